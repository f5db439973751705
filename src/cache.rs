// This module defines the storage interface the coherence controllers use,
// and a set-associative LRU implementation of it.

use crate::commons::{Addr, LineState, SystemSpec};

pub trait CacheStore {
    /// way holding `addr`, if any (the line may still be `Invalid`)
    fn contains(&self, addr: Addr) -> Option<usize>;
    fn state_of(&self, addr: Addr, way: usize) -> LineState;
    /// set the state of a present line and mark it most recently used
    fn update_state(&mut self, addr: Addr, way: usize, state: LineState);
    /// place a line not currently present, returning the displaced valid line
    fn insert(&mut self, addr: Addr, state: LineState) -> Option<(LineState, Addr)>;

    fn lookup(&self, addr: Addr) -> LineState {
        self.contains(addr)
            .map(|way| self.state_of(addr, way))
            .unwrap_or(LineState::Invalid)
    }
}

#[derive(Clone, Copy, Debug)]
struct Block {
    tag: u32,
    last_used: u32,
    state: LineState,
}

#[derive(Clone, Debug)]
struct CacheSet {
    blocks: Vec<Option<Block>>,
    mru_ctr: u32,
}

impl CacheSet {
    fn new(assoc: usize) -> Self {
        Self { blocks: vec![None; assoc], mru_ctr: 0 }
    }
    fn get(&self, tag: u32) -> Option<usize> {
        self.blocks.iter().position(|b| matches!(b, Some(b) if b.tag == tag))
    }
    fn tick(&mut self) -> u32 {
        self.mru_ctr += 1;
        self.mru_ctr
    }
    fn touch(&mut self, way: usize, state: LineState) {
        let now = self.tick();
        if let Some(b) = self.blocks[way].as_mut() {
            b.state = state;
            b.last_used = now;
        }
    }
    /// way to fill next: an empty or invalid way if there is one, else the LRU way
    fn victim(&self) -> usize {
        let free = self.blocks.iter().position(|b| match b {
            None => true,
            Some(b) => !b.state.is_valid(),
        });
        free.unwrap_or_else(|| {
            self.blocks
                .iter()
                .enumerate()
                .min_by_key(|(_, b)| b.map(|b| b.last_used).unwrap_or(0))
                .map(|(i, _)| i)
                .unwrap_or(0)
        })
    }
    fn replace(&mut self, way: usize, tag: u32, state: LineState) -> Option<Block> {
        let now = self.tick();
        std::mem::replace(&mut self.blocks[way], Some(Block { tag, last_used: now, state }))
    }
}

#[derive(Clone, Debug)]
pub struct SetAssocCache {
    specs: SystemSpec,
    sets: Vec<CacheSet>,
}

impl SetAssocCache {
    pub fn new(specs: SystemSpec) -> Self {
        let sets = (0..specs.num_sets())
            .map(|_| CacheSet::new(specs.cache_assoc as usize))
            .collect();
        Self { specs, sets }
    }

    fn set_and_tag_of(&self, addr: Addr) -> (&CacheSet, u32) {
        let (index, tag) = addr.pos(&self.specs);
        (&self.sets[index as usize], tag)
    }
    fn set_and_tag_of_mut(&mut self, addr: Addr) -> (&mut CacheSet, u32) {
        let (index, tag) = addr.pos(&self.specs);
        (&mut self.sets[index as usize], tag)
    }
}

impl CacheStore for SetAssocCache {
    fn contains(&self, addr: Addr) -> Option<usize> {
        let (set, tag) = self.set_and_tag_of(addr);
        set.get(tag)
    }

    fn state_of(&self, addr: Addr, way: usize) -> LineState {
        let (set, tag) = self.set_and_tag_of(addr);
        match set.blocks[way] {
            Some(b) if b.tag == tag => b.state,
            _ => LineState::Invalid,
        }
    }

    fn update_state(&mut self, addr: Addr, way: usize, state: LineState) {
        let (set, tag) = self.set_and_tag_of_mut(addr);
        debug_assert_eq!(set.get(tag), Some(way), "update of a line that is not present");
        set.touch(way, state);
    }

    fn insert(&mut self, addr: Addr, state: LineState) -> Option<(LineState, Addr)> {
        let (index, tag) = addr.pos(&self.specs);
        let specs = self.specs;
        let set = &mut self.sets[index as usize];
        if let Some(way) = set.get(tag) {
            set.touch(way, state);
            return None;
        }
        let way = set.victim();
        set.replace(way, tag, state)
            .filter(|old| old.state.is_valid())
            .map(|old| (old.state, Addr::from_pos(index, old.tag, &specs)))
    }
}
