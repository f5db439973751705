// Coherence controllers. Each protocol is one implementation of
// `CoherenceProtocol`; the simulator picks one per cache at construction.

mod mesi;
mod moesi;

pub use mesi::Mesi;
pub use moesi::Moesi;

use std::collections::VecDeque;

use crate::cache::{CacheStore, SetAssocCache};
use crate::commons::*;

/// transactions a controller wants the bus to carry on its behalf
pub type BusQ = VecDeque<(TxKind, Addr)>;

/// Access counters, written only by the local access handlers.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub struct AccessStats {
    pub hits: u64,
    pub misses: u64,
    /// hits on lines held exclusively (Modified/Exclusive)
    pub private_accesses: u64,
    /// hits on lines peers may also hold (Shared/Owned)
    pub public_accesses: u64,
}

impl AccessStats {
    fn hit(&mut self, state: LineState) {
        self.hits += 1;
        if state.is_exclusive() {
            self.private_accesses += 1;
        } else {
            self.public_accesses += 1;
        }
    }
    fn miss(&mut self) {
        self.misses += 1;
    }
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }
    pub fn miss_rate(&self) -> f64 {
        match self.accesses() {
            0 => 0.0,
            n => self.misses as f64 / n as f64,
        }
    }
}

pub trait CoherenceProtocol {
    fn protocol(&self) -> Protocol;
    /// processor read
    fn read(&mut self, addr: Addr, send_bus: &mut BusQ);
    /// processor write
    fn write(&mut self, addr: Addr, send_bus: &mut BusQ);
    /// react to a transaction issued by another cache, returns whether
    /// this cache holds a valid copy it can supply
    fn snoop(&mut self, t: &Transaction, send_bus: &mut BusQ) -> bool;
    /// a transaction issued by this cache has completed (unstall)
    fn complete(&mut self, t: &Transaction, send_bus: &mut BusQ);
    fn state_of(&self, addr: Addr) -> LineState;
    fn stats(&self) -> &AccessStats;
}

/// Build the controller for the protocol named in `specs`.
pub fn build(specs: &SystemSpec) -> Box<dyn CoherenceProtocol> {
    let cache = SetAssocCache::new(*specs);
    match specs.protocol {
        Protocol::Mesi => Box::new(Mesi::new(cache)),
        Protocol::Moesi => Box::new(Moesi::new(cache)),
    }
}

// shared helpers

fn lookup<S: CacheStore>(store: &S, addr: Addr) -> Option<(usize, LineState)> {
    store.contains(addr).map(|way| (way, store.state_of(addr, way)))
}

/// Install the line fetched by a completed transaction. A dirty line pushed
/// out to make room is written back.
fn fill<S: CacheStore>(store: &mut S, addr: Addr, state: LineState, send_bus: &mut BusQ) {
    if let Some(way) = store.contains(addr) {
        store.update_state(addr, way, state);
        return;
    }
    if let Some((evicted_state, evicted)) = store.insert(addr, state) {
        if evicted_state.is_dirty() {
            debug!("evicted dirty line {} ({:?}), writing back", evicted, evicted_state);
            send_bus.push_back((TxKind::WriteBack, evicted));
        } else {
            trace!("evicted clean line {} ({:?})", evicted, evicted_state);
        }
    }
}

/// A BusUpgr is only issued by a cache holding a readable copy, so no peer
/// can be Modified or Exclusive when one is snooped.
fn upgrade_on_exclusive(addr: Addr, state: LineState) {
    debug_assert!(false, "BusUpgr snooped for {} while holding it {:?}", addr, state);
    warn!("BusUpgr snooped for {} while holding it {:?}, ignoring", addr, state);
}
