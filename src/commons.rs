use std::collections::VecDeque;
use std::fmt;

use crate::error::ConfigError;

// system specs

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Protocol {
    Mesi,
    Moesi,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Mesi => write!(f, "MESI"),
            Protocol::Moesi => write!(f, "MOESI"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SystemSpec {         // unit         reasonable defaults
    pub protocol: Protocol,     //              MOESI
    pub word_size: u32,         // bytes        4
    pub address_size: u32,      // bytes        4
    pub block_size: u32,        // bytes        32
    pub cache_size: u32,        // bytes        4096
    pub cache_assoc: u32,       // blocks       2
}

impl Default for SystemSpec {
    fn default() -> Self {
        SystemSpec {
            protocol: Protocol::Moesi,
            word_size: 4,
            address_size: 4,
            block_size: 32,
            cache_size: 4096,
            cache_assoc: 2,
        }
    }
}

impl SystemSpec {
    /// number of sets in each cache
    pub fn num_sets(&self) -> u32 {
        self.cache_size / (self.block_size * self.cache_assoc)
    }

    /// block address containing the given byte address
    pub fn block_of(&self, byte_addr: u32) -> Addr {
        Addr(byte_addr / self.block_size)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("word_size", self.word_size),
            ("address_size", self.address_size),
            ("block_size", self.block_size),
            ("cache_size", self.cache_size),
            ("cache_assoc", self.cache_assoc),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Zero(name));
        }
        if self.block_size % self.word_size != 0 {
            return Err(ConfigError::BlockNotWordAligned {
                block_size: self.block_size,
                word_size: self.word_size,
            });
        }
        let set_bytes = self.block_size * self.cache_assoc;
        if self.cache_size % set_bytes != 0 || self.cache_size < set_bytes {
            return Err(ConfigError::Geometry {
                cache_size: self.cache_size,
                block_size: self.block_size,
                cache_assoc: self.cache_assoc,
            });
        }
        Ok(())
    }
}

// addresses and blocks

/// A block address, i.e. a byte address divided by the block size.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Addr(pub u32);

impl Addr {
    /// get cache index and tag of this address under given system specs
    pub fn pos(&self, specs: &SystemSpec) -> (u32, u32) {
        let num_indices = specs.num_sets();
        let index = self.0 % num_indices;
        let tag = self.0 / num_indices;
        (index, tag)
    }

    /// inverse of `pos`
    pub fn from_pos(index: u32, tag: u32, specs: &SystemSpec) -> Addr {
        Addr(tag * specs.num_sets() + index)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// instructions

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instr {
    Read(Addr),
    Write(Addr),
    Other(u32),
}

pub type Instructions = VecDeque<Instr>;

// coherence

/// State of a cache line. Addresses absent from a cache are `Invalid`.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LineState {
    Modified,
    Owned,
    Exclusive,
    Shared,
    #[default]
    Invalid,
}

impl LineState {
    pub fn is_valid(self) -> bool {
        self != LineState::Invalid
    }

    /// holds data newer than memory
    pub fn is_dirty(self) -> bool {
        matches!(self, LineState::Modified | LineState::Owned)
    }

    /// no peer may hold a valid copy
    pub fn is_exclusive(self) -> bool {
        matches!(self, LineState::Modified | LineState::Exclusive)
    }
}

// the bus transactions a cache can issue and snoop
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TxKind {
    BusRd,
    BusRdX,
    BusUpgr,
    WriteBack,
}

impl TxKind {
    pub const ALL: [TxKind; 4] = [TxKind::BusRd, TxKind::BusRdX, TxKind::BusUpgr, TxKind::WriteBack];

    /// moves a block over the bus
    pub fn carries_data(self) -> bool {
        !matches!(self, TxKind::BusUpgr)
    }

    /// invalidates all peer copies
    pub fn invalidates(self) -> bool {
        matches!(self, TxKind::BusRdX | TxKind::BusUpgr)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Transaction {
    pub kind: TxKind,
    pub addr: Addr,
    /// some peer still holds a valid copy, only meaningful on BusRd completion
    pub shared: bool,
    pub source: u32,
}

impl Transaction {
    pub fn new(kind: TxKind, addr: Addr, source: u32) -> Self {
        Transaction { kind, addr, shared: false, source }
    }
}
