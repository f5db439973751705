use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::commons::{Addr, LineState};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be non-zero")]
    Zero(&'static str),
    #[error("block size {block_size} is not a multiple of the word size {word_size}")]
    BlockNotWordAligned { block_size: u32, word_size: u32 },
    #[error("cache size {cache_size} is not a multiple of block size {block_size} x associativity {cache_assoc}")]
    Geometry { cache_size: u32, block_size: u32, cache_assoc: u32 },
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to read {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("{path:?}:{line}: malformed trace line {text:?}")]
    Malformed { path: PathBuf, line: usize, text: String },
    #[error("{path:?}:{line}: invalid instruction code {code}")]
    UnknownInstr { path: PathBuf, line: usize, code: u32 },
    #[error("no trace files named {name}*.data in {dir:?}")]
    NotFound { dir: PathBuf, name: String },
}

/// A coherence invariant broken across the caches of one simulation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoherenceError {
    #[error("{addr} held {held:?} by cache {holder} while other caches hold valid copies: {states:?}")]
    NotExclusive { addr: Addr, holder: usize, held: LineState, states: Vec<LineState> },
    #[error("{addr} owned by more than one cache: {states:?}")]
    MultipleOwners { addr: Addr, states: Vec<LineState> },
}
