/*
    A MOESI (and MESI) cache coherence simulator for a shared-bus multiprocessor.
 */

#[macro_use]
extern crate log;

pub mod bus;
pub mod cache;
pub mod commons;
pub mod error;
pub mod processor;
pub mod protocol;
pub mod simulator;
pub mod utils;

pub use bus::{Bus, BusStats};
pub use cache::{CacheStore, SetAssocCache};
pub use commons::*;
pub use error::{CoherenceError, ConfigError, TraceError};
pub use processor::{ProcState, ProcStats, Processor};
pub use protocol::{AccessStats, BusQ, CoherenceProtocol, Mesi, Moesi};
pub use simulator::{check_coherence, simulate, SimStats, Simulator};
