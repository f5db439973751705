use std::collections::BTreeSet;

use crate::bus::{Bus, BusStats};
use crate::commons::*;
use crate::error::{CoherenceError, ConfigError};
use crate::processor::{ProcStats, Processor};
use crate::protocol::{self, AccessStats, BusQ, CoherenceProtocol};

#[derive(Clone, PartialEq, Debug)]
pub struct SimStats {
    pub protocol: Protocol,
    pub steps: u64,
    pub procs: Vec<ProcStats>,
    pub caches: Vec<AccessStats>,
    pub bus: BusStats,
}

/*
    Every step each processor gets one cycle. Whatever its access put on the
    bus is carried to completion before the next processor runs, so at most
    one transaction is ever in flight and snoops never race.
 */
pub struct Simulator {
    protocol: Protocol,
    procs: Vec<Processor>,
    caches: Vec<Box<dyn CoherenceProtocol>>,
    bus: Bus,
    steps: u64,
}

impl Simulator {
    pub fn new(specs: SystemSpec, insts: Vec<Instructions>) -> Result<Self, ConfigError> {
        specs.validate()?;
        let caches = insts.iter().map(|_| protocol::build(&specs)).collect();
        Ok(Self::with_caches(specs.protocol, caches, insts))
    }

    /// one processor per instruction stream, driving the cache at the same index
    pub fn with_caches(
        protocol: Protocol,
        caches: Vec<Box<dyn CoherenceProtocol>>,
        insts: Vec<Instructions>,
    ) -> Self {
        assert_eq!(caches.len(), insts.len(), "need one cache per processor");
        let procs = insts
            .into_iter()
            .enumerate()
            .map(|(i, insts)| Processor::new(i as u32, insts))
            .collect();
        Simulator { protocol, procs, caches, bus: Bus::new(), steps: 0 }
    }

    pub fn caches(&self) -> &[Box<dyn CoherenceProtocol>] {
        &self.caches
    }

    pub fn procs(&self) -> &[Processor] {
        &self.procs
    }

    pub fn is_done(&self) -> bool {
        self.procs.iter().all(Processor::is_done)
    }

    /// Run one cycle and return the addresses whose coherence state may have changed.
    pub fn step(&mut self) -> BTreeSet<Addr> {
        let mut touched = BTreeSet::new();
        let mut send_bus = BusQ::new();
        for i in 0..self.procs.len() {
            self.procs[i].tick(self.caches[i].as_mut(), &mut send_bus);
            self.bus.enqueue(i as u32, &mut send_bus);
            while let Some(t) = self.bus.step(&mut self.caches) {
                touched.insert(t.addr);
                self.procs[t.source as usize].on_complete(&t);
            }
        }
        self.steps += 1;

        if cfg!(debug_assertions) {
            for addr in &touched {
                if let Err(e) = check_coherence(&self.caches, *addr) {
                    panic!("coherence violated after step {}: {}", self.steps, e);
                }
            }
        }
        touched
    }

    pub fn run(&mut self, max_steps: Option<u64>) -> SimStats {
        info!("simulating {} processors with {}", self.procs.len(), self.protocol);
        while !self.is_done() {
            if max_steps.is_some_and(|max| self.steps >= max) {
                warn!("stopping after {} steps, processors still running", self.steps);
                break;
            }
            self.step();
        }
        info!("finished simulation in {} steps", self.steps);
        self.stats()
    }

    pub fn stats(&self) -> SimStats {
        SimStats {
            protocol: self.protocol,
            steps: self.steps,
            procs: self.procs.iter().map(|p| *p.stats()).collect(),
            caches: self.caches.iter().map(|c| *c.stats()).collect(),
            bus: *self.bus.stats(),
        }
    }
}

pub fn simulate(
    specs: SystemSpec,
    insts: Vec<Instructions>,
    max_steps: Option<u64>,
) -> Result<SimStats, ConfigError> {
    let mut sim = Simulator::new(specs, insts)?;
    Ok(sim.run(max_steps))
}

/// Check the cross-cache invariants for one address: a Modified or
/// Exclusive line is the only valid copy, and there is at most one owner.
pub fn check_coherence(caches: &[Box<dyn CoherenceProtocol>], addr: Addr) -> Result<(), CoherenceError> {
    let states = caches.iter().map(|c| c.state_of(addr)).collect::<Vec<_>>();
    let valid = states.iter().filter(|s| s.is_valid()).count();
    if let Some(holder) = states.iter().position(|s| s.is_exclusive()) {
        if valid > 1 {
            return Err(CoherenceError::NotExclusive { addr, holder, held: states[holder], states });
        }
    }
    if states.iter().filter(|&&s| s == LineState::Owned).count() > 1 {
        return Err(CoherenceError::MultipleOwners { addr, states });
    }
    Ok(())
}
