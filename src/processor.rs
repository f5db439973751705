use crate::commons::*;
use crate::protocol::{BusQ, CoherenceProtocol};

#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProcState {
    #[default]
    Ready,
    // the integer is the number of cycles remaining
    ExecutingOther(u32),
    WaitingForBus(Addr),
    Done,
}

#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProcStats {
    pub cycles: u64,
    pub compute_cycles: u64,
    pub idle_cycles: u64,
    pub loads: u64,
    pub stores: u64,
}

#[derive(Debug)]
pub struct Processor {
    pub id: u32,
    state: ProcState,
    insts: Instructions,
    stats: ProcStats,
}

impl Processor {
    pub fn new(id: u32, insts: Instructions) -> Self {
        let mut cpu = Processor {
            id,
            state: ProcState::Ready,
            insts,
            stats: ProcStats::default(),
        };
        cpu.check_done();
        cpu
    }

    pub fn state(&self) -> ProcState {
        self.state
    }

    pub fn stats(&self) -> &ProcStats {
        &self.stats
    }

    pub fn is_done(&self) -> bool {
        self.state == ProcState::Done
    }

    /// advance one cycle, issuing at most one memory access to `cache`
    pub fn tick(&mut self, cache: &mut dyn CoherenceProtocol, send_bus: &mut BusQ) {
        if self.is_done() {
            return;
        }
        self.stats.cycles += 1;
        self.state = match self.state {
            ProcState::Ready => self.exec_instr(cache, send_bus),
            ProcState::ExecutingOther(t) => {
                self.stats.compute_cycles += 1;
                if t > 1 { ProcState::ExecutingOther(t - 1) } else { ProcState::Ready }
            }
            ProcState::WaitingForBus(addr) => {
                self.stats.idle_cycles += 1;
                ProcState::WaitingForBus(addr)
            }
            ProcState::Done => ProcState::Done,
        };
        self.check_done();
    }

    fn exec_instr(&mut self, cache: &mut dyn CoherenceProtocol, send_bus: &mut BusQ) -> ProcState {
        let issued_before = send_bus.len();
        let addr = match self.insts.pop_front() {
            Some(Instr::Read(addr)) => {
                self.stats.loads += 1;
                cache.read(addr, send_bus);
                addr
            }
            Some(Instr::Write(addr)) => {
                self.stats.stores += 1;
                cache.write(addr, send_bus);
                addr
            }
            Some(Instr::Other(t)) => {
                self.stats.compute_cycles += 1;
                return if t > 1 { ProcState::ExecutingOther(t - 1) } else { ProcState::Ready };
            }
            None => return ProcState::Done,
        };
        let stalled = send_bus
            .iter()
            .skip(issued_before)
            .any(|&(kind, a)| kind != TxKind::WriteBack && a == addr);
        if stalled {
            trace!("processor {} stalls on {}", self.id, addr);
            ProcState::WaitingForBus(addr)
        } else {
            ProcState::Ready
        }
    }

    /// unstall once the transaction we are waiting for has completed
    pub fn on_complete(&mut self, t: &Transaction) {
        if t.kind == TxKind::WriteBack {
            return;
        }
        if self.state == ProcState::WaitingForBus(t.addr) {
            trace!("processor {} resumes after {:?} {}", self.id, t.kind, t.addr);
            self.state = ProcState::Ready;
            self.check_done();
        }
    }

    fn check_done(&mut self) {
        if self.state == ProcState::Ready && self.insts.is_empty() {
            self.state = ProcState::Done;
        }
    }
}
