use std::collections::VecDeque;

use crate::commons::*;
use crate::protocol::{BusQ, CoherenceProtocol};

#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub struct BusStats {
    pub bus_rd: u64,
    pub bus_rdx: u64,
    pub bus_upgr: u64,
    pub write_backs: u64,
    /// transactions that moved a block
    pub data_traffic: u64,
    /// data requests answered by a peer cache instead of memory
    pub c2c_transfers: u64,
    /// broadcasts that invalidate peer copies
    pub invalidations: u64,
}

impl BusStats {
    pub fn transactions(&self) -> u64 {
        self.bus_rd + self.bus_rdx + self.bus_upgr + self.write_backs
    }

    fn record(&mut self, t: &Transaction, supplied_by_peer: bool) {
        match t.kind {
            TxKind::BusRd => self.bus_rd += 1,
            TxKind::BusRdX => self.bus_rdx += 1,
            TxKind::BusUpgr => self.bus_upgr += 1,
            TxKind::WriteBack => self.write_backs += 1,
        }
        if t.kind.carries_data() {
            self.data_traffic += 1;
        }
        if supplied_by_peer && matches!(t.kind, TxKind::BusRd | TxKind::BusRdX) {
            self.c2c_transfers += 1;
        }
        if t.kind.invalidates() {
            self.invalidations += 1;
        }
    }
}

/// The shared bus. Transactions are carried one at a time in the order
/// they were issued.
#[derive(Default, Debug)]
pub struct Bus {
    queue: VecDeque<Transaction>,
    stats: BusStats,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// queue everything cache `id` asked to send
    pub fn enqueue(&mut self, id: u32, send_bus: &mut BusQ) {
        for (kind, addr) in send_bus.drain(..) {
            debug!("cache {} queues {:?} {}", id, kind, addr);
            self.queue.push_back(Transaction::new(kind, addr, id));
        }
    }

    /// Carry the oldest queued transaction: every other cache snoops it, then
    /// the issuing cache completes it. Returns the completed transaction.
    pub fn step(&mut self, caches: &mut [Box<dyn CoherenceProtocol>]) -> Option<Transaction> {
        let mut t = self.queue.pop_front()?;
        let mut send_bus = BusQ::new();

        let mut can_provide = false;
        for (id, cache) in caches.iter_mut().enumerate() {
            if id as u32 == t.source {
                continue;
            }
            can_provide |= cache.snoop(&t, &mut send_bus);
            self.enqueue(id as u32, &mut send_bus);
        }
        t.shared = can_provide;
        self.stats.record(&t, can_provide);
        debug!("bus carries {:?} {} from cache {} (shared: {})", t.kind, t.addr, t.source, t.shared);

        let source = caches
            .get_mut(t.source as usize)
            .expect("transaction from unknown cache");
        source.complete(&t, &mut send_bus);
        self.enqueue(t.source, &mut send_bus);
        Some(t)
    }
}
