use crate::cache::{CacheStore, SetAssocCache};
use crate::commons::*;

use super::{fill, lookup, upgrade_on_exclusive, AccessStats, BusQ, CoherenceProtocol};

/// MOESI controller. A dirty line read by a peer stays here as Owned, so
/// memory is only updated when an Owned or Modified line is evicted.
#[derive(Debug)]
pub struct Moesi<S: CacheStore = SetAssocCache> {
    store: S,
    stats: AccessStats,
}

impl<S: CacheStore> Moesi<S> {
    pub fn new(store: S) -> Self {
        Self { store, stats: AccessStats::default() }
    }

    /// next state when snooping `kind` in `state`, `None` if the line is unaffected
    fn snoop_transition(addr: Addr, state: LineState, kind: TxKind) -> Option<LineState> {
        use LineState::*;
        use TxKind::*;
        match (state, kind) {
            (Invalid, _) => None,
            // dirty data stays here, no write-back
            (Modified, BusRd) => Some(Owned),
            (Owned, BusRd) => None,
            (Exclusive, BusRd) => Some(Shared),
            (Shared, BusRd) => None,
            (Modified | Owned | Exclusive | Shared, BusRdX) => Some(Invalid),
            (Owned | Shared, BusUpgr) => Some(Invalid),
            (Modified | Exclusive, BusUpgr) => {
                upgrade_on_exclusive(addr, state);
                None
            }
            (_, WriteBack) => None,
        }
    }
}

impl<S: CacheStore> CoherenceProtocol for Moesi<S> {
    fn protocol(&self) -> Protocol {
        Protocol::Moesi
    }

    fn read(&mut self, addr: Addr, send_bus: &mut BusQ) {
        match lookup(&self.store, addr) {
            None | Some((_, LineState::Invalid)) => {
                trace!("read miss {}", addr);
                self.stats.miss();
                send_bus.push_back((TxKind::BusRd, addr));
            }
            Some((way, state)) => {
                trace!("read hit {} ({:?})", addr, state);
                self.stats.hit(state);
                self.store.update_state(addr, way, state);
            }
        }
    }

    fn write(&mut self, addr: Addr, send_bus: &mut BusQ) {
        match lookup(&self.store, addr) {
            None | Some((_, LineState::Invalid)) => {
                trace!("write miss {}", addr);
                self.stats.miss();
                send_bus.push_back((TxKind::BusRdX, addr));
            }
            Some((way, state @ (LineState::Shared | LineState::Owned))) => {
                // copy is current, peers only need invalidating
                trace!("write hit {} ({:?}), upgrading", addr, state);
                self.stats.hit(state);
                self.store.update_state(addr, way, LineState::Modified);
                send_bus.push_back((TxKind::BusUpgr, addr));
            }
            Some((way, state @ (LineState::Exclusive | LineState::Modified))) => {
                trace!("write hit {} ({:?})", addr, state);
                self.stats.hit(state);
                self.store.update_state(addr, way, LineState::Modified);
            }
        }
    }

    fn snoop(&mut self, t: &Transaction, _send_bus: &mut BusQ) -> bool {
        let Some((way, state)) = lookup(&self.store, t.addr) else {
            return false;
        };
        if let Some(next) = Self::snoop_transition(t.addr, state, t.kind) {
            trace!("snoop {:?} {}: {:?} -> {:?}", t.kind, t.addr, state, next);
            self.store.update_state(t.addr, way, next);
        }
        state.is_valid()
    }

    fn complete(&mut self, t: &Transaction, send_bus: &mut BusQ) {
        let state = match t.kind {
            // WriteBack: the line is already gone. BusUpgr: set to Modified at issue.
            TxKind::WriteBack | TxKind::BusUpgr => return,
            TxKind::BusRd if t.shared => LineState::Shared,
            TxKind::BusRd => LineState::Exclusive,
            TxKind::BusRdX => LineState::Modified,
        };
        trace!("unstall {:?} {}: -> {:?}", t.kind, t.addr, state);
        fill(&mut self.store, t.addr, state, send_bus);
    }

    fn state_of(&self, addr: Addr) -> LineState {
        self.store.lookup(addr)
    }

    fn stats(&self) -> &AccessStats {
        &self.stats
    }
}
