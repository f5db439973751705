use crate::cache::{CacheStore, SetAssocCache};
use crate::commons::*;

use super::{fill, lookup, upgrade_on_exclusive, AccessStats, BusQ, CoherenceProtocol};

/// MESI controller. Without an Owned state, a Modified line snooped by a
/// peer has to be flushed to memory.
#[derive(Debug)]
pub struct Mesi<S: CacheStore = SetAssocCache> {
    store: S,
    stats: AccessStats,
}

impl<S: CacheStore> Mesi<S> {
    pub fn new(store: S) -> Self {
        Self { store, stats: AccessStats::default() }
    }
}

impl<S: CacheStore> CoherenceProtocol for Mesi<S> {
    fn protocol(&self) -> Protocol {
        Protocol::Mesi
    }

    fn read(&mut self, addr: Addr, send_bus: &mut BusQ) {
        match lookup(&self.store, addr) {
            None | Some((_, LineState::Invalid)) => {
                trace!("read miss {}", addr);
                self.stats.miss();
                send_bus.push_back((TxKind::BusRd, addr));
            }
            Some((way, state)) => {
                debug_assert!(state != LineState::Owned, "Owned line in a MESI cache");
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
            Some((way, LineState::Shared)) => {
                trace!("write hit {} (Shared), upgrading", addr);
                self.stats.hit(LineState::Shared);
                self.store.update_state(addr, way, LineState::Modified);
                send_bus.push_back((TxKind::BusUpgr, addr));
            }
            Some((way, state @ (LineState::Exclusive | LineState::Modified | LineState::Owned))) => {
                debug_assert!(state != LineState::Owned, "Owned line in a MESI cache");
                trace!("write hit {} ({:?})", addr, state);
                self.stats.hit(state);
                self.store.update_state(addr, way, LineState::Modified);
            }
        }
    }

    fn snoop(&mut self, t: &Transaction, send_bus: &mut BusQ) -> bool {
        use LineState::*;
        use TxKind::*;
        let Some((way, state)) = lookup(&self.store, t.addr) else {
            return false;
        };
        debug_assert!(state != Owned, "Owned line in a MESI cache");
        let next = match (state, t.kind) {
            (Invalid, _) => None,
            (Modified | Owned, BusRd) => {
                send_bus.push_back((WriteBack, t.addr));
                Some(Shared)
            }
            (Modified | Owned, BusRdX) => {
                send_bus.push_back((WriteBack, t.addr));
                Some(Invalid)
            }
            (Exclusive, BusRd) => Some(Shared),
            (Shared, BusRd) => None,
            (Exclusive | Shared, BusRdX) => Some(Invalid),
            (Shared, BusUpgr) => Some(Invalid),
            (Modified | Owned | Exclusive, BusUpgr) => {
                upgrade_on_exclusive(t.addr, state);
                None
            }
            (_, WriteBack) => None,
        };
        if let Some(next) = next {
            trace!("snoop {:?} {}: {:?} -> {:?}", t.kind, t.addr, state, next);
            self.store.update_state(t.addr, way, next);
        }
        state.is_valid()
    }

    fn complete(&mut self, t: &Transaction, send_bus: &mut BusQ) {
        let state = match t.kind {
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
