use cachesim_moesi::*;
use pretty_assertions::assert_eq;

const A: Addr = Addr(0x40);
const PEER: u32 = 1;

fn moesi() -> Moesi {
    Moesi::new(SetAssocCache::new(SystemSpec::default()))
}

fn mesi() -> Mesi {
    Mesi::new(SetAssocCache::new(SystemSpec {
        protocol: Protocol::Mesi,
        ..Default::default()
    }))
}

fn tx(kind: TxKind, addr: Addr, shared: bool) -> Transaction {
    Transaction { kind, addr, shared, source: 0 }
}

fn peer(kind: TxKind, addr: Addr) -> Transaction {
    Transaction::new(kind, addr, PEER)
}

fn queued(q: &BusQ) -> Vec<(TxKind, Addr)> {
    q.iter().copied().collect()
}

/// drive `cache` until it holds `addr` in `state`
fn prepare(cache: &mut dyn CoherenceProtocol, addr: Addr, state: LineState) {
    let mut q = BusQ::new();
    match state {
        LineState::Invalid => {}
        LineState::Shared | LineState::Exclusive => {
            cache.read(addr, &mut q);
            cache.complete(&tx(TxKind::BusRd, addr, state == LineState::Shared), &mut q);
        }
        LineState::Modified => {
            cache.write(addr, &mut q);
            cache.complete(&tx(TxKind::BusRdX, addr, false), &mut q);
        }
        LineState::Owned => {
            prepare(cache, addr, LineState::Modified);
            cache.snoop(&peer(TxKind::BusRd, addr), &mut q);
        }
    }
    assert_eq!(cache.state_of(addr), state);
}

// local accesses

#[test]
fn read_miss_then_exclusive_fill() {
    let mut cache = moesi();
    let mut q = BusQ::new();
    cache.read(A, &mut q);
    assert_eq!(queued(&q), vec![(TxKind::BusRd, A)]);
    assert_eq!(cache.stats().misses, 1);
    assert_eq!(cache.state_of(A), LineState::Invalid);

    q.clear();
    cache.complete(&tx(TxKind::BusRd, A, false), &mut q);
    assert_eq!(cache.state_of(A), LineState::Exclusive);
    assert!(q.is_empty());
}

#[test]
fn read_miss_then_shared_fill() {
    let mut cache = moesi();
    let mut q = BusQ::new();
    cache.read(A, &mut q);
    cache.complete(&tx(TxKind::BusRd, A, true), &mut q);
    assert_eq!(cache.state_of(A), LineState::Shared);
}

#[test]
fn write_on_exclusive_is_silent() {
    let mut cache = moesi();
    prepare(&mut cache, A, LineState::Exclusive);
    let before = *cache.stats();

    let mut q = BusQ::new();
    cache.write(A, &mut q);
    assert_eq!(cache.state_of(A), LineState::Modified);
    assert!(q.is_empty());
    assert_eq!(cache.stats().hits, before.hits + 1);
    assert_eq!(cache.stats().private_accesses, before.private_accesses + 1);
    assert_eq!(cache.stats().misses, before.misses);
}

#[test]
fn write_on_owned_upgrades() {
    let mut cache = moesi();
    prepare(&mut cache, A, LineState::Owned);
    let before = *cache.stats();

    let mut q = BusQ::new();
    cache.write(A, &mut q);
    assert_eq!(cache.state_of(A), LineState::Modified);
    assert_eq!(queued(&q), vec![(TxKind::BusUpgr, A)]);
    assert_eq!(cache.stats().public_accesses, before.public_accesses + 1);

    // completing the upgrade changes nothing
    q.clear();
    cache.complete(&tx(TxKind::BusUpgr, A, false), &mut q);
    assert_eq!(cache.state_of(A), LineState::Modified);
    assert!(q.is_empty());
}

#[test]
fn write_on_shared_upgrades() {
    let mut cache = moesi();
    prepare(&mut cache, A, LineState::Shared);
    let mut q = BusQ::new();
    cache.write(A, &mut q);
    assert_eq!(cache.state_of(A), LineState::Modified);
    assert_eq!(queued(&q), vec![(TxKind::BusUpgr, A)]);
}

#[test]
fn write_miss_fills_modified() {
    let mut cache = moesi();
    let mut q = BusQ::new();
    cache.write(A, &mut q);
    assert_eq!(queued(&q), vec![(TxKind::BusRdX, A)]);
    assert_eq!(cache.stats().misses, 1);
    q.clear();
    cache.complete(&tx(TxKind::BusRdX, A, true), &mut q);
    assert_eq!(cache.state_of(A), LineState::Modified);
}

#[test]
fn write_on_invalidated_line_misses() {
    let mut cache = moesi();
    prepare(&mut cache, A, LineState::Shared);
    let mut q = BusQ::new();
    cache.snoop(&peer(TxKind::BusRdX, A), &mut q);
    assert_eq!(cache.state_of(A), LineState::Invalid);

    cache.write(A, &mut q);
    assert_eq!(queued(&q), vec![(TxKind::BusRdX, A)]);
    assert_eq!(cache.stats().misses, 2);
}

#[test]
fn read_hits_change_nothing() {
    for state in [LineState::Modified, LineState::Owned, LineState::Exclusive, LineState::Shared] {
        let mut cache = moesi();
        prepare(&mut cache, A, state);
        let before = *cache.stats();
        let mut q = BusQ::new();
        cache.read(A, &mut q);
        cache.read(A, &mut q);
        assert_eq!(cache.state_of(A), state);
        assert!(q.is_empty(), "read hit in {:?} issued {:?}", state, q);
        assert_eq!(cache.stats().hits, before.hits + 2);
        assert_eq!(cache.stats().misses, before.misses);
        if state.is_exclusive() {
            assert_eq!(cache.stats().private_accesses, before.private_accesses + 2);
        } else {
            assert_eq!(cache.stats().public_accesses, before.public_accesses + 2);
        }
    }
}

#[test]
fn every_access_counts_once() {
    let mut cache = moesi();
    let mut q = BusQ::new();
    cache.read(A, &mut q);
    cache.complete(&tx(TxKind::BusRd, A, false), &mut q);
    cache.read(A, &mut q);
    cache.write(A, &mut q);
    cache.write(Addr(0x41), &mut q);
    let s = cache.stats();
    assert_eq!(s.accesses(), 4);
    assert_eq!(s.hits, s.private_accesses + s.public_accesses);
    assert_eq!(s.misses, 2);
}

// snooping

#[test]
fn snoop_table() {
    use LineState::*;
    use TxKind::*;
    let table = [
        (Modified, BusRd, Owned),
        (Modified, BusRdX, Invalid),
        (Owned, BusRd, Owned),
        (Owned, BusRdX, Invalid),
        (Owned, BusUpgr, Invalid),
        (Exclusive, BusRd, Shared),
        (Exclusive, BusRdX, Invalid),
        (Shared, BusRd, Shared),
        (Shared, BusRdX, Invalid),
        (Shared, BusUpgr, Invalid),
        (Modified, WriteBack, Modified),
        (Owned, WriteBack, Owned),
        (Exclusive, WriteBack, Exclusive),
        (Shared, WriteBack, Shared),
    ];
    for (from, kind, to) in table {
        let mut cache = moesi();
        prepare(&mut cache, A, from);
        let mut q = BusQ::new();
        let can_provide = cache.snoop(&peer(kind, A), &mut q);
        assert!(can_provide, "{:?} on {:?}", kind, from);
        assert_eq!(cache.state_of(A), to, "{:?} on {:?}", kind, from);
        assert!(q.is_empty(), "MOESI snoop issued {:?}", q);
    }
}

#[test]
fn snoop_on_absent_or_invalid_line() {
    let mut cache = moesi();
    let mut q = BusQ::new();
    for kind in TxKind::ALL {
        assert!(!cache.snoop(&peer(kind, A), &mut q));
    }
    prepare(&mut cache, A, LineState::Shared);
    cache.snoop(&peer(TxKind::BusUpgr, A), &mut q);
    for kind in TxKind::ALL {
        assert!(!cache.snoop(&peer(kind, A), &mut q));
        assert_eq!(cache.state_of(A), LineState::Invalid);
    }
    assert!(q.is_empty());
}

#[test]
fn shared_line_invalidated_by_read_exclusive() {
    let mut cache = moesi();
    prepare(&mut cache, A, LineState::Shared);
    let mut q = BusQ::new();
    assert!(cache.snoop(&peer(TxKind::BusRdX, A), &mut q));
    assert_eq!(cache.state_of(A), LineState::Invalid);
}

#[test]
fn modified_line_becomes_owner_without_write_back() {
    let mut cache = moesi();
    prepare(&mut cache, A, LineState::Modified);
    let mut q = BusQ::new();
    assert!(cache.snoop(&peer(TxKind::BusRd, A), &mut q));
    assert_eq!(cache.state_of(A), LineState::Owned);
    assert!(q.is_empty());
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "BusUpgr snooped")]
fn upgrade_snooped_on_exclusive_line_fails_loudly() {
    let mut cache = moesi();
    prepare(&mut cache, A, LineState::Exclusive);
    cache.snoop(&peer(TxKind::BusUpgr, A), &mut BusQ::new());
}

// completion and eviction

fn direct_mapped() -> SystemSpec {
    // one set, one way: every fill evicts
    SystemSpec {
        block_size: 4,
        cache_size: 4,
        cache_assoc: 1,
        ..Default::default()
    }
}

#[test]
fn fill_evicting_modified_line_writes_it_back() {
    let b = Addr(0xb);
    let c = Addr(0xc);
    let mut cache = Moesi::new(SetAssocCache::new(direct_mapped()));
    prepare(&mut cache, c, LineState::Modified);

    let mut q = BusQ::new();
    cache.read(b, &mut q);
    assert_eq!(queued(&q), vec![(TxKind::BusRd, b)]);
    q.clear();
    cache.complete(&tx(TxKind::BusRd, b, true), &mut q);
    assert_eq!(cache.state_of(b), LineState::Shared);
    assert_eq!(cache.state_of(c), LineState::Invalid);
    assert_eq!(queued(&q), vec![(TxKind::WriteBack, c)]);
}

#[test]
fn fill_evicting_owned_line_writes_it_back() {
    let b = Addr(0xb);
    let c = Addr(0xc);
    let mut cache = Moesi::new(SetAssocCache::new(direct_mapped()));
    prepare(&mut cache, c, LineState::Owned);

    let mut q = BusQ::new();
    cache.write(b, &mut q);
    q.clear();
    cache.complete(&tx(TxKind::BusRdX, b, false), &mut q);
    assert_eq!(cache.state_of(b), LineState::Modified);
    assert_eq!(queued(&q), vec![(TxKind::WriteBack, c)]);
}

#[test]
fn fill_evicting_clean_line_is_silent() {
    let b = Addr(0xb);
    let c = Addr(0xc);
    for state in [LineState::Exclusive, LineState::Shared, LineState::Invalid] {
        let mut cache = Moesi::new(SetAssocCache::new(direct_mapped()));
        prepare(&mut cache, c, state);
        let mut q = BusQ::new();
        cache.read(b, &mut q);
        q.clear();
        cache.complete(&tx(TxKind::BusRd, b, false), &mut q);
        assert_eq!(cache.state_of(b), LineState::Exclusive);
        assert!(q.is_empty(), "evicting {:?} issued {:?}", state, q);
    }
}

#[test]
fn write_back_completion_changes_nothing() {
    let mut cache = moesi();
    prepare(&mut cache, A, LineState::Owned);
    let mut q = BusQ::new();
    cache.complete(&tx(TxKind::WriteBack, Addr(0x99), false), &mut q);
    assert_eq!(cache.state_of(A), LineState::Owned);
    assert_eq!(cache.state_of(Addr(0x99)), LineState::Invalid);
    assert!(q.is_empty());
}

#[test]
fn refill_of_invalidated_line_reuses_its_slot() {
    let mut cache = Moesi::new(SetAssocCache::new(direct_mapped()));
    prepare(&mut cache, A, LineState::Shared);
    let mut q = BusQ::new();
    cache.snoop(&peer(TxKind::BusUpgr, A), &mut q);
    cache.read(A, &mut q);
    q.clear();
    cache.complete(&tx(TxKind::BusRd, A, false), &mut q);
    assert_eq!(cache.state_of(A), LineState::Exclusive);
    assert!(q.is_empty());
}

// MESI

#[test]
fn mesi_modified_flushes_on_peer_read() {
    let mut cache = mesi();
    prepare(&mut cache, A, LineState::Modified);
    let mut q = BusQ::new();
    assert!(cache.snoop(&peer(TxKind::BusRd, A), &mut q));
    assert_eq!(cache.state_of(A), LineState::Shared);
    assert_eq!(queued(&q), vec![(TxKind::WriteBack, A)]);
}

#[test]
fn mesi_modified_flushes_on_peer_read_exclusive() {
    let mut cache = mesi();
    prepare(&mut cache, A, LineState::Modified);
    let mut q = BusQ::new();
    assert!(cache.snoop(&peer(TxKind::BusRdX, A), &mut q));
    assert_eq!(cache.state_of(A), LineState::Invalid);
    assert_eq!(queued(&q), vec![(TxKind::WriteBack, A)]);
}

#[test]
fn mesi_clean_lines() {
    let mut cache = mesi();
    prepare(&mut cache, A, LineState::Exclusive);
    let mut q = BusQ::new();
    assert!(cache.snoop(&peer(TxKind::BusRd, A), &mut q));
    assert_eq!(cache.state_of(A), LineState::Shared);

    cache.write(A, &mut q);
    assert_eq!(queued(&q), vec![(TxKind::BusUpgr, A)]);
    assert_eq!(cache.state_of(A), LineState::Modified);
    assert_eq!(cache.stats().public_accesses, 1);
}

#[test]
fn protocol_selected_at_construction() {
    let specs = SystemSpec { protocol: Protocol::Mesi, ..Default::default() };
    let sim = Simulator::new(specs, vec![Instructions::new()]).unwrap();
    assert_eq!(sim.caches()[0].protocol(), Protocol::Mesi);
    let sim = Simulator::new(SystemSpec::default(), vec![Instructions::new()]).unwrap();
    assert_eq!(sim.caches()[0].protocol(), Protocol::Moesi);
}
