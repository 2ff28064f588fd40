//! The reference scenarios: blocking, read-then-write, missed updates and
//! two-transaction deadlock.

use crate::common::*;

#[test]
fn reader_blocks_behind_replicated_writer() {
    let (c, events) = replay("begin(T1)\nW(T1,x2,100)\nbegin(T2)\nR(T2,x2)\n");
    assert_eq!(
        events.last(),
        Some(&EngineEvent::LockConflict {
            txn: T2,
            var: VarId(2),
            access: Access::Read,
            holders: vec![T1],
            newly_waiting: true,
        })
    );
    assert_eq!(c.status(T2), Some(TransactionStatus::Waiting));
    assert!(reads_of(&events, T2).is_empty());
}

#[test]
fn blocked_writer_proceeds_after_reader_commits() {
    let (c, events) = replay("begin(T1)\nR(T1,x3)\nbegin(T2)\nW(T2,x3,50)\nend(T1)\nend(T2)\n");
    assert_eq!(reads_of(&events, T1), vec![(VarId(3), 30)]);
    assert_eq!(commits(&events), vec![T1, T2]);
    assert!(aborts(&events).is_empty());
    assert_eq!(committed_copies(&c, VarId(3)), vec![(SiteId(4), 50)]);
}

#[test]
fn replica_down_during_commit_is_write_restricted_after_recovery() {
    let (c, events) = replay("fail(2)\nbegin(T1)\nW(T1,x4,9)\nend(T1)\nrecover(2)\n");
    assert_eq!(commits(&events), vec![T1]);
    let site2 = c.site(SiteId(2)).unwrap();
    assert!(site2.is_write_restricted(VarId(4)));
    for site in c.sites().iter().filter(|s| s.id() != SiteId(2)) {
        assert_eq!(site.committed(VarId(4)), Some(9));
    }
}

#[test]
fn two_cycle_aborts_younger_transaction() {
    let (c, events) = replay(
        "begin(T1)\nbegin(T2)\nW(T1,x1,101)\nW(T2,x2,202)\nW(T1,x2,102)\nW(T2,x1,201)\nend(T1)\ndump()\n",
    );
    assert!(events.contains(&EngineEvent::Deadlock {
        cycle: vec![T1, T2],
        victim: T2,
    }));
    assert_eq!(aborts(&events), vec![T2]);
    assert_eq!(commits(&events), vec![T1]);
    assert_no_trace(&c, T2);
    assert_eq!(committed_copies(&c, VarId(1)), vec![(SiteId(2), 101)]);
    assert_converged(&c, VarId(2));
    assert_eq!(c.site(SiteId(5)).unwrap().committed(VarId(2)), Some(102));
}

#[test]
fn dump_lists_every_site_in_order() {
    let (_, events) = replay("dump()\n");
    let Some(EngineEvent::Dump { sites }) = events.last() else {
        panic!("expected dump");
    };
    let ids: Vec<u32> = sites.iter().map(|d| d.site.0).collect();
    assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    assert_eq!(sites[0].values.len(), 10);
    assert_eq!(sites[1].values.len(), 12);
    assert_eq!(sites[1].values[0], (VarId(1), 10));
}
