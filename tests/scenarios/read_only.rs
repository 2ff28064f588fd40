//! Read-only transactions and their snapshots.

use crate::common::*;

#[test]
fn snapshot_ignores_later_commits() {
    let (_, events) = replay(
        "beginRO(T1)\nbegin(T2)\nW(T2,x6,66)\nW(T2,x7,77)\nend(T2)\nR(T1,x6)\nR(T1,x7)\n",
    );
    assert_eq!(reads_of(&events, T1), vec![(VarId(6), 60), (VarId(7), 70)]);
}

#[test]
fn snapshot_includes_commits_before_begin() {
    let (_, events) = replay("begin(T2)\nW(T2,x8,88)\nend(T2)\nbeginRO(T1)\nR(T1,x8)\n");
    assert_eq!(reads_of(&events, T1), vec![(VarId(8), 88)]);
}

#[test]
fn site_failure_after_begin_does_not_matter() {
    let (c, events) = replay("beginRO(T1)\nfail(4)\nR(T1,x3)\nend(T1)\n");
    assert_eq!(reads_of(&events, T1), vec![(VarId(3), 30)]);
    assert_eq!(c.status(T1), Some(TransactionStatus::Committed));
}

#[test]
fn unavailable_variable_aborts_immediately() {
    let (c, events) = replay("fail(4)\nbeginRO(T1)\nR(T1,x3)\nR(T1,x2)\n");
    assert!(events.contains(&EngineEvent::SnapshotMiss {
        txn: T1,
        var: VarId(3)
    }));
    // Later reads of an aborted transaction are ignored
    assert!(reads_of(&events, T1).is_empty());
    assert_eq!(c.status(T1), Some(TransactionStatus::Aborted));
}
