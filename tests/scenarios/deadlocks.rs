//! Deadlock detection across the engine.

use crate::common::*;

#[test]
fn victim_is_latest_start_not_highest_id() {
    // T2 begins before T1, so T1 is younger
    let (_, events) = replay(
        "begin(T2)\nbegin(T1)\nW(T1,x1,1)\nW(T2,x2,2)\nW(T1,x2,3)\nW(T2,x1,4)\n",
    );
    assert!(events.contains(&EngineEvent::Deadlock {
        cycle: vec![T1, T2],
        victim: T1,
    }));
    assert_eq!(aborts(&events), vec![T1]);
}

#[test]
fn read_write_cycle_is_detected() {
    let (c, events) = replay(
        "begin(T1)\nbegin(T2)\nR(T1,x3)\nR(T2,x5)\nW(T1,x5,1)\nW(T2,x3,2)\nend(T1)\n",
    );
    assert_eq!(aborts(&events), vec![T2]);
    assert_eq!(commits(&events), vec![T1]);
    assert_eq!(committed_copies(&c, VarId(5)), vec![(SiteId(6), 1)]);
    assert!(c.wait_for().is_empty());
}

#[test]
fn independent_cycles_each_lose_one_member() {
    let script = "begin(T1)\nbegin(T2)\nbegin(T3)\nbegin(T4)\n\
                  W(T1,x1,1)\nW(T2,x3,1)\nW(T3,x5,1)\nW(T4,x7,1)\n\
                  W(T1,x3,2)\nW(T2,x1,2)\n\
                  W(T3,x7,2)\nW(T4,x5,2)\n";
    let (c, events) = replay(script);
    assert_eq!(aborts(&events), vec![T2, T4]);
    assert!(c.wait_for().find_cycle().is_none());
    assert_no_trace(&c, T2);
    assert_no_trace(&c, T4);
}

#[test]
fn waiter_on_victim_is_released() {
    // T3 waits on T2; T2 is the deadlock victim, so T3's read runs
    let script = "begin(T1)\nbegin(T2)\nbegin(T3)\n\
                  W(T1,x1,1)\nW(T2,x2,2)\nR(T3,x2)\n\
                  W(T1,x2,3)\nW(T2,x1,4)\n";
    let (_, events) = replay(script);
    assert_eq!(aborts(&events), vec![T2]);
    assert_eq!(reads_of(&events, T3), vec![(VarId(2), 20)]);
}
