//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

pub use repcrec::{
    parse_script, AbortReason, Access, CommitBlocker, Coordinator, EngineConfig, EngineEvent,
    SiteId, TransactionStatus, TxnId, Value, VarId,
};

pub const T1: TxnId = TxnId(1);
pub const T2: TxnId = TxnId(2);
pub const T3: TxnId = TxnId(3);
pub const T4: TxnId = TxnId(4);

// ============================================================================
// Running scripts
// ============================================================================

/// Replay `script` on a default 10-site, 20-variable engine.
pub fn replay(script: &str) -> (Coordinator, Vec<EngineEvent>) {
    replay_with(EngineConfig::default(), script)
}

/// Replay `script` on an engine built from `config`.
pub fn replay_with(config: EngineConfig, script: &str) -> (Coordinator, Vec<EngineEvent>) {
    let ops = parse_script(script).expect("test script must parse");
    let mut coordinator = Coordinator::new(config);
    let events = coordinator.execute(ops);
    (coordinator, events)
}

// ============================================================================
// Event queries
// ============================================================================

/// Values `txn` read, in order.
pub fn reads_of(events: &[EngineEvent], txn: TxnId) -> Vec<(VarId, Value)> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::ReadValue { txn: t, var, value } if *t == txn => Some((*var, *value)),
            _ => None,
        })
        .collect()
}

/// Transactions that aborted, in order (repeated END of a victim included).
pub fn aborts(events: &[EngineEvent]) -> Vec<TxnId> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Aborted { txn, .. } => Some(*txn),
            _ => None,
        })
        .collect()
}

/// Transactions that committed, in order.
pub fn commits(events: &[EngineEvent]) -> Vec<TxnId> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Committed { txn } => Some(*txn),
            _ => None,
        })
        .collect()
}

// ============================================================================
// State assertions
// ============================================================================

/// Committed value of `var` at every UP site holding it, ascending site id.
pub fn committed_copies(c: &Coordinator, var: VarId) -> Vec<(SiteId, Value)> {
    c.sites()
        .iter()
        .filter(|s| s.is_up())
        .filter_map(|s| s.committed(var).map(|v| (s.id(), v)))
        .collect()
}

/// Panic unless every UP copy of `var` holds the same committed value.
pub fn assert_converged(c: &Coordinator, var: VarId) {
    let copies = committed_copies(c, var);
    if let Some((_, first)) = copies.first() {
        assert!(
            copies.iter().all(|(_, v)| v == first),
            "{} diverged: {:?}",
            var,
            copies
        );
    }
}

/// Panic if `txn` still holds a lock, sits in the wait-for graph or has a
/// parked instruction.
pub fn assert_no_trace(c: &Coordinator, txn: TxnId) {
    for site in c.sites() {
        assert!(
            !site.locks().holds_any(txn),
            "{} still holds a lock at site {}",
            txn,
            site.id()
        );
    }
    assert!(!c.wait_for().contains(txn), "{} still in wait-for graph", txn);
    assert!(c.blocked_operations().iter().all(|op| op.txn() != Some(txn)));
    assert!(c.site_failed_operations().iter().all(|op| op.txn() != Some(txn)));
}

/// Panic unless every tentative value sits under the exclusive lock of a
/// transaction that is still registered.
pub fn assert_tentative_values_owned(c: &Coordinator) {
    for site in c.sites() {
        for var in (1..=c.config().num_variables).map(VarId) {
            if site.has_tentative(var) {
                let owned = c
                    .transactions()
                    .iter()
                    .any(|t| site.locks().holds_exclusive(t.id, var));
                assert!(owned, "orphan tentative {} at site {}", var, site.id());
            }
        }
    }
}
