//! Wait-for graph and cycle search
//!
//! An edge `holder → waiter` means `waiter` has an instruction parked behind
//! a lock `holder` owns. Edges are added on lock conflicts and removed when
//! the holder commits or aborts.
//!
//! Cycle search walks from every holder in ascending id order with a fresh
//! visited set per root and an explicit path stack. Reaching a node that is
//! already on the path closes a cycle; the cycle is the path suffix starting
//! at that node.

use repcrec_core::{Timestamp, TxnId};
use std::collections::{BTreeMap, BTreeSet};

/// Directed graph of blocking relationships between transactions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitForGraph {
    /// holder → waiters, in the order the waits were recorded
    edges: BTreeMap<TxnId, Vec<TxnId>>,
}

impl WaitForGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `waiter` waits for `holder`
    ///
    /// Self-edges and duplicate edges are ignored. Returns true if an edge
    /// was added.
    pub fn add_edge(&mut self, holder: TxnId, waiter: TxnId) -> bool {
        if holder == waiter {
            return false;
        }
        let waiters = self.edges.entry(holder).or_default();
        if waiters.contains(&waiter) {
            return false;
        }
        waiters.push(waiter);
        true
    }

    /// Transactions waiting for `holder`, in recording order
    pub fn waiters(&self, holder: TxnId) -> &[TxnId] {
        self.edges.get(&holder).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drop the outgoing edges of `holder` and return its waiters
    pub fn remove_holder(&mut self, holder: TxnId) -> Vec<TxnId> {
        self.edges.remove(&holder).unwrap_or_default()
    }

    /// Drop `txn` entirely: its outgoing edges and every edge pointing at it
    ///
    /// Holders left with no waiters are pruned. Returns the waiters `txn`
    /// was blocking.
    pub fn remove_txn(&mut self, txn: TxnId) -> Vec<TxnId> {
        let waiters = self.remove_holder(txn);
        for list in self.edges.values_mut() {
            list.retain(|w| *w != txn);
        }
        self.edges.retain(|_, list| !list.is_empty());
        waiters
    }

    /// Whether `txn` appears anywhere in the graph
    pub fn contains(&self, txn: TxnId) -> bool {
        self.edges.contains_key(&txn) || self.edges.values().any(|list| list.contains(&txn))
    }

    /// True if there are no edges
    pub fn is_empty(&self) -> bool {
        self.edges.values().all(Vec::is_empty)
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Snapshot of the graph as `(holder, waiters)` pairs in holder order
    pub fn to_vec(&self) -> Vec<(TxnId, Vec<TxnId>)> {
        self.edges
            .iter()
            .filter(|(_, waiters)| !waiters.is_empty())
            .map(|(holder, waiters)| (*holder, waiters.clone()))
            .collect()
    }

    /// First cycle found, members in traversal order
    pub fn find_cycle(&self) -> Option<Vec<TxnId>> {
        for root in self.edges.keys() {
            let mut visited = BTreeSet::new();
            let mut path = Vec::new();
            if let Some(cycle) = self.search(*root, &mut visited, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn search(
        &self,
        node: TxnId,
        visited: &mut BTreeSet<TxnId>,
        path: &mut Vec<TxnId>,
    ) -> Option<Vec<TxnId>> {
        if let Some(start) = path.iter().position(|n| *n == node) {
            return Some(path[start..].to_vec());
        }
        if !visited.insert(node) {
            return None;
        }
        path.push(node);
        for next in self.waiters(node) {
            if let Some(cycle) = self.search(*next, visited, path) {
                return Some(cycle);
            }
        }
        path.pop();
        None
    }
}

/// Pick the youngest member of a cycle
///
/// Youngest means the latest start time; ties go to the member met first.
/// Members without a known start time count as oldest.
pub fn select_victim<F>(cycle: &[TxnId], start_time: F) -> Option<TxnId>
where
    F: Fn(TxnId) -> Option<Timestamp>,
{
    let mut victim: Option<(TxnId, Timestamp)> = None;
    for &txn in cycle {
        let started = start_time(txn).unwrap_or(0);
        match victim {
            Some((_, best)) if started <= best => {}
            _ => victim = Some((txn, started)),
        }
    }
    victim.map(|(txn, _)| txn)
}
