//! Per-site lock table
//!
//! Each variable is in exactly one [`LockState`]: free, shared by a set of
//! readers, or held exclusively by one writer. Shared locks are mutually
//! compatible; an exclusive lock excludes every other request, including a
//! second exclusive one.
//!
//! The table never blocks. A denied request returns the holder(s) and leaves
//! the table untouched; the coordinator decides whether to park and retry.

use repcrec_core::{TxnId, VarId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Lock state of one variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// No transaction holds a lock
    Free,
    /// Held in shared mode by one or more readers
    Shared(BTreeSet<TxnId>),
    /// Held in exclusive mode by a single writer
    Exclusive(TxnId),
}

/// Lock table for the variables of one site
#[derive(Debug, Clone, Default)]
pub struct LockManager {
    /// Free variables are not stored
    locks: BTreeMap<VarId, LockState>,
}

impl LockManager {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a shared lock
    ///
    /// Grants (or extends) the shared lock and returns None unless `var` is
    /// held exclusively, in which case the exclusive holder is returned and
    /// nothing changes. The holder may be `txn` itself.
    pub fn request_read(&mut self, txn: TxnId, var: VarId) -> Option<TxnId> {
        let state = self.locks.entry(var).or_insert(LockState::Free);
        match state {
            LockState::Exclusive(holder) => {
                debug!(target: "repcrec::lock", %txn, %var, %holder, "Shared lock denied");
                Some(*holder)
            }
            LockState::Shared(readers) => {
                readers.insert(txn);
                None
            }
            LockState::Free => {
                *state = LockState::Shared(BTreeSet::from([txn]));
                debug!(target: "repcrec::lock", %txn, %var, "Shared lock granted");
                None
            }
        }
    }

    /// Request an exclusive lock
    ///
    /// Grants it and returns an empty set only when `var` is free. Otherwise
    /// returns every current holder (all readers, or the single writer) and
    /// leaves the table unchanged.
    pub fn request_write(&mut self, txn: TxnId, var: VarId) -> BTreeSet<TxnId> {
        match self.locks.get(&var) {
            Some(LockState::Shared(readers)) => {
                debug!(target: "repcrec::lock", %txn, %var, holders = readers.len(), "Exclusive lock denied");
                readers.clone()
            }
            Some(LockState::Exclusive(holder)) => {
                debug!(target: "repcrec::lock", %txn, %var, %holder, "Exclusive lock denied");
                BTreeSet::from([*holder])
            }
            Some(LockState::Free) | None => {
                self.locks.insert(var, LockState::Exclusive(txn));
                debug!(target: "repcrec::lock", %txn, %var, "Exclusive lock granted");
                BTreeSet::new()
            }
        }
    }

    /// Replace whatever lock `var` has with an exclusive lock held by `txn`
    ///
    /// The caller must have checked that `txn` is the only holder.
    pub fn promote(&mut self, txn: TxnId, var: VarId) {
        debug!(target: "repcrec::lock", %txn, %var, "Lock promoted to exclusive");
        self.locks.insert(var, LockState::Exclusive(txn));
    }

    /// Release every lock held by `txn`
    ///
    /// Returns the variables whose exclusive lock `txn` held, i.e. the ones it
    /// may have modified at this site.
    pub fn release(&mut self, txn: TxnId) -> BTreeSet<VarId> {
        let mut released = BTreeSet::new();
        self.locks.retain(|var, state| match state {
            LockState::Shared(readers) => {
                readers.remove(&txn);
                !readers.is_empty()
            }
            LockState::Exclusive(holder) if *holder == txn => {
                released.insert(*var);
                false
            }
            LockState::Exclusive(_) => true,
            LockState::Free => false,
        });
        released
    }

    /// Drop the whole table (site failure)
    pub fn release_all(&mut self) {
        self.locks.clear();
    }

    /// Current lock state of `var`
    pub fn state(&self, var: VarId) -> LockState {
        match self.locks.get(&var) {
            Some(LockState::Shared(readers)) if readers.is_empty() => LockState::Free,
            Some(state) => state.clone(),
            None => LockState::Free,
        }
    }

    /// True if `txn` is among the shared holders of `var`
    pub fn holds_shared(&self, txn: TxnId, var: VarId) -> bool {
        matches!(self.locks.get(&var), Some(LockState::Shared(readers)) if readers.contains(&txn))
    }

    /// True if `txn` holds the exclusive lock on `var`
    pub fn holds_exclusive(&self, txn: TxnId, var: VarId) -> bool {
        matches!(self.locks.get(&var), Some(LockState::Exclusive(holder)) if *holder == txn)
    }

    /// True if `txn` holds any lock in this table
    pub fn holds_any(&self, txn: TxnId) -> bool {
        self.locks.values().any(|state| match state {
            LockState::Shared(readers) => readers.contains(&txn),
            LockState::Exclusive(holder) => *holder == txn,
            LockState::Free => false,
        })
    }

    /// True if no locks are held
    pub fn is_empty(&self) -> bool {
        self.locks.values().all(|state| match state {
            LockState::Shared(readers) => readers.is_empty(),
            LockState::Exclusive(_) => false,
            LockState::Free => true,
        })
    }
}
