//! Transaction records and the registry that owns them
//!
//! The registry is the only place transaction state lives. Committed
//! transactions keep their record. Aborted transactions are evicted and only
//! a tombstone remains, so later instructions for them resolve to
//! [`TransactionStatus::Aborted`].
//!
//! State transitions:
//! - `Running` ⇄ `Waiting` (lock conflict / retry succeeds)
//! - `Running`/`Waiting` → `Committed`
//! - any non-committed state → `Aborted`

use repcrec_core::{AbortReason, Timestamp, TxnId, Value, VarId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Status of a transaction in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Executing normally
    Running,
    /// Has an instruction parked behind a lock
    Waiting,
    /// Marked or already processed as aborted
    Aborted,
    /// Committed
    Committed,
}

impl TransactionStatus {
    /// Committed or aborted
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Aborted | TransactionStatus::Committed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Running => write!(f, "RUNNING"),
            TransactionStatus::Waiting => write!(f, "WAITING"),
            TransactionStatus::Aborted => write!(f, "ABORTED"),
            TransactionStatus::Committed => write!(f, "COMMITTED"),
        }
    }
}

/// State of one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction id
    pub id: TxnId,
    /// Timestamp of its BEGIN instruction; later means younger
    pub start_time: Timestamp,
    /// Started with `beginRO`
    pub read_only: bool,
    /// Current status
    pub status: TransactionStatus,
    /// Set when the transaction is marked aborted ahead of its END
    pub abort_reason: Option<AbortReason>,
    /// Variables written
    pub affected_variables: BTreeSet<VarId>,
    /// Variable → logical time of the most recent granted read
    pub read_history: BTreeMap<VarId, Timestamp>,
    /// Variable → logical time of the most recent applied write
    pub write_history: BTreeMap<VarId, Timestamp>,
    /// Committed values visible at BEGIN (read-only transactions only)
    pub snapshot: BTreeMap<VarId, Value>,
}

impl Transaction {
    /// A read-write transaction
    pub fn new(id: TxnId, start_time: Timestamp) -> Self {
        Self {
            id,
            start_time,
            read_only: false,
            status: TransactionStatus::Running,
            abort_reason: None,
            affected_variables: BTreeSet::new(),
            read_history: BTreeMap::new(),
            write_history: BTreeMap::new(),
            snapshot: BTreeMap::new(),
        }
    }

    /// A read-only transaction over `snapshot`
    pub fn read_only(id: TxnId, start_time: Timestamp, snapshot: BTreeMap<VarId, Value>) -> Self {
        Self {
            read_only: true,
            snapshot,
            ..Self::new(id, start_time)
        }
    }

    /// Mark aborted without running the abort protocol yet
    ///
    /// The protocol runs when the transaction's END arrives. A committed
    /// transaction is left untouched.
    pub fn mark_aborted(&mut self, reason: AbortReason) {
        if self.status == TransactionStatus::Committed {
            return;
        }
        self.status = TransactionStatus::Aborted;
        self.abort_reason.get_or_insert(reason);
    }

    /// Record a read of `var` granted at `time`
    pub fn record_read(&mut self, var: VarId, time: Timestamp) {
        self.status = TransactionStatus::Running;
        self.read_history.insert(var, time);
    }

    /// Whether some variable matching `hosted` was read strictly before `time`
    pub fn read_any_before<F>(&self, time: Timestamp, hosted: F) -> bool
    where
        F: Fn(VarId) -> bool,
    {
        self.read_history
            .iter()
            .any(|(&var, &at)| at < time && hosted(var))
    }

    /// Record an applied write at `time`
    pub fn record_write(&mut self, var: VarId, time: Timestamp) {
        self.status = TransactionStatus::Running;
        self.affected_variables.insert(var);
        self.write_history.insert(var, time);
    }

    /// Move from `Running` to `Waiting`; returns true if the status changed
    pub fn wait(&mut self) -> bool {
        if self.status == TransactionStatus::Running {
            self.status = TransactionStatus::Waiting;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} start={} read_only={} status={}",
            self.id, self.start_time, self.read_only, self.status
        )
    }
}

/// Owner of every transaction record, keyed by id
#[derive(Debug, Clone, Default)]
pub struct TransactionRegistry {
    live: BTreeMap<TxnId, Transaction>,
    aborted: BTreeMap<TxnId, AbortReason>,
}

impl TransactionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly begun transaction
    ///
    /// Reusing the id of an aborted transaction clears its tombstone.
    pub fn begin(&mut self, txn: Transaction) {
        self.aborted.remove(&txn.id);
        self.live.insert(txn.id, txn);
    }

    /// Look up a non-evicted transaction
    pub fn get(&self, id: TxnId) -> Option<&Transaction> {
        self.live.get(&id)
    }

    /// Mutable lookup of a non-evicted transaction
    pub fn get_mut(&mut self, id: TxnId) -> Option<&mut Transaction> {
        self.live.get_mut(&id)
    }

    /// Status of `id`, including evicted aborted transactions
    pub fn status(&self, id: TxnId) -> Option<TransactionStatus> {
        if self.aborted.contains_key(&id) {
            return Some(TransactionStatus::Aborted);
        }
        self.live.get(&id).map(|txn| txn.status)
    }

    /// Whether `id` ever began
    pub fn contains(&self, id: TxnId) -> bool {
        self.live.contains_key(&id) || self.aborted.contains_key(&id)
    }

    /// Why `id` is aborted, if it is
    pub fn abort_reason(&self, id: TxnId) -> Option<AbortReason> {
        if let Some(reason) = self.aborted.get(&id) {
            return Some(*reason);
        }
        self.live.get(&id).and_then(|txn| txn.abort_reason)
    }

    /// Evict an aborted transaction, keeping a tombstone
    ///
    /// Returns the evicted record, if it was still live.
    pub fn retire_aborted(&mut self, id: TxnId, reason: AbortReason) -> Option<Transaction> {
        self.aborted.insert(id, reason);
        self.live.remove(&id).map(|mut txn| {
            txn.status = TransactionStatus::Aborted;
            txn
        })
    }

    /// Start time of a live transaction
    pub fn start_time(&self, id: TxnId) -> Option<Timestamp> {
        self.live.get(&id).map(|txn| txn.start_time)
    }

    /// Live (not evicted) transactions in id order
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.live.values()
    }

    /// Mutable iteration over live transactions in id order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Transaction> {
        self.live.values_mut()
    }
}
