//! Scripted instructions consumed by the coordinator
//!
//! An [`Operation`] is one line of the script after parsing, stamped with its
//! intake position. Parked operations keep their original timestamp when they
//! are requeued.

use crate::types::{SiteId, Timestamp, TxnId, Value, VarId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The action an instruction performs, with its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// `begin(T<id>)`
    Begin {
        /// Transaction being started
        txn: TxnId,
    },
    /// `beginRO(T<id>)`
    BeginReadOnly {
        /// Read-only transaction being started
        txn: TxnId,
    },
    /// `R(T<id>,x<var>)`
    Read {
        /// Reading transaction
        txn: TxnId,
        /// Variable read
        var: VarId,
    },
    /// `W(T<id>,x<var>,<value>)`
    Write {
        /// Writing transaction
        txn: TxnId,
        /// Variable written
        var: VarId,
        /// Value written
        value: Value,
    },
    /// `end(T<id>)`
    End {
        /// Transaction attempting to commit
        txn: TxnId,
    },
    /// `fail(<site>)`
    Fail {
        /// Failing site
        site: SiteId,
    },
    /// `recover(<site>)`
    Recover {
        /// Recovering site
        site: SiteId,
    },
    /// `dump()`
    Dump,
}

impl OperationKind {
    /// Transaction this instruction belongs to, if any
    pub fn txn(&self) -> Option<TxnId> {
        match *self {
            OperationKind::Begin { txn }
            | OperationKind::BeginReadOnly { txn }
            | OperationKind::Read { txn, .. }
            | OperationKind::Write { txn, .. }
            | OperationKind::End { txn } => Some(txn),
            OperationKind::Fail { .. } | OperationKind::Recover { .. } | OperationKind::Dump => {
                None
            }
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Begin { txn } => write!(f, "begin({})", txn),
            OperationKind::BeginReadOnly { txn } => write!(f, "beginRO({})", txn),
            OperationKind::Read { txn, var } => write!(f, "R({},{})", txn, var),
            OperationKind::Write { txn, var, value } => write!(f, "W({},{},{})", txn, var, value),
            OperationKind::End { txn } => write!(f, "end({})", txn),
            OperationKind::Fail { site } => write!(f, "fail({})", site),
            OperationKind::Recover { site } => write!(f, "recover({})", site),
            OperationKind::Dump => write!(f, "dump()"),
        }
    }
}

/// An instruction with the timestamp it was assigned at intake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// What to do
    pub kind: OperationKind,
    /// Intake position, 1-based
    pub timestamp: Timestamp,
}

impl Operation {
    /// Create an operation
    pub fn new(kind: OperationKind, timestamp: Timestamp) -> Self {
        Self { kind, timestamp }
    }

    /// Transaction this instruction belongs to, if any
    pub fn txn(&self) -> Option<TxnId> {
        self.kind.txn()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.timestamp)
    }
}
