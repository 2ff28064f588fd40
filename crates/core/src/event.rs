//! Structured record of everything the engine does
//!
//! The coordinator never prints. Each observable protocol effect is an
//! [`EngineEvent`]; rendering them as text is the caller's business.

use crate::operation::Operation;
use crate::types::{SiteId, TxnId, Value, VarId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of data access an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    /// Shared access (`R`)
    Read,
    /// Exclusive access (`W`)
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => write!(f, "read"),
            Access::Write => write!(f, "write"),
        }
    }
}

/// Why a commit attempt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitBlocker {
    /// A DOWN site still holds an uncommitted copy of a replicated write
    ReplicaDown {
        /// Variable written
        var: VarId,
        /// Site that is down
        site: SiteId,
    },
    /// The home site of a non-replicated write is down
    HomeSiteDown {
        /// Variable written
        var: VarId,
        /// Its home site
        site: SiteId,
    },
    /// The home site is up but lost the uncommitted value
    HomeSiteLostWrite {
        /// Variable written
        var: VarId,
        /// Its home site
        site: SiteId,
    },
    /// A site refuses writes to the variable until it is refreshed
    WriteRestricted {
        /// Variable written
        var: VarId,
        /// Restricting site
        site: SiteId,
    },
    /// The write happened before a site failure
    WriteBeforeFailure {
        /// Variable written
        var: VarId,
        /// Site that failed afterwards
        site: SiteId,
    },
    /// A variable read was served by a site that failed afterwards
    ReadBeforeFailure {
        /// Variable read
        var: VarId,
        /// Site that failed
        site: SiteId,
    },
    /// The transaction has instructions still waiting for an available site
    PendingUnavailable,
}

impl fmt::Display for CommitBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitBlocker::ReplicaDown { var, site } => {
                write!(f, "site {} is down with an uncommitted copy of {}", site, var)
            }
            CommitBlocker::HomeSiteDown { var, site } => {
                write!(f, "home site {} of {} is down", site, var)
            }
            CommitBlocker::HomeSiteLostWrite { var, site } => {
                write!(f, "home site {} lost the uncommitted value of {}", site, var)
            }
            CommitBlocker::WriteRestricted { var, site } => {
                write!(f, "site {} restricts writes to {}", site, var)
            }
            CommitBlocker::WriteBeforeFailure { var, site } => {
                write!(f, "{} was written before site {} failed", var, site)
            }
            CommitBlocker::ReadBeforeFailure { var, site } => {
                write!(f, "{} was read before site {} failed", var, site)
            }
            CommitBlocker::PendingUnavailable => {
                write!(f, "instructions still wait for an available site")
            }
        }
    }
}

/// Why a transaction ended up aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// Chosen as the youngest member of a wait-for cycle
    Deadlock,
    /// Refused at commit time
    CommitRejected(CommitBlocker),
    /// Read-only transaction read a variable absent from its snapshot
    ReadOnlyUnavailable {
        /// Variable requested
        var: VarId,
    },
    /// Read a replica from a site that failed afterwards (found on recovery)
    StaleRead {
        /// Recovered site
        site: SiteId,
    },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Deadlock => write!(f, "deadlock victim"),
            AbortReason::CommitRejected(blocker) => write!(f, "commit rejected: {}", blocker),
            AbortReason::ReadOnlyUnavailable { var } => {
                write!(f, "no snapshot copy of {}", var)
            }
            AbortReason::StaleRead { site } => write!(f, "stale read from site {}", site),
        }
    }
}

/// Committed values of one site, ordered by variable index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDump {
    /// Site id
    pub site: SiteId,
    /// `(variable, committed value)` pairs in index order
    pub values: Vec<(VarId, Value)>,
}

/// One observable effect of processing an instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A transaction started
    Began {
        /// Transaction
        txn: TxnId,
        /// Started with `beginRO`
        read_only: bool,
    },
    /// A read returned a value
    ReadValue {
        /// Reader
        txn: TxnId,
        /// Variable
        var: VarId,
        /// Value observed
        value: Value,
    },
    /// A write was applied to the listed sites' tentative values
    Wrote {
        /// Writer
        txn: TxnId,
        /// Variable
        var: VarId,
        /// Value written
        value: Value,
        /// Sites that accepted the write, ascending
        sites: Vec<SiteId>,
    },
    /// An access was denied by a conflicting lock and parked
    LockConflict {
        /// Requester
        txn: TxnId,
        /// Variable
        var: VarId,
        /// Access kind
        access: Access,
        /// Holders the requester now waits for
        holders: Vec<TxnId>,
        /// The requester moved from RUNNING to WAITING with this conflict
        newly_waiting: bool,
    },
    /// No site could serve the access; the instruction waits for a recovery
    NoSiteAvailable {
        /// Requester
        txn: TxnId,
        /// Variable
        var: VarId,
        /// Access kind
        access: Access,
    },
    /// A read-only transaction asked for a variable missing from its snapshot
    SnapshotMiss {
        /// Read-only transaction
        txn: TxnId,
        /// Variable
        var: VarId,
    },
    /// A transaction committed
    Committed {
        /// Transaction
        txn: TxnId,
    },
    /// A transaction was aborted
    Aborted {
        /// Transaction
        txn: TxnId,
        /// Why
        reason: AbortReason,
    },
    /// A wait-for cycle was found and a victim picked
    Deadlock {
        /// Cycle members in traversal order
        cycle: Vec<TxnId>,
        /// Youngest member, about to be aborted
        victim: TxnId,
    },
    /// Recovery discovered a transaction read from this site before it failed
    StaleReadDetected {
        /// Transaction marked aborted
        txn: TxnId,
        /// Recovered site
        site: SiteId,
    },
    /// A site went down
    SiteFailed {
        /// Site
        site: SiteId,
    },
    /// `fail` on a site that was already down
    SiteAlreadyDown {
        /// Site
        site: SiteId,
    },
    /// A site came back up
    SiteRecovered {
        /// Site
        site: SiteId,
    },
    /// `recover` on a site that was already up
    SiteAlreadyUp {
        /// Site
        site: SiteId,
    },
    /// Committed values at every site
    Dump {
        /// One entry per site, ascending id
        sites: Vec<SiteDump>,
    },
    /// Internal coordinator state, emitted with dumps in debug mode
    DebugState {
        /// Instructions parked behind a lock
        blocked: Vec<Operation>,
        /// Instructions parked until a site recovers
        site_failed: Vec<Operation>,
        /// Wait-for graph, holder → waiters
        wait_for: Vec<(TxnId, Vec<TxnId>)>,
    },
    /// An instruction named a transaction that never began
    UnknownTransaction {
        /// The offending instruction
        operation: Operation,
    },
    /// `fail`/`recover` named a site outside `1..=N`
    InvalidSite {
        /// Site
        site: SiteId,
    },
}

impl EngineEvent {
    /// The transaction this event is about, if any
    pub fn txn(&self) -> Option<TxnId> {
        match self {
            EngineEvent::Began { txn, .. }
            | EngineEvent::ReadValue { txn, .. }
            | EngineEvent::Wrote { txn, .. }
            | EngineEvent::LockConflict { txn, .. }
            | EngineEvent::NoSiteAvailable { txn, .. }
            | EngineEvent::SnapshotMiss { txn, .. }
            | EngineEvent::Committed { txn }
            | EngineEvent::Aborted { txn, .. }
            | EngineEvent::StaleReadDetected { txn, .. } => Some(*txn),
            EngineEvent::Deadlock { victim, .. } => Some(*victim),
            EngineEvent::UnknownTransaction { operation } => operation.txn(),
            EngineEvent::SiteFailed { .. }
            | EngineEvent::SiteAlreadyDown { .. }
            | EngineEvent::SiteRecovered { .. }
            | EngineEvent::SiteAlreadyUp { .. }
            | EngineEvent::Dump { .. }
            | EngineEvent::DebugState { .. }
            | EngineEvent::InvalidSite { .. } => None,
        }
    }
}
