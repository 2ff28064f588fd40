//! A data site: committed and tentative values, restrictions, and locks
//!
//! Writes go to `tentative` under an exclusive lock and only reach
//! `committed` on commit. After a recovery every replicated variable is
//! read-restricted until a commit refreshes it, and variables updated
//! elsewhere while the site was down may be write-restricted.

use repcrec_concurrency::LockManager;
use repcrec_core::{SiteDump, SiteId, Timestamp, TxnId, Value, VarId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Whether a site is serving requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    /// Serving reads and writes
    Up,
    /// Failed; refuses everything
    Down,
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteStatus::Up => write!(f, "UP"),
            SiteStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// Why a site refused to serve an access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SiteError {
    /// The site is down
    #[error("site {0} is down")]
    Down(SiteId),
    /// The site holds no copy of the variable
    #[error("site {site} does not hold {var}")]
    NotHosted {
        /// Site
        site: SiteId,
        /// Variable
        var: VarId,
    },
    /// The local copy is stale since recovery
    #[error("{var} at site {site} is unreadable until refreshed")]
    ReadRestricted {
        /// Site
        site: SiteId,
        /// Variable
        var: VarId,
    },
    /// The site refuses writes until refreshed
    #[error("{var} at site {site} refuses writes until refreshed")]
    WriteRestricted {
        /// Site
        site: SiteId,
        /// Variable
        var: VarId,
    },
}

/// Result of a read the site agreed to serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Lock granted; the value visible to the reader
    Value(Value),
    /// Another transaction holds the exclusive lock
    Blocked(TxnId),
}

/// Result of a write the site agreed to consider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Stored as the tentative value
    Applied,
    /// Denied; these transactions hold conflicting locks
    Blocked(BTreeSet<TxnId>),
}

/// One site of the replicated store
#[derive(Debug, Clone)]
pub struct Site {
    id: SiteId,
    num_sites: u32,
    num_variables: u32,
    status: SiteStatus,
    failed_time: Timestamp,
    committed: BTreeMap<VarId, Value>,
    tentative: BTreeMap<VarId, Value>,
    read_restricted: BTreeSet<VarId>,
    write_restricted: BTreeSet<VarId>,
    locks: LockManager,
}

impl Site {
    /// Create an UP site seeded with default values
    pub fn new(id: SiteId, num_sites: u32, num_variables: u32) -> Self {
        let mut site = Self {
            id,
            num_sites,
            num_variables,
            status: SiteStatus::Up,
            failed_time: 0,
            committed: BTreeMap::new(),
            tentative: BTreeMap::new(),
            read_restricted: BTreeSet::new(),
            write_restricted: BTreeSet::new(),
            locks: LockManager::new(),
        };
        site.initialize();
        site
    }

    /// Seed `committed` with the default value of every hosted variable
    ///
    /// Overwrites whatever was committed before.
    pub fn initialize(&mut self) {
        for var in (1..=self.num_variables).map(VarId) {
            if var.resides_at(self.id, self.num_sites) {
                self.committed.insert(var, var.default_value());
            }
        }
    }

    /// Site id
    pub fn id(&self) -> SiteId {
        self.id
    }

    /// Current status
    pub fn status(&self) -> SiteStatus {
        self.status
    }

    /// True when UP
    pub fn is_up(&self) -> bool {
        self.status == SiteStatus::Up
    }

    /// Logical time of the most recent failure, 0 if never failed
    pub fn failed_time(&self) -> Timestamp {
        self.failed_time
    }

    /// Whether the site holds a committed copy of `var`
    pub fn hosts(&self, var: VarId) -> bool {
        self.committed.contains_key(&var)
    }

    /// Committed value of `var`
    pub fn committed(&self, var: VarId) -> Option<Value> {
        self.committed.get(&var).copied()
    }

    /// Ordered copy of every committed value
    pub fn committed_snapshot(&self) -> BTreeMap<VarId, Value> {
        self.committed.clone()
    }

    /// Uncommitted value of `var`
    pub fn tentative(&self, var: VarId) -> Option<Value> {
        self.tentative.get(&var).copied()
    }

    /// Whether an uncommitted value of `var` is present
    pub fn has_tentative(&self, var: VarId) -> bool {
        self.tentative.contains_key(&var)
    }

    /// Whether `var` is unreadable here until refreshed
    pub fn is_read_restricted(&self, var: VarId) -> bool {
        self.read_restricted.contains(&var)
    }

    /// Whether `var` refuses writes here until refreshed
    pub fn is_write_restricted(&self, var: VarId) -> bool {
        self.write_restricted.contains(&var)
    }

    /// Refuse writes to `var` until refreshed
    pub fn restrict_write(&mut self, var: VarId) {
        debug!(target: "repcrec::site", site = %self.id, %var, "Write restricted");
        self.write_restricted.insert(var);
    }

    /// Lift a write restriction
    pub fn lift_write_restriction(&mut self, var: VarId) {
        self.write_restricted.remove(&var);
    }

    /// Lock table of this site
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Committed values that a reader may see, in index order
    pub fn readable_values(&self) -> impl Iterator<Item = (VarId, Value)> + '_ {
        self.committed
            .iter()
            .filter(|(var, _)| !self.read_restricted.contains(var))
            .map(|(var, value)| (*var, *value))
    }

    /// Read `var` on behalf of `txn`
    ///
    /// A transaction holding the exclusive lock reads its own tentative
    /// value.
    pub fn read(&mut self, txn: TxnId, var: VarId) -> Result<ReadOutcome, SiteError> {
        let committed = self.check_available(var)?;
        if self.read_restricted.contains(&var) {
            return Err(SiteError::ReadRestricted { site: self.id, var });
        }
        match self.locks.request_read(txn, var) {
            Some(holder) if holder != txn => Ok(ReadOutcome::Blocked(holder)),
            Some(_) => Ok(ReadOutcome::Value(
                self.tentative.get(&var).copied().unwrap_or(committed),
            )),
            None => Ok(ReadOutcome::Value(committed)),
        }
    }

    /// Write `value` to `var` on behalf of `txn`
    ///
    /// A shared lock held by `txn` alone is promoted in place.
    pub fn write(&mut self, txn: TxnId, var: VarId, value: Value) -> Result<WriteOutcome, SiteError> {
        self.check_available(var)?;
        if self.write_restricted.contains(&var) {
            return Err(SiteError::WriteRestricted { site: self.id, var });
        }
        let mut holders = self.locks.request_write(txn, var);
        if holders.len() == 1 && holders.contains(&txn) {
            self.locks.promote(txn, var);
            holders.clear();
        }
        if holders.is_empty() {
            self.tentative.insert(var, value);
            Ok(WriteOutcome::Applied)
        } else {
            Ok(WriteOutcome::Blocked(holders))
        }
    }

    /// Release `txn`'s locks and roll back its tentative writes
    pub fn abort(&mut self, txn: TxnId) {
        for var in self.locks.release(txn) {
            self.tentative.remove(&var);
            self.write_restricted.remove(&var);
        }
    }

    /// Release `txn`'s locks and install its tentative writes
    ///
    /// Only values of `affected` written under `txn`'s own exclusive lock are
    /// installed; tentative values left by a write that never completed are
    /// dropped. Installing a value makes the copy readable again.
    pub fn commit(&mut self, txn: TxnId, affected: &BTreeSet<VarId>) {
        for var in self.locks.release(txn) {
            let Some(value) = self.tentative.remove(&var) else {
                continue;
            };
            if affected.contains(&var) {
                self.committed.insert(var, value);
                self.read_restricted.remove(&var);
            }
        }
        for var in affected {
            self.write_restricted.remove(var);
        }
    }

    /// Install a value committed elsewhere while this copy was stale
    pub fn refresh(&mut self, var: VarId, value: Value) {
        if !self.hosts(var) {
            return;
        }
        debug!(target: "repcrec::site", site = %self.id, %var, value, "Replica refreshed");
        self.committed.insert(var, value);
        self.read_restricted.remove(&var);
        self.write_restricted.remove(&var);
    }

    /// Take the site down at logical time `time`
    ///
    /// Returns false (and changes nothing) if it was already down.
    pub fn fail(&mut self, time: Timestamp) -> bool {
        if self.status == SiteStatus::Down {
            return false;
        }
        self.locks.release_all();
        self.tentative.clear();
        self.status = SiteStatus::Down;
        self.failed_time = time;
        info!(target: "repcrec::site", site = %self.id, time, "Site failed");
        true
    }

    /// Bring the site back up
    ///
    /// Re-seeds default values and read-restricts every replicated variable.
    /// Returns false (and changes nothing) if it was already up.
    pub fn recover(&mut self) -> bool {
        if self.status == SiteStatus::Up {
            return false;
        }
        self.initialize();
        self.read_restricted = self
            .committed
            .keys()
            .copied()
            .filter(|var| var.is_replicated())
            .collect();
        self.status = SiteStatus::Up;
        info!(target: "repcrec::site", site = %self.id, "Site recovered");
        true
    }

    /// Committed values in index order
    pub fn dump(&self) -> SiteDump {
        SiteDump {
            site: self.id,
            values: self.committed.iter().map(|(var, value)| (*var, *value)).collect(),
        }
    }

    fn check_available(&self, var: VarId) -> Result<Value, SiteError> {
        if self.status == SiteStatus::Down {
            return Err(SiteError::Down(self.id));
        }
        self.committed
            .get(&var)
            .copied()
            .ok_or(SiteError::NotHosted { site: self.id, var })
    }
}
