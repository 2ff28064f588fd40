//! Transaction coordinator: event loop and replication protocols
//!
//! The coordinator owns every site, the transaction registry and the
//! wait-for graph. It pulls one instruction per logical tick from a FIFO
//! queue and dispatches it:
//!
//! ```text
//! BEGIN / BEGIN_RO  register the transaction (RO: snapshot committed values)
//! READ              first site able to serve wins; conflict → park
//! WRITE             every hosting site; any conflict → park
//!                   (both followed by deadlock detection)
//! END               check commit eligibility, commit at UP sites or abort
//! FAIL / RECOVER    site state, restrictions, retry of parked instructions
//! DUMP              committed values of every site
//! ```
//!
//! An instruction that cannot proceed is parked, either behind a lock
//! (`blocked`) or until a site recovers (`site_failed`). Parked instructions
//! are pushed back to the front of the queue, in the order they were parked,
//! when whatever blocked them goes away.

use crate::config::EngineConfig;
use crate::site::{ReadOutcome, Site, WriteOutcome};
use repcrec_concurrency::{
    select_victim, Transaction, TransactionRegistry, TransactionStatus, WaitForGraph,
};
use repcrec_core::{
    Access, AbortReason, CommitBlocker, EngineEvent, Operation, OperationKind, SiteDump, SiteId,
    Timestamp, TxnId, Value, VarId,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info, warn};

/// Receiver of engine events as they happen
pub trait EventSink {
    /// Handle one event
    fn emit(&mut self, event: EngineEvent);
}

impl EventSink for Vec<EngineEvent> {
    fn emit(&mut self, event: EngineEvent) {
        self.push(event);
    }
}

/// Discrete-event transaction manager over a fixed set of sites
#[derive(Debug)]
pub struct Coordinator {
    config: EngineConfig,
    /// Incremented before each instruction is processed
    time: Timestamp,
    queue: VecDeque<Operation>,
    sites: Vec<Site>,
    txns: TransactionRegistry,
    wait_for: WaitForGraph,
    /// Parked behind a lock, in parking order
    blocked: Vec<Operation>,
    /// Parked until a site recovers, in parking order
    site_failed: Vec<Operation>,
    /// Variable → time of its latest applied, not yet committed write
    uncommitted: BTreeMap<VarId, Timestamp>,
    /// Variables committed while the site was down
    missed_updates: BTreeMap<SiteId, BTreeSet<VarId>>,
    /// Write restrictions placed because of a missed update; lifted by the
    /// next commit of the variable
    stale_replicas: BTreeSet<(SiteId, VarId)>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Coordinator {
    /// Create a coordinator with every site UP and seeded
    pub fn new(config: EngineConfig) -> Self {
        let sites = (1..=config.num_sites)
            .map(|id| Site::new(SiteId(id), config.num_sites, config.num_variables))
            .collect();
        Self {
            config,
            time: 0,
            queue: VecDeque::new(),
            sites,
            txns: TransactionRegistry::new(),
            wait_for: WaitForGraph::new(),
            blocked: Vec::new(),
            site_failed: Vec::new(),
            uncommitted: BTreeMap::new(),
            missed_updates: BTreeMap::new(),
            stale_replicas: BTreeSet::new(),
        }
    }

    /// Append instructions to the back of the queue
    pub fn enqueue<I>(&mut self, operations: I)
    where
        I: IntoIterator<Item = Operation>,
    {
        self.queue.extend(operations);
    }

    /// Process the next queued instruction
    ///
    /// Returns false when the queue is empty.
    pub fn step<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> bool {
        let Some(op) = self.queue.pop_front() else {
            return false;
        };
        self.time += 1;
        debug!(target: "repcrec::txn", time = self.time, %op, "Dispatch");
        self.dispatch(op, sink);
        true
    }

    /// Process instructions until the queue is empty
    pub fn run_with<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        while self.step(sink) {}
    }

    /// Process instructions until the queue is empty, collecting events
    pub fn run(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        self.run_with(&mut events);
        events
    }

    /// Enqueue `operations` and run them to completion
    pub fn execute<I>(&mut self, operations: I) -> Vec<EngineEvent>
    where
        I: IntoIterator<Item = Operation>,
    {
        self.enqueue(operations);
        self.run()
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current logical time
    pub fn time(&self) -> Timestamp {
        self.time
    }

    /// All sites, ascending id
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Site by id
    pub fn site(&self, id: SiteId) -> Option<&Site> {
        id.index().and_then(|idx| self.sites.get(idx))
    }

    /// Transaction registry
    pub fn transactions(&self) -> &TransactionRegistry {
        &self.txns
    }

    /// Status of a transaction
    pub fn status(&self, txn: TxnId) -> Option<TransactionStatus> {
        self.txns.status(txn)
    }

    /// Wait-for graph
    pub fn wait_for(&self) -> &WaitForGraph {
        &self.wait_for
    }

    /// Instructions parked behind locks
    pub fn blocked_operations(&self) -> &[Operation] {
        &self.blocked
    }

    /// Instructions parked until a site recovers
    pub fn site_failed_operations(&self) -> &[Operation] {
        &self.site_failed
    }

    /// Instructions still queued
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Committed values of every site
    pub fn dump(&self) -> Vec<SiteDump> {
        self.sites.iter().map(Site::dump).collect()
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn dispatch<S: EventSink + ?Sized>(&mut self, op: Operation, sink: &mut S) {
        match op.kind {
            OperationKind::Begin { txn } => self.begin(txn, op.timestamp, false, sink),
            OperationKind::BeginReadOnly { txn } => self.begin(txn, op.timestamp, true, sink),
            OperationKind::Read { txn, var } => {
                if self.known(op, sink) {
                    self.read(op, txn, var, sink);
                    self.detect_deadlocks(sink);
                }
            }
            OperationKind::Write { txn, var, value } => {
                if self.known(op, sink) {
                    self.write(op, txn, var, value, sink);
                    self.detect_deadlocks(sink);
                }
            }
            OperationKind::End { txn } => {
                if self.known(op, sink) {
                    self.end(txn, sink);
                }
            }
            OperationKind::Fail { site } => self.fail(site, sink),
            OperationKind::Recover { site } => self.recover(site, sink),
            OperationKind::Dump => self.dump_all(sink),
        }
    }

    fn known<S: EventSink + ?Sized>(&self, op: Operation, sink: &mut S) -> bool {
        match op.txn() {
            Some(txn) if self.txns.contains(txn) => true,
            _ => {
                warn!(target: "repcrec::txn", %op, "Instruction for a transaction that never began");
                sink.emit(EngineEvent::UnknownTransaction { operation: op });
                false
            }
        }
    }

    fn begin<S: EventSink + ?Sized>(
        &mut self,
        txn: TxnId,
        start_time: Timestamp,
        read_only: bool,
        sink: &mut S,
    ) {
        let record = if read_only {
            Transaction::read_only(txn, start_time, self.capture_snapshot())
        } else {
            Transaction::new(txn, start_time)
        };
        self.txns.begin(record);
        info!(target: "repcrec::txn", %txn, read_only, "Transaction started");
        sink.emit(EngineEvent::Began { txn, read_only });
    }

    /// Committed values readable at UP sites; later sites overwrite earlier ones
    fn capture_snapshot(&self) -> BTreeMap<VarId, Value> {
        let mut snapshot = BTreeMap::new();
        for site in self.sites.iter().filter(|s| s.is_up()) {
            snapshot.extend(site.readable_values());
        }
        snapshot
    }

    // ------------------------------------------------------------------
    // Reads and writes
    // ------------------------------------------------------------------

    fn read<S: EventSink + ?Sized>(&mut self, op: Operation, txn: TxnId, var: VarId, sink: &mut S) {
        let time = self.time;
        let Some(record) = self.txns.get_mut(txn) else {
            return;
        };
        if record.status == TransactionStatus::Aborted {
            debug!(target: "repcrec::txn", %txn, %var, "Read skipped, transaction aborted");
            return;
        }

        if record.read_only {
            match record.snapshot.get(&var).copied() {
                Some(value) => sink.emit(EngineEvent::ReadValue { txn, var, value }),
                None => {
                    record.mark_aborted(AbortReason::ReadOnlyUnavailable { var });
                    sink.emit(EngineEvent::SnapshotMiss { txn, var });
                }
            }
            return;
        }

        let served = self
            .sites
            .iter_mut()
            .find_map(|site| site.read(txn, var).ok());

        match served {
            None => {
                debug!(target: "repcrec::txn", %txn, %var, "No site can serve read");
                self.site_failed.push(op);
                sink.emit(EngineEvent::NoSiteAvailable {
                    txn,
                    var,
                    access: Access::Read,
                });
            }
            Some(ReadOutcome::Blocked(holder)) => {
                self.blocked.push(op);
                self.wait_for.add_edge(holder, txn);
                let newly_waiting = self
                    .txns
                    .get_mut(txn)
                    .map(Transaction::wait)
                    .unwrap_or(false);
                sink.emit(EngineEvent::LockConflict {
                    txn,
                    var,
                    access: Access::Read,
                    holders: vec![holder],
                    newly_waiting,
                });
            }
            Some(ReadOutcome::Value(value)) => {
                if let Some(record) = self.txns.get_mut(txn) {
                    record.record_read(var, time);
                }
                sink.emit(EngineEvent::ReadValue { txn, var, value });
            }
        }
    }

    fn write<S: EventSink + ?Sized>(
        &mut self,
        op: Operation,
        txn: TxnId,
        var: VarId,
        value: Value,
        sink: &mut S,
    ) {
        if self.txns.status(txn) == Some(TransactionStatus::Aborted) {
            debug!(target: "repcrec::txn", %txn, %var, "Write skipped, transaction aborted");
            return;
        }

        let mut holders = BTreeSet::new();
        let mut applied = Vec::new();
        for site in self.sites.iter_mut() {
            match site.write(txn, var, value) {
                Ok(WriteOutcome::Applied) => applied.push(site.id()),
                Ok(WriteOutcome::Blocked(conflicts)) => holders.extend(conflicts),
                Err(e) => debug!(target: "repcrec::site", %txn, error = %e, "Write refused"),
            }
        }

        if applied.is_empty() && holders.is_empty() {
            debug!(target: "repcrec::txn", %txn, %var, "No site can accept write");
            self.site_failed.push(op);
            sink.emit(EngineEvent::NoSiteAvailable {
                txn,
                var,
                access: Access::Write,
            });
            return;
        }

        if !holders.is_empty() {
            self.blocked.push(op);
            holders.remove(&txn);
            for holder in &holders {
                self.wait_for.add_edge(*holder, txn);
            }
            let newly_waiting = self
                .txns
                .get_mut(txn)
                .map(Transaction::wait)
                .unwrap_or(false);
            sink.emit(EngineEvent::LockConflict {
                txn,
                var,
                access: Access::Write,
                holders: holders.into_iter().collect(),
                newly_waiting,
            });
            return;
        }

        let time = self.time;
        if let Some(record) = self.txns.get_mut(txn) {
            record.record_write(var, time);
        }
        self.uncommitted.insert(var, time);
        sink.emit(EngineEvent::Wrote {
            txn,
            var,
            value,
            sites: applied,
        });
    }

    // ------------------------------------------------------------------
    // Deadlocks
    // ------------------------------------------------------------------

    /// Abort the youngest member of each wait-for cycle until none remain
    fn detect_deadlocks<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        while let Some(cycle) = self.wait_for.find_cycle() {
            let Some(victim) = select_victim(&cycle, |id| self.txns.start_time(id)) else {
                break;
            };
            warn!(target: "repcrec::txn", ?cycle, %victim, "Deadlock detected");
            sink.emit(EngineEvent::Deadlock { cycle, victim });
            self.abort(victim, AbortReason::Deadlock, sink);
        }
    }

    // ------------------------------------------------------------------
    // Commit / abort
    // ------------------------------------------------------------------

    fn end<S: EventSink + ?Sized>(&mut self, txn: TxnId, sink: &mut S) {
        match self.txns.status(txn) {
            Some(TransactionStatus::Aborted) => {
                let reason = self
                    .txns
                    .abort_reason(txn)
                    .unwrap_or(AbortReason::Deadlock);
                self.abort(txn, reason, sink);
                return;
            }
            Some(TransactionStatus::Committed) => {
                debug!(target: "repcrec::txn", %txn, "Already committed");
                return;
            }
            Some(TransactionStatus::Running | TransactionStatus::Waiting) => {}
            None => return,
        }

        let blocker = self.commit_blocker(txn);
        let pending = self.drop_site_failed(txn);
        let blocker = blocker.or(pending.then_some(CommitBlocker::PendingUnavailable));
        if let Some(blocker) = blocker {
            info!(target: "repcrec::txn", %txn, %blocker, "Commit rejected");
            self.abort(txn, AbortReason::CommitRejected(blocker), sink);
            return;
        }

        let affected = self
            .txns
            .get(txn)
            .map(|record| record.affected_variables.clone())
            .unwrap_or_default();
        let written = self.written_values(txn, &affected);
        let lagging = self.lagging_replicas(txn, &written);

        for site in self.sites.iter_mut().filter(|s| s.is_up()) {
            site.commit(txn, &affected);
        }
        self.refresh_replicas(lagging);
        self.record_missed_updates(&affected);

        if let Some(record) = self.txns.get_mut(txn) {
            record.status = TransactionStatus::Committed;
        }
        for var in &affected {
            self.uncommitted.remove(var);
        }
        info!(target: "repcrec::txn", %txn, writes = affected.len(), "Transaction committed");
        sink.emit(EngineEvent::Committed { txn });

        self.blocked.retain(|op| op.txn() != Some(txn));
        let waiters = self.wait_for.remove_txn(txn);
        self.requeue_blocked(&waiters);
    }

    /// First reason `txn` may not commit, if any
    fn commit_blocker(&self, txn: TxnId) -> Option<CommitBlocker> {
        let record = self.txns.get(txn)?;

        for &var in &record.affected_variables {
            if var.is_replicated() {
                if let Some(site) = self
                    .sites
                    .iter()
                    .find(|s| !s.is_up() && s.has_tentative(var))
                {
                    return Some(CommitBlocker::ReplicaDown {
                        var,
                        site: site.id(),
                    });
                }
            } else if let Some(home) = var
                .home_site(self.config.num_sites)
                .and_then(|id| self.site(id))
            {
                if !home.is_up() {
                    return Some(CommitBlocker::HomeSiteDown {
                        var,
                        site: home.id(),
                    });
                }
                if !home.has_tentative(var) {
                    return Some(CommitBlocker::HomeSiteLostWrite {
                        var,
                        site: home.id(),
                    });
                }
            }
        }

        for site in &self.sites {
            for &var in &record.affected_variables {
                if site.is_write_restricted(var) && !self.stale_replicas.contains(&(site.id(), var))
                {
                    return Some(CommitBlocker::WriteRestricted {
                        var,
                        site: site.id(),
                    });
                }
                let written_at = record.write_history.get(&var).copied().unwrap_or(0);
                if written_at < site.failed_time() {
                    return Some(CommitBlocker::WriteBeforeFailure {
                        var,
                        site: site.id(),
                    });
                }
            }
            for &var in record.read_history.keys() {
                if site.hosts(var) && self.time < site.failed_time() {
                    return Some(CommitBlocker::ReadBeforeFailure {
                        var,
                        site: site.id(),
                    });
                }
            }
        }

        None
    }

    /// Remove `txn`'s instructions waiting for a site; true if there were any
    fn drop_site_failed(&mut self, txn: TxnId) -> bool {
        let before = self.site_failed.len();
        self.site_failed.retain(|op| op.txn() != Some(txn));
        self.site_failed.len() != before
    }

    /// Tentative values `txn` holds under its own exclusive locks at UP sites
    fn written_values(&self, txn: TxnId, affected: &BTreeSet<VarId>) -> BTreeMap<VarId, Value> {
        affected
            .iter()
            .filter_map(|&var| {
                self.sites
                    .iter()
                    .filter(|s| s.is_up() && s.locks().holds_exclusive(txn, var))
                    .find_map(|s| s.tentative(var))
                    .map(|value| (var, value))
            })
            .collect()
    }

    /// UP copies of written variables that `txn` holds no exclusive lock on
    ///
    /// These sites were down or write-restricted when the write was applied,
    /// so committing there installs nothing.
    fn lagging_replicas(
        &self,
        txn: TxnId,
        written: &BTreeMap<VarId, Value>,
    ) -> Vec<(SiteId, VarId, Value)> {
        let mut lagging = Vec::new();
        for (&var, &value) in written {
            for site in self.sites.iter().filter(|s| s.is_up() && s.hosts(var)) {
                if !site.locks().holds_exclusive(txn, var) {
                    lagging.push((site.id(), var, value));
                }
            }
        }
        lagging
    }

    /// Bring lagging copies up to the value just committed
    fn refresh_replicas(&mut self, lagging: Vec<(SiteId, VarId, Value)>) {
        for (site, var, value) in lagging {
            if let Some(target) = site.index().and_then(|idx| self.sites.get_mut(idx)) {
                target.refresh(var, value);
            }
            self.stale_replicas.remove(&(site, var));
        }
    }

    /// Remember which DOWN sites hold copies of variables just committed
    fn record_missed_updates(&mut self, affected: &BTreeSet<VarId>) {
        let num_sites = self.config.num_sites;
        for &var in affected {
            for site in self.sites.iter().filter(|s| !s.is_up()) {
                if var.resides_at(site.id(), num_sites) {
                    self.missed_updates.entry(site.id()).or_default().insert(var);
                }
            }
        }
    }

    /// Abort protocol
    ///
    /// Rolls back at every site, evicts the transaction, removes it from the
    /// wait-for graph and requeues the instructions of its waiters.
    fn abort<S: EventSink + ?Sized>(&mut self, txn: TxnId, reason: AbortReason, sink: &mut S) {
        let affected = self
            .txns
            .get(txn)
            .map(|record| record.affected_variables.clone())
            .unwrap_or_default();

        for site in self.sites.iter_mut() {
            site.abort(txn);
            for &var in &affected {
                if !self.stale_replicas.contains(&(site.id(), var)) {
                    site.lift_write_restriction(var);
                }
            }
        }

        self.txns.retire_aborted(txn, reason);
        self.blocked.retain(|op| op.txn() != Some(txn));
        self.site_failed.retain(|op| op.txn() != Some(txn));
        let waiters = self.wait_for.remove_txn(txn);
        self.requeue_blocked(&waiters);

        info!(target: "repcrec::txn", %txn, %reason, "Transaction aborted");
        sink.emit(EngineEvent::Aborted { txn, reason });
    }

    /// Move the parked instructions of `waiters` to the front of the queue
    fn requeue_blocked(&mut self, waiters: &[TxnId]) {
        if waiters.is_empty() {
            return;
        }
        let waiting: BTreeSet<TxnId> = waiters.iter().copied().collect();
        let (released, still_blocked): (Vec<Operation>, Vec<Operation>) =
            std::mem::take(&mut self.blocked)
                .into_iter()
                .partition(|op| op.txn().is_some_and(|t| waiting.contains(&t)));
        self.blocked = still_blocked;
        debug!(target: "repcrec::txn", count = released.len(), "Requeueing unblocked instructions");
        for op in released.into_iter().rev() {
            self.queue.push_front(op);
        }
    }

    // ------------------------------------------------------------------
    // Failure and recovery
    // ------------------------------------------------------------------

    fn fail<S: EventSink + ?Sized>(&mut self, site: SiteId, sink: &mut S) {
        let time = self.time;
        let Some(target) = site.index().and_then(|idx| self.sites.get_mut(idx)) else {
            warn!(target: "repcrec::site", %site, "No such site");
            sink.emit(EngineEvent::InvalidSite { site });
            return;
        };
        if target.fail(time) {
            sink.emit(EngineEvent::SiteFailed { site });
        } else {
            sink.emit(EngineEvent::SiteAlreadyDown { site });
        }
    }

    fn recover<S: EventSink + ?Sized>(&mut self, site: SiteId, sink: &mut S) {
        let Some(idx) = site.index().filter(|idx| *idx < self.sites.len()) else {
            warn!(target: "repcrec::site", %site, "No such site");
            sink.emit(EngineEvent::InvalidSite { site });
            return;
        };
        if !self.sites[idx].recover() {
            sink.emit(EngineEvent::SiteAlreadyUp { site });
            return;
        }
        sink.emit(EngineEvent::SiteRecovered { site });

        let failed_time = self.sites[idx].failed_time();
        let target = &mut self.sites[idx];

        // Writes still uncommitted when the site went down
        for (&var, &written_at) in &self.uncommitted {
            if written_at <= failed_time && target.hosts(var) {
                target.restrict_write(var);
            }
        }

        // Commits the site missed while down
        if let Some(missed) = self.missed_updates.remove(&site) {
            for var in missed {
                if target.hosts(var) {
                    target.restrict_write(var);
                    self.stale_replicas.insert((site, var));
                }
            }
        }

        // Reads of variables this site hosts, made before it failed
        for record in self.txns.iter_mut() {
            if record.status.is_terminal()
                || !record.read_any_before(failed_time, |var| target.hosts(var))
            {
                continue;
            }
            record.mark_aborted(AbortReason::StaleRead { site });
            info!(target: "repcrec::txn", txn = %record.id, %site, "Stale read detected");
            sink.emit(EngineEvent::StaleReadDetected {
                txn: record.id,
                site,
            });
        }

        for op in std::mem::take(&mut self.site_failed).into_iter().rev() {
            self.queue.push_front(op);
        }
    }

    fn dump_all<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        sink.emit(EngineEvent::Dump { sites: self.dump() });
        if self.config.debug_dump {
            sink.emit(EngineEvent::DebugState {
                blocked: self.blocked.clone(),
                site_failed: self.site_failed.clone(),
                wait_for: self.wait_for.to_vec(),
            });
        }
    }
}
