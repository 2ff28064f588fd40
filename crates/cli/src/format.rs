//! Event → output line formatting.
//!
//! Two modes:
//! - **Text** (default): the classic RepCRec transcript, e.g. `T1 reads x2: 20`
//! - **JSON** (`--json`): one `serde_json` object per event

use repcrec_core::{EngineEvent, Operation, SiteDump, TxnId};

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

/// Format one event as zero or more output lines.
pub fn format_event(event: &EngineEvent, mode: OutputMode) -> Vec<String> {
    match mode {
        OutputMode::Json => vec![serde_json::to_string(event)
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))],
        OutputMode::Text => format_text(event),
    }
}

fn format_text(event: &EngineEvent) -> Vec<String> {
    let line = match event {
        EngineEvent::Began { txn, read_only } => {
            if *read_only {
                format!("{} begins, and it is read-only", txn)
            } else {
                format!("{} begins", txn)
            }
        }
        EngineEvent::ReadValue { txn, var, value } => format!("{} reads {}: {}", txn, var, value),
        EngineEvent::Wrote {
            txn,
            var,
            value,
            sites,
        } => {
            let sites: Vec<String> = sites.iter().map(|s| s.to_string()).collect();
            format!(
                "{} writes {} as {}, and affected sites are {}",
                txn,
                var,
                value,
                sites.join(" ")
            )
        }
        EngineEvent::LockConflict {
            txn,
            var,
            access,
            newly_waiting,
            ..
        } => {
            if !*newly_waiting {
                return Vec::new();
            }
            format!(
                "{} can not {} {} since the lock conflicts",
                txn,
                access,
                var
            )
        }
        EngineEvent::NoSiteAvailable { txn, var, access } => format!(
            "{} can not {} {} since there are no sites available.",
            txn,
            access,
            var
        ),
        EngineEvent::SnapshotMiss { txn, var } => format!(
            "{} can not read {} since there are no sites available. {} aborts!",
            txn, var, txn
        ),
        EngineEvent::Committed { txn } => format!("{} commits!", txn),
        EngineEvent::Aborted { txn, .. } => format!("{} aborts!", txn),
        EngineEvent::Deadlock { .. } => "Deadlock happens!".to_string(),
        // Surfaces as an abort once the transaction ends
        EngineEvent::StaleReadDetected { .. } => return Vec::new(),
        EngineEvent::SiteFailed { site } => format!("Site{} fails!", site),
        EngineEvent::SiteAlreadyDown { site } => format!("Site{} is already DOWN!", site),
        EngineEvent::SiteRecovered { site } => format!("Site{} recovers!", site),
        EngineEvent::SiteAlreadyUp { site } => format!("Site{} is already UP!", site),
        EngineEvent::Dump { sites } => return sites.iter().map(format_site_dump).collect(),
        EngineEvent::DebugState {
            blocked,
            site_failed,
            wait_for,
        } => {
            return vec![
                format!("Blocked: {}", format_operations(blocked)),
                format!("Waiting for sites: {}", format_operations(site_failed)),
                format!("Wait-for: {}", format_wait_for(wait_for)),
            ];
        }
        EngineEvent::UnknownTransaction { operation } => {
            format!("{} ignored: transaction never began", operation.kind)
        }
        EngineEvent::InvalidSite { site } => format!("Site{} does not exist!", site),
    };
    vec![line]
}

fn format_site_dump(dump: &SiteDump) -> String {
    let values: Vec<String> = dump
        .values
        .iter()
        .map(|(var, value)| format!("{}: {}", var, value))
        .collect();
    format!("Site {} - {}", dump.site, values.join(", "))
}

fn format_operations(ops: &[Operation]) -> String {
    if ops.is_empty() {
        return "(none)".to_string();
    }
    ops.iter()
        .map(|op| op.kind.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_wait_for(edges: &[(TxnId, Vec<TxnId>)]) -> String {
    if edges.is_empty() {
        return "(none)".to_string();
    }
    edges
        .iter()
        .map(|(holder, waiters)| {
            let waiters: Vec<String> = waiters.iter().map(|w| w.to_string()).collect();
            format!("{} -> {}", holder, waiters.join(" "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}
