//! Replicated transaction engine
//!
//! This crate ties the lower layers together:
//! - Sites: per-site committed/tentative values, restrictions and locks
//! - Coordinator: the instruction loop, commit/abort and failure protocols
//! - Configuration loaded from `repcrec.toml`
//!
//! The coordinator never prints. Every observable effect is reported as an
//! [`EngineEvent`](repcrec_core::EngineEvent).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod site;

pub use config::{EngineConfig, CONFIG_FILE_NAME};
pub use coordinator::{Coordinator, EventSink};
pub use site::{ReadOutcome, Site, SiteError, SiteStatus, WriteOutcome};
