//! Core types for RepCRec
//!
//! This crate defines the foundational types used throughout the system:
//! - TxnId, SiteId, VarId: identifiers and variable placement rules
//! - Operation: a parsed, timestamped script instruction
//! - EngineEvent: structured record of every protocol effect
//! - Error: hard failures (parse, I/O, configuration)
//! - parse: script text → operation stream

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod event;
pub mod operation;
pub mod parse;
pub mod types;

pub use error::{Error, Result};
pub use event::{Access, AbortReason, CommitBlocker, EngineEvent, SiteDump};
pub use operation::{Operation, OperationKind};
pub use parse::{parse_instruction, parse_script};
pub use types::{SiteId, Timestamp, TxnId, Value, VarId};
