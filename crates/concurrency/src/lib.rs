//! Concurrency control for RepCRec
//!
//! This crate implements the pessimistic side of the engine:
//! - LockManager: per-site shared/exclusive lock table with upgrade
//! - TransactionRegistry: transaction records, histories, read-only snapshots
//! - WaitForGraph: blocking relationships and cycle search for deadlocks

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lock;
pub mod transaction;
pub mod wait_for;

pub use lock::{LockManager, LockState};
pub use transaction::{Transaction, TransactionRegistry, TransactionStatus};
pub use wait_for::{select_victim, WaitForGraph};
