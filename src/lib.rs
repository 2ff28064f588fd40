//! RepCRec - replicated concurrency control and recovery
//!
//! A discrete-event simulation of a distributed database: sites holding
//! replicated and non-replicated integer variables, strict two-phase locking
//! with the available-copies rule, snapshot reads for read-only transactions,
//! deadlock detection and site failure/recovery.
//!
//! # Quick Start
//!
//! ```
//! use repcrec::{parse_script, Coordinator, EngineEvent, TxnId};
//!
//! let ops = parse_script("begin(T1)\nW(T1,x2,7)\nend(T1)\n").unwrap();
//! let mut coordinator = Coordinator::default();
//! let events = coordinator.execute(ops);
//! assert_eq!(events.last(), Some(&EngineEvent::Committed { txn: TxnId(1) }));
//! ```
//!
//! # Architecture
//!
//! - `repcrec-core`: identifiers, instructions, events, parsing, errors
//! - `repcrec-concurrency`: lock tables, transaction records, wait-for graph
//! - `repcrec-engine`: sites, the coordinator, configuration

pub use repcrec_concurrency::{
    select_victim, LockManager, LockState, Transaction, TransactionRegistry, TransactionStatus,
    WaitForGraph,
};
pub use repcrec_core::*;
pub use repcrec_engine::*;
