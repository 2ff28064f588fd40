//! End-to-end scenario tests
//!
//! Scripts replayed through the public facade, checking the observable
//! behaviour of the replicated engine.

#[path = "../common/mod.rs"]
mod common;

mod available_copies;
mod deadlocks;
mod invariants;
mod read_only;
mod textbook;
