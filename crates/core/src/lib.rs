//! Domain types and pure rules for batch fan-out reconciliation.
//!
//! Nothing in this crate performs I/O. The record store, job service and
//! engine crates build on these types.

pub mod batch;
pub mod error;
pub mod job_status;
pub mod sizing;
pub mod types;
