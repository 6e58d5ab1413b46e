//! Batch fan-out and completion reconciliation.
//!
//! A batch is fanned out into N jobs by the [`coordinator`]. Job
//! completion reaches the batch over two unordered, at-least-once
//! channels: a per-job [`poller`] (guaranteed, bounded in time) and the
//! inbound [`push`] webhook (best-effort). Both funnel into the
//! [`reconciler`], which merges each job's outcome into the batch record
//! exactly once.
//!
//! [`Engine`] wires the pieces together and is the handle the HTTP layer
//! holds.

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod locks;
pub mod poller;
pub mod push;
pub mod reconciler;
pub mod recovery;
pub mod registry;

pub use config::{EngineConfig, WriteRetry};
pub use engine::Engine;
pub use error::{EngineError, ReconcileError};
pub use events::BatchEvent;
