//! Job service and asset collaborators.
//!
//! Provides the [`JobService`] seam used by the engine to submit
//! generation jobs and fetch their status, an HTTP implementation for a
//! prediction-style REST API ([`PredictionApi`]), and the
//! [`AssetEncoder`] that turns a subject image reference into a
//! transportable data URI.

pub mod api;
pub mod asset;
pub mod service;

pub use api::{JobServiceError, Prediction, PredictionApi};
pub use asset::{AssetEncoder, AssetError, HttpAssetEncoder};
pub use service::{JobService, JobSpec, JobStatusReport};
