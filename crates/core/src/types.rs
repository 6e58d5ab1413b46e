/// Record-store identifier of a batch (opaque, e.g. `rec8f2K1...`).
pub type BatchId = String;

/// Job-service identifier of a single generation job.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
