use std::time::Duration;

/// Reference poll interval between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(7);

/// Reference absolute deadline for one job's poller.
pub const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(20 * 60);

/// Reference delay between consecutive job submissions.
pub const DEFAULT_SUBMIT_PACING: Duration = Duration::from_secs(1);

/// Store write attempts before a merge or a job id write gives up.
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 5;

/// Pause between store write attempts.
pub const DEFAULT_WRITE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub poll_interval: Duration,
    pub poll_deadline: Duration,
    pub submit_pacing: Duration,
    pub max_write_attempts: u32,
    pub write_retry_delay: Duration,
    /// Webhook URL handed to the job service on submission. `None`
    /// disables the push channel; pollers still complete every job.
    pub notify_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_deadline: DEFAULT_POLL_DEADLINE,
            submit_pacing: DEFAULT_SUBMIT_PACING,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            write_retry_delay: DEFAULT_WRITE_RETRY_DELAY,
            notify_url: None,
        }
    }
}

impl EngineConfig {
    pub fn write_retry(&self) -> WriteRetry {
        WriteRetry {
            max_attempts: self.max_write_attempts.max(1),
            delay: self.write_retry_delay,
        }
    }
}

/// How often, and how patiently, a store write is retried after a
/// conflict or a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRetry {
    pub max_attempts: u32,
    pub delay: Duration,
}
