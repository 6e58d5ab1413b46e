use std::time::Duration;

use fanout_engine::EngineConfig;

/// Path the job service posts completion notifications to.
pub const JOB_WEBHOOK_PATH: &str = "/api/v1/webhooks/jobs";

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In production,
/// override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for pollers to exit (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Externally reachable base URL of this server; the job webhook
    /// target is built from it.
    pub public_base_url: String,
    pub job_service_url: String,
    pub job_service_token: String,
    /// Model/version identifier sent with every job.
    pub job_service_model: String,
    /// Record store table URL. `None` selects the in-memory store.
    pub record_store_url: Option<String>,
    pub record_store_token: String,
    pub poll_interval_secs: u64,
    pub poll_deadline_secs: u64,
    pub submit_pacing_ms: u64,
    /// Re-spawn pollers for in-flight jobs at boot (default: `true`).
    pub recover_on_startup: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                        |
    /// |-------------------------|--------------------------------|
    /// | `HOST`                  | `0.0.0.0`                      |
    /// | `PORT`                  | `3000`                         |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`        |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                           |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                           |
    /// | `PUBLIC_BASE_URL`       | `http://localhost:3000`        |
    /// | `JOB_SERVICE_URL`       | `https://api.replicate.com/v1` |
    /// | `JOB_SERVICE_TOKEN`     | empty                          |
    /// | `JOB_SERVICE_MODEL`     | empty                          |
    /// | `RECORD_STORE_URL`      | unset (in-memory store)        |
    /// | `RECORD_STORE_TOKEN`    | empty                          |
    /// | `POLL_INTERVAL_SECS`    | `7`                            |
    /// | `POLL_DEADLINE_SECS`    | `1200`                         |
    /// | `SUBMIT_PACING_MS`      | `1000`                         |
    /// | `RECOVER_ON_STARTUP`    | `true`                         |
    pub fn from_env() -> Self {
        let host = var_or("HOST", "0.0.0.0");

        let port: u16 = var_or("PORT", "3000")
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = var_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = var_or("REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = var_or("SHUTDOWN_TIMEOUT_SECS", "30")
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let record_store_url = std::env::var("RECORD_STORE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let poll_interval_secs: u64 = var_or("POLL_INTERVAL_SECS", "7")
            .parse()
            .expect("POLL_INTERVAL_SECS must be a valid u64");

        let poll_deadline_secs: u64 = var_or("POLL_DEADLINE_SECS", "1200")
            .parse()
            .expect("POLL_DEADLINE_SECS must be a valid u64");

        let submit_pacing_ms: u64 = var_or("SUBMIT_PACING_MS", "1000")
            .parse()
            .expect("SUBMIT_PACING_MS must be a valid u64");

        let recover_on_startup = parse_flag(&var_or("RECOVER_ON_STARTUP", "true"));

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            public_base_url: var_or("PUBLIC_BASE_URL", "http://localhost:3000"),
            job_service_url: var_or("JOB_SERVICE_URL", "https://api.replicate.com/v1"),
            job_service_token: var_or("JOB_SERVICE_TOKEN", ""),
            job_service_model: var_or("JOB_SERVICE_MODEL", ""),
            record_store_url,
            record_store_token: var_or("RECORD_STORE_TOKEN", ""),
            poll_interval_secs,
            poll_deadline_secs,
            submit_pacing_ms,
            recover_on_startup,
        }
    }

    /// Full URL the job service should notify on job completion.
    pub fn notify_url(&self) -> String {
        format!(
            "{}{JOB_WEBHOOK_PATH}",
            self.public_base_url.trim_end_matches('/')
        )
    }

    /// Engine tunables derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            poll_deadline: Duration::from_secs(self.poll_deadline_secs),
            submit_pacing: Duration::from_millis(self.submit_pacing_ms),
            notify_url: Some(self.notify_url()),
            ..EngineConfig::default()
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
