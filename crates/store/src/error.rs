/// Errors from the record store layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record exists with the given id.
    #[error("Record {0} not found")]
    NotFound(String),

    /// A conditional write lost against a concurrent writer.
    #[error("Record {id} changed concurrently (expected version {expected}, found {actual})")]
    Conflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store returned a non-2xx status code.
    #[error("Record store API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A record could not be decoded into a batch.
    #[error("Malformed record: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Failures worth another attempt: network errors, rate limiting and
    /// server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
