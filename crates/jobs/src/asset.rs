//! Subject image fetch and encoding.
//!
//! The job service accepts the subject image inline, so the image is
//! fetched once per batch and turned into a `data:<mime>;base64,...` URI.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Upper bound on fetching one subject image.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from fetching or encoding a subject image.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Asset fetch returned HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Asset at {0} is not a supported image format")]
    UnsupportedFormat(String),
}

/// Converts an image reference into a transportable encoding.
#[async_trait]
pub trait AssetEncoder: Send + Sync {
    async fn encode(&self, reference: &str) -> Result<String, AssetError>;
}

/// Fetches images over HTTP and encodes them as data URIs.
pub struct HttpAssetEncoder {
    client: reqwest::Client,
}

impl HttpAssetEncoder {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpAssetEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetEncoder for HttpAssetEncoder {
    async fn encode(&self, reference: &str) -> Result<String, AssetError> {
        if reference.starts_with("data:") {
            return Ok(reference.to_string());
        }

        let response = self.client.get(reference).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::HttpStatus {
                status: status.as_u16(),
                url: reference.to_string(),
            });
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        let uri = to_data_uri(&bytes, content_type.as_deref())
            .ok_or_else(|| AssetError::UnsupportedFormat(reference.to_string()))?;

        tracing::debug!(url = reference, bytes = bytes.len(), "Subject image encoded");
        Ok(uri)
    }
}

/// Encode raw image bytes as a data URI.
///
/// The MIME type is sniffed from the bytes; an `image/*` content type
/// header is used only when sniffing fails. Returns `None` when neither
/// identifies an image.
pub fn to_data_uri(bytes: &[u8], content_type: Option<&str>) -> Option<String> {
    let mime = match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
            .filter(|ct| ct.starts_with("image/"))?
            .to_string(),
    };
    Some(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}
