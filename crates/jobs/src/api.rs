//! REST client for a prediction-style generation API.
//!
//! Wraps `POST /predictions` (submit) and `GET /predictions/{id}`
//! (status) using [`reqwest`]. The same [`Prediction`] body shape is what
//! the service posts to the completion webhook.

use std::time::Duration;

use async_trait::async_trait;
use fanout_core::job_status::UpstreamStatus;
use fanout_core::types::JobId;
use serde::Deserialize;

use crate::service::{JobService, JobSpec, JobStatusReport};

/// Upper bound on any single request to the job service.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the generation service.
pub struct PredictionApi {
    client: reqwest::Client,
    api_url: String,
    token: String,
    /// Model version identifier sent with every submission.
    model: String,
}

/// A prediction as returned by the API (and delivered to webhooks).
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub output: Option<PredictionOutput>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Prediction output: a single URL or a list of URLs.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PredictionOutput {
    One(String),
    Many(Vec<String>),
}

impl Prediction {
    /// Output URLs in the order the service reported them.
    pub fn output_urls(&self) -> Vec<String> {
        match &self.output {
            None => Vec::new(),
            Some(PredictionOutput::One(url)) => vec![url.clone()],
            Some(PredictionOutput::Many(urls)) => urls.clone(),
        }
    }

    pub fn into_report(self) -> JobStatusReport {
        let outputs = self.output_urls();
        let error = self.error.and_then(|e| match e {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });
        JobStatusReport {
            status: UpstreamStatus::from_wire(&self.status),
            raw_status: self.status,
            outputs,
            error,
        }
    }
}

/// Errors from the job service REST layer.
#[derive(Debug, thiserror::Error)]
pub enum JobServiceError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Job service API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A submission response carried no job id.
    #[error("Job service accepted the submission but returned no job id")]
    MissingJobId,
}

impl PredictionApi {
    /// Create a client.
    ///
    /// * `api_url` - base URL, e.g. `https://api.replicate.com/v1`.
    /// * `token`   - bearer token.
    /// * `model`   - model version identifier.
    pub fn new(api_url: String, token: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self::with_client(client, api_url, token, model)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_url: String,
        token: String,
        model: String,
    ) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            model,
        }
    }

    /// Build the submission body for a job.
    fn submission_body(&self, spec: &JobSpec, notify_target: Option<&str>) -> serde_json::Value {
        let mut body = serde_json::json!({
            "version": self.model,
            "input": {
                "prompt": spec.prompt,
                "image": spec.image,
                "width": spec.width,
                "height": spec.height,
                "seed": spec.seed,
            },
        });
        if let Some(target) = notify_target {
            body["webhook"] = serde_json::Value::from(target);
            body["webhook_events_filter"] = serde_json::json!(["completed"]);
        }
        body
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, JobServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(JobServiceError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, JobServiceError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl JobService for PredictionApi {
    async fn submit(
        &self,
        spec: &JobSpec,
        notify_target: Option<&str>,
    ) -> Result<JobId, JobServiceError> {
        let response = self
            .client
            .post(format!("{}/predictions", self.api_url))
            .bearer_auth(&self.token)
            .json(&self.submission_body(spec, notify_target))
            .send()
            .await?;

        let prediction: Prediction = Self::parse_response(response).await?;
        if prediction.id.trim().is_empty() {
            return Err(JobServiceError::MissingJobId);
        }

        tracing::debug!(job_id = %prediction.id, status = %prediction.status, "Job submitted");
        Ok(prediction.id)
    }

    async fn get_status(&self, job_id: &str) -> Result<JobStatusReport, JobServiceError> {
        let response = self
            .client
            .get(format!("{}/predictions/{}", self.api_url, job_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let prediction: Prediction = Self::parse_response(response).await?;
        Ok(prediction.into_report())
    }
}
