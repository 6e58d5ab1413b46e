//! Record store client for a hosted table REST API.
//!
//! Targets a single table: `GET {table_url}/{id}` reads a record,
//! `PATCH {table_url}/{id}` with `{"fields": {...}}` updates it, and
//! `GET {table_url}?filterByFormula=...` queries it.
//!
//! The API has no native conditional update. Conditional writes re-read
//! the `Version` field immediately before patching, which narrows but
//! does not close the cross-process race; in-process callers serialize
//! per batch before writing.

use std::time::Duration;

use async_trait::async_trait;
use fanout_core::batch::{Batch, BatchPatch, BatchStatus};
use serde_json::json;

use crate::fields::{
    decode_record, encode_patch, RawRecord, RawRecordPage, FIELD_JOB_IDS, FIELD_STATUS,
};
use crate::{RecordStore, StoreError};

/// Upper bound on any single request to the table API.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one table of batch records.
pub struct HttpRecordStore {
    client: reqwest::Client,
    table_url: String,
    token: String,
}

impl HttpRecordStore {
    /// Create a client for a table.
    ///
    /// * `table_url` - full table URL, e.g. `https://api.airtable.com/v0/appXYZ/Batches`.
    /// * `token`     - bearer token sent on every request.
    pub fn new(table_url: String, token: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self::with_client(client, table_url, token)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, table_url: String, token: String) -> Self {
        Self {
            client,
            table_url: table_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Run a filter formula and collect every matching record across pages.
    async fn query(
        &self,
        formula: &str,
        max_records: Option<u32>,
    ) -> Result<Vec<Batch>, StoreError> {
        let mut batches = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut params: Vec<(&str, String)> = vec![("filterByFormula", formula.to_string())];
            if let Some(max) = max_records {
                params.push(("maxRecords", max.to_string()));
            }
            if let Some(cursor) = &offset {
                params.push(("offset", cursor.clone()));
            }

            let response = self
                .client
                .get(&self.table_url)
                .bearer_auth(&self.token)
                .query(&params)
                .send()
                .await?;
            let page: RawRecordPage = Self::parse_response(response, None).await?;

            for record in &page.records {
                batches.push(decode_record(record)?);
            }

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(batches)
    }

    // ---- private helpers ----

    /// Map a non-2xx response to an error, treating 404 as
    /// [`StoreError::NotFound`] when a record id is known.
    async fn ensure_success(
        response: reqwest::Response,
        record_id: Option<&str>,
    ) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            if let Some(id) = record_id {
                return Err(StoreError::NotFound(id.to_string()));
            }
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        record_id: Option<&str>,
    ) -> Result<T, StoreError> {
        let response = Self::ensure_success(response, record_id).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn read(&self, batch_id: &str) -> Result<Batch, StoreError> {
        let response = self
            .client
            .get(format!("{}/{}", self.table_url, batch_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let record: RawRecord = Self::parse_response(response, Some(batch_id)).await?;
        decode_record(&record)
    }

    async fn write(
        &self,
        batch_id: &str,
        patch: &BatchPatch,
        expected_version: Option<u64>,
    ) -> Result<Batch, StoreError> {
        let current = self.read(batch_id).await?.version;
        if let Some(expected) = expected_version {
            if current != expected {
                return Err(StoreError::Conflict {
                    id: batch_id.to_string(),
                    expected,
                    actual: current,
                });
            }
        }

        let body = json!({ "fields": encode_patch(patch, current + 1) });
        let response = self
            .client
            .patch(format!("{}/{}", self.table_url, batch_id))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let record: RawRecord = Self::parse_response(response, Some(batch_id)).await?;

        tracing::debug!(batch_id, version = current + 1, "Batch record written");
        decode_record(&record)
    }

    async fn find_by_job_id(&self, job_id: &str) -> Result<Option<Batch>, StoreError> {
        let escaped = job_id.replace('\'', "\\'");
        let formula = format!("FIND('{escaped}', {{{FIELD_JOB_IDS}}})");
        let candidates = self.query(&formula, Some(10)).await?;
        // FIND is a substring match; confirm exact membership.
        Ok(candidates.into_iter().find(|b| b.job_ids.contains(job_id)))
    }

    async fn list_by_status(&self, status: BatchStatus) -> Result<Vec<Batch>, StoreError> {
        let formula = format!("{{{FIELD_STATUS}}} = '{}'", status.as_str());
        self.query(&formula, None).await
    }
}
