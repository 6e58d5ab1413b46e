//! Field codec between [`Batch`] and the hosted table's record shape.
//!
//! Records look like `{"id": "rec..", "fields": {"Prompt": "..", ...}}`.
//! Id sets are stored as comma-separated text, outputs as an attachment
//! list of `{url, filename}` objects.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use fanout_core::batch::{Batch, BatchPatch, BatchStatus, OutputImage};
use fanout_core::types::Timestamp;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::StoreError;

pub const FIELD_PROMPT: &str = "Prompt";
pub const FIELD_SUBJECT_IMAGE: &str = "Subject Image";
pub const FIELD_SIZE: &str = "Size";
pub const FIELD_VARIATIONS: &str = "Variations";
pub const FIELD_STATUS: &str = "Status";
pub const FIELD_JOB_IDS: &str = "Job IDs";
pub const FIELD_SEEN_IDS: &str = "Seen IDs";
pub const FIELD_FAILED_IDS: &str = "Failed IDs";
pub const FIELD_OUTPUTS: &str = "Outputs";
pub const FIELD_LAST_UPDATE: &str = "Last Update";
pub const FIELD_COMPLETED_AT: &str = "Completed At";
pub const FIELD_VERSION: &str = "Version";

/// A record as returned by the table API.
#[derive(Debug, Deserialize)]
pub struct RawRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// A page of records from a list/filter query.
#[derive(Debug, Deserialize)]
pub struct RawRecordPage {
    #[serde(default)]
    pub records: Vec<RawRecord>,
    /// Cursor for the next page, absent on the last one.
    pub offset: Option<String>,
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decode a table record into a [`Batch`].
///
/// Missing fields decode to their empty/default values; fields of the
/// wrong JSON type are a [`StoreError::Decode`].
pub fn decode_record(record: &RawRecord) -> Result<Batch, StoreError> {
    let f = &record.fields;

    Ok(Batch {
        id: record.id.clone(),
        prompt: text(f, FIELD_PROMPT)?,
        subject_image_ref: subject_image(f)?,
        size: text(f, FIELD_SIZE)?,
        requested_fanout: integer(f, FIELD_VARIATIONS)?,
        status: text(f, FIELD_STATUS)?
            .map(|s| BatchStatus::from_stored(&s))
            .unwrap_or_default(),
        job_ids: id_set(f, FIELD_JOB_IDS)?,
        seen_ids: id_set(f, FIELD_SEEN_IDS)?,
        failed_ids: id_set(f, FIELD_FAILED_IDS)?,
        outputs: outputs(f)?,
        last_update: timestamp(f, FIELD_LAST_UPDATE)?,
        completed_at: timestamp(f, FIELD_COMPLETED_AT)?,
        version: integer(f, FIELD_VERSION)?.unwrap_or(0).max(0) as u64,
    })
}

fn text(f: &Map<String, Value>, name: &str) -> Result<Option<String>, StoreError> {
    match f.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(type_error(name, "text", other)),
    }
}

fn integer(f: &Map<String, Value>, name: &str) -> Result<Option<i64>, StoreError> {
    match f.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_i64().or_else(|| n.as_f64().map(|v| v as i64))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| StoreError::Decode(format!("{name}: '{s}' is not an integer"))),
        Some(other) => Err(type_error(name, "number", other)),
    }
}

/// The subject image is either a URL string or an attachment list; the
/// first attachment's URL wins.
fn subject_image(f: &Map<String, Value>) -> Result<Option<String>, StoreError> {
    match f.get(FIELD_SUBJECT_IMAGE) {
        Some(Value::Array(items)) => Ok(items
            .iter()
            .find_map(|item| item.get("url").and_then(Value::as_str))
            .map(str::to_string)),
        _ => text(f, FIELD_SUBJECT_IMAGE),
    }
}

fn id_set(f: &Map<String, Value>, name: &str) -> Result<BTreeSet<String>, StoreError> {
    Ok(text(f, name)?
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

fn outputs(f: &Map<String, Value>) -> Result<Vec<OutputImage>, StoreError> {
    match f.get(FIELD_OUTPUTS) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                let url = item.get("url").and_then(Value::as_str).ok_or_else(|| {
                    StoreError::Decode(format!("{FIELD_OUTPUTS}: attachment without url"))
                })?;
                let filename = item
                    .get("filename")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(OutputImage {
                    url: url.to_string(),
                    filename: filename.to_string(),
                })
            })
            .collect(),
        Some(other) => Err(type_error(FIELD_OUTPUTS, "attachment list", other)),
    }
}

fn timestamp(f: &Map<String, Value>, name: &str) -> Result<Option<Timestamp>, StoreError> {
    text(f, name)?
        .filter(|s| !s.is_empty())
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StoreError::Decode(format!("{name}: {e}")))
        })
        .transpose()
}

fn type_error(name: &str, expected: &str, got: &Value) -> StoreError {
    StoreError::Decode(format!("{name}: expected {expected}, got {got}"))
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encode a patch into a `fields` object, stamping `version`.
pub fn encode_patch(patch: &BatchPatch, version: u64) -> Map<String, Value> {
    let mut fields = Map::new();

    if let Some(status) = patch.status {
        fields.insert(FIELD_STATUS.into(), Value::from(status.as_str()));
    }
    for (name, ids) in [
        (FIELD_JOB_IDS, &patch.job_ids),
        (FIELD_SEEN_IDS, &patch.seen_ids),
        (FIELD_FAILED_IDS, &patch.failed_ids),
    ] {
        if let Some(ids) = ids {
            let joined = ids.iter().map(String::as_str).collect::<Vec<_>>().join(",");
            fields.insert(name.into(), Value::from(joined));
        }
    }
    if let Some(outputs) = &patch.outputs {
        let attachments = outputs
            .iter()
            .map(|o| serde_json::json!({ "url": o.url, "filename": o.filename }))
            .collect();
        fields.insert(FIELD_OUTPUTS.into(), Value::Array(attachments));
    }
    if let Some(ts) = patch.last_update {
        fields.insert(FIELD_LAST_UPDATE.into(), Value::from(ts.to_rfc3339()));
    }
    if let Some(completed_at) = patch.completed_at {
        let value = completed_at.map_or(Value::Null, |ts| Value::from(ts.to_rfc3339()));
        fields.insert(FIELD_COMPLETED_AT.into(), value);
    }
    fields.insert(FIELD_VERSION.into(), Value::from(version));

    fields
}
