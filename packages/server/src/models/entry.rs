use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::engine::pipeline::{DeletionFailure, FileFailure};
use common::engine::{SubmissionReport, UpsertInput, UpsertOutcome};
use common::{EntryStatus, UsageRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::evidence::EvidenceResponse;

/// Editable content of an entry.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct EntryContentRequest {
    /// Page identifier, e.g. `diesel`.
    #[schema(example = "diesel")]
    pub page_key: String,
    #[schema(example = 2024)]
    pub period_year: i32,
    /// Defaults to the page's unit.
    #[schema(example = "L")]
    pub unit: Option<String>,
    /// Month (`"1"`..`"12"`) to quantity. Invalid months are dropped;
    /// negative or non-numeric values count as zero.
    #[serde(default)]
    #[schema(value_type = Object, example = json!({"1": 100.0, "2": 80.5}))]
    pub monthly: BTreeMap<String, serde_json::Value>,
    /// Free-form page data. Itemised pages keep `line_records` here.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    pub notes: Option<String>,
}

impl From<EntryContentRequest> for UpsertInput {
    fn from(req: EntryContentRequest) -> Self {
        Self {
            page_key: req.page_key.trim().to_string(),
            period_year: req.period_year,
            unit: req.unit,
            monthly: req.monthly,
            payload: req.payload.unwrap_or(serde_json::Value::Null),
            notes: req.notes,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpsertEntryRequest {
    #[serde(flatten)]
    pub content: EntryContentRequest,
    /// Reviewer edit: keep the current status instead of submitting.
    #[serde(default)]
    pub preserve_status: bool,
    /// Reviewer edits may target another owner's entry.
    pub owner_id: Option<Uuid>,
}

/// JSON part named `entry` of a multipart submission.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SubmitEntryRequest {
    #[serde(flatten)]
    pub content: EntryContentRequest,
    /// Save without handing the entry in for review.
    #[serde(default)]
    pub save_draft: bool,
    /// Previously committed evidence to delete once the entry is written.
    #[serde(default)]
    pub delete_file_ids: Vec<Uuid>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UpsertEntryResponse {
    pub entry_id: Uuid,
    pub created: bool,
    pub status: EntryStatus,
    #[schema(example = 180.5)]
    pub amount: f64,
    /// Monthly inputs that were dropped or zeroed.
    pub issues: Vec<String>,
}

impl From<UpsertOutcome> for UpsertEntryResponse {
    fn from(outcome: UpsertOutcome) -> Self {
        Self {
            entry_id: outcome.record.id,
            created: outcome.created,
            status: outcome.record.status,
            amount: outcome.record.amount,
            issues: outcome.issues.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EntryResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    #[schema(example = "diesel")]
    pub page_key: String,
    #[schema(example = 2024)]
    pub period_year: i32,
    #[schema(example = "Diesel (mobile)")]
    pub category: String,
    #[schema(example = "L")]
    pub unit: String,
    #[schema(example = 180.5)]
    pub amount: f64,
    pub monthly: BTreeMap<String, f64>,
    pub payload: serde_json::Value,
    pub notes: Option<String>,
    pub status: EntryStatus,
    pub is_locked: bool,
    pub reviewer_id: Option<Uuid>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UsageRecord> for EntryResponse {
    fn from(record: UsageRecord) -> Self {
        Self {
            monthly: record.monthly.to_raw(),
            id: record.id,
            owner_id: record.owner_id,
            page_key: record.page_key,
            period_year: record.period_year,
            category: record.category,
            unit: record.unit,
            amount: record.amount,
            payload: record.payload,
            notes: record.notes,
            status: record.status,
            is_locked: record.is_locked,
            reviewer_id: record.reviewer_id,
            review_notes: record.review_notes,
            reviewed_at: record.reviewed_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EntryListResponse {
    pub entries: Vec<EntryResponse>,
    pub total: u64,
}

impl From<Vec<UsageRecord>> for EntryListResponse {
    fn from(records: Vec<UsageRecord>) -> Self {
        let total = records.len() as u64;
        Self {
            entries: records.into_iter().map(EntryResponse::from).collect(),
            total,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListEntriesQuery {
    /// Only entries for this reporting year.
    pub period_year: Option<i32>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LookupQuery {
    pub page_key: String,
    pub period_year: i32,
}

/// Per-step outcome of a multipart submission.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmitResponse {
    pub entry: EntryResponse,
    pub created: bool,
    pub committed: Vec<EvidenceResponse>,
    pub failed_files: Vec<FileFailure>,
    pub deleted: Vec<Uuid>,
    pub failed_deletions: Vec<DeletionFailure>,
    pub issues: Vec<String>,
}

impl From<SubmissionReport> for SubmitResponse {
    fn from(report: SubmissionReport) -> Self {
        Self {
            entry: report.record.into(),
            created: report.created,
            committed: report.committed.into_iter().map(Into::into).collect(),
            failed_files: report.failed_files,
            deleted: report.deleted,
            failed_deletions: report.failed_deletions,
            issues: report.issues,
        }
    }
}
