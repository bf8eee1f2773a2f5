#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entry_status::EntryStatus;
use crate::monthly::MonthlyUsage;

/// `(owner, page, reporting year)`: at most one usage entry exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub owner_id: Uuid,
    pub page_key: String,
    pub period_year: i32,
}

impl NaturalKey {
    pub fn new(owner_id: Uuid, page_key: impl Into<String>, period_year: i32) -> Self {
        Self {
            owner_id,
            page_key: page_key.into(),
            period_year,
        }
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.owner_id, self.page_key, self.period_year)
    }
}

/// One reporting fact for a page and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub page_key: String,
    pub period_year: i32,
    pub category: String,
    pub unit: String,
    pub amount: f64,
    pub monthly: MonthlyUsage,
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

impl UsageRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.owner_id, self.page_key.clone(), self.period_year)
    }
}

/// Content columns written by the upsert engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordContent {
    pub category: String,
    pub unit: String,
    pub amount: f64,
    pub monthly: MonthlyUsage,
    pub payload: serde_json::Value,
    pub notes: Option<String>,
}

/// A usage entry that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub key: NaturalKey,
    pub content: RecordContent,
    pub status: EntryStatus,
}

/// Precondition of a content write: the row must still have the status the
/// writer read, and must be unlocked unless `allow_locked` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentGuard {
    pub status: EntryStatus,
    pub allow_locked: bool,
}

/// Status and audit columns written by a review transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPatch {
    pub status: EntryStatus,
    pub is_locked: bool,
    pub reviewer_id: Option<Uuid>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Sort order for record listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordOrder {
    /// Newest first by creation time.
    #[default]
    CreatedDesc,
    /// Most recent decision first.
    ReviewedDesc,
    /// Latest reporting year first, then page key.
    PeriodDesc,
}

/// Filter for [`crate::repository::RecordStore::list`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub owner_id: Option<Uuid>,
    pub page_key: Option<String>,
    pub period_year: Option<i32>,
    pub category: Option<String>,
    pub statuses: Vec<EntryStatus>,
    pub reviewed_from: Option<DateTime<Utc>>,
    pub reviewed_to: Option<DateTime<Utc>>,
    pub order: RecordOrder,
}

impl RecordFilter {
    /// Applies the filter to an in-memory record.
    pub fn matches(&self, record: &UsageRecord) -> bool {
        self.owner_id.is_none_or(|id| record.owner_id == id)
            && self
                .page_key
                .as_deref()
                .is_none_or(|k| record.page_key == k)
            && self.period_year.is_none_or(|y| record.period_year == y)
            && self
                .category
                .as_deref()
                .is_none_or(|c| record.category == c)
            && (self.statuses.is_empty() || self.statuses.contains(&record.status))
            && self
                .reviewed_from
                .is_none_or(|from| record.reviewed_at.is_some_and(|at| at >= from))
            && self
                .reviewed_to
                .is_none_or(|to| record.reviewed_at.is_some_and(|at| at <= to))
    }
}

/// What an evidence document proves.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// Invoices, meter readings, receipts.
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "usage_evidence"))]
    UsageEvidence,
    /// Safety data sheet or product specification.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "msds"))]
    Msds,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "other"))]
    Other,
}

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsageEvidence => "usage_evidence",
            Self::Msds => "msds",
            Self::Other => "other",
        }
    }
}

/// Persisted metadata for an uploaded evidence object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceFile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub entry_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub file_path: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub kind: EvidenceKind,
    pub month: Option<u8>,
    pub created_at: DateTime<Utc>,
}

impl EvidenceFile {
    /// Whether two files compete for the same single-file slot.
    pub fn same_slot(&self, kind: EvidenceKind, month: Option<u8>, group_id: Option<Uuid>) -> bool {
        self.kind == kind && self.month == month && self.group_id == group_id
    }
}

/// Metadata row to insert after an object upload succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvidence {
    pub owner_id: Uuid,
    pub entry_id: Uuid,
    pub group_id: Option<Uuid>,
    pub file_path: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub kind: EvidenceKind,
    pub month: Option<u8>,
}

/// Filter for [`crate::repository::EvidenceIndex::list`].
#[derive(Debug, Clone, Default)]
pub struct EvidenceFilter {
    pub owner_id: Option<Uuid>,
    pub entry_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    /// Only rows that no longer belong to an entry.
    pub detached: bool,
    pub created_before: Option<DateTime<Utc>>,
}

impl EvidenceFilter {
    pub fn for_entry(entry_id: Uuid) -> Self {
        Self {
            entry_id: Some(entry_id),
            ..Default::default()
        }
    }

    pub fn for_group(group_id: Uuid) -> Self {
        Self {
            group_id: Some(group_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, file: &EvidenceFile) -> bool {
        self.owner_id.is_none_or(|id| file.owner_id == id)
            && self.entry_id.is_none_or(|id| file.entry_id == Some(id))
            && self.group_id.is_none_or(|id| file.group_id == Some(id))
            && (!self.detached || file.entry_id.is_none())
            && self.created_before.is_none_or(|t| file.created_at < t)
    }
}

/// A numeric line inside an itemised entry, stored in the entry payload
/// under `line_records`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LineRecord {
    pub id: String,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub quantity: f64,
    #[serde(default)]
    pub note: Option<String>,
}
