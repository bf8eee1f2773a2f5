use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::groups::{line_records, monthly_from_line_records};
use super::review::ReviewMachine;
use crate::actor::Actor;
use crate::entry_status::EntryStatus;
use crate::error::{CoreError, ResultExt, StoreError};
use crate::model::{ContentGuard, NaturalKey, NewRecord, RecordContent, RecordFilter, RecordOrder, UsageRecord};
use crate::monthly::{MonthlyIssue, MonthlyUsage, RawMonthly};
use crate::page::{PageRegistry, UsageMode};
use crate::repository::RecordStore;

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// What the caller wants the write to do to the entry's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsertIntent {
    /// Hand the entry in for review.
    #[default]
    Submit,
    /// Keep working on it later; skips the zero-total check.
    SaveDraft,
    /// Reviewer edit during review; the status is left alone.
    PreserveStatus,
}

impl UpsertIntent {
    pub fn from_flags(preserve_status: bool) -> Self {
        if preserve_status {
            Self::PreserveStatus
        } else {
            Self::Submit
        }
    }

    fn requires_positive_total(&self) -> bool {
        !matches!(self, Self::SaveDraft)
    }
}

/// Client-supplied content of an entry.
#[derive(Debug, Clone, Default)]
pub struct UpsertInput {
    pub page_key: String,
    pub period_year: i32,
    pub unit: Option<String>,
    pub monthly: RawMonthly,
    pub payload: serde_json::Value,
    pub notes: Option<String>,
}

/// Validated content ready to be written.
#[derive(Debug, Clone)]
pub struct PreparedEntry {
    pub page_key: String,
    pub period_year: i32,
    pub content: RecordContent,
    pub issues: Vec<MonthlyIssue>,
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub record: UsageRecord,
    pub created: bool,
    pub issues: Vec<MonthlyIssue>,
}

/// Finds or creates the single entry for a natural key and writes its content.
#[derive(Clone)]
pub struct UpsertEngine {
    records: Arc<dyn RecordStore>,
    pages: Arc<PageRegistry>,
    review: ReviewMachine,
}

impl UpsertEngine {
    pub fn new(records: Arc<dyn RecordStore>, pages: Arc<PageRegistry>) -> Self {
        let review = ReviewMachine::new(records.clone());
        Self {
            records,
            pages,
            review,
        }
    }

    /// Validates input without touching the store.
    pub fn prepare(
        &self,
        input: &UpsertInput,
        intent: UpsertIntent,
    ) -> Result<PreparedEntry, CoreError> {
        let page = self.pages.resolve(&input.page_key)?;
        if !(MIN_YEAR..=MAX_YEAR).contains(&input.period_year) {
            return Err(CoreError::validation(format!(
                "period_year must be between {MIN_YEAR} and {MAX_YEAR}"
            )));
        }

        let payload = match &input.payload {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            serde_json::Value::Object(_) => input.payload.clone(),
            _ => return Err(CoreError::validation("payload must be a JSON object")),
        };

        let (mut monthly, issues) = MonthlyUsage::from_raw(&input.monthly);
        if monthly.is_empty() && page.usage_mode == UsageMode::LineRecords {
            monthly = monthly_from_line_records(&line_records(&payload)?);
        }

        let amount = if intent.requires_positive_total() {
            monthly.require_positive_total()?
        } else {
            monthly.total()
        };

        let unit = input
            .unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(&page.default_unit)
            .to_string();

        Ok(PreparedEntry {
            page_key: page.page_key.clone(),
            period_year: input.period_year,
            content: RecordContent {
                category: page.category.clone(),
                unit,
                amount,
                monthly,
                payload,
                notes: input
                    .notes
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string),
            },
            issues,
        })
    }

    /// Validates, writes, and applies the submit transition unless the intent
    /// says otherwise. `owner` lets a reviewer target another user's entry.
    pub async fn upsert(
        &self,
        actor: &Actor,
        owner: Option<Uuid>,
        input: &UpsertInput,
        intent: UpsertIntent,
    ) -> Result<UpsertOutcome, CoreError> {
        let prepared = self.prepare(input, intent)?;
        let mut outcome = self.write(actor, owner, prepared, intent).await?;
        if intent == UpsertIntent::Submit {
            outcome.record = self.review.submit(actor, outcome.record.id).await?;
        }
        Ok(outcome)
    }

    /// Writes prepared content without changing the status of an existing
    /// entry. New entries start as drafts.
    pub async fn write(
        &self,
        actor: &Actor,
        owner: Option<Uuid>,
        prepared: PreparedEntry,
        intent: UpsertIntent,
    ) -> Result<UpsertOutcome, CoreError> {
        actor.ensure_active()?;
        let owner_id = owner.unwrap_or(actor.id);
        if owner_id != actor.id && intent != UpsertIntent::PreserveStatus {
            return Err(CoreError::forbidden(
                "only status-preserving reviewer edits may target another owner",
            ));
        }
        if intent == UpsertIntent::PreserveStatus {
            actor.require_reviewer()?;
        }

        for issue in &prepared.issues {
            warn!(page_key = %prepared.page_key, %issue, "Monthly input normalized");
        }

        let key = NaturalKey::new(owner_id, prepared.page_key.clone(), prepared.period_year);
        let existing = self
            .records
            .find_by_natural_key(&key)
            .await
            .context("failed to look up entry")?;

        let (record, created) = match existing {
            Some(record) => (self.update(actor, record, &prepared, intent).await?, false),
            None if intent == UpsertIntent::PreserveStatus => {
                return Err(CoreError::not_found(format!("no entry exists for {key}")));
            }
            None => {
                let new = NewRecord {
                    key: key.clone(),
                    content: prepared.content.clone(),
                    status: EntryStatus::Draft,
                };
                match self.records.insert(new).await {
                    Ok(record) => (record, true),
                    // Lost a race with a concurrent first write for the same key.
                    Err(StoreError::Duplicate(_)) => {
                        let record = self
                            .records
                            .find_by_natural_key(&key)
                            .await
                            .context("failed to look up entry")?
                            .ok_or_else(|| {
                                CoreError::Conflict(format!("entry {key} changed concurrently"))
                            })?;
                        (self.update(actor, record, &prepared, intent).await?, false)
                    }
                    Err(e) => return Err(e).context("failed to create entry"),
                }
            }
        };

        info!(
            entry_id = %record.id,
            key = %record.natural_key(),
            amount = record.amount,
            created,
            "Entry written"
        );
        Ok(UpsertOutcome {
            record,
            created,
            issues: prepared.issues,
        })
    }

    async fn update(
        &self,
        actor: &Actor,
        record: UsageRecord,
        prepared: &PreparedEntry,
        intent: UpsertIntent,
    ) -> Result<UsageRecord, CoreError> {
        if record.is_locked && intent != UpsertIntent::PreserveStatus {
            return Err(CoreError::forbidden(
                "entry is approved and locked; ask a reviewer to reset it",
            ));
        }
        if !record.status.is_owner_editable() && !actor.is_reviewer {
            return Err(CoreError::forbidden(format!(
                "entry is {} and cannot be edited",
                record.status
            )));
        }

        // Conditional on what was just checked, so a concurrent approval
        // cannot be overwritten.
        let guard = ContentGuard {
            status: record.status,
            allow_locked: intent == UpsertIntent::PreserveStatus,
        };
        self.records
            .update_content(record.id, guard, prepared.content.clone())
            .await
            .context("failed to update entry")?
            .ok_or_else(|| {
                CoreError::Conflict(format!("entry {} changed concurrently", record.id))
            })
    }

    /// `getByOwnerAndKey`: the caller's entry for a page and year, if any.
    pub async fn find_by_key(
        &self,
        actor: &Actor,
        page_key: &str,
        period_year: i32,
    ) -> Result<Option<UsageRecord>, CoreError> {
        actor.ensure_active()?;
        self.records
            .find_by_natural_key(&NaturalKey::new(actor.id, page_key, period_year))
            .await
            .context("failed to look up entry")
    }

    pub async fn get(&self, actor: &Actor, entry_id: Uuid) -> Result<UsageRecord, CoreError> {
        actor.ensure_active()?;
        self.records
            .find_by_id(entry_id)
            .await
            .context("failed to load entry")?
            .filter(|r| actor.can_access(r.owner_id))
            .ok_or_else(|| CoreError::not_found(format!("entry {entry_id} not found")))
    }

    /// The caller's own entries, latest year first.
    pub async fn list_mine(
        &self,
        actor: &Actor,
        period_year: Option<i32>,
    ) -> Result<Vec<UsageRecord>, CoreError> {
        actor.ensure_active()?;
        let filter = RecordFilter {
            owner_id: Some(actor.id),
            period_year,
            order: RecordOrder::PeriodDesc,
            ..Default::default()
        };
        self.records
            .list(&filter)
            .await
            .context("failed to list entries")
    }
}
