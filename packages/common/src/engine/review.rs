use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::actor::Actor;
use crate::entry_status::EntryStatus;
use crate::error::{CoreError, ResultExt};
use crate::model::{RecordFilter, RecordOrder, UsageRecord};
use crate::repository::RecordStore;
use crate::review::{BulkAction, ReviewAction, Transition};

/// Maximum number of ids accepted by one bulk review.
pub const MAX_BULK_IDS: usize = 500;

/// Result of a bulk review. `affected` may be lower than `requested`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub requested: usize,
    pub affected: u64,
}

/// Filters for listing decided entries.
#[derive(Debug, Clone, Default)]
pub struct ReviewedFilter {
    pub owner_id: Option<Uuid>,
    /// Approved or rejected; both when unset.
    pub status: Option<EntryStatus>,
    pub category: Option<String>,
    pub reviewed_from: Option<DateTime<Utc>>,
    pub reviewed_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingOwner {
    pub owner_id: Uuid,
    pub pending_count: usize,
}

/// Applies review transitions with conditional updates.
#[derive(Clone)]
pub struct ReviewMachine {
    records: Arc<dyn RecordStore>,
}

impl ReviewMachine {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Reads the entry, checks the transition is legal from its current
    /// status, then updates only if that status is still current.
    async fn transition(
        &self,
        actor: &Actor,
        entry_id: Uuid,
        transition: Transition,
        notes: Option<String>,
        owner_scope: Option<Uuid>,
    ) -> Result<UsageRecord, CoreError> {
        if transition.requires_reviewer() {
            actor.require_reviewer()?;
        }
        let record = self
            .records
            .find_by_id(entry_id)
            .await
            .context("failed to load entry")?
            .filter(|r| owner_scope.is_none_or(|owner| r.owner_id == owner))
            .ok_or_else(|| CoreError::not_found(format!("entry {entry_id} not found")))?;

        if !transition.is_allowed_from(record.status) {
            return Err(CoreError::not_found(format!(
                "cannot {} entry {entry_id}: it is {}",
                transition.name(),
                record.status
            )));
        }

        let patch = transition.patch(actor, notes, Utc::now());
        let affected = self
            .records
            .apply_review(&[entry_id], &[record.status], owner_scope, &patch)
            .await
            .context("failed to update entry status")?;
        if affected == 0 {
            return Err(CoreError::Conflict(format!(
                "entry {entry_id} changed status concurrently; reload and try again"
            )));
        }

        info!(
            entry_id = %entry_id,
            actor_id = %actor.id,
            from = %record.status,
            to = %patch.status,
            transition = transition.name(),
            "Entry status changed"
        );

        self.records
            .find_by_id(entry_id)
            .await
            .context("failed to reload entry")?
            .ok_or_else(|| CoreError::Conflict(format!("entry {entry_id} was removed")))
    }

    /// Reviewer decision on one entry.
    pub async fn review(
        &self,
        actor: &Actor,
        entry_id: Uuid,
        action: ReviewAction,
        notes: Option<String>,
    ) -> Result<UsageRecord, CoreError> {
        self.transition(actor, entry_id, action.into(), notes, None)
            .await
    }

    /// Owner hands their own entry in for review.
    pub async fn submit(&self, actor: &Actor, entry_id: Uuid) -> Result<UsageRecord, CoreError> {
        actor.ensure_active()?;
        let locked = self
            .records
            .find_by_id(entry_id)
            .await
            .context("failed to load entry")?
            .is_some_and(|r| r.owner_id == actor.id && r.is_locked);
        if locked {
            return Err(CoreError::forbidden(
                "entry is approved and locked; ask a reviewer to reset it",
            ));
        }
        self.transition(actor, entry_id, Transition::Submit, None, Some(actor.id))
            .await
    }

    /// Owner hands a rejected entry back in. Any other status affects no
    /// rows and is reported as not found.
    pub async fn resubmit(&self, actor: &Actor, entry_id: Uuid) -> Result<(), CoreError> {
        actor.ensure_active()?;
        let transition = Transition::Resubmit;
        let patch = transition.patch(actor, None, Utc::now());
        let affected = self
            .records
            .apply_review(
                &[entry_id],
                transition.allowed_from(),
                Some(actor.id),
                &patch,
            )
            .await
            .context("failed to resubmit entry")?;

        if affected == 0 {
            return Err(CoreError::not_found(format!(
                "no rejected entry {entry_id} to resubmit"
            )));
        }
        info!(entry_id = %entry_id, owner_id = %actor.id, "Entry resubmitted");
        Ok(())
    }

    /// Approves or rejects every listed entry that is currently submitted.
    pub async fn bulk_review(
        &self,
        actor: &Actor,
        entry_ids: &[Uuid],
        action: BulkAction,
        notes: Option<String>,
    ) -> Result<BulkOutcome, CoreError> {
        actor.require_reviewer()?;
        validate_bulk_ids(entry_ids)?;

        let transition = Transition::from(ReviewAction::from(action));
        let patch = transition.patch(actor, notes, Utc::now());
        let affected = self
            .records
            .apply_review(entry_ids, transition.allowed_from(), None, &patch)
            .await
            .context("failed to apply bulk review")?;

        info!(
            actor_id = %actor.id,
            transition = transition.name(),
            requested = entry_ids.len(),
            affected,
            "Bulk review applied"
        );
        Ok(BulkOutcome {
            requested: entry_ids.len(),
            affected,
        })
    }

    /// Entries waiting for a decision, newest first.
    pub async fn list_pending(
        &self,
        actor: &Actor,
        owner_id: Option<Uuid>,
    ) -> Result<Vec<UsageRecord>, CoreError> {
        actor.require_reviewer()?;
        let filter = RecordFilter {
            owner_id,
            statuses: vec![EntryStatus::Submitted],
            order: RecordOrder::CreatedDesc,
            ..Default::default()
        };
        self.records
            .list(&filter)
            .await
            .context("failed to list pending entries")
    }

    /// Decided entries, most recent decision first.
    pub async fn list_reviewed(
        &self,
        actor: &Actor,
        filter: ReviewedFilter,
    ) -> Result<Vec<UsageRecord>, CoreError> {
        actor.require_reviewer()?;
        let statuses = match filter.status {
            Some(status) if status.is_reviewed() => vec![status],
            Some(status) => {
                return Err(CoreError::validation(format!(
                    "status filter must be approved or rejected, got {status}"
                )));
            }
            None => EntryStatus::REVIEWED.to_vec(),
        };
        let filter = RecordFilter {
            owner_id: filter.owner_id,
            category: filter.category,
            statuses,
            reviewed_from: filter.reviewed_from,
            reviewed_to: filter.reviewed_to,
            order: RecordOrder::ReviewedDesc,
            ..Default::default()
        };
        self.records
            .list(&filter)
            .await
            .context("failed to list reviewed entries")
    }

    /// Owners with at least one submitted entry, busiest first.
    pub async fn pending_owners(&self, actor: &Actor) -> Result<Vec<PendingOwner>, CoreError> {
        let pending = self.list_pending(actor, None).await?;
        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        for record in &pending {
            *counts.entry(record.owner_id).or_default() += 1;
        }
        let mut owners: Vec<_> = counts
            .into_iter()
            .map(|(owner_id, pending_count)| PendingOwner {
                owner_id,
                pending_count,
            })
            .collect();
        owners.sort_by(|a, b| {
            b.pending_count
                .cmp(&a.pending_count)
                .then_with(|| a.owner_id.cmp(&b.owner_id))
        });
        Ok(owners)
    }
}

fn validate_bulk_ids(ids: &[Uuid]) -> Result<(), CoreError> {
    if ids.is_empty() {
        return Err(CoreError::validation("entry_ids must not be empty"));
    }
    if ids.len() > MAX_BULK_IDS {
        return Err(CoreError::validation(format!(
            "entry_ids must have at most {MAX_BULK_IDS} items"
        )));
    }
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id) {
            return Err(CoreError::validation(format!(
                "entry_ids contains duplicate {id}"
            )));
        }
    }
    Ok(())
}
