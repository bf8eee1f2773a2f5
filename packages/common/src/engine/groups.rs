use std::sync::Arc;

use chrono::Datelike;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::actor::Actor;
use crate::error::{CoreError, ResultExt};
use crate::model::{EvidenceFile, EvidenceFilter, LineRecord, UsageRecord};
use crate::monthly::MonthlyUsage;
use crate::repository::{EvidenceIndex, RecordStore};

const LINE_RECORDS_KEY: &str = "line_records";

/// Reads the line records stored in an entry payload.
///
/// A payload without `line_records` has none. A malformed list is a
/// validation error.
pub fn line_records(payload: &serde_json::Value) -> Result<Vec<LineRecord>, CoreError> {
    match payload.get(LINE_RECORDS_KEY) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| CoreError::validation(format!("invalid line_records: {e}"))),
    }
}

/// Sums dated line records per month. Undated records are skipped.
pub fn monthly_from_line_records(records: &[LineRecord]) -> MonthlyUsage {
    records
        .iter()
        .filter_map(|r| r.date.map(|d| (d.month() as u8, r.quantity)))
        .collect()
}

/// Whether a group has both numbers and a supporting document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    Complete,
    /// The group's evidence was removed; the line records remain.
    DataWithoutEvidence,
    /// Evidence is attached but no line record references the group.
    EvidenceWithoutData,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    pub group_id: Uuid,
    pub state: GroupState,
    pub records: Vec<LineRecord>,
    pub files: Vec<EvidenceFile>,
}

/// Builds one view per group id found in either the line records or the files.
pub fn group_views(records: &[LineRecord], files: &[EvidenceFile]) -> Vec<GroupView> {
    let mut order: Vec<Uuid> = Vec::new();
    let ids = records
        .iter()
        .filter_map(|r| r.group_id)
        .chain(files.iter().filter_map(|f| f.group_id));
    for id in ids {
        if !order.contains(&id) {
            order.push(id);
        }
    }

    order
        .into_iter()
        .map(|group_id| {
            let members: Vec<_> = records
                .iter()
                .filter(|r| r.group_id == Some(group_id))
                .cloned()
                .collect();
            let evidence: Vec<_> = files
                .iter()
                .filter(|f| f.group_id == Some(group_id))
                .cloned()
                .collect();
            let state = match (members.is_empty(), evidence.is_empty()) {
                (false, false) => GroupState::Complete,
                (false, true) => GroupState::DataWithoutEvidence,
                _ => GroupState::EvidenceWithoutData,
            };
            GroupView {
                group_id,
                state,
                records: members,
                files: evidence,
            }
        })
        .collect()
}

/// Links evidence files to cohorts of line records.
#[derive(Clone)]
pub struct GroupLinker {
    records: Arc<dyn RecordStore>,
    index: Arc<dyn EvidenceIndex>,
}

impl GroupLinker {
    pub fn new(records: Arc<dyn RecordStore>, index: Arc<dyn EvidenceIndex>) -> Self {
        Self { records, index }
    }

    async fn accessible_record(
        &self,
        actor: &Actor,
        entry_id: Uuid,
    ) -> Result<UsageRecord, CoreError> {
        self.records
            .find_by_id(entry_id)
            .await
            .context("failed to load entry")?
            .filter(|r| actor.can_access(r.owner_id))
            .ok_or_else(|| CoreError::not_found(format!("entry {entry_id} not found")))
    }

    async fn accessible_file(&self, actor: &Actor, file_id: Uuid) -> Result<EvidenceFile, CoreError> {
        self.index
            .find(file_id)
            .await
            .context("failed to load evidence")?
            .filter(|f| actor.can_access(f.owner_id))
            .ok_or_else(|| CoreError::not_found(format!("evidence file {file_id} not found")))
    }

    /// Owners may not regroup or detach evidence of an approved entry.
    async fn ensure_unlocked(&self, actor: &Actor, entry_id: Uuid) -> Result<(), CoreError> {
        if actor.is_reviewer {
            return Ok(());
        }
        let locked = self
            .records
            .find_by_id(entry_id)
            .await
            .context("failed to load entry")?
            .is_some_and(|r| r.is_locked);
        if locked {
            return Err(CoreError::forbidden("entry is approved and locked"));
        }
        Ok(())
    }

    pub async fn assign_group(
        &self,
        actor: &Actor,
        file_id: Uuid,
        group_id: Uuid,
    ) -> Result<EvidenceFile, CoreError> {
        actor.ensure_active()?;
        let file = self.accessible_file(actor, file_id).await?;
        let Some(entry_id) = file.entry_id else {
            return Err(CoreError::validation(
                "evidence file is not attached to an entry",
            ));
        };
        self.ensure_unlocked(actor, entry_id).await?;

        let affected = self
            .index
            .set_group(file_id, Some(group_id))
            .await
            .context("failed to assign group")?;
        if affected == 0 {
            return Err(CoreError::not_found(format!(
                "evidence file {file_id} not found"
            )));
        }

        info!(file_id = %file_id, group_id = %group_id, "Evidence assigned to group");
        Ok(EvidenceFile {
            group_id: Some(group_id),
            ..file
        })
    }

    pub async fn records_for_group(
        &self,
        actor: &Actor,
        entry_id: Uuid,
        group_id: Uuid,
    ) -> Result<Vec<LineRecord>, CoreError> {
        let record = self.accessible_record(actor, entry_id).await?;
        Ok(line_records(&record.payload)?
            .into_iter()
            .filter(|r| r.group_id == Some(group_id))
            .collect())
    }

    /// Detaches every file of the group from its entry. Line records keep
    /// their group id, so the group reads as data without evidence.
    pub async fn ungroup(&self, actor: &Actor, group_id: Uuid) -> Result<u64, CoreError> {
        actor.ensure_active()?;
        let files = self
            .index
            .list(&EvidenceFilter::for_group(group_id))
            .await
            .context("failed to load group evidence")?;
        if files.is_empty() || files.iter().any(|f| !actor.can_access(f.owner_id)) {
            return Err(CoreError::not_found(format!("group {group_id} not found")));
        }
        let mut entries: Vec<Uuid> = files.iter().filter_map(|f| f.entry_id).collect();
        entries.sort_unstable();
        entries.dedup();
        for entry_id in entries {
            self.ensure_unlocked(actor, entry_id).await?;
        }

        let detached = self
            .index
            .detach_group(group_id)
            .await
            .context("failed to detach group evidence")?;
        info!(group_id = %group_id, detached, "Group evidence detached");
        Ok(detached)
    }

    pub async fn groups(&self, actor: &Actor, entry_id: Uuid) -> Result<Vec<GroupView>, CoreError> {
        let record = self.accessible_record(actor, entry_id).await?;
        let records = line_records(&record.payload)?;
        let files = self
            .index
            .list(&EvidenceFilter::for_entry(entry_id))
            .await
            .context("failed to load evidence")?;
        Ok(group_views(&records, &files))
    }
}
