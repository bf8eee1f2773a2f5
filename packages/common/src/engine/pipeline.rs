//! Two-phase submission: the entry is written first, evidence is attached
//! only once the entry is durable.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::evidence::EvidenceAdapter;
use super::review::ReviewMachine;
use super::upsert::{UpsertEngine, UpsertInput, UpsertIntent};
use crate::actor::Actor;
use crate::entry_status::EntryStatus;
use crate::error::{CoreError, ResultExt};
use crate::model::{EvidenceFile, UsageRecord};
use crate::monthly::MonthlyIssue;
use crate::repository::RecordStore;
use crate::staging::{StagedFile, StagingArea};

#[derive(Debug, Clone)]
struct FileStep {
    staged: StagedFile,
    committed: Option<EvidenceFile>,
    last_error: Option<String>,
}

#[derive(Debug, Clone)]
struct DeletionStep {
    file_id: Uuid,
    done: bool,
    last_error: Option<String>,
}

/// A submission in flight. Holds the outcome of every step so a retry only
/// repeats what has not succeeded yet.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    input: UpsertInput,
    intent: UpsertIntent,
    owner: Option<Uuid>,
    entry: Option<UsageRecord>,
    created: bool,
    issues: Vec<MonthlyIssue>,
    files: Vec<FileStep>,
    deletions: Vec<DeletionStep>,
    transitioned: bool,
}

impl PendingSubmission {
    /// Takes ownership of everything staged so far.
    pub fn new(input: UpsertInput, intent: UpsertIntent, staging: &mut StagingArea) -> Self {
        let (files, deletions) = staging.take();
        Self {
            input,
            intent,
            owner: None,
            entry: None,
            created: false,
            issues: Vec::new(),
            files: files
                .into_iter()
                .map(|staged| FileStep {
                    staged,
                    committed: None,
                    last_error: None,
                })
                .collect(),
            deletions: deletions
                .into_iter()
                .map(|file_id| DeletionStep {
                    file_id,
                    done: false,
                    last_error: None,
                })
                .collect(),
            transitioned: false,
        }
    }

    /// Reviewer edits target the entry of another owner.
    pub fn for_owner(mut self, owner: Uuid) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn entry_id(&self) -> Option<Uuid> {
        self.entry.as_ref().map(|e| e.id)
    }

    fn wants_transition(&self) -> bool {
        self.intent == UpsertIntent::Submit
    }

    /// True when every step has reached success.
    pub fn is_settled(&self) -> bool {
        self.entry.is_some()
            && self.files.iter().all(|f| f.committed.is_some())
            && self.deletions.iter().all(|d| d.done)
            && (self.transitioned || !self.wants_transition())
    }

    /// Staged files that have not been committed yet.
    pub fn unsent_files(&self) -> impl Iterator<Item = &StagedFile> {
        self.files
            .iter()
            .filter(|f| f.committed.is_none())
            .map(|f| &f.staged)
    }

    fn report(&self) -> Option<SubmissionReport> {
        let record = self.entry.clone()?;
        Some(SubmissionReport {
            record,
            created: self.created,
            committed: self.files.iter().filter_map(|f| f.committed.clone()).collect(),
            failed_files: self
                .files
                .iter()
                .filter(|f| f.committed.is_none())
                .map(|f| FileFailure {
                    local_id: f.staged.local_id,
                    file_name: f.staged.file_name.clone(),
                    error: f.last_error.clone().unwrap_or_default(),
                })
                .collect(),
            deleted: self
                .deletions
                .iter()
                .filter(|d| d.done)
                .map(|d| d.file_id)
                .collect(),
            failed_deletions: self
                .deletions
                .iter()
                .filter(|d| !d.done)
                .map(|d| DeletionFailure {
                    file_id: d.file_id,
                    error: d.last_error.clone().unwrap_or_default(),
                })
                .collect(),
            issues: self.issues.iter().map(ToString::to_string).collect(),
        })
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct FileFailure {
    pub local_id: Uuid,
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DeletionFailure {
    pub file_id: Uuid,
    pub error: String,
}

/// Per-step results of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReport {
    pub record: UsageRecord,
    pub created: bool,
    pub committed: Vec<EvidenceFile>,
    pub failed_files: Vec<FileFailure>,
    pub deleted: Vec<Uuid>,
    pub failed_deletions: Vec<DeletionFailure>,
    /// Monthly inputs that were dropped or zeroed.
    pub issues: Vec<String>,
}

impl SubmissionReport {
    pub fn is_complete(&self) -> bool {
        self.failed_files.is_empty() && self.failed_deletions.is_empty()
    }
}

/// Orchestrates upsert, evidence commit, deferred deletions and the submit
/// transition.
#[derive(Clone)]
pub struct CommitPipeline {
    upsert: UpsertEngine,
    evidence: EvidenceAdapter,
    review: ReviewMachine,
    records: Arc<dyn RecordStore>,
}

impl CommitPipeline {
    pub fn new(
        upsert: UpsertEngine,
        evidence: EvidenceAdapter,
        review: ReviewMachine,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            upsert,
            evidence,
            review,
            records,
        }
    }

    /// Runs every step that has not succeeded yet.
    ///
    /// Validation, authentication and entry-write failures return `Err` and
    /// leave the staged files in `pending` for a retry. Per-file failures are
    /// reported in the returned [`SubmissionReport`] instead.
    pub async fn submit(
        &self,
        actor: &Actor,
        pending: &mut PendingSubmission,
    ) -> Result<SubmissionReport, CoreError> {
        actor.ensure_active()?;

        let entry_id = match &pending.entry {
            Some(entry) => entry.id,
            None => {
                let prepared = self.upsert.prepare(&pending.input, pending.intent)?;
                let outcome = self
                    .upsert
                    .write(actor, pending.owner, prepared, pending.intent)
                    .await?;
                pending.created = outcome.created;
                pending.issues = outcome.issues;
                let id = outcome.record.id;
                pending.entry = Some(outcome.record);
                id
            }
        };

        for step in pending.files.iter_mut().filter(|f| f.committed.is_none()) {
            match self.evidence.commit(actor, &step.staged, entry_id, None).await {
                Ok(file) => {
                    step.committed = Some(file);
                    step.last_error = None;
                }
                Err(e @ CoreError::Auth(_)) => return Err(e),
                Err(e) => {
                    warn!(
                        entry_id = %entry_id,
                        file_name = %step.staged.file_name,
                        error = %e,
                        "Evidence commit failed"
                    );
                    step.last_error = Some(e.to_string());
                }
            }
        }

        for step in pending.deletions.iter_mut().filter(|d| !d.done) {
            match self.evidence.delete(actor, step.file_id).await {
                // Already gone counts as deleted.
                Ok(()) | Err(CoreError::NotFound(_)) => {
                    step.done = true;
                    step.last_error = None;
                }
                Err(e @ CoreError::Auth(_)) => return Err(e),
                Err(e) => {
                    warn!(file_id = %step.file_id, error = %e, "Deferred evidence deletion failed");
                    step.last_error = Some(e.to_string());
                }
            }
        }

        if pending.wants_transition() && !pending.transitioned {
            let record = self.review.submit(actor, entry_id).await?;
            pending.entry = Some(record);
            pending.transitioned = true;
        }

        let report = pending
            .report()
            .ok_or_else(|| CoreError::Conflict(format!("entry {entry_id} was not written")))?;
        info!(
            entry_id = %entry_id,
            committed = report.committed.len(),
            failed = report.failed_files.len(),
            deleted = report.deleted.len(),
            status = %report.record.status,
            "Submission processed"
        );
        Ok(report)
    }

    /// Deletes an owner's draft together with its evidence.
    pub async fn discard_draft(&self, actor: &Actor, entry_id: Uuid) -> Result<(), CoreError> {
        let record = self.upsert.get(actor, entry_id).await?;
        if record.owner_id != actor.id || record.status != EntryStatus::Draft {
            return Err(CoreError::not_found(format!(
                "no draft entry {entry_id} to delete"
            )));
        }

        for file in self.evidence.list(actor, entry_id).await? {
            self.evidence.remove(&file).await?;
        }

        let affected = self
            .records
            .delete_where(entry_id, actor.id, EntryStatus::Draft)
            .await
            .context("failed to delete draft")?;
        if affected == 0 {
            return Err(CoreError::Conflict(format!(
                "entry {entry_id} changed status concurrently"
            )));
        }
        info!(entry_id = %entry_id, owner_id = %actor.id, "Draft deleted");
        Ok(())
    }
}
