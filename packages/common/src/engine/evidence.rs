use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::actor::Actor;
use crate::error::{CoreError, ResultExt};
use crate::model::{EvidenceFile, EvidenceFilter, NewEvidence, UsageRecord};
use crate::page::{EvidenceMode, PageRegistry};
use crate::repository::{EvidenceIndex, RecordStore};
use crate::staging::StagedFile;
use crate::storage::{ObjectKey, ObjectStore};

/// Limits applied when committing evidence.
#[derive(Debug, Clone)]
pub struct EvidenceSettings {
    pub max_file_size: u64,
    pub signed_url_ttl: Duration,
    /// Accepted MIME types. `image/*` matches any image subtype.
    pub allowed_types: Vec<String>,
}

impl Default for EvidenceSettings {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            signed_url_ttl: Duration::from_secs(3600),
            allowed_types: default_allowed_types(),
        }
    }
}

pub fn default_allowed_types() -> Vec<String> {
    vec!["image/*".to_string(), "application/pdf".to_string()]
}

impl EvidenceSettings {
    pub fn allows(&self, mime_type: &str) -> bool {
        let mime_type = mime_type.trim().to_ascii_lowercase();
        self.allowed_types.iter().any(|pattern| {
            match pattern.strip_suffix("/*") {
                Some(top) => mime_type
                    .split_once('/')
                    .is_some_and(|(t, _)| t.eq_ignore_ascii_case(top)),
                None => pattern.eq_ignore_ascii_case(&mime_type),
            }
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_in: u64,
}

/// Moves staged files into object storage and keeps their metadata rows.
#[derive(Clone)]
pub struct EvidenceAdapter {
    objects: Arc<dyn ObjectStore>,
    index: Arc<dyn EvidenceIndex>,
    records: Arc<dyn RecordStore>,
    pages: Arc<PageRegistry>,
    settings: EvidenceSettings,
}

impl EvidenceAdapter {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        index: Arc<dyn EvidenceIndex>,
        records: Arc<dyn RecordStore>,
        pages: Arc<PageRegistry>,
        settings: EvidenceSettings,
    ) -> Self {
        Self {
            objects,
            index,
            records,
            pages,
            settings,
        }
    }

    pub fn settings(&self) -> &EvidenceSettings {
        &self.settings
    }

    /// Wraps picked bytes as a staged file. No I/O.
    pub fn stage(
        &self,
        file_name: impl Into<String>,
        declared_type: Option<String>,
        bytes: Vec<u8>,
    ) -> StagedFile {
        StagedFile::new(file_name, declared_type, bytes)
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

    fn check_staged(&self, staged: &StagedFile) -> Result<(), CoreError> {
        if staged.bytes.is_empty() {
            return Err(CoreError::validation(format!(
                "{} is empty",
                staged.file_name
            )));
        }
        if staged.size() > self.settings.max_file_size {
            return Err(CoreError::validation(format!(
                "{} exceeds the {} byte upload limit",
                staged.file_name, self.settings.max_file_size
            )));
        }
        let mime_type = staged.mime_type();
        if !self.settings.allows(&mime_type) {
            return Err(CoreError::validation(format!(
                "{} has type {mime_type}; only images and PDF files are accepted",
                staged.file_name
            )));
        }
        if let Some(month) = staged.month.filter(|m| !(1..=12).contains(m)) {
            return Err(CoreError::validation(format!(
                "evidence month must be between 1 and 12, got {month}"
            )));
        }
        Ok(())
    }

    /// Uploads the bytes, then inserts the metadata row. If the insert fails
    /// the uploaded object is removed again.
    pub async fn commit(
        &self,
        actor: &Actor,
        staged: &StagedFile,
        entry_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<EvidenceFile, CoreError> {
        actor.ensure_active()?;
        self.check_staged(staged)?;
        let record = self.accessible_record(actor, entry_id).await?;
        if record.is_locked && !actor.is_reviewer {
            return Err(CoreError::forbidden("entry is approved and locked"));
        }
        let group_id = group_id.or(staged.group_id);

        let single = self
            .pages
            .get(&record.page_key)
            .is_some_and(|p| p.evidence_mode == EvidenceMode::SinglePerSlot);
        if single {
            let occupants = self
                .index
                .list(&EvidenceFilter::for_entry(entry_id))
                .await
                .context("failed to load existing evidence")?;
            for old in occupants
                .iter()
                .filter(|f| f.same_slot(staged.kind, staged.month, group_id))
            {
                self.replace_occupant(old).await;
            }
        }

        let key = ObjectKey {
            owner_id: record.owner_id,
            page_key: &record.page_key,
            period_year: record.period_year,
            month: staged.month,
            file_name: &staged.file_name,
        }
        .render(Utc::now())
        .context("invalid evidence path")?;

        let mime_type = staged.mime_type();
        let path = self
            .objects
            .put(&key, &staged.bytes, &mime_type)
            .await
            .context("failed to upload evidence")?;

        let row = NewEvidence {
            owner_id: record.owner_id,
            entry_id,
            group_id,
            file_path: path.clone(),
            file_name: staged.file_name.clone(),
            mime_type,
            file_size: staged.size() as i64,
            kind: staged.kind,
            month: staged.month,
        };
        match self.index.insert(row).await {
            Ok(file) => {
                info!(
                    file_id = %file.id,
                    entry_id = %entry_id,
                    path = %file.file_path,
                    size = file.file_size,
                    "Evidence committed"
                );
                Ok(file)
            }
            Err(e) => {
                if let Err(cleanup) = self.objects.delete(&path).await {
                    warn!(path = %path, error = %cleanup, "Failed to remove object after metadata insert failed");
                }
                Err(e).context("failed to record evidence")
            }
        }
    }

    /// Removes a file that a new upload replaces. Failures are logged only.
    async fn replace_occupant(&self, old: &EvidenceFile) {
        if let Err(e) = self.objects.delete(&old.file_path).await {
            warn!(path = %old.file_path, error = %e, "Failed to delete replaced evidence object");
        }
        if let Err(e) = self.index.delete(old.id).await {
            warn!(file_id = %old.id, error = %e, "Failed to delete replaced evidence record");
        }
    }

    /// Removes the object, then the row. A failed object delete leaves an
    /// orphan for the reconciler and does not keep the row.
    pub async fn remove(&self, file: &EvidenceFile) -> Result<(), CoreError> {
        if let Err(e) = self.objects.delete(&file.file_path).await {
            warn!(path = %file.file_path, error = %e, "Evidence object left orphaned");
        }
        self.index
            .delete(file.id)
            .await
            .context("failed to delete evidence record")?;
        info!(file_id = %file.id, path = %file.file_path, "Evidence deleted");
        Ok(())
    }

    pub async fn delete(&self, actor: &Actor, file_id: Uuid) -> Result<(), CoreError> {
        actor.ensure_active()?;
        let file = self.accessible_file(actor, file_id).await?;
        if let Some(entry_id) = file.entry_id.filter(|_| !actor.is_reviewer) {
            let locked = self
                .records
                .find_by_id(entry_id)
                .await
                .context("failed to load entry")?
                .is_some_and(|r| r.is_locked);
            if locked {
                return Err(CoreError::forbidden("entry is approved and locked"));
            }
        }
        self.remove(&file).await
    }

    /// Files of one entry, oldest first.
    pub async fn list(&self, actor: &Actor, entry_id: Uuid) -> Result<Vec<EvidenceFile>, CoreError> {
        self.accessible_record(actor, entry_id).await?;
        self.index
            .list(&EvidenceFilter::for_entry(entry_id))
            .await
            .context("failed to list evidence")
    }

    pub async fn signed_url(&self, actor: &Actor, file_id: Uuid) -> Result<SignedUrl, CoreError> {
        let file = self.accessible_file(actor, file_id).await?;
        let url = self
            .objects
            .signed_url(&file.file_path, self.settings.signed_url_ttl)
            .await
            .context("failed to sign evidence url")?;
        Ok(SignedUrl {
            url,
            expires_in: self.settings.signed_url_ttl.as_secs(),
        })
    }
}
