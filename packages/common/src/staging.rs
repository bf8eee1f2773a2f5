use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::EvidenceKind;
use crate::storage::resolve_mime_type;

/// A file picked by the user that has not been uploaded yet.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFile {
    pub local_id: Uuid,
    pub file_name: String,
    pub declared_type: Option<String>,
    pub bytes: Vec<u8>,
    pub kind: EvidenceKind,
    pub month: Option<u8>,
    pub group_id: Option<Uuid>,
    pub staged_at: DateTime<Utc>,
}

impl StagedFile {
    pub fn new(file_name: impl Into<String>, declared_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            file_name: file_name.into(),
            declared_type,
            bytes,
            kind: EvidenceKind::UsageEvidence,
            month: None,
            group_id: None,
            staged_at: Utc::now(),
        }
    }

    pub fn with_kind(mut self, kind: EvidenceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn for_month(mut self, month: u8) -> Self {
        self.month = Some(month);
        self
    }

    pub fn in_group(mut self, group_id: Uuid) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn mime_type(&self) -> String {
        resolve_mime_type(self.declared_type.as_deref(), &self.file_name)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Files staged in one editing session plus persisted files the user asked
/// to remove. Nothing here touches storage.
#[derive(Debug, Clone, Default)]
pub struct StagingArea {
    files: Vec<StagedFile>,
    pending_deletions: Vec<Uuid>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file and returns its local id.
    pub fn stage(&mut self, file: StagedFile) -> Uuid {
        let id = file.local_id;
        self.files.push(file);
        id
    }

    pub fn unstage(&mut self, local_id: Uuid) -> Option<StagedFile> {
        let pos = self.files.iter().position(|f| f.local_id == local_id)?;
        Some(self.files.remove(pos))
    }

    /// Marks a persisted evidence file for removal on the next commit.
    pub fn mark_for_deletion(&mut self, file_id: Uuid) {
        if !self.pending_deletions.contains(&file_id) {
            self.pending_deletions.push(file_id);
        }
    }

    pub fn unmark(&mut self, file_id: Uuid) {
        self.pending_deletions.retain(|id| *id != file_id);
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    pub fn pending_deletions(&self) -> &[Uuid] {
        &self.pending_deletions
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.pending_deletions.is_empty()
    }

    /// Hands everything over to a commit, leaving the area empty.
    pub fn take(&mut self) -> (Vec<StagedFile>, Vec<Uuid>) {
        (
            std::mem::take(&mut self.files),
            std::mem::take(&mut self.pending_deletions),
        )
    }
}
