//! Relational store seams consumed by the engines.
//!
//! Implementations enforce nothing beyond what the method names say; owner
//! checks and transition rules live in the engines.

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::entry_status::EntryStatus;
use crate::error::StoreError;
use crate::model::{
    ContentGuard, EvidenceFile, EvidenceFilter, NaturalKey, NewEvidence, NewRecord,
    RecordContent, RecordFilter, ReviewPatch, UsageRecord,
};

/// Usage entry persistence.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_by_natural_key(&self, key: &NaturalKey)
    -> Result<Option<UsageRecord>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UsageRecord>, StoreError>;

    /// Inserts a new entry. Returns [`StoreError::Duplicate`] when the natural
    /// key is already taken.
    async fn insert(&self, record: NewRecord) -> Result<UsageRecord, StoreError>;

    /// Replaces the content columns of an entry if it still satisfies `guard`.
    /// Returns `None` when no row matched.
    async fn update_content(
        &self,
        id: Uuid,
        guard: ContentGuard,
        content: RecordContent,
    ) -> Result<Option<UsageRecord>, StoreError>;

    /// Applies `patch` to every id in `ids` whose status is in `expected`
    /// (and whose owner is `owner`, when given). Returns the affected row count.
    async fn apply_review(
        &self,
        ids: &[Uuid],
        expected: &[EntryStatus],
        owner: Option<Uuid>,
        patch: &ReviewPatch,
    ) -> Result<u64, StoreError>;

    /// Deletes the entry if its owner and status still match.
    async fn delete_where(
        &self,
        id: Uuid,
        owner: Uuid,
        status: EntryStatus,
    ) -> Result<u64, StoreError>;

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<UsageRecord>, StoreError>;
}

/// Evidence metadata persistence.
#[async_trait]
pub trait EvidenceIndex: Send + Sync {
    async fn insert(&self, file: NewEvidence) -> Result<EvidenceFile, StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<EvidenceFile>, StoreError>;

    /// Returns the number of rows removed.
    async fn delete(&self, id: Uuid) -> Result<u64, StoreError>;

    /// Oldest first.
    async fn list(&self, filter: &EvidenceFilter) -> Result<Vec<EvidenceFile>, StoreError>;

    async fn set_group(&self, id: Uuid, group_id: Option<Uuid>) -> Result<u64, StoreError>;

    /// Clears `entry_id` and `group_id` on every file of the group.
    async fn detach_group(&self, group_id: Uuid) -> Result<u64, StoreError>;

    /// Every object path referenced by a row.
    async fn referenced_paths(&self) -> Result<HashSet<String>, StoreError>;
}
