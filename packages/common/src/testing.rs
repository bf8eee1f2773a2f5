//! In-memory collaborators with fault switches for engine tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entry_status::EntryStatus;
use crate::error::StoreError;
use crate::model::{
    ContentGuard, EvidenceFile, EvidenceFilter, NaturalKey, NewEvidence, NewRecord, RecordContent,
    RecordFilter, RecordOrder, ReviewPatch, UsageRecord,
};
use crate::repository::{EvidenceIndex, RecordStore};
use crate::storage::{ObjectInfo, ObjectStore, StorageError};

fn unavailable() -> StoreError {
    StoreError::Unavailable("simulated outage".into())
}

#[derive(Default)]
pub struct MemoryRecordStore {
    rows: Mutex<HashMap<Uuid, UsageRecord>>,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
}

impl MemoryRecordStore {
    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Simulates another actor changing the status behind the engine's back.
    pub fn force_status(&self, id: Uuid, status: EntryStatus) {
        if let Some(row) = self.rows.lock().unwrap().get_mut(&id) {
            row.status = status;
            row.is_locked = status == EntryStatus::Approved;
        }
    }

    pub fn get(&self, id: Uuid) -> Option<UsageRecord> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_natural_key(
        &self,
        key: &NaturalKey,
    ) -> Result<Option<UsageRecord>, StoreError> {
        self.check_read()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.values().find(|r| r.natural_key() == *key).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UsageRecord>, StoreError> {
        self.check_read()?;
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn insert(&self, record: NewRecord) -> Result<UsageRecord, StoreError> {
        self.check_write()?;
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|r| r.natural_key() == record.key) {
            return Err(StoreError::Duplicate(record.key.to_string()));
        }
        let now = Utc::now();
        let row = UsageRecord {
            id: Uuid::now_v7(),
            owner_id: record.key.owner_id,
            page_key: record.key.page_key,
            period_year: record.key.period_year,
            category: record.content.category,
            unit: record.content.unit,
            amount: record.content.amount,
            monthly: record.content.monthly,
            payload: record.content.payload,
            notes: record.content.notes,
            status: record.status,
            is_locked: false,
            reviewer_id: None,
            review_notes: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        };
        rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_content(
        &self,
        id: Uuid,
        guard: ContentGuard,
        content: RecordContent,
    ) -> Result<Option<UsageRecord>, StoreError> {
        self.check_write()?;
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows
            .get_mut(&id)
            .filter(|r| r.status == guard.status && (guard.allow_locked || !r.is_locked))
        else {
            return Ok(None);
        };
        row.category = content.category;
        row.unit = content.unit;
        row.amount = content.amount;
        row.monthly = content.monthly;
        row.payload = content.payload;
        row.notes = content.notes;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn apply_review(
        &self,
        ids: &[Uuid],
        expected: &[EntryStatus],
        owner: Option<Uuid>,
        patch: &ReviewPatch,
    ) -> Result<u64, StoreError> {
        self.check_write()?;
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for id in ids {
            let Some(row) = rows.get_mut(id) else {
                continue;
            };
            if !expected.contains(&row.status) || owner.is_some_and(|o| o != row.owner_id) {
                continue;
            }
            row.status = patch.status;
            row.is_locked = patch.is_locked;
            row.reviewer_id = patch.reviewer_id;
            row.review_notes = patch.review_notes.clone();
            row.reviewed_at = patch.reviewed_at;
            row.updated_at = Utc::now();
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete_where(
        &self,
        id: Uuid,
        owner: Uuid,
        status: EntryStatus,
    ) -> Result<u64, StoreError> {
        self.check_write()?;
        let mut rows = self.rows.lock().unwrap();
        match rows.get(&id) {
            Some(row) if row.owner_id == owner && row.status == status => {
                rows.remove(&id);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<UsageRecord>, StoreError> {
        self.check_read()?;
        let rows = self.rows.lock().unwrap();
        let mut out: Vec<_> = rows.values().filter(|r| filter.matches(r)).cloned().collect();
        match filter.order {
            RecordOrder::CreatedDesc => out.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            RecordOrder::ReviewedDesc => out.sort_by(|a, b| b.reviewed_at.cmp(&a.reviewed_at)),
            RecordOrder::PeriodDesc => out.sort_by(|a, b| {
                b.period_year
                    .cmp(&a.period_year)
                    .then_with(|| a.page_key.cmp(&b.page_key))
            }),
        }
        Ok(out)
    }
}

#[derive(Default)]
pub struct MemoryEvidenceIndex {
    rows: Mutex<Vec<EvidenceFile>>,
    pub fail_inserts: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl MemoryEvidenceIndex {
    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<EvidenceFile> {
        self.rows.lock().unwrap().clone()
    }

    /// Inserts a row directly, bypassing the adapter.
    pub fn seed(&self, file: EvidenceFile) {
        self.rows.lock().unwrap().push(file);
    }
}

#[async_trait]
impl EvidenceIndex for MemoryEvidenceIndex {
    async fn insert(&self, file: NewEvidence) -> Result<EvidenceFile, StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let row = EvidenceFile {
            id: Uuid::now_v7(),
            owner_id: file.owner_id,
            entry_id: Some(file.entry_id),
            group_id: file.group_id,
            file_path: file.file_path,
            file_name: file.file_name,
            mime_type: file.mime_type,
            file_size: file.file_size,
            kind: file.kind,
            month: file.month,
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn find(&self, id: Uuid) -> Result<Option<EvidenceFile>, StoreError> {
        Ok(self.rows.lock().unwrap().iter().find(|f| f.id == id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<u64, StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|f| f.id != id);
        Ok((before - rows.len()) as u64)
    }

    async fn list(&self, filter: &EvidenceFilter) -> Result<Vec<EvidenceFile>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|f| filter.matches(f)).cloned().collect())
    }

    async fn set_group(&self, id: Uuid, group_id: Option<Uuid>) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|f| f.id == id) {
            Some(row) => {
                row.group_id = group_id;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn detach_group(&self, group_id: Uuid) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for row in rows.iter_mut().filter(|f| f.group_id == Some(group_id)) {
            row.group_id = None;
            row.entry_id = None;
            affected += 1;
        }
        Ok(affected)
    }

    async fn referenced_paths(&self) -> Result<HashSet<String>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().map(|f| f.file_path.clone()).collect())
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>,
    pub fail_puts: AtomicBool,
    pub fail_deletes: AtomicBool,
    /// Fail uploads whose key contains this fragment.
    pub fail_puts_matching: Mutex<Option<String>>,
    pub put_calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }

    /// Inserts an object with an explicit modification time.
    pub fn seed(&self, path: &str, modified: DateTime<Utc>) {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (b"seed".to_vec(), modified));
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        _content_type: &str,
    ) -> Result<String, StorageError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("simulated upload failure".into()));
        }
        let poisoned = self
            .fail_puts_matching
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|fragment| key.contains(fragment));
        if poisoned {
            return Err(StorageError::Backend("simulated upload failure".into()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data.to_vec(), Utc::now()));
        Ok(key.to_string())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.contains(path))
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("simulated delete failure".into()));
        }
        Ok(self.objects.lock().unwrap().remove(path).is_some())
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        Ok(format!("memory://{path}?ttl={}", ttl.as_secs()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, (bytes, modified))| ObjectInfo {
                path: path.clone(),
                size: bytes.len() as u64,
                last_modified: Some(*modified),
            })
            .collect())
    }
}
