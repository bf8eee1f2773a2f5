use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{CoreError, ResultExt};
use crate::model::EvidenceFilter;
use crate::repository::EvidenceIndex;
use crate::storage::ObjectStore;

#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Objects and rows younger than this are left alone.
    pub grace: Duration,
    pub dry_run: bool,
    /// Only objects under this prefix are scanned.
    pub prefix: String,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            grace: Duration::hours(24),
            dry_run: false,
            prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub objects_scanned: usize,
    pub rows_scanned: usize,
    pub orphan_objects: Vec<String>,
    pub ghost_rows: Vec<Uuid>,
    pub detached_rows: Vec<Uuid>,
    pub failures: usize,
    pub dry_run: bool,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_objects.is_empty() && self.ghost_rows.is_empty() && self.detached_rows.is_empty()
    }
}

/// Repairs drift between the evidence index and object storage.
#[derive(Clone)]
pub struct Reconciler {
    objects: Arc<dyn ObjectStore>,
    index: Arc<dyn EvidenceIndex>,
    settings: ReconcileSettings,
}

impl Reconciler {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        index: Arc<dyn EvidenceIndex>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            objects,
            index,
            settings,
        }
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// One full pass: detached rows, then ghost rows, then orphan objects.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ReconcileReport, CoreError> {
        let cutoff = now - self.settings.grace;
        let mut report = ReconcileReport {
            dry_run: self.settings.dry_run,
            ..Default::default()
        };
        let mut handled = HashSet::new();

        let detached = self
            .index
            .list(&EvidenceFilter {
                detached: true,
                created_before: Some(cutoff),
                ..Default::default()
            })
            .await
            .context("failed to list detached evidence")?;
        for file in detached {
            handled.insert(file.id);
            if !self.settings.dry_run {
                if let Err(e) = self.objects.delete(&file.file_path).await {
                    warn!(path = %file.file_path, error = %e, "Failed to delete detached evidence object");
                }
                if let Err(e) = self.index.delete(file.id).await {
                    warn!(file_id = %file.id, error = %e, "Failed to delete detached evidence row");
                    report.failures += 1;
                    continue;
                }
            }
            report.detached_rows.push(file.id);
        }

        let rows = self
            .index
            .list(&EvidenceFilter {
                created_before: Some(cutoff),
                ..Default::default()
            })
            .await
            .context("failed to list evidence")?;
        report.rows_scanned = rows.len();
        for file in rows.into_iter().filter(|f| !handled.contains(&f.id)) {
            // A second look rules out a transient listing gap.
            if self.object_present(&file.file_path).await?
                || self.object_present(&file.file_path).await?
            {
                continue;
            }
            if !self.settings.dry_run {
                if let Err(e) = self.index.delete(file.id).await {
                    warn!(file_id = %file.id, error = %e, "Failed to delete ghost evidence row");
                    report.failures += 1;
                    continue;
                }
            }
            report.ghost_rows.push(file.id);
        }

        let referenced = self
            .index
            .referenced_paths()
            .await
            .context("failed to load referenced paths")?;
        let objects = self
            .objects
            .list(&self.settings.prefix)
            .await
            .context("failed to list objects")?;
        report.objects_scanned = objects.len();
        for object in objects {
            let old_enough = object.last_modified.is_some_and(|t| t < cutoff);
            if !old_enough || referenced.contains(&object.path) {
                continue;
            }
            if !self.settings.dry_run {
                if let Err(e) = self.objects.delete(&object.path).await {
                    warn!(path = %object.path, error = %e, "Failed to delete orphan object");
                    report.failures += 1;
                    continue;
                }
            }
            report.orphan_objects.push(object.path);
        }

        info!(
            objects_scanned = report.objects_scanned,
            rows_scanned = report.rows_scanned,
            orphan_objects = report.orphan_objects.len(),
            ghost_rows = report.ghost_rows.len(),
            detached_rows = report.detached_rows.len(),
            failures = report.failures,
            dry_run = report.dry_run,
            "Storage reconciliation finished"
        );
        Ok(report)
    }

    async fn object_present(&self, path: &str) -> Result<bool, CoreError> {
        self.objects
            .exists(path)
            .await
            .context("failed to check object")
    }
}
