pub mod evidence;
pub mod groups;
pub mod pipeline;
pub mod reconcile;
pub mod review;
pub mod upsert;

use std::sync::Arc;

use crate::page::PageRegistry;
use crate::repository::{EvidenceIndex, RecordStore};
use crate::storage::ObjectStore;

pub use evidence::{EvidenceAdapter, EvidenceSettings, SignedUrl, default_allowed_types};
pub use groups::{GroupLinker, GroupState, GroupView};
pub use pipeline::{CommitPipeline, PendingSubmission, SubmissionReport};
pub use reconcile::{ReconcileReport, ReconcileSettings, Reconciler};
pub use review::{BulkOutcome, PendingOwner, ReviewMachine, ReviewedFilter};
pub use upsert::{UpsertEngine, UpsertInput, UpsertIntent, UpsertOutcome};

/// Every engine wired to the same collaborators.
#[derive(Clone)]
pub struct Engines {
    pub upsert: UpsertEngine,
    pub evidence: EvidenceAdapter,
    pub review: ReviewMachine,
    pub groups: GroupLinker,
    pub pipeline: CommitPipeline,
    pub reconciler: Reconciler,
}

impl Engines {
    pub fn new(
        records: Arc<dyn RecordStore>,
        index: Arc<dyn EvidenceIndex>,
        objects: Arc<dyn ObjectStore>,
        pages: Arc<PageRegistry>,
        evidence: EvidenceSettings,
        reconcile: ReconcileSettings,
    ) -> Self {
        let upsert = UpsertEngine::new(records.clone(), pages.clone());
        let review = ReviewMachine::new(records.clone());
        let evidence = EvidenceAdapter::new(
            objects.clone(),
            index.clone(),
            records.clone(),
            pages,
            evidence,
        );
        let groups = GroupLinker::new(records.clone(), index.clone());
        let pipeline = CommitPipeline::new(
            upsert.clone(),
            evidence.clone(),
            review.clone(),
            records,
        );
        let reconciler = Reconciler::new(objects, index, reconcile);
        Self {
            upsert,
            evidence,
            review,
            groups,
            pipeline,
            reconciler,
        }
    }
}
