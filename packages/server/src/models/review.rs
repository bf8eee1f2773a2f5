use chrono::{DateTime, Utc};
use common::EntryStatus;
use common::engine::{BulkOutcome, PendingOwner, ReviewedFilter};
use common::review::{BulkAction, ReviewAction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ReviewRequest {
    pub action: ReviewAction,
    #[schema(example = "Invoice total does not match January figure")]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BulkReviewRequest {
    /// At most 500 distinct ids.
    pub entry_ids: Vec<Uuid>,
    pub action: BulkAction,
    pub notes: Option<String>,
}

/// Entries that were not `submitted` are skipped; compare `affected` with
/// `requested`.
#[derive(Serialize, utoipa::ToSchema)]
pub struct BulkReviewResponse {
    #[schema(example = 2)]
    pub requested: usize,
    #[schema(example = 1)]
    pub affected: u64,
}

impl From<BulkOutcome> for BulkReviewResponse {
    fn from(outcome: BulkOutcome) -> Self {
        Self {
            requested: outcome.requested,
            affected: outcome.affected,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PendingQuery {
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReviewedQuery {
    pub owner_id: Option<Uuid>,
    /// `approved` or `rejected`.
    pub status: Option<EntryStatus>,
    pub category: Option<String>,
    pub reviewed_from: Option<DateTime<Utc>>,
    pub reviewed_to: Option<DateTime<Utc>>,
}

impl From<ReviewedQuery> for ReviewedFilter {
    fn from(query: ReviewedQuery) -> Self {
        Self {
            owner_id: query.owner_id,
            status: query.status,
            category: query.category,
            reviewed_from: query.reviewed_from,
            reviewed_to: query.reviewed_to,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PendingOwnerResponse {
    pub owner_id: Uuid,
    #[schema(example = 3)]
    pub pending_count: usize,
}

impl From<PendingOwner> for PendingOwnerResponse {
    fn from(owner: PendingOwner) -> Self {
        Self {
            owner_id: owner.owner_id,
            pending_count: owner.pending_count,
        }
    }
}
