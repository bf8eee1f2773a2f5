use axum::Json;
use axum::extract::{Path, State};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::entry::{EntryListResponse, EntryResponse};
use crate::models::review::{
    BulkReviewRequest, BulkReviewResponse, PendingOwnerResponse, PendingQuery, ReviewRequest,
    ReviewedQuery,
};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/review/pending",
    tag = "Review",
    operation_id = "listPending",
    summary = "Entries waiting for review",
    description = "Submitted entries, newest first. Reviewer only.",
    params(PendingQuery),
    responses(
        (status = 200, description = "Pending entries", body = EntryListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Reviewer required (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_pending(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PendingQuery>,
) -> Result<Json<EntryListResponse>, AppError> {
    auth_user.require_reviewer()?;
    let records = state
        .engines
        .review
        .list_pending(&auth_user.actor(), query.owner_id)
        .await?;
    Ok(Json(records.into()))
}

#[utoipa::path(
    get,
    path = "/review/reviewed",
    tag = "Review",
    operation_id = "listReviewed",
    summary = "Entries that already have a decision",
    description = "Approved or rejected entries, most recent decision first. Reviewer only.",
    params(ReviewedQuery),
    responses(
        (status = 200, description = "Reviewed entries", body = EntryListResponse),
        (status = 400, description = "Invalid status filter (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Reviewer required (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_reviewed(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ReviewedQuery>,
) -> Result<Json<EntryListResponse>, AppError> {
    auth_user.require_reviewer()?;
    let records = state
        .engines
        .review
        .list_reviewed(&auth_user.actor(), query.into())
        .await?;
    Ok(Json(records.into()))
}

#[utoipa::path(
    get,
    path = "/review/owners",
    tag = "Review",
    operation_id = "pendingOwners",
    summary = "Owners with entries waiting for review",
    description = "Busiest owner first.",
    responses(
        (status = 200, description = "Owners", body = Vec<PendingOwnerResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Reviewer required (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn pending_owners(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PendingOwnerResponse>>, AppError> {
    auth_user.require_reviewer()?;
    let owners = state
        .engines
        .review
        .pending_owners(&auth_user.actor())
        .await?;
    Ok(Json(owners.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/review/{id}",
    tag = "Review",
    operation_id = "reviewEntry",
    summary = "Decide on one entry",
    description = "`approve` and `reject` apply to submitted entries. `reset` returns an \
        approved or rejected entry to `submitted` and unlocks it.",
    params(("id" = Uuid, Path, description = "Entry ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Entry after the decision", body = EntryResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Reviewer required (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Entry not found or not in a reviewable status (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Concurrent status change (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(entry_id = %id, action = ?payload.action))]
pub async fn review_entry(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<ReviewRequest>,
) -> Result<Json<EntryResponse>, AppError> {
    auth_user.require_reviewer()?;
    let record = state
        .engines
        .review
        .review(&auth_user.actor(), id, payload.action, payload.notes)
        .await?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    post,
    path = "/review/bulk",
    tag = "Review",
    operation_id = "bulkReview",
    summary = "Approve or reject many entries at once",
    description = "Only entries currently `submitted` are changed. Up to 500 ids per call.",
    request_body = BulkReviewRequest,
    responses(
        (status = 200, description = "Bulk decision applied", body = BulkReviewResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Reviewer required (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(count = payload.entry_ids.len()))]
pub async fn bulk_review(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<BulkReviewRequest>,
) -> Result<Json<BulkReviewResponse>, AppError> {
    auth_user.require_reviewer()?;
    let outcome = state
        .engines
        .review
        .bulk_review(
            &auth_user.actor(),
            &payload.entry_ids,
            payload.action,
            payload.notes,
        )
        .await?;
    Ok(Json(outcome.into()))
}
