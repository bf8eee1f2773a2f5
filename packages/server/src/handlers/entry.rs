use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use common::engine::{PendingSubmission, UpsertIntent};
use common::staging::StagingArea;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::handlers::evidence::read_staged_file;
use crate::models::entry::{
    EntryContentRequest, EntryListResponse, EntryResponse, ListEntriesQuery, LookupQuery,
    SubmitEntryRequest, SubmitResponse, UpsertEntryRequest, UpsertEntryResponse,
};
use crate::models::evidence::FileMeta;
use crate::state::AppState;

/// Upper bound for a multipart submission carrying several files.
pub fn submit_body_limit(max_object_size: u64) -> DefaultBodyLimit {
    DefaultBodyLimit::max((max_object_size as usize).saturating_mul(8) + 1024 * 1024)
}

#[utoipa::path(
    put,
    path = "/entries",
    tag = "Entries",
    operation_id = "upsertEntry",
    summary = "Create or replace an entry",
    description = "Finds the entry for `(caller, page_key, period_year)` or creates it, then \
        writes the monthly figures. Without `preserve_status` the entry is submitted for review. \
        Reviewers may set `preserve_status` and `owner_id` to correct another owner's entry \
        without changing its status.",
    request_body = UpsertEntryRequest,
    responses(
        (status = 200, description = "Entry written", body = UpsertEntryResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Entry locked or reviewer required (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Entry not found for a status-preserving edit (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Concurrent status change (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn upsert_entry(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpsertEntryRequest>,
) -> Result<Json<UpsertEntryResponse>, AppError> {
    let intent = UpsertIntent::from_flags(payload.preserve_status);
    let outcome = state
        .engines
        .upsert
        .upsert(
            &auth_user.actor(),
            payload.owner_id,
            &payload.content.into(),
            intent,
        )
        .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/entries/draft",
    tag = "Entries",
    operation_id = "saveDraft",
    summary = "Save an entry without submitting it",
    description = "Writes the entry content without the zero-total check. New entries stay \
        `draft`; existing entries keep their status.",
    request_body = EntryContentRequest,
    responses(
        (status = 200, description = "Draft saved", body = UpsertEntryResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Entry locked (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn save_draft(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<EntryContentRequest>,
) -> Result<Json<UpsertEntryResponse>, AppError> {
    let outcome = state
        .engines
        .upsert
        .upsert(
            &auth_user.actor(),
            None,
            &payload.into(),
            UpsertIntent::SaveDraft,
        )
        .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/entries/submit",
    tag = "Entries",
    operation_id = "submitEntry",
    summary = "Submit an entry together with its evidence",
    description = "Multipart form. The `entry` field holds a JSON `SubmitEntryRequest`; each \
        `file` field is one evidence document; an optional `file_meta` field holds a JSON array \
        of `FileMeta` matched to the files by position. The entry is written first, then each \
        file is uploaded independently, then `delete_file_ids` are removed, then the entry is \
        submitted. Per-file failures are reported in the response and can be retried by \
        submitting again with only the failed files.",
    request_body(content_type = "multipart/form-data", description = "Entry JSON plus evidence files"),
    responses(
        (status = 200, description = "Submission processed", body = SubmitResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Entry locked (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Concurrent status change (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = %auth_user.user_id))]
pub async fn submit_entry(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>, AppError> {
    let mut entry: Option<SubmitEntryRequest> = None;
    let mut metas: Vec<FileMeta> = Vec::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        match field.name() {
            Some("entry") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read entry: {e}")))?;
                entry = Some(
                    serde_json::from_str(&text)
                        .map_err(|e| AppError::Validation(format!("Invalid entry: {e}")))?,
                );
            }
            Some("file_meta") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file_meta: {e}")))?;
                metas = serde_json::from_str(&text)
                    .map_err(|e| AppError::Validation(format!("Invalid file_meta: {e}")))?;
            }
            Some("file") => files.push(read_staged_file(&state, field).await?),
            _ => {} // Ignore unknown fields.
        }
    }

    let entry = entry.ok_or_else(|| AppError::Validation("Missing 'entry' field".into()))?;
    if metas.len() > files.len() {
        return Err(AppError::Validation(format!(
            "file_meta has {} items but only {} files were sent",
            metas.len(),
            files.len()
        )));
    }

    let mut metas = metas.into_iter();
    let mut staging = StagingArea::new();
    for file in files {
        let meta = metas.next().unwrap_or_default();
        let mut file = file.with_kind(meta.kind);
        if let Some(month) = meta.month {
            file = file.for_month(month);
        }
        if let Some(group_id) = meta.group_id {
            file = file.in_group(group_id);
        }
        staging.stage(file);
    }
    for file_id in &entry.delete_file_ids {
        staging.mark_for_deletion(*file_id);
    }

    let intent = if entry.save_draft {
        UpsertIntent::SaveDraft
    } else {
        UpsertIntent::Submit
    };
    let mut pending = PendingSubmission::new(entry.content.into(), intent, &mut staging);
    let report = state
        .engines
        .pipeline
        .submit(&auth_user.actor(), &mut pending)
        .await?;

    Ok(Json(report.into()))
}

#[utoipa::path(
    get,
    path = "/entries",
    tag = "Entries",
    operation_id = "listEntries",
    summary = "List the caller's entries",
    description = "Latest reporting year first, then by page key.",
    params(ListEntriesQuery),
    responses(
        (status = 200, description = "Entry list", body = EntryListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_entries(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListEntriesQuery>,
) -> Result<Json<EntryListResponse>, AppError> {
    let records = state
        .engines
        .upsert
        .list_mine(&auth_user.actor(), query.period_year)
        .await?;
    Ok(Json(records.into()))
}

#[utoipa::path(
    get,
    path = "/entries/lookup",
    tag = "Entries",
    operation_id = "lookupEntry",
    summary = "Find the caller's entry by page and year",
    description = "Returns `null` when no entry exists for the natural key.",
    params(LookupQuery),
    responses(
        (status = 200, description = "Entry or null", body = Option<EntryResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn lookup_entry(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<LookupQuery>,
) -> Result<Json<Option<EntryResponse>>, AppError> {
    let record = state
        .engines
        .upsert
        .find_by_key(&auth_user.actor(), query.page_key.trim(), query.period_year)
        .await?;
    Ok(Json(record.map(Into::into)))
}

#[utoipa::path(
    get,
    path = "/entries/{id}",
    tag = "Entries",
    operation_id = "getEntry",
    summary = "Get an entry",
    description = "Owners see their own entries; reviewers see every entry.",
    params(("id" = Uuid, Path, description = "Entry ID")),
    responses(
        (status = 200, description = "Entry", body = EntryResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(entry_id = %id))]
pub async fn get_entry(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EntryResponse>, AppError> {
    let record = state.engines.upsert.get(&auth_user.actor(), id).await?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    delete,
    path = "/entries/{id}",
    tag = "Entries",
    operation_id = "deleteDraft",
    summary = "Delete a draft entry",
    description = "Deletes one of the caller's drafts and all of its evidence. Entries in any \
        other status cannot be deleted.",
    params(("id" = Uuid, Path, description = "Entry ID")),
    responses(
        (status = 204, description = "Draft deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No draft with this ID (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(entry_id = %id))]
pub async fn delete_draft(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .engines
        .pipeline
        .discard_draft(&auth_user.actor(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/entries/{id}/resubmit",
    tag = "Entries",
    operation_id = "resubmitEntry",
    summary = "Hand a rejected entry back in",
    description = "Moves one of the caller's rejected entries back to `submitted` and clears \
        the previous decision. Any other status is reported as not found.",
    params(("id" = Uuid, Path, description = "Entry ID")),
    responses(
        (status = 200, description = "Entry resubmitted", body = EntryResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No rejected entry with this ID (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(entry_id = %id))]
pub async fn resubmit_entry(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EntryResponse>, AppError> {
    let actor = auth_user.actor();
    state.engines.review.resubmit(&actor, id).await?;
    let record = state.engines.upsert.get(&actor, id).await?;
    Ok(Json(record.into()))
}
