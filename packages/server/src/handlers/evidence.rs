use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use common::model::LineRecord;
use common::staging::StagedFile;
use common::EvidenceKind;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::evidence::{
    AssignGroupRequest, EvidenceListResponse, EvidenceResponse, GroupResponse, SignedUrlResponse,
    UngroupResponse,
};
use crate::state::AppState;

pub fn evidence_upload_body_limit(max_object_size: u64) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_object_size as usize + 64 * 1024)
}

/// Reads one multipart `file` field into memory as a staged file.
pub(crate) async fn read_staged_file(
    state: &AppState,
    field: Field<'_>,
) -> Result<StagedFile, AppError> {
    let file_name = field
        .file_name()
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
    let declared_type = field.content_type().map(|s| s.to_string());
    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read {file_name}: {e}")))?;

    Ok(state
        .engines
        .evidence
        .stage(file_name, declared_type, bytes.to_vec()))
}

fn parse_text_field<T: std::str::FromStr>(name: &str, text: &str) -> Result<T, AppError> {
    text.trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("Invalid '{name}' field: {text}")))
}

#[utoipa::path(
    get,
    path = "/entries/{id}/evidence",
    tag = "Evidence",
    operation_id = "listEvidence",
    summary = "List evidence attached to an entry",
    description = "Oldest upload first.",
    params(("id" = Uuid, Path, description = "Entry ID")),
    responses(
        (status = 200, description = "Evidence list", body = EvidenceListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(entry_id = %id))]
pub async fn list_evidence(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EvidenceListResponse>, AppError> {
    let files = state.engines.evidence.list(&auth_user.actor(), id).await?;
    Ok(Json(files.into()))
}

#[utoipa::path(
    post,
    path = "/entries/{id}/evidence",
    tag = "Evidence",
    operation_id = "uploadEvidence",
    summary = "Attach one evidence file to an entry",
    description = "The `file` multipart field is required. Optional text fields: `kind` \
        (`usage_evidence`, `msds`, `annual_evidence`, `heat_value_evidence`), `month` (1..12) \
        and `group_id`. On pages with one file per slot the previous file in the same slot is \
        replaced.",
    params(("id" = Uuid, Path, description = "Entry ID")),
    request_body(content_type = "multipart/form-data", description = "File upload with optional slot fields"),
    responses(
        (status = 201, description = "Evidence stored", body = EvidenceResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Entry locked (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(entry_id = %id))]
pub async fn upload_evidence(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<StagedFile> = None;
    let mut kind = EvidenceKind::default();
    let mut month: Option<u8> = None;
    let mut group_id: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("file") => file = Some(read_staged_file(&state, field).await?),
            Some(other @ ("kind" | "month" | "group_id")) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read {other}: {e}")))?;
                match other {
                    "kind" => {
                        kind = serde_json::from_value(serde_json::Value::String(
                            text.trim().to_string(),
                        ))
                        .map_err(|_| {
                            AppError::Validation(format!("Invalid 'kind' field: {text}"))
                        })?;
                    }
                    "month" => month = Some(parse_text_field("month", &text)?),
                    _ => group_id = Some(parse_text_field("group_id", &text)?),
                }
            }
            _ => {} // Ignore unknown fields.
        }
    }

    let mut staged = file
        .ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?
        .with_kind(kind);
    if let Some(month) = month {
        staged = staged.for_month(month);
    }

    let committed = state
        .engines
        .evidence
        .commit(&auth_user.actor(), &staged, id, group_id)
        .await?;

    Ok((StatusCode::CREATED, Json(EvidenceResponse::from(committed))))
}

#[utoipa::path(
    delete,
    path = "/evidence/{id}",
    tag = "Evidence",
    operation_id = "deleteEvidence",
    summary = "Delete an evidence file",
    description = "Removes the stored object and its metadata. Owners cannot delete evidence \
        of an approved entry.",
    params(("id" = Uuid, Path, description = "Evidence file ID")),
    responses(
        (status = 204, description = "Evidence deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Entry locked (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Evidence not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(file_id = %id))]
pub async fn delete_evidence(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.engines.evidence.delete(&auth_user.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/evidence/{id}/url",
    tag = "Evidence",
    operation_id = "evidenceUrl",
    summary = "Get a time-limited download link",
    params(("id" = Uuid, Path, description = "Evidence file ID")),
    responses(
        (status = 200, description = "Signed URL", body = SignedUrlResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Evidence not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(file_id = %id))]
pub async fn evidence_url(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SignedUrlResponse>, AppError> {
    let signed = state
        .engines
        .evidence
        .signed_url(&auth_user.actor(), id)
        .await?;
    Ok(Json(signed.into()))
}

#[utoipa::path(
    put,
    path = "/evidence/{id}/group",
    tag = "Groups",
    operation_id = "assignGroup",
    summary = "Move an evidence file into a group",
    params(("id" = Uuid, Path, description = "Evidence file ID")),
    request_body = AssignGroupRequest,
    responses(
        (status = 200, description = "Evidence regrouped", body = EvidenceResponse),
        (status = 400, description = "File is detached (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Entry locked (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Evidence not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(file_id = %id))]
pub async fn assign_group(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<AssignGroupRequest>,
) -> Result<Json<EvidenceResponse>, AppError> {
    let file = state
        .engines
        .groups
        .assign_group(&auth_user.actor(), id, payload.group_id)
        .await?;
    Ok(Json(file.into()))
}

#[utoipa::path(
    get,
    path = "/entries/{id}/groups",
    tag = "Groups",
    operation_id = "listGroups",
    summary = "Evidence groups of an itemised entry",
    description = "Each group lists its line records and files. A group with records but no \
        files reads as `data_only`.",
    params(("id" = Uuid, Path, description = "Entry ID")),
    responses(
        (status = 200, description = "Groups", body = Vec<GroupResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(entry_id = %id))]
pub async fn list_groups(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<GroupResponse>>, AppError> {
    let views = state.engines.groups.groups(&auth_user.actor(), id).await?;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/entries/{id}/groups/{group_id}",
    tag = "Groups",
    operation_id = "groupRecords",
    summary = "Line records belonging to one group",
    params(
        ("id" = Uuid, Path, description = "Entry ID"),
        ("group_id" = Uuid, Path, description = "Group ID"),
    ),
    responses(
        (status = 200, description = "Line records", body = Vec<LineRecord>),
        (status = 400, description = "Malformed line records (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(entry_id = %id, group_id = %group_id))]
pub async fn group_records(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, group_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<LineRecord>>, AppError> {
    let records = state
        .engines
        .groups
        .records_for_group(&auth_user.actor(), id, group_id)
        .await?;
    Ok(Json(records))
}

#[utoipa::path(
    delete,
    path = "/groups/{group_id}",
    tag = "Groups",
    operation_id = "ungroup",
    summary = "Detach every file of a group",
    description = "Files are unlinked from their entry and removed by the next storage \
        reconciliation after the grace period. Line records keep their group.",
    params(("group_id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group detached", body = UngroupResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Entry locked (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Group not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(group_id = %group_id))]
pub async fn ungroup(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<UngroupResponse>, AppError> {
    let detached = state
        .engines
        .groups
        .ungroup(&auth_user.actor(), group_id)
        .await?;
    Ok(Json(UngroupResponse { detached }))
}
