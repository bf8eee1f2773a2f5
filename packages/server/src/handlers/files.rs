use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use common::storage::{SignatureError, StorageError, resolve_mime_type};
use tracing::instrument;

use crate::error::AppError;
use crate::extractors::json::AppQuery;
use crate::models::evidence::SignedFileQuery;
use crate::state::AppState;

/// Serves a stored object behind a signed link issued by the filesystem
/// backend. The link itself is the credential, so no bearer token is read.
#[instrument(skip(state, query), fields(path = %path))]
pub async fn download(
    State(state): State<AppState>,
    Path(path): Path<String>,
    AppQuery(query): AppQuery<SignedFileQuery>,
) -> Result<Response, AppError> {
    let signer = state
        .signer
        .as_ref()
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    signer
        .verify(&path, query.expires, &query.sig)
        .map_err(|e| match e {
            SignatureError::Expired => AppError::PermissionDenied("Download link has expired".into()),
            SignatureError::Mismatch => AppError::PermissionDenied("Invalid download link".into()),
            SignatureError::InvalidKey => AppError::Internal(e.to_string()),
        })?;

    let bytes = state.objects.get(&path).await.map_err(|e| match e {
        StorageError::NotFound(_) | StorageError::InvalidKey(_) => {
            AppError::NotFound("File not found".into())
        }
        other => AppError::Internal(other.to_string()),
    })?;

    let file_name = path.rsplit('/').next().unwrap_or(path.as_str());
    let content_type = resolve_mime_type(None, file_name);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, bytes.len().to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(file_name),
        )
        .header(header::CACHE_CONTROL, "private, max-age=300")
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

/// Build a safe `Content-Disposition` header value.
fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                String::from(b as char)
            }
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("inline; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}
