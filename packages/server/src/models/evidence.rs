use chrono::{DateTime, Utc};
use common::engine::{GroupState, GroupView, SignedUrl};
use common::model::LineRecord;
use common::{EvidenceFile, EvidenceKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response DTO for a committed evidence file.
#[derive(Serialize, utoipa::ToSchema)]
pub struct EvidenceResponse {
    /// Evidence file ID (UUIDv7).
    pub id: Uuid,
    /// NULL once detached by an ungroup.
    pub entry_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    /// Original upload filename.
    #[schema(example = "invoice-2024-01.pdf")]
    pub file_name: String,
    #[schema(example = "application/pdf")]
    pub mime_type: String,
    /// Size in bytes.
    #[schema(example = 142857)]
    pub file_size: i64,
    pub kind: EvidenceKind,
    /// Month tag (1..12) for per-month slots.
    pub month: Option<u8>,
    pub created_at: DateTime<Utc>,
}

impl From<EvidenceFile> for EvidenceResponse {
    fn from(file: EvidenceFile) -> Self {
        Self {
            id: file.id,
            entry_id: file.entry_id,
            group_id: file.group_id,
            file_name: file.file_name,
            mime_type: file.mime_type,
            file_size: file.file_size,
            kind: file.kind,
            month: file.month,
            created_at: file.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EvidenceListResponse {
    pub files: Vec<EvidenceResponse>,
    pub total: u64,
}

impl From<Vec<EvidenceFile>> for EvidenceListResponse {
    fn from(files: Vec<EvidenceFile>) -> Self {
        let total = files.len() as u64;
        Self {
            files: files.into_iter().map(EvidenceResponse::from).collect(),
            total,
        }
    }
}

/// Per-file metadata sent alongside uploads. Optional.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct FileMeta {
    #[serde(default)]
    pub kind: EvidenceKind,
    pub month: Option<u8>,
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AssignGroupRequest {
    pub group_id: Uuid,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SignedUrlResponse {
    pub url: String,
    /// Seconds until the link expires.
    #[schema(example = 3600)]
    pub expires_in: u64,
}

impl From<SignedUrl> for SignedUrlResponse {
    fn from(signed: SignedUrl) -> Self {
        Self {
            url: signed.url,
            expires_in: signed.expires_in,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct GroupResponse {
    pub group_id: Uuid,
    pub state: GroupState,
    pub records: Vec<LineRecord>,
    pub files: Vec<EvidenceResponse>,
}

impl From<GroupView> for GroupResponse {
    fn from(view: GroupView) -> Self {
        Self {
            group_id: view.group_id,
            state: view.state,
            records: view.records,
            files: view.files.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UngroupResponse {
    /// Number of files detached from their entry.
    pub detached: u64,
}

/// Query string of a signed download link.
#[derive(Debug, Deserialize)]
pub struct SignedFileQuery {
    pub expires: i64,
    pub sig: String,
}
