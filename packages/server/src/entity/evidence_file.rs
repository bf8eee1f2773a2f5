use common::EvidenceKind;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "evidence_file")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub owner_id: Uuid,

    /// NULL once the file was detached from its entry by an ungroup.
    pub entry_id: Option<Uuid>,
    #[sea_orm(belongs_to, from = "entry_id", to = "id")]
    pub entry: HasOne<super::usage_entry::Entity>,

    pub group_id: Option<Uuid>,

    /// Object-store key.
    #[sea_orm(unique)]
    pub file_path: String,
    /// Original upload filename.
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub kind: EvidenceKind,
    /// Month tag (1..12) for per-month evidence slots.
    pub month: Option<i16>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
