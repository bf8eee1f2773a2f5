use common::EntryStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_entry")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique_key = "owner_page_year")]
    pub owner_id: Uuid,
    #[sea_orm(unique_key = "owner_page_year")]
    pub page_key: String,
    #[sea_orm(unique_key = "owner_page_year")]
    pub period_year: i32,

    pub category: String,
    pub unit: String,
    /// Sum of the validated monthly values.
    pub amount: f64,

    /// Month number ("1".."12") to quantity.
    #[sea_orm(column_type = "Json")]
    pub monthly: serde_json::Value,
    #[sea_orm(column_type = "Json")]
    pub payload: serde_json::Value,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    pub status: EntryStatus,
    /// True only while approved.
    pub is_locked: bool,
    pub reviewer_id: Option<Uuid>,
    #[sea_orm(column_type = "Text", nullable)]
    pub review_notes: Option<String>,
    pub reviewed_at: Option<DateTimeUtc>,

    #[sea_orm(has_many)]
    pub evidence: HasMany<super::evidence_file::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
