use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use common::StoreError;
use common::model::{EvidenceFile, EvidenceFilter, NewEvidence};
use common::repository::EvidenceIndex;
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use super::store_error;
use crate::entity::evidence_file;

pub struct SeaEvidenceIndex {
    db: DatabaseConnection,
}

impl SeaEvidenceIndex {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_file(model: evidence_file::Model) -> Result<EvidenceFile, StoreError> {
    let month = model
        .month
        .map(|m| {
            u8::try_from(m)
                .map_err(|_| StoreError::Corrupt(format!("evidence_file {}: month {m}", model.id)))
        })
        .transpose()?;
    Ok(EvidenceFile {
        id: model.id,
        owner_id: model.owner_id,
        entry_id: model.entry_id,
        group_id: model.group_id,
        file_path: model.file_path,
        file_name: model.file_name,
        mime_type: model.mime_type,
        file_size: model.file_size,
        kind: model.kind,
        month,
        created_at: model.created_at,
    })
}

#[async_trait]
impl EvidenceIndex for SeaEvidenceIndex {
    async fn insert(&self, file: NewEvidence) -> Result<EvidenceFile, StoreError> {
        let model = evidence_file::ActiveModel {
            id: Set(Uuid::now_v7()),
            owner_id: Set(file.owner_id),
            entry_id: Set(Some(file.entry_id)),
            group_id: Set(file.group_id),
            file_path: Set(file.file_path),
            file_name: Set(file.file_name),
            mime_type: Set(file.mime_type),
            file_size: Set(file.file_size),
            kind: Set(file.kind),
            month: Set(file.month.map(i16::from)),
            created_at: Set(Utc::now()),
        };
        let inserted = model.insert(&self.db).await.map_err(store_error)?;
        to_file(inserted)
    }

    async fn find(&self, id: Uuid) -> Result<Option<EvidenceFile>, StoreError> {
        evidence_file::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(store_error)?
            .map(to_file)
            .transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<u64, StoreError> {
        let result = evidence_file::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected)
    }

    async fn list(&self, filter: &EvidenceFilter) -> Result<Vec<EvidenceFile>, StoreError> {
        let mut cond = Condition::all();
        if let Some(owner) = filter.owner_id {
            cond = cond.add(evidence_file::Column::OwnerId.eq(owner));
        }
        if let Some(entry) = filter.entry_id {
            cond = cond.add(evidence_file::Column::EntryId.eq(entry));
        }
        if let Some(group) = filter.group_id {
            cond = cond.add(evidence_file::Column::GroupId.eq(group));
        }
        if filter.detached {
            cond = cond.add(evidence_file::Column::EntryId.is_null());
        }
        if let Some(before) = filter.created_before {
            cond = cond.add(evidence_file::Column::CreatedAt.lt(before));
        }

        evidence_file::Entity::find()
            .filter(cond)
            .order_by_asc(evidence_file::Column::CreatedAt)
            .order_by_asc(evidence_file::Column::Id)
            .all(&self.db)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(to_file)
            .collect()
    }

    async fn set_group(&self, id: Uuid, group_id: Option<Uuid>) -> Result<u64, StoreError> {
        let result = evidence_file::Entity::update_many()
            .col_expr(evidence_file::Column::GroupId, Expr::value(group_id))
            .filter(evidence_file::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected)
    }

    async fn detach_group(&self, group_id: Uuid) -> Result<u64, StoreError> {
        let result = evidence_file::Entity::update_many()
            .col_expr(evidence_file::Column::GroupId, Expr::value(Option::<Uuid>::None))
            .col_expr(evidence_file::Column::EntryId, Expr::value(Option::<Uuid>::None))
            .filter(evidence_file::Column::GroupId.eq(group_id))
            .exec(&self.db)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected)
    }

    async fn referenced_paths(&self) -> Result<HashSet<String>, StoreError> {
        let paths: Vec<String> = evidence_file::Entity::find()
            .select_only()
            .column(evidence_file::Column::FilePath)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(store_error)?;
        Ok(paths.into_iter().collect())
    }
}
