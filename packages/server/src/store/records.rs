use async_trait::async_trait;
use chrono::Utc;
use common::model::{
    ContentGuard, NaturalKey, NewRecord, RecordContent, RecordFilter, RecordOrder, ReviewPatch, UsageRecord,
};
use common::monthly::MonthlyUsage;
use common::repository::RecordStore;
use common::{EntryStatus, StoreError};
use sea_orm::sea_query::Condition;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::store_error;
use crate::entity::usage_entry;

pub struct SeaRecordStore {
    db: DatabaseConnection,
}

impl SeaRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn monthly_json(monthly: &MonthlyUsage) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(monthly).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn to_record(model: usage_entry::Model) -> Result<UsageRecord, StoreError> {
    let monthly: MonthlyUsage = serde_json::from_value(model.monthly)
        .map_err(|e| StoreError::Corrupt(format!("usage_entry {}: monthly: {e}", model.id)))?;
    Ok(UsageRecord {
        id: model.id,
        owner_id: model.owner_id,
        page_key: model.page_key,
        period_year: model.period_year,
        category: model.category,
        unit: model.unit,
        amount: model.amount,
        monthly,
        payload: model.payload,
        notes: model.notes,
        status: model.status,
        is_locked: model.is_locked,
        reviewer_id: model.reviewer_id,
        review_notes: model.review_notes,
        reviewed_at: model.reviewed_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

#[async_trait]
impl RecordStore for SeaRecordStore {
    async fn find_by_natural_key(
        &self,
        key: &NaturalKey,
    ) -> Result<Option<UsageRecord>, StoreError> {
        usage_entry::Entity::find()
            .filter(usage_entry::Column::OwnerId.eq(key.owner_id))
            .filter(usage_entry::Column::PageKey.eq(key.page_key.as_str()))
            .filter(usage_entry::Column::PeriodYear.eq(key.period_year))
            .one(&self.db)
            .await
            .map_err(store_error)?
            .map(to_record)
            .transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UsageRecord>, StoreError> {
        usage_entry::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(store_error)?
            .map(to_record)
            .transpose()
    }

    async fn insert(&self, record: NewRecord) -> Result<UsageRecord, StoreError> {
        let now = Utc::now();
        let model = usage_entry::ActiveModel {
            id: Set(Uuid::now_v7()),
            owner_id: Set(record.key.owner_id),
            page_key: Set(record.key.page_key),
            period_year: Set(record.key.period_year),
            category: Set(record.content.category),
            unit: Set(record.content.unit),
            amount: Set(record.content.amount),
            monthly: Set(monthly_json(&record.content.monthly)?),
            payload: Set(record.content.payload),
            notes: Set(record.content.notes),
            status: Set(record.status),
            is_locked: Set(false),
            reviewer_id: Set(None),
            review_notes: Set(None),
            reviewed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = model.insert(&self.db).await.map_err(store_error)?;
        to_record(inserted)
    }

    async fn update_content(
        &self,
        id: Uuid,
        guard: ContentGuard,
        content: RecordContent,
    ) -> Result<Option<UsageRecord>, StoreError> {
        let changes = usage_entry::ActiveModel {
            category: Set(content.category),
            unit: Set(content.unit),
            amount: Set(content.amount),
            monthly: Set(monthly_json(&content.monthly)?),
            payload: Set(content.payload),
            notes: Set(content.notes),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        let mut update = usage_entry::Entity::update_many()
            .set(changes)
            .filter(usage_entry::Column::Id.eq(id))
            .filter(usage_entry::Column::Status.eq(guard.status));
        if !guard.allow_locked {
            update = update.filter(usage_entry::Column::IsLocked.eq(false));
        }

        let result = update.exec(&self.db).await.map_err(store_error)?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn apply_review(
        &self,
        ids: &[Uuid],
        expected: &[EntryStatus],
        owner: Option<Uuid>,
        patch: &ReviewPatch,
    ) -> Result<u64, StoreError> {
        if ids.is_empty() || expected.is_empty() {
            return Ok(0);
        }

        let changes = usage_entry::ActiveModel {
            status: Set(patch.status),
            is_locked: Set(patch.is_locked),
            reviewer_id: Set(patch.reviewer_id),
            review_notes: Set(patch.review_notes.clone()),
            reviewed_at: Set(patch.reviewed_at),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        let mut update = usage_entry::Entity::update_many()
            .set(changes)
            .filter(usage_entry::Column::Id.is_in(ids.iter().copied()))
            .filter(usage_entry::Column::Status.is_in(expected.iter().copied()));
        if let Some(owner) = owner {
            update = update.filter(usage_entry::Column::OwnerId.eq(owner));
        }

        let result = update.exec(&self.db).await.map_err(store_error)?;
        Ok(result.rows_affected)
    }

    async fn delete_where(
        &self,
        id: Uuid,
        owner: Uuid,
        status: EntryStatus,
    ) -> Result<u64, StoreError> {
        let result = usage_entry::Entity::delete_many()
            .filter(usage_entry::Column::Id.eq(id))
            .filter(usage_entry::Column::OwnerId.eq(owner))
            .filter(usage_entry::Column::Status.eq(status))
            .exec(&self.db)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected)
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<UsageRecord>, StoreError> {
        let mut cond = Condition::all();
        if let Some(owner) = filter.owner_id {
            cond = cond.add(usage_entry::Column::OwnerId.eq(owner));
        }
        if let Some(page_key) = &filter.page_key {
            cond = cond.add(usage_entry::Column::PageKey.eq(page_key.as_str()));
        }
        if let Some(year) = filter.period_year {
            cond = cond.add(usage_entry::Column::PeriodYear.eq(year));
        }
        if let Some(category) = &filter.category {
            cond = cond.add(usage_entry::Column::Category.eq(category.as_str()));
        }
        if !filter.statuses.is_empty() {
            cond = cond.add(usage_entry::Column::Status.is_in(filter.statuses.iter().copied()));
        }
        if let Some(from) = filter.reviewed_from {
            cond = cond.add(usage_entry::Column::ReviewedAt.gte(from));
        }
        if let Some(to) = filter.reviewed_to {
            cond = cond.add(usage_entry::Column::ReviewedAt.lte(to));
        }

        let query = usage_entry::Entity::find().filter(cond);
        let query = match filter.order {
            RecordOrder::CreatedDesc => query.order_by_desc(usage_entry::Column::CreatedAt),
            RecordOrder::ReviewedDesc => query.order_by_desc(usage_entry::Column::ReviewedAt),
            RecordOrder::PeriodDesc => query
                .order_by_desc(usage_entry::Column::PeriodYear)
                .order_by_asc(usage_entry::Column::PageKey),
        };

        query
            .all(&self.db)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(to_record)
            .collect()
    }
}
