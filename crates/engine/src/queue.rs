//! Mutation Queue: the durable FIFO log of writes not yet replayed remotely.
//!
//! One global table for every identity. Each entry carries the remote user
//! id it was authored under; [`MutationQueue::peek_for`] and
//! [`MutationQueue::pending_for`] restrict the log to one owner so a write is
//! never replayed under another identity.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, prelude::*,
};
use uuid::Uuid;

use crate::{
    Mutation, MutationRecord, ResultEngine,
    mutations::{self, Column},
};

#[derive(Clone, Debug)]
pub struct MutationQueue {
    database: DatabaseConnection,
}

impl MutationQueue {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    /// Appends `mutation` at the tail.
    pub async fn enqueue(&self, mutation: Mutation, owner: &str) -> ResultEngine<MutationRecord> {
        enqueue_in(&self.database, mutation, owner).await
    }

    /// Head of the whole log.
    pub async fn peek(&self) -> ResultEngine<Option<MutationRecord>> {
        mutations::Entity::find()
            .order_by_asc(Column::Seq)
            .one(&self.database)
            .await?
            .map(MutationRecord::try_from)
            .transpose()
    }

    /// Oldest entry authored by `owner`.
    pub async fn peek_for(&self, owner: &str) -> ResultEngine<Option<MutationRecord>> {
        mutations::Entity::find()
            .filter(Column::Owner.eq(owner))
            .order_by_asc(Column::Seq)
            .one(&self.database)
            .await?
            .map(MutationRecord::try_from)
            .transpose()
    }

    /// Removes and returns the head of the whole log.
    pub async fn dequeue(&self) -> ResultEngine<Option<MutationRecord>> {
        let Some(head) = mutations::Entity::find()
            .order_by_asc(Column::Seq)
            .one(&self.database)
            .await?
        else {
            return Ok(None);
        };
        mutations::Entity::delete_by_id(head.seq)
            .exec(&self.database)
            .await?;
        MutationRecord::try_from(head).map(Some)
    }

    /// Bumps the retry counter of an entry, leaving it in place.
    pub async fn retry(&self, id: Uuid) -> ResultEngine<bool> {
        let Some(model) = mutations::Entity::find()
            .filter(Column::Id.eq(id.to_string()))
            .one(&self.database)
            .await?
        else {
            return Ok(false);
        };
        let retry_count = model.retry_count.saturating_add(1);
        let mut active: mutations::ActiveModel = model.into();
        active.retry_count = ActiveValue::Set(retry_count);
        active.update(&self.database).await?;
        Ok(true)
    }

    pub async fn remove(&self, id: Uuid) -> ResultEngine<bool> {
        let result = mutations::Entity::delete_many()
            .filter(Column::Id.eq(id.to_string()))
            .exec(&self.database)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Every entry in enqueue order.
    pub async fn all(&self) -> ResultEngine<Vec<MutationRecord>> {
        mutations::Entity::find()
            .order_by_asc(Column::Seq)
            .all(&self.database)
            .await?
            .into_iter()
            .map(MutationRecord::try_from)
            .collect()
    }

    /// Entries of `owner` in enqueue order.
    pub async fn pending_for(&self, owner: &str) -> ResultEngine<Vec<MutationRecord>> {
        pending_for_in(&self.database, owner).await
    }

    pub async fn len(&self) -> ResultEngine<u64> {
        Ok(mutations::Entity::find().count(&self.database).await?)
    }

    pub async fn is_empty(&self) -> ResultEngine<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn clear(&self) -> ResultEngine<u64> {
        let result = mutations::Entity::delete_many()
            .exec(&self.database)
            .await?;
        Ok(result.rows_affected)
    }

    /// Drops every entry of `owner`.
    pub async fn clear_owner(&self, owner: &str) -> ResultEngine<u64> {
        let result = mutations::Entity::delete_many()
            .filter(Column::Owner.eq(owner))
            .exec(&self.database)
            .await?;
        Ok(result.rows_affected)
    }
}

pub(crate) async fn enqueue_in<C: ConnectionTrait>(
    db: &C,
    mutation: Mutation,
    owner: &str,
) -> ResultEngine<MutationRecord> {
    let record = MutationRecord {
        id: Uuid::new_v4(),
        mutation,
        enqueued_at: Utc::now(),
        retry_count: 0,
        owner: owner.to_string(),
    };
    mutations::Entity::insert(record.to_active_model()?)
        .exec_without_returning(db)
        .await?;
    tracing::debug!(
        "enqueued {} {} for {owner}",
        record.mutation.label(),
        record.mutation.entity_id()
    );
    Ok(record)
}

pub(crate) async fn pending_for_in<C: ConnectionTrait>(
    db: &C,
    owner: &str,
) -> ResultEngine<Vec<MutationRecord>> {
    mutations::Entity::find()
        .filter(Column::Owner.eq(owner))
        .order_by_asc(Column::Seq)
        .all(db)
        .await?
        .into_iter()
        .map(MutationRecord::try_from)
        .collect()
}
