use sea_orm::{
    ActiveModelTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait, prelude::*,
};
use uuid::Uuid;

use super::{Replica, with_tx};
use crate::{
    Category, CategoryDraft, CategoryPatch, EngineError, ResultEngine, budgets, categories,
    transactions, util::normalize_required_name,
};

impl Replica {
    /// Categories ordered by kind, then name.
    pub async fn categories(&self) -> ResultEngine<Vec<Category>> {
        self.categories_in(&self.database).await
    }

    pub async fn category(&self, id: Uuid) -> ResultEngine<Option<Category>> {
        self.find_category_in(&self.database, id).await
    }

    /// Overwrites the whole collection.
    pub async fn set_categories(&self, categories: Vec<Category>) -> ResultEngine<()> {
        with_tx!(self.database, |db_tx| {
            categories::Entity::delete_many()
                .filter(categories::Column::Namespace.eq(self.namespace.as_str()))
                .exec(&db_tx)
                .await?;
            self.insert_category_rows_in(&db_tx, &categories).await
        })
    }

    pub async fn create_category(&self, draft: CategoryDraft) -> ResultEngine<Category> {
        with_tx!(self.database, |db_tx| self
            .create_category_in(&db_tx, draft)
            .await)
    }

    pub async fn update_category(&self, id: Uuid, patch: CategoryPatch) -> ResultEngine<Category> {
        with_tx!(self.database, |db_tx| self
            .update_category_in(&db_tx, id, patch)
            .await)
    }

    /// Removes a category nothing references.
    pub async fn delete_category(&self, id: Uuid) -> ResultEngine<Category> {
        with_tx!(self.database, |db_tx| {
            self.ensure_category_unused_in(&db_tx, id).await?;
            self.delete_category_in(&db_tx, id)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("category".to_string()))
        })
    }

    pub(crate) async fn categories_in<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> ResultEngine<Vec<Category>> {
        categories::Entity::find()
            .filter(categories::Column::Namespace.eq(self.namespace.as_str()))
            .order_by_asc(categories::Column::Kind)
            .order_by_asc(categories::Column::Name)
            .all(db)
            .await?
            .into_iter()
            .map(Category::try_from)
            .collect()
    }

    pub(crate) async fn find_category_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
    ) -> ResultEngine<Option<Category>> {
        categories::Entity::find_by_id((self.namespace.clone(), id.to_string()))
            .one(db)
            .await?
            .map(Category::try_from)
            .transpose()
    }

    pub(crate) async fn require_category_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
    ) -> ResultEngine<Category> {
        self.find_category_in(db, id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("category".to_string()))
    }

    pub(crate) async fn create_category_in<C: ConnectionTrait>(
        &self,
        db: &C,
        draft: CategoryDraft,
    ) -> ResultEngine<Category> {
        let category = Category {
            id: Uuid::new_v4(),
            name: normalize_required_name(&draft.name, "category")?,
            kind: draft.kind,
            icon: draft.icon.trim().to_string(),
        };
        categories::Entity::insert(categories::ActiveModel::from((&category, self.namespace())))
            .exec_without_returning(db)
            .await?;
        Ok(category)
    }

    pub(crate) async fn update_category_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
        patch: CategoryPatch,
    ) -> ResultEngine<Category> {
        let mut category = self.require_category_in(db, id).await?;
        if let Some(name) = patch.name {
            category.name = normalize_required_name(&name, "category")?;
        }
        if let Some(kind) = patch.kind {
            category.kind = kind;
        }
        if let Some(icon) = patch.icon {
            category.icon = icon.trim().to_string();
        }
        categories::ActiveModel::from((&category, self.namespace()))
            .update(db)
            .await?;
        Ok(category)
    }

    pub(crate) async fn ensure_category_unused_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
    ) -> ResultEngine<()> {
        let linked = transactions::Entity::find()
            .filter(transactions::Column::Namespace.eq(self.namespace.as_str()))
            .filter(transactions::Column::CategoryId.eq(id.to_string()))
            .count(db)
            .await?;
        if linked > 0 {
            return Err(EngineError::InvalidData(format!(
                "category has {linked} transactions"
            )));
        }
        let budgeted = budgets::Entity::find()
            .filter(budgets::Column::Namespace.eq(self.namespace.as_str()))
            .filter(budgets::Column::CategoryId.eq(id.to_string()))
            .count(db)
            .await?;
        if budgeted > 0 {
            return Err(EngineError::InvalidData("category has a budget".to_string()));
        }
        Ok(())
    }

    /// Stores the full record `category`, inserting or replacing by id.
    pub(crate) async fn put_category_in<C: ConnectionTrait>(
        &self,
        db: &C,
        category: &Category,
    ) -> ResultEngine<()> {
        let model = categories::ActiveModel::from((category, self.namespace()));
        if self.find_category_in(db, category.id).await?.is_some() {
            model.update(db).await?;
        } else {
            categories::Entity::insert(model)
                .exec_without_returning(db)
                .await?;
        }
        Ok(())
    }

    pub(crate) async fn delete_category_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
    ) -> ResultEngine<Option<Category>> {
        let Some(category) = self.find_category_in(db, id).await? else {
            return Ok(None);
        };
        categories::Entity::delete_by_id((self.namespace.clone(), id.to_string()))
            .exec(db)
            .await?;
        Ok(Some(category))
    }

    pub(crate) async fn insert_category_rows_in<C: ConnectionTrait>(
        &self,
        db: &C,
        categories: &[Category],
    ) -> ResultEngine<()> {
        for category in categories {
            categories::Entity::insert(categories::ActiveModel::from((category, self.namespace())))
                .exec_without_returning(db)
                .await?;
        }
        Ok(())
    }
}
