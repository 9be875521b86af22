use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use super::{Replica, with_tx};
use crate::{
    Budget, BudgetDraft, BudgetPatch, BudgetPeriod, BudgetView, EngineError, ResultEngine,
    aggregates::{MonthWindow, budget_spent},
    budgets,
    util::ensure_positive,
};

impl Replica {
    /// Budgets of the current month with their category name and spend.
    pub async fn budgets(&self) -> ResultEngine<Vec<BudgetView>> {
        self.budgets_at(Utc::now()).await
    }

    /// Budget view for the month containing `now`.
    ///
    /// Spend is recomputed from the stored transactions on every call.
    pub async fn budgets_at(&self, now: DateTime<Utc>) -> ResultEngine<Vec<BudgetView>> {
        let window = MonthWindow::containing(now, &self.timezone);
        let budgets = self.budget_records_in(&self.database).await?;
        let names: HashMap<Uuid, String> = self
            .categories_in(&self.database)
            .await?
            .into_iter()
            .map(|category| (category.id, category.name))
            .collect();
        let txs = self.transactions_in(&self.database).await?;

        Ok(budgets
            .into_iter()
            .map(|budget| BudgetView {
                category_name: names.get(&budget.category_id).cloned(),
                spent: budget_spent(&txs, budget.category_id, &window),
                budget,
            })
            .collect())
    }

    /// Stored budgets without the computed fields.
    pub async fn budget_records(&self) -> ResultEngine<Vec<Budget>> {
        self.budget_records_in(&self.database).await
    }

    pub async fn budget(&self, id: Uuid) -> ResultEngine<Option<Budget>> {
        self.find_budget_in(&self.database, id).await
    }

    /// Overwrites the whole collection.
    pub async fn set_budgets(&self, budgets: Vec<Budget>) -> ResultEngine<()> {
        with_tx!(self.database, |db_tx| {
            budgets::Entity::delete_many()
                .filter(budgets::Column::Namespace.eq(self.namespace.as_str()))
                .exec(&db_tx)
                .await?;
            self.insert_budget_rows_in(&db_tx, &budgets).await
        })
    }

    /// Creates a monthly budget. A category holds at most one budget.
    pub async fn create_budget(&self, draft: BudgetDraft) -> ResultEngine<Budget> {
        with_tx!(self.database, |db_tx| self.create_budget_in(&db_tx, draft).await)
    }

    pub async fn update_budget(&self, id: Uuid, patch: BudgetPatch) -> ResultEngine<Budget> {
        with_tx!(self.database, |db_tx| self
            .update_budget_in(&db_tx, id, patch)
            .await)
    }

    pub async fn delete_budget(&self, id: Uuid) -> ResultEngine<Budget> {
        with_tx!(self.database, |db_tx| {
            self.delete_budget_in(&db_tx, id)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("budget".to_string()))
        })
    }

    pub(crate) async fn budget_records_in<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> ResultEngine<Vec<Budget>> {
        budgets::Entity::find()
            .filter(budgets::Column::Namespace.eq(self.namespace.as_str()))
            .order_by_asc(budgets::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(Budget::try_from)
            .collect()
    }

    pub(crate) async fn find_budget_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
    ) -> ResultEngine<Option<Budget>> {
        budgets::Entity::find_by_id((self.namespace.clone(), id.to_string()))
            .one(db)
            .await?
            .map(Budget::try_from)
            .transpose()
    }

    async fn ensure_no_budget_for_in<C: ConnectionTrait>(
        &self,
        db: &C,
        category_id: Uuid,
    ) -> ResultEngine<()> {
        let existing = budgets::Entity::find()
            .filter(budgets::Column::Namespace.eq(self.namespace.as_str()))
            .filter(budgets::Column::CategoryId.eq(category_id.to_string()))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(EngineError::ExistingKey(format!(
                "budget for category {category_id}"
            )));
        }
        Ok(())
    }

    pub(crate) async fn create_budget_in<C: ConnectionTrait>(
        &self,
        db: &C,
        draft: BudgetDraft,
    ) -> ResultEngine<Budget> {
        ensure_positive(draft.amount, "budget")?;
        self.require_category_in(db, draft.category_id).await?;
        self.ensure_no_budget_for_in(db, draft.category_id).await?;

        let budget = Budget {
            id: Uuid::new_v4(),
            category_id: draft.category_id,
            amount: draft.amount,
            period: BudgetPeriod::Monthly,
            created_at: Utc::now(),
        };
        budgets::Entity::insert(budgets::ActiveModel::from((&budget, self.namespace())))
            .exec_without_returning(db)
            .await?;
        Ok(budget)
    }

    pub(crate) async fn update_budget_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
        patch: BudgetPatch,
    ) -> ResultEngine<Budget> {
        let mut budget = self
            .find_budget_in(db, id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("budget".to_string()))?;
        if let Some(category_id) = patch.category_id.filter(|c| *c != budget.category_id) {
            self.require_category_in(db, category_id).await?;
            self.ensure_no_budget_for_in(db, category_id).await?;
            budget.category_id = category_id;
        }
        if let Some(amount) = patch.amount {
            ensure_positive(amount, "budget")?;
            budget.amount = amount;
        }
        budgets::ActiveModel::from((&budget, self.namespace()))
            .update(db)
            .await?;
        Ok(budget)
    }

    /// Stores the full record `budget`, inserting or replacing by id.
    pub(crate) async fn put_budget_in<C: ConnectionTrait>(
        &self,
        db: &C,
        budget: &Budget,
    ) -> ResultEngine<()> {
        let model = budgets::ActiveModel::from((budget, self.namespace()));
        if self.find_budget_in(db, budget.id).await?.is_some() {
            model.update(db).await?;
        } else {
            budgets::Entity::insert(model).exec_without_returning(db).await?;
        }
        Ok(())
    }

    pub(crate) async fn delete_budget_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
    ) -> ResultEngine<Option<Budget>> {
        let Some(budget) = self.find_budget_in(db, id).await? else {
            return Ok(None);
        };
        budgets::Entity::delete_by_id((self.namespace.clone(), id.to_string()))
            .exec(db)
            .await?;
        Ok(Some(budget))
    }

    pub(crate) async fn insert_budget_rows_in<C: ConnectionTrait>(
        &self,
        db: &C,
        budgets: &[Budget],
    ) -> ResultEngine<()> {
        for budget in budgets {
            budgets::Entity::insert(budgets::ActiveModel::from((budget, self.namespace())))
                .exec_without_returning(db)
                .await?;
        }
        Ok(())
    }
}
