//! Monthly spending limits per category.
//!
//! Only the limit is stored. How much was spent is always derived from the
//! live transaction list when budgets are read, see [`BudgetView`].

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, util::parse_uuid};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetPeriod {
    #[default]
    Monthly,
}

impl BudgetPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "MONTHLY",
        }
    }
}

impl TryFrom<&str> for BudgetPeriod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "MONTHLY" => Ok(Self::Monthly),
            other => Err(EngineError::InvalidData(format!(
                "invalid budget period: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub category_id: Uuid,
    /// Limit for one period.
    pub amount: Money,
    pub period: BudgetPeriod,
    pub created_at: DateTime<Utc>,
}

/// A budget joined with its category and the amount spent this month.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BudgetView {
    #[serde(flatten)]
    pub budget: Budget,
    /// `None` when the category was deleted locally.
    pub category_name: Option<String>,
    pub spent: Money,
}

impl BudgetView {
    /// What is left before the limit is hit (negative once exceeded).
    pub fn remaining(&self) -> Money {
        self.budget.amount - self.spent
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub namespace: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub period: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<(&Budget, &str)> for ActiveModel {
    fn from((budget, namespace): (&Budget, &str)) -> Self {
        Self {
            namespace: ActiveValue::Set(namespace.to_string()),
            id: ActiveValue::Set(budget.id.to_string()),
            category_id: ActiveValue::Set(budget.category_id.to_string()),
            amount_minor: ActiveValue::Set(budget.amount.cents()),
            period: ActiveValue::Set(budget.period.as_str().to_string()),
            created_at: ActiveValue::Set(budget.created_at),
        }
    }
}

impl TryFrom<Model> for Budget {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "budget")?,
            category_id: parse_uuid(&model.category_id, "category")?,
            amount: Money::new(model.amount_minor),
            period: BudgetPeriod::try_from(model.period.as_str())?,
            created_at: model.created_at,
        })
    }
}
