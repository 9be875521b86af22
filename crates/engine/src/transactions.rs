//! Transaction primitives.
//!
//! A `Transaction` moves money in or out of exactly one wallet. Its effect on
//! the wallet balance is maintained incrementally, see [`crate::aggregates`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
        }
    }

    /// The kind whose application undoes this one.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Income => Self::Expense,
            Self::Expense => Self::Income,
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "INCOME" => Ok(Self::Income),
            "EXPENSE" => Ok(Self::Expense),
            other => Err(EngineError::InvalidData(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Client-assigned, so offline creation never waits for the remote.
    pub id: Uuid,
    /// Always positive; the direction comes from `kind`.
    pub amount: Money,
    pub kind: TransactionKind,
    pub category_id: Uuid,
    pub wallet_id: Uuid,
    pub date: DateTime<Utc>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub namespace: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub amount_minor: i64,
    pub kind: String,
    pub category_id: String,
    pub wallet_id: String,
    pub date: DateTimeUtc,
    pub note: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<(&Transaction, &str)> for ActiveModel {
    fn from((tx, namespace): (&Transaction, &str)) -> Self {
        Self {
            namespace: ActiveValue::Set(namespace.to_string()),
            id: ActiveValue::Set(tx.id.to_string()),
            amount_minor: ActiveValue::Set(tx.amount.cents()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            category_id: ActiveValue::Set(tx.category_id.to_string()),
            wallet_id: ActiveValue::Set(tx.wallet_id.to_string()),
            date: ActiveValue::Set(tx.date),
            note: ActiveValue::Set(tx.note.clone()),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            amount: Money::new(model.amount_minor),
            kind: TransactionKind::try_from(model.kind.as_str())?,
            category_id: parse_uuid(&model.category_id, "category")?,
            wallet_id: parse_uuid(&model.wallet_id, "wallet")?,
            date: model.date,
            note: model.note,
            created_at: model.created_at,
        })
    }
}
