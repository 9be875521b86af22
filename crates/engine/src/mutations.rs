//! Write intents recorded for remote replay.
//!
//! A [`Mutation`] always carries the full record it produced (never a diff),
//! so replaying it is idempotent by entity id. Deletes only need the id.
//!
//! Wallet balances are the exception: a balance is a running total owned by
//! whoever holds the transactions, so only an explicit [`WalletUpdate`]
//! correction asks the receiver to take it.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Budget, Category, EngineError, ResultEngine, Transaction, Wallet, util::parse_uuid};

/// The four replicated entity kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Transaction,
    Wallet,
    Category,
    Budget,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transaction => "transaction",
            Self::Wallet => "wallet",
            Self::Category => "category",
            Self::Budget => "budget",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOp {
    Create,
    Update,
    Delete,
}

impl WriteOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A wallet update as queued.
///
/// `wallet` is the full record after the write. Unless `sets_balance` is set
/// the receiver keeps its own balance and only takes name, type and order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletUpdate {
    #[serde(flatten)]
    pub wallet: Wallet,
    #[serde(default)]
    pub sets_balance: bool,
}

impl WalletUpdate {
    /// Name, type or display order changed.
    pub fn details(wallet: Wallet) -> Self {
        Self {
            wallet,
            sets_balance: false,
        }
    }

    /// The balance was corrected or rebuilt and must be taken as is.
    pub fn balance(wallet: Wallet) -> Self {
        Self {
            wallet,
            sets_balance: true,
        }
    }
}

/// Closed set of the twelve queueable writes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mutation {
    CreateTransaction(Transaction),
    UpdateTransaction(Transaction),
    DeleteTransaction { id: Uuid },
    CreateWallet(Wallet),
    UpdateWallet(WalletUpdate),
    DeleteWallet { id: Uuid },
    CreateCategory(Category),
    UpdateCategory(Category),
    DeleteCategory { id: Uuid },
    CreateBudget(Budget),
    UpdateBudget(Budget),
    DeleteBudget { id: Uuid },
}

impl Mutation {
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Self::CreateTransaction(_) | Self::UpdateTransaction(_) | Self::DeleteTransaction { .. } => {
                EntityKind::Transaction
            }
            Self::CreateWallet(_) | Self::UpdateWallet(_) | Self::DeleteWallet { .. } => {
                EntityKind::Wallet
            }
            Self::CreateCategory(_) | Self::UpdateCategory(_) | Self::DeleteCategory { .. } => {
                EntityKind::Category
            }
            Self::CreateBudget(_) | Self::UpdateBudget(_) | Self::DeleteBudget { .. } => {
                EntityKind::Budget
            }
        }
    }

    pub fn op(&self) -> WriteOp {
        match self {
            Self::CreateTransaction(_)
            | Self::CreateWallet(_)
            | Self::CreateCategory(_)
            | Self::CreateBudget(_) => WriteOp::Create,
            Self::UpdateTransaction(_)
            | Self::UpdateWallet(_)
            | Self::UpdateCategory(_)
            | Self::UpdateBudget(_) => WriteOp::Update,
            Self::DeleteTransaction { .. }
            | Self::DeleteWallet { .. }
            | Self::DeleteCategory { .. }
            | Self::DeleteBudget { .. } => WriteOp::Delete,
        }
    }

    /// Id of the entity this write targets.
    pub fn entity_id(&self) -> Uuid {
        match self {
            Self::CreateTransaction(tx) | Self::UpdateTransaction(tx) => tx.id,
            Self::CreateWallet(wallet) => wallet.id,
            Self::UpdateWallet(update) => update.wallet.id,
            Self::CreateCategory(category) | Self::UpdateCategory(category) => category.id,
            Self::CreateBudget(budget) | Self::UpdateBudget(budget) => budget.id,
            Self::DeleteTransaction { id }
            | Self::DeleteWallet { id }
            | Self::DeleteCategory { id }
            | Self::DeleteBudget { id } => *id,
        }
    }

    /// Queue label, e.g. `CREATE_TRANSACTION`.
    pub fn label(&self) -> String {
        format!(
            "{}_{}",
            self.op().as_str().to_uppercase(),
            self.entity_kind().as_str().to_uppercase()
        )
    }
}

/// One queued write, as stored in the mutation queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub id: Uuid,
    pub mutation: Mutation,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: i32,
    /// Remote user id the write was authored under.
    pub owner: String,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "mutations")]
pub struct Model {
    /// Enqueue order. Drain order is strictly ascending `seq`.
    #[sea_orm(primary_key)]
    pub seq: i64,
    #[sea_orm(unique)]
    pub id: String,
    pub kind: String,
    pub payload: Json,
    pub owner: String,
    pub enqueued_at: DateTimeUtc,
    pub retry_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl MutationRecord {
    pub(crate) fn to_active_model(&self) -> ResultEngine<ActiveModel> {
        Ok(ActiveModel {
            seq: ActiveValue::NotSet,
            id: ActiveValue::Set(self.id.to_string()),
            kind: ActiveValue::Set(self.mutation.label()),
            payload: ActiveValue::Set(serde_json::to_value(&self.mutation)?),
            owner: ActiveValue::Set(self.owner.clone()),
            enqueued_at: ActiveValue::Set(self.enqueued_at),
            retry_count: ActiveValue::Set(self.retry_count),
        })
    }
}

impl TryFrom<Model> for MutationRecord {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "mutation")?,
            mutation: serde_json::from_value(model.payload)?,
            enqueued_at: model.enqueued_at,
            retry_count: model.retry_count,
            owner: model.owner,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{Money, TransactionKind};

    fn transaction() -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            amount: Money::new(5000),
            kind: TransactionKind::Expense,
            category_id: Uuid::new_v4(),
            wallet_id: Uuid::new_v4(),
            date: Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap(),
            note: Some(String::from("lunch")),
            created_at: Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn mutation_is_tagged_with_queue_label() {
        let tx = transaction();
        let value = serde_json::to_value(Mutation::CreateTransaction(tx.clone())).unwrap();
        assert_eq!(value["type"], "CREATE_TRANSACTION");
        assert_eq!(value["payload"]["amount"], 5000);

        let back: Mutation = serde_json::from_value(value).unwrap();
        assert_eq!(back, Mutation::CreateTransaction(tx));
    }

    #[test]
    fn delete_carries_only_the_id() {
        let id = Uuid::new_v4();
        let mutation = Mutation::DeleteBudget { id };
        let value = serde_json::to_value(&mutation).unwrap();
        assert_eq!(value["type"], "DELETE_BUDGET");
        assert_eq!(value["payload"]["id"], id.to_string());
        assert_eq!(mutation.entity_id(), id);
    }

    #[test]
    fn label_matches_serde_tag() {
        let tx = transaction();
        let cases = [
            Mutation::UpdateTransaction(tx.clone()),
            Mutation::DeleteWallet { id: tx.wallet_id },
            Mutation::DeleteCategory { id: tx.category_id },
        ];
        for mutation in cases {
            let value = serde_json::to_value(&mutation).unwrap();
            assert_eq!(value["type"], mutation.label());
        }
    }

    #[test]
    fn wallet_update_flags_balance_writes() {
        let wallet = Wallet::new("Bank".to_string(), crate::WalletType::Bank, 1);
        let value = serde_json::to_value(Mutation::UpdateWallet(WalletUpdate::details(
            wallet.clone(),
        )))
        .unwrap();
        assert_eq!(value["type"], "UPDATE_WALLET");
        assert_eq!(value["payload"]["name"], "Bank");
        assert_eq!(value["payload"]["sets_balance"], false);

        let back: Mutation = serde_json::from_value(value).unwrap();
        assert_eq!(back.entity_id(), wallet.id);
        assert_eq!(back, Mutation::UpdateWallet(WalletUpdate::details(wallet)));
    }

    #[test]
    fn kind_and_op_split() {
        let mutation = Mutation::UpdateTransaction(transaction());
        assert_eq!(mutation.entity_kind(), EntityKind::Transaction);
        assert_eq!(mutation.op(), WriteOp::Update);
    }
}
