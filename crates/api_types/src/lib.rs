//! Wire types exchanged with the remote authority.
//!
//! Amounts travel as integer minor units (`amount_minor`), timestamps as
//! RFC3339 strings and ids as UUID strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of every non-success response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum TransactionKind {
        Income,
        Expense,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TransactionRecord {
        pub id: Uuid,
        /// Always positive; the sign comes from `kind`.
        pub amount_minor: i64,
        pub kind: TransactionKind,
        pub category_id: Uuid,
        pub wallet_id: Uuid,
        pub date: DateTime<Utc>,
        pub note: Option<String>,
        pub created_at: DateTime<Utc>,
    }
}

pub mod wallet {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum WalletType {
        Cash,
        Bank,
        EWallet,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct WalletRecord {
        pub id: Uuid,
        pub name: String,
        #[serde(rename = "type")]
        pub wallet_type: WalletType,
        pub balance_minor: i64,
        pub display_order: i32,
        pub created_at: DateTime<Utc>,
    }

    /// A wallet as written by a client. Without `balance_minor` the remote
    /// keeps the balance it holds; creates and balance corrections send one.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct WalletWrite {
        pub id: Uuid,
        pub name: String,
        #[serde(rename = "type")]
        pub wallet_type: WalletType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub balance_minor: Option<i64>,
        pub display_order: i32,
        pub created_at: DateTime<Utc>,
    }
}

pub mod category {
    use super::*;
    use crate::transaction::TransactionKind;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CategoryRecord {
        pub id: Uuid,
        pub name: String,
        #[serde(rename = "type")]
        pub kind: TransactionKind,
        pub icon: String,
    }
}

pub mod budget {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum BudgetPeriod {
        #[default]
        Monthly,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BudgetRecord {
        pub id: Uuid,
        pub category_id: Uuid,
        pub amount_minor: i64,
        #[serde(default)]
        pub period: BudgetPeriod,
        pub created_at: DateTime<Utc>,
    }
}

pub mod sync {
    use super::*;
    use crate::{
        budget::BudgetRecord,
        category::CategoryRecord,
        transaction::TransactionRecord,
        wallet::{WalletRecord, WalletWrite},
    };

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Entity {
        Transaction,
        Wallet,
        Category,
        Budget,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum WriteOp {
        Create,
        Update,
        Delete,
    }

    /// Full record for creates and updates, just the id for deletes.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum WritePayload {
        Transaction(TransactionRecord),
        Wallet(WalletWrite),
        Category(CategoryRecord),
        Budget(BudgetRecord),
        Id { id: Uuid },
    }

    /// One replayed mutation.
    ///
    /// Creates are idempotent by `payload.id`: a repeated create of an
    /// existing id answers success without writing again.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct WriteRequest {
        pub entity: Entity,
        pub op: WriteOp,
        pub payload: WritePayload,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SnapshotQuery {
        pub transaction_limit: u32,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct SnapshotResponse {
        /// Newest first.
        #[serde(default)]
        pub transactions: Vec<TransactionRecord>,
        #[serde(default)]
        pub wallets: Vec<WalletRecord>,
        #[serde(default)]
        pub categories: Vec<CategoryRecord>,
        #[serde(default)]
        pub budgets: Vec<BudgetRecord>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WalletsResponse {
        pub wallets: Vec<WalletRecord>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoriesResponse {
        pub categories: Vec<CategoryRecord>,
    }
}
