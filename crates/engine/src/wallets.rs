//! The module contains `Wallet` struct and its storage model.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletType {
    Cash,
    Bank,
    EWallet,
}

impl WalletType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Bank => "BANK",
            Self::EWallet => "E_WALLET",
        }
    }
}

impl TryFrom<&str> for WalletType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "CASH" => Ok(Self::Cash),
            "BANK" => Ok(Self::Bank),
            "E_WALLET" => Ok(Self::EWallet),
            other => Err(EngineError::InvalidData(format!(
                "invalid wallet type: {other}"
            ))),
        }
    }
}

/// A wallet.
///
/// A wallet is a representation of a real wallet, a bank account or an
/// e-money account: anywhere money is kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub name: String,
    pub wallet_type: WalletType,
    /// Running total of the wallet's transactions plus recorded corrections.
    ///
    /// Only transaction deltas and [`BalanceCorrection`]s move it locally; a
    /// pull adopts whatever the remote reports.
    ///
    /// [`BalanceCorrection`]: crate::BalanceCorrection
    pub balance: Money,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(name: String, wallet_type: WalletType, display_order: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            wallet_type,
            balance: Money::ZERO,
            display_order,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub namespace: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub wallet_type: String,
    pub balance: i64,
    pub display_order: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<(&Wallet, &str)> for ActiveModel {
    fn from((wallet, namespace): (&Wallet, &str)) -> Self {
        Self {
            namespace: ActiveValue::Set(namespace.to_string()),
            id: ActiveValue::Set(wallet.id.to_string()),
            name: ActiveValue::Set(wallet.name.clone()),
            wallet_type: ActiveValue::Set(wallet.wallet_type.as_str().to_string()),
            balance: ActiveValue::Set(wallet.balance.cents()),
            display_order: ActiveValue::Set(wallet.display_order),
            created_at: ActiveValue::Set(wallet.created_at),
        }
    }
}

impl TryFrom<Model> for Wallet {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "wallet")?,
            name: model.name,
            wallet_type: WalletType::try_from(model.wallet_type.as_str())?,
            balance: Money::new(model.balance),
            display_order: model.display_order,
            created_at: model.created_at,
        })
    }
}
