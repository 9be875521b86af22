//! Audit log of manual wallet balance corrections.
//!
//! A correction is the only way a wallet balance moves without a transaction.
//! Each one records the delta it introduced, so
//! `balance == Σ signed(transactions) + Σ corrections.delta` holds for locally
//! authored history.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCorrection {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub previous: Money,
    pub new: Money,
    pub delta: Money,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BalanceCorrection {
    pub fn new(wallet_id: Uuid, previous: Money, new: Money, note: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            previous,
            new,
            delta: new - previous,
            note,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "balance_corrections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub namespace: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub wallet_id: String,
    pub previous_minor: i64,
    pub new_minor: i64,
    pub delta_minor: i64,
    pub note: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<(&BalanceCorrection, &str)> for ActiveModel {
    fn from((correction, namespace): (&BalanceCorrection, &str)) -> Self {
        Self {
            namespace: ActiveValue::Set(namespace.to_string()),
            id: ActiveValue::Set(correction.id.to_string()),
            wallet_id: ActiveValue::Set(correction.wallet_id.to_string()),
            previous_minor: ActiveValue::Set(correction.previous.cents()),
            new_minor: ActiveValue::Set(correction.new.cents()),
            delta_minor: ActiveValue::Set(correction.delta.cents()),
            note: ActiveValue::Set(correction.note.clone()),
            created_at: ActiveValue::Set(correction.created_at),
        }
    }
}

impl TryFrom<Model> for BalanceCorrection {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "correction")?,
            wallet_id: parse_uuid(&model.wallet_id, "wallet")?,
            previous: Money::new(model.previous_minor),
            new: Money::new(model.new_minor),
            delta: Money::new(model.delta_minor),
            note: model.note,
            created_at: model.created_at,
        })
    }
}
