//! Command structs for local writes.
//!
//! Drafts describe a record to create (the replica assigns id and
//! timestamps); patches describe which fields of an existing record change.
//! Unset patch fields keep their stored value.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Money, TransactionKind, WalletType};

/// Create a transaction.
#[derive(Clone, Debug)]
pub struct TransactionDraft {
    pub amount: Money,
    pub kind: TransactionKind,
    pub category_id: Uuid,
    pub wallet_id: Uuid,
    pub date: DateTime<Utc>,
    pub note: Option<String>,
}

impl TransactionDraft {
    #[must_use]
    pub fn new(
        kind: TransactionKind,
        amount: Money,
        category_id: Uuid,
        wallet_id: Uuid,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            amount,
            kind,
            category_id,
            wallet_id,
            date,
            note: None,
        }
    }

    #[must_use]
    pub fn income(amount: Money, category_id: Uuid, wallet_id: Uuid, date: DateTime<Utc>) -> Self {
        Self::new(TransactionKind::Income, amount, category_id, wallet_id, date)
    }

    #[must_use]
    pub fn expense(amount: Money, category_id: Uuid, wallet_id: Uuid, date: DateTime<Utc>) -> Self {
        Self::new(TransactionKind::Expense, amount, category_id, wallet_id, date)
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Change fields of a stored transaction.
#[derive(Clone, Debug, Default)]
pub struct TransactionPatch {
    pub amount: Option<Money>,
    pub kind: Option<TransactionKind>,
    pub category_id: Option<Uuid>,
    pub wallet_id: Option<Uuid>,
    pub date: Option<DateTime<Utc>>,
    /// `Some(None)` clears the note.
    pub note: Option<Option<String>>,
}

impl TransactionPatch {
    #[must_use]
    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn wallet_id(mut self, wallet_id: Uuid) -> Self {
        self.wallet_id = Some(wallet_id);
        self
    }

    #[must_use]
    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn note(mut self, note: Option<String>) -> Self {
        self.note = Some(note);
        self
    }
}

/// Create a wallet. A non-zero opening balance is recorded as a balance
/// correction.
#[derive(Clone, Debug)]
pub struct WalletDraft {
    pub name: String,
    pub wallet_type: WalletType,
    pub opening_balance: Money,
}

impl WalletDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, wallet_type: WalletType) -> Self {
        Self {
            name: name.into(),
            wallet_type,
            opening_balance: Money::ZERO,
        }
    }

    #[must_use]
    pub fn opening_balance(mut self, balance: Money) -> Self {
        self.opening_balance = balance;
        self
    }
}

/// Change descriptive fields of a wallet. The balance is not patchable, see
/// `Replica::correct_wallet_balance`.
#[derive(Clone, Debug, Default)]
pub struct WalletPatch {
    pub name: Option<String>,
    pub wallet_type: Option<WalletType>,
    pub display_order: Option<i32>,
}

impl WalletPatch {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn wallet_type(mut self, wallet_type: WalletType) -> Self {
        self.wallet_type = Some(wallet_type);
        self
    }

    #[must_use]
    pub fn display_order(mut self, display_order: i32) -> Self {
        self.display_order = Some(display_order);
        self
    }
}

#[derive(Clone, Debug)]
pub struct CategoryDraft {
    pub name: String,
    pub kind: TransactionKind,
    pub icon: String,
}

impl CategoryDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: TransactionKind, icon: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            icon: icon.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub kind: Option<TransactionKind>,
    pub icon: Option<String>,
}

impl CategoryPatch {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

#[derive(Clone, Debug)]
pub struct BudgetDraft {
    pub category_id: Uuid,
    pub amount: Money,
}

impl BudgetDraft {
    #[must_use]
    pub fn monthly(category_id: Uuid, amount: Money) -> Self {
        Self {
            category_id,
            amount,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BudgetPatch {
    pub category_id: Option<Uuid>,
    pub amount: Option<Money>,
}

impl BudgetPatch {
    #[must_use]
    pub fn category_id(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// Filters for listing transactions. Both bounds are inclusive.
#[derive(Clone, Debug, Default)]
pub struct TransactionFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub wallet_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub kind: Option<TransactionKind>,
}

impl TransactionFilter {
    pub(crate) fn matches(&self, tx: &crate::Transaction) -> bool {
        self.from.is_none_or(|from| tx.date >= from)
            && self.to.is_none_or(|to| tx.date <= to)
            && self.wallet_id.is_none_or(|id| tx.wallet_id == id)
            && self.category_id.is_none_or(|id| tx.category_id == id)
            && self.kind.is_none_or(|kind| tx.kind == kind)
    }
}
