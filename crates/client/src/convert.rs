//! Mapping between engine records and their wire form.

use api_types::{
    budget::{self, BudgetRecord},
    category::CategoryRecord,
    sync::{Entity, SnapshotResponse, WriteOp, WritePayload, WriteRequest},
    transaction::{self, TransactionRecord},
    wallet::{self, WalletRecord, WalletWrite},
};
use engine::{
    Budget, BudgetPeriod, Category, EntityKind, Money, Mutation, Snapshot, Transaction,
    TransactionKind, Wallet, WalletType, WalletUpdate,
};

fn kind_to_wire(kind: TransactionKind) -> transaction::TransactionKind {
    match kind {
        TransactionKind::Income => transaction::TransactionKind::Income,
        TransactionKind::Expense => transaction::TransactionKind::Expense,
    }
}

fn kind_from_wire(kind: transaction::TransactionKind) -> TransactionKind {
    match kind {
        transaction::TransactionKind::Income => TransactionKind::Income,
        transaction::TransactionKind::Expense => TransactionKind::Expense,
    }
}

fn wallet_type_to_wire(wallet_type: WalletType) -> wallet::WalletType {
    match wallet_type {
        WalletType::Cash => wallet::WalletType::Cash,
        WalletType::Bank => wallet::WalletType::Bank,
        WalletType::EWallet => wallet::WalletType::EWallet,
    }
}

fn wallet_type_from_wire(wallet_type: wallet::WalletType) -> WalletType {
    match wallet_type {
        wallet::WalletType::Cash => WalletType::Cash,
        wallet::WalletType::Bank => WalletType::Bank,
        wallet::WalletType::EWallet => WalletType::EWallet,
    }
}

pub(crate) fn transaction_to_wire(tx: &Transaction) -> TransactionRecord {
    TransactionRecord {
        id: tx.id,
        amount_minor: tx.amount.into(),
        kind: kind_to_wire(tx.kind),
        category_id: tx.category_id,
        wallet_id: tx.wallet_id,
        date: tx.date,
        note: tx.note.clone(),
        created_at: tx.created_at,
    }
}

pub(crate) fn transaction_from_wire(record: TransactionRecord) -> Transaction {
    Transaction {
        id: record.id,
        amount: Money::new(record.amount_minor),
        kind: kind_from_wire(record.kind),
        category_id: record.category_id,
        wallet_id: record.wallet_id,
        date: record.date,
        note: record.note,
        created_at: record.created_at,
    }
}

/// `balance` is sent only when the remote must take it.
pub(crate) fn wallet_write(wallet: &Wallet, balance: Option<Money>) -> WalletWrite {
    WalletWrite {
        id: wallet.id,
        name: wallet.name.clone(),
        wallet_type: wallet_type_to_wire(wallet.wallet_type),
        balance_minor: balance.map(i64::from),
        display_order: wallet.display_order,
        created_at: wallet.created_at,
    }
}

pub(crate) fn wallet_from_wire(record: WalletRecord) -> Wallet {
    Wallet {
        id: record.id,
        name: record.name,
        wallet_type: wallet_type_from_wire(record.wallet_type),
        balance: Money::new(record.balance_minor),
        display_order: record.display_order,
        created_at: record.created_at,
    }
}

pub(crate) fn category_to_wire(category: &Category) -> CategoryRecord {
    CategoryRecord {
        id: category.id,
        name: category.name.clone(),
        kind: kind_to_wire(category.kind),
        icon: category.icon.clone(),
    }
}

pub(crate) fn category_from_wire(record: CategoryRecord) -> Category {
    Category {
        id: record.id,
        name: record.name,
        kind: kind_from_wire(record.kind),
        icon: record.icon,
    }
}

pub(crate) fn budget_to_wire(budget: &Budget) -> BudgetRecord {
    BudgetRecord {
        id: budget.id,
        category_id: budget.category_id,
        amount_minor: budget.amount.into(),
        period: match budget.period {
            BudgetPeriod::Monthly => budget::BudgetPeriod::Monthly,
        },
        created_at: budget.created_at,
    }
}

pub(crate) fn budget_from_wire(record: BudgetRecord) -> Budget {
    Budget {
        id: record.id,
        category_id: record.category_id,
        amount: Money::new(record.amount_minor),
        period: match record.period {
            budget::BudgetPeriod::Monthly => BudgetPeriod::Monthly,
        },
        created_at: record.created_at,
    }
}

pub(crate) fn write_request(mutation: &Mutation) -> WriteRequest {
    let entity = match mutation.entity_kind() {
        EntityKind::Transaction => Entity::Transaction,
        EntityKind::Wallet => Entity::Wallet,
        EntityKind::Category => Entity::Category,
        EntityKind::Budget => Entity::Budget,
    };
    let op = match mutation.op() {
        engine::WriteOp::Create => WriteOp::Create,
        engine::WriteOp::Update => WriteOp::Update,
        engine::WriteOp::Delete => WriteOp::Delete,
    };
    let payload = match mutation {
        Mutation::CreateTransaction(tx) | Mutation::UpdateTransaction(tx) => {
            WritePayload::Transaction(transaction_to_wire(tx))
        }
        Mutation::CreateWallet(wallet) => {
            WritePayload::Wallet(wallet_write(wallet, Some(wallet.balance)))
        }
        Mutation::UpdateWallet(WalletUpdate {
            wallet,
            sets_balance,
        }) => WritePayload::Wallet(wallet_write(
            wallet,
            sets_balance.then_some(wallet.balance),
        )),
        Mutation::CreateCategory(category) | Mutation::UpdateCategory(category) => {
            WritePayload::Category(category_to_wire(category))
        }
        Mutation::CreateBudget(budget) | Mutation::UpdateBudget(budget) => {
            WritePayload::Budget(budget_to_wire(budget))
        }
        Mutation::DeleteTransaction { id }
        | Mutation::DeleteWallet { id }
        | Mutation::DeleteCategory { id }
        | Mutation::DeleteBudget { id } => WritePayload::Id { id: *id },
    };

    WriteRequest { entity, op, payload }
}

pub(crate) fn snapshot_from_wire(response: SnapshotResponse) -> Snapshot {
    Snapshot {
        transactions: response
            .transactions
            .into_iter()
            .map(transaction_from_wire)
            .collect(),
        wallets: response.wallets.into_iter().map(wallet_from_wire).collect(),
        categories: response
            .categories
            .into_iter()
            .map(category_from_wire)
            .collect(),
        budgets: response.budgets.into_iter().map(budget_from_wire).collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn mutations_map_to_entity_and_op() {
        let wallet = Wallet::new("Bank".to_string(), WalletType::Bank, 1);
        let request = write_request(&Mutation::UpdateWallet(WalletUpdate::details(
            wallet.clone(),
        )));
        assert_eq!(request.entity, Entity::Wallet);
        assert_eq!(request.op, WriteOp::Update);
        assert_eq!(request.payload, WritePayload::Wallet(wallet_write(&wallet, None)));

        let id = Uuid::new_v4();
        let request = write_request(&Mutation::DeleteCategory { id });
        assert_eq!(request.entity, Entity::Category);
        assert_eq!(request.op, WriteOp::Delete);
        assert_eq!(request.payload, WritePayload::Id { id });
    }

    #[test]
    fn only_balance_writes_carry_a_balance() {
        let mut wallet = Wallet::new("GoPay".to_string(), WalletType::EWallet, 2);
        wallet.balance = Money::new(75_000);

        let balance_of = |mutation: Mutation| match write_request(&mutation).payload {
            WritePayload::Wallet(write) => write.balance_minor,
            other => panic!("unexpected payload {other:?}"),
        };
        assert_eq!(
            balance_of(Mutation::UpdateWallet(WalletUpdate::details(wallet.clone()))),
            None
        );
        assert_eq!(
            balance_of(Mutation::UpdateWallet(WalletUpdate::balance(wallet.clone()))),
            Some(75_000)
        );
        assert_eq!(balance_of(Mutation::CreateWallet(wallet)), Some(75_000));
    }

    #[test]
    fn amounts_travel_in_minor_units() {
        let tx = Transaction {
            id: Uuid::new_v4(),
            amount: Money::new(12_345),
            kind: TransactionKind::Expense,
            category_id: Uuid::new_v4(),
            wallet_id: Uuid::new_v4(),
            date: Utc::now(),
            note: Some("lunch".to_string()),
            created_at: Utc::now(),
        };
        let record = transaction_to_wire(&tx);
        assert_eq!(record.amount_minor, 12_345);
        assert_eq!(transaction_from_wire(record), tx);
    }
}
