//! Seed data for a fresh namespace: one cash wallet and the default category
//! taxonomy (8 expense, 5 income).

use uuid::Uuid;

use crate::{Category, TransactionKind, Wallet, WalletType};

pub const DEFAULT_WALLET_NAME: &str = "Cash";

const EXPENSE_CATEGORIES: [(&str, &str); 8] = [
    ("Food & Drink", "restaurant"),
    ("Transportation", "directions_bus"),
    ("Shopping", "shopping_bag"),
    ("Housing", "home"),
    ("Entertainment", "movie"),
    ("Health", "medical_services"),
    ("Education", "school"),
    ("Others", "more_horiz"),
];

const INCOME_CATEGORIES: [(&str, &str); 5] = [
    ("Salary", "work"),
    ("Business", "store"),
    ("Gift", "card_giftcard"),
    ("Investment", "trending_up"),
    ("Other Income", "attach_money"),
];

pub fn default_wallet() -> Wallet {
    Wallet::new(DEFAULT_WALLET_NAME.to_string(), WalletType::Cash, 0)
}

pub fn default_categories() -> Vec<Category> {
    let expenses = EXPENSE_CATEGORIES
        .iter()
        .map(|(name, icon)| (name, icon, TransactionKind::Expense));
    let incomes = INCOME_CATEGORIES
        .iter()
        .map(|(name, icon)| (name, icon, TransactionKind::Income));

    expenses
        .chain(incomes)
        .map(|(name, icon, kind)| Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind,
            icon: icon.to_string(),
        })
        .collect()
}
