use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::Replica;
use crate::{Money, ResultEngine, Transaction, TransactionKind, aggregates::MonthWindow};

const RECENT_TRANSACTIONS: usize = 5;

/// Expense total of one category over a month.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category_id: Uuid,
    pub category_name: Option<String>,
    pub total: Money,
}

/// Dashboard figures for one month.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub window: (DateTime<Utc>, DateTime<Utc>),
    pub total_balance: Money,
    pub income: Money,
    pub expense: Money,
    /// Largest first.
    pub expenses_by_category: Vec<CategoryTotal>,
    pub recent: Vec<Transaction>,
}

impl Replica {
    pub async fn summary(&self) -> ResultEngine<Summary> {
        self.summary_at(Utc::now()).await
    }

    pub async fn summary_at(&self, now: DateTime<Utc>) -> ResultEngine<Summary> {
        let window = MonthWindow::containing(now, &self.timezone);
        let wallets = self.wallets_in(&self.database).await?;
        let categories = self.categories_in(&self.database).await?;
        let txs = self.transactions_in(&self.database).await?;

        let mut income = Money::ZERO;
        let mut expense = Money::ZERO;
        let mut by_category: HashMap<Uuid, Money> = HashMap::new();
        for tx in txs.iter().filter(|tx| window.contains(tx.date)) {
            match tx.kind {
                TransactionKind::Income => income += tx.amount,
                TransactionKind::Expense => {
                    expense += tx.amount;
                    *by_category.entry(tx.category_id).or_default() += tx.amount;
                }
            }
        }

        let mut expenses_by_category: Vec<CategoryTotal> = by_category
            .into_iter()
            .map(|(category_id, total)| CategoryTotal {
                category_id,
                category_name: categories
                    .iter()
                    .find(|c| c.id == category_id)
                    .map(|c| c.name.clone()),
                total,
            })
            .collect();
        expenses_by_category.sort_by(|a, b| {
            b.total
                .cmp(&a.total)
                .then_with(|| a.category_name.cmp(&b.category_name))
        });

        Ok(Summary {
            window: (window.start, window.end),
            total_balance: wallets.iter().map(|w| w.balance).sum(),
            income,
            expense,
            expenses_by_category,
            recent: txs.into_iter().take(RECENT_TRANSACTIONS).collect(),
        })
    }
}
