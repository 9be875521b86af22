//! Derived aggregates: wallet balance deltas and budget spend.
//!
//! Pure functions, no I/O. Wallet balances are kept incrementally by applying
//! and reverting signed deltas; budget spend is never stored and is recomputed
//! from the transaction list on every read, always over the same
//! [`MonthWindow`].

use chrono::{
    DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc,
};
use uuid::Uuid;

use crate::{Money, Transaction, TransactionKind};

/// `+amount` for income, `-amount` for expenses.
pub fn signed(amount: Money, kind: TransactionKind) -> Money {
    match kind {
        TransactionKind::Income => amount,
        TransactionKind::Expense => -amount,
    }
}

/// Balance after applying a transaction of `kind`.
pub fn apply_delta(balance: Money, amount: Money, kind: TransactionKind) -> Money {
    balance + signed(amount, kind)
}

/// Balance after undoing a transaction of `kind`.
///
/// Reverting an income behaves like applying an expense and vice versa.
pub fn revert_delta(balance: Money, amount: Money, kind: TransactionKind) -> Money {
    apply_delta(balance, amount, kind.opposite())
}

/// Balance a wallet would have from its transactions alone.
pub fn derived_balance<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    wallet_id: Uuid,
) -> Money {
    transactions
        .into_iter()
        .filter(|tx| tx.wallet_id == wallet_id)
        .map(|tx| signed(tx.amount, tx.kind))
        .sum()
}

/// Calendar month bounds, `[start 00:00:00.000, end 23:59:59.999]` in the
/// configured time zone, expressed in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonthWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonthWindow {
    /// The month `now` falls in, as seen from `tz`.
    pub fn containing<Z: TimeZone>(now: DateTime<Utc>, tz: &Z) -> Self {
        let local = now.with_timezone(tz);
        let first = local.date_naive() - Days::new(u64::from(local.day0()));
        let next_first = first + Months::new(1);

        let start = local_midnight(tz, first);
        let end = local_midnight(tz, next_first) - Duration::milliseconds(1);
        Self { start, end }
    }

    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        self.start <= date && date <= self.end
    }
}

fn local_midnight<Z: TimeZone>(tz: &Z, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Sum of expense amounts in `category_id` dated inside `window`.
pub fn budget_spent<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    category_id: Uuid,
    window: &MonthWindow,
) -> Money {
    transactions
        .into_iter()
        .filter(|tx| {
            tx.category_id == category_id
                && tx.kind == TransactionKind::Expense
                && window.contains(tx.date)
        })
        .map(|tx| tx.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use chrono_tz::{Asia::Jakarta, Europe::Rome};

    use super::*;

    fn tx(amount: i64, kind: TransactionKind, category: Uuid, date: DateTime<Utc>) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            amount: Money::new(amount),
            kind,
            category_id: category,
            wallet_id: Uuid::nil(),
            date,
            note: None,
            created_at: date,
        }
    }

    #[test]
    fn revert_undoes_apply() {
        for kind in [TransactionKind::Income, TransactionKind::Expense] {
            let balance = Money::new(1_000);
            let applied = apply_delta(balance, Money::new(250), kind);
            assert_eq!(revert_delta(applied, Money::new(250), kind), balance);
        }
        assert_eq!(
            apply_delta(Money::ZERO, Money::new(5_000), TransactionKind::Expense),
            Money::new(-5_000)
        );
    }

    #[test]
    fn month_window_is_inclusive_to_the_millisecond() {
        let now = Utc.with_ymd_and_hms(2026, 2, 14, 10, 0, 0).unwrap();
        let window = MonthWindow::containing(now, &Utc);

        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(
            window.end,
            Utc.with_ymd_and_hms(2026, 2, 28, 23, 59, 59).unwrap() + Duration::milliseconds(999)
        );
        assert!(window.contains(window.end));
        assert!(!window.contains(window.end + Duration::milliseconds(1)));
    }

    #[test]
    fn month_window_wraps_december() {
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 8, 0, 0).unwrap();
        let window = MonthWindow::containing(now, &Utc);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(
            window.end + Duration::milliseconds(1),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn month_window_follows_the_local_calendar() {
        // 2026-03-31 20:00 UTC is already April 1st in Jakarta (UTC+7).
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 20, 0, 0).unwrap();
        let window = MonthWindow::containing(now, &Jakarta);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 3, 31, 17, 0, 0).unwrap());

        // Rome switches to CEST on 2026-03-29, the window still starts at local midnight.
        let window = MonthWindow::containing(now, &Rome);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 2, 28, 23, 0, 0).unwrap());
        assert_eq!(
            window.end + Duration::milliseconds(1),
            Utc.with_ymd_and_hms(2026, 3, 31, 22, 0, 0).unwrap()
        );
    }

    #[test]
    fn budget_spent_counts_only_expenses_in_month_and_category() {
        let food = Uuid::new_v4();
        let rent = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap();
        let window = MonthWindow::containing(now, &Utc);
        let in_month = Utc.with_ymd_and_hms(2026, 5, 3, 9, 0, 0).unwrap();
        let last_month = Utc.with_ymd_and_hms(2026, 4, 30, 23, 59, 59).unwrap();

        let txs = vec![
            tx(1_000, TransactionKind::Expense, food, in_month),
            tx(2_500, TransactionKind::Expense, food, window.end),
            tx(9_999, TransactionKind::Income, food, in_month),
            tx(4_000, TransactionKind::Expense, food, last_month),
            tx(7_000, TransactionKind::Expense, rent, in_month),
        ];

        let spent = budget_spent(&txs, food, &window);
        assert_eq!(spent, Money::new(3_500));
        assert_eq!(budget_spent(&txs, food, &window), spent);
    }

    #[test]
    fn derived_balance_sums_signed_amounts() {
        let wallet = Uuid::new_v4();
        let date = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut txs = vec![
            tx(10_000, TransactionKind::Income, Uuid::nil(), date),
            tx(3_000, TransactionKind::Expense, Uuid::nil(), date),
        ];
        for t in &mut txs {
            t.wallet_id = wallet;
        }
        txs.push(tx(500, TransactionKind::Expense, Uuid::nil(), date));

        assert_eq!(derived_balance(&txs, wallet), Money::new(7_000));
    }
}
