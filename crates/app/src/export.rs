//! CSV export of transactions.

use std::{collections::HashMap, io};

use chrono_tz::Tz;
use engine::Transaction;
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct Row<'a> {
    pub id: Uuid,
    pub date: String,
    pub kind: &'static str,
    pub amount: String,
    pub category: &'a str,
    pub wallet: &'a str,
    pub note: &'a str,
}

/// One row per transaction, dates on the `timezone` wall clock.
pub fn rows<'a>(
    txs: &'a [Transaction],
    wallets: &'a HashMap<Uuid, String>,
    categories: &'a HashMap<Uuid, String>,
    timezone: &Tz,
) -> Vec<Row<'a>> {
    txs.iter()
        .map(|tx| Row {
            id: tx.id,
            date: tx
                .date
                .with_timezone(timezone)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            kind: tx.kind.as_str(),
            amount: tx.amount.to_string(),
            category: categories.get(&tx.category_id).map_or("", String::as_str),
            wallet: wallets.get(&tx.wallet_id).map_or("", String::as_str),
            note: tx.note.as_deref().unwrap_or_default(),
        })
        .collect()
}

/// Writes a header and `rows`, returns how many rows were written.
pub fn write_csv<W: io::Write>(writer: W, rows: &[Row<'_>]) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use engine::{Money, TransactionKind};

    use super::*;

    #[test]
    fn rows_use_names_and_local_dates() {
        let wallet = Uuid::new_v4();
        let category = Uuid::new_v4();
        let tx = Transaction {
            id: Uuid::nil(),
            amount: Money::new(4_250),
            kind: TransactionKind::Expense,
            category_id: category,
            wallet_id: wallet,
            date: Utc.with_ymd_and_hms(2026, 1, 31, 20, 30, 0).unwrap(),
            note: Some("dinner, with friends".to_string()),
            created_at: Utc::now(),
        };
        let wallets = HashMap::from([(wallet, "Cash".to_string())]);
        let categories = HashMap::from([(category, "Food".to_string())]);

        let txs = [tx];
        let rows = rows(&txs, &wallets, &categories, &chrono_tz::Asia::Jakarta);
        let mut out = Vec::new();
        assert_eq!(write_csv(&mut out, &rows).unwrap(), 1);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "id,date,kind,amount,category,wallet,note\n\
             00000000-0000-0000-0000-000000000000,2026-02-01 03:30,EXPENSE,42.50,Food,Cash,\"dinner, with friends\"\n"
        );
    }
}
