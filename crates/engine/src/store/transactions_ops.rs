use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use super::{Replica, with_tx};
use crate::{
    EngineError, ResultEngine, Transaction, TransactionDraft, TransactionFilter, TransactionPatch,
    aggregates::{apply_delta, revert_delta},
    transactions,
    util::{ensure_positive, normalize_optional_text},
};

impl Replica {
    /// Transactions matching `filter`, most recent first.
    pub async fn transactions(&self, filter: &TransactionFilter) -> ResultEngine<Vec<Transaction>> {
        let mut txs = self.transactions_in(&self.database).await?;
        txs.retain(|tx| filter.matches(tx));
        Ok(txs)
    }

    pub async fn transaction(&self, id: Uuid) -> ResultEngine<Option<Transaction>> {
        self.find_transaction_in(&self.database, id).await
    }

    /// Overwrites the whole collection. Wallet balances are left as they are.
    pub async fn set_transactions(&self, txs: Vec<Transaction>) -> ResultEngine<()> {
        with_tx!(self.database, |db_tx| {
            transactions::Entity::delete_many()
                .filter(transactions::Column::Namespace.eq(self.namespace.as_str()))
                .exec(&db_tx)
                .await?;
            self.insert_transaction_rows_in(&db_tx, &txs).await
        })
    }

    /// Creates a transaction and applies its delta to the wallet.
    pub async fn create_transaction(&self, draft: TransactionDraft) -> ResultEngine<Transaction> {
        with_tx!(self.database, |db_tx| self
            .create_transaction_in(&db_tx, draft)
            .await)
    }

    /// Updates a transaction.
    ///
    /// When amount, kind or wallet change, the stored effect is reverted on
    /// the original wallet before the new one is applied.
    pub async fn update_transaction(
        &self,
        id: Uuid,
        patch: TransactionPatch,
    ) -> ResultEngine<Transaction> {
        with_tx!(self.database, |db_tx| self
            .update_transaction_in(&db_tx, id, patch)
            .await)
    }

    /// Reverts the transaction's effect on its wallet, then removes it.
    pub async fn delete_transaction(&self, id: Uuid) -> ResultEngine<Transaction> {
        with_tx!(self.database, |db_tx| {
            self.delete_transaction_in(&db_tx, id)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("transaction".to_string()))
        })
    }

    pub(crate) async fn transactions_in<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> ResultEngine<Vec<Transaction>> {
        let mut txs = transactions::Entity::find()
            .filter(transactions::Column::Namespace.eq(self.namespace.as_str()))
            .all(db)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        txs.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(txs)
    }

    pub(crate) async fn find_transaction_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
    ) -> ResultEngine<Option<Transaction>> {
        transactions::Entity::find_by_id((self.namespace.clone(), id.to_string()))
            .one(db)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }

    pub(crate) async fn create_transaction_in<C: ConnectionTrait>(
        &self,
        db: &C,
        draft: TransactionDraft,
    ) -> ResultEngine<Transaction> {
        ensure_positive(draft.amount, "transaction")?;
        self.require_wallet_in(db, draft.wallet_id).await?;
        self.require_category_in(db, draft.category_id).await?;

        let tx = Transaction {
            id: Uuid::new_v4(),
            amount: draft.amount,
            kind: draft.kind,
            category_id: draft.category_id,
            wallet_id: draft.wallet_id,
            date: draft.date,
            note: normalize_optional_text(draft.note.as_deref()),
            created_at: Utc::now(),
        };
        self.insert_transaction_in(db, &tx).await?;
        Ok(tx)
    }

    pub(crate) async fn update_transaction_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
        patch: TransactionPatch,
    ) -> ResultEngine<Transaction> {
        let old = self
            .find_transaction_in(db, id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transaction".to_string()))?;

        let mut new = old.clone();
        if let Some(amount) = patch.amount {
            new.amount = amount;
        }
        if let Some(kind) = patch.kind {
            new.kind = kind;
        }
        if let Some(category_id) = patch.category_id {
            new.category_id = category_id;
        }
        if let Some(wallet_id) = patch.wallet_id {
            new.wallet_id = wallet_id;
        }
        if let Some(date) = patch.date {
            new.date = date;
        }
        if let Some(note) = patch.note {
            new.note = normalize_optional_text(note.as_deref());
        }

        ensure_positive(new.amount, "transaction")?;
        if new.wallet_id != old.wallet_id {
            self.require_wallet_in(db, new.wallet_id).await?;
        }
        if new.category_id != old.category_id {
            self.require_category_in(db, new.category_id).await?;
        }

        self.replace_transaction_in(db, &old, &new).await?;
        Ok(new)
    }

    /// Inserts `tx` and applies its delta. Returns `false` when the id is
    /// already stored, leaving everything untouched.
    pub(crate) async fn insert_transaction_in<C: ConnectionTrait>(
        &self,
        db: &C,
        tx: &Transaction,
    ) -> ResultEngine<bool> {
        if self.find_transaction_in(db, tx.id).await?.is_some() {
            return Ok(false);
        }
        transactions::Entity::insert(transactions::ActiveModel::from((tx, self.namespace())))
            .exec_without_returning(db)
            .await?;
        self.shift_balance_in(db, tx.wallet_id, |balance| {
            apply_delta(balance, tx.amount, tx.kind)
        })
        .await?;
        Ok(true)
    }

    /// Stores the full record `tx`, inserting or replacing by id.
    pub(crate) async fn put_transaction_in<C: ConnectionTrait>(
        &self,
        db: &C,
        tx: &Transaction,
    ) -> ResultEngine<()> {
        match self.find_transaction_in(db, tx.id).await? {
            Some(old) => self.replace_transaction_in(db, &old, tx).await,
            None => self.insert_transaction_in(db, tx).await.map(|_| ()),
        }
    }

    pub(crate) async fn delete_transaction_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
    ) -> ResultEngine<Option<Transaction>> {
        let Some(tx) = self.find_transaction_in(db, id).await? else {
            return Ok(None);
        };
        self.shift_balance_in(db, tx.wallet_id, |balance| {
            revert_delta(balance, tx.amount, tx.kind)
        })
        .await?;
        transactions::Entity::delete_by_id((self.namespace.clone(), id.to_string()))
            .exec(db)
            .await?;
        Ok(Some(tx))
    }

    async fn replace_transaction_in<C: ConnectionTrait>(
        &self,
        db: &C,
        old: &Transaction,
        new: &Transaction,
    ) -> ResultEngine<()> {
        if old == new {
            return Ok(());
        }
        transactions::ActiveModel::from((new, self.namespace()))
            .update(db)
            .await?;

        if old.amount != new.amount || old.kind != new.kind || old.wallet_id != new.wallet_id {
            // Revert against the original wallet first, it may be the same one.
            self.shift_balance_in(db, old.wallet_id, |balance| {
                revert_delta(balance, old.amount, old.kind)
            })
            .await?;
            self.shift_balance_in(db, new.wallet_id, |balance| {
                apply_delta(balance, new.amount, new.kind)
            })
            .await?;
        }
        Ok(())
    }

    pub(crate) async fn insert_transaction_rows_in<C: ConnectionTrait>(
        &self,
        db: &C,
        txs: &[Transaction],
    ) -> ResultEngine<()> {
        for tx in txs {
            transactions::Entity::insert(transactions::ActiveModel::from((tx, self.namespace())))
                .exec_without_returning(db)
                .await?;
        }
        Ok(())
    }
}
