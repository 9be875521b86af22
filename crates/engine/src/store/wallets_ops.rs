use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ActiveValue, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use super::{Replica, with_tx};
use crate::{
    BalanceCorrection, EngineError, Money, ResultEngine, Wallet, WalletDraft, WalletPatch,
    WalletUpdate,
    aggregates::derived_balance,
    balance_corrections, transactions,
    util::{normalize_optional_text, normalize_required_name},
    wallets,
};

const OPENING_BALANCE_NOTE: &str = "opening balance";

impl Replica {
    /// Wallets ordered by `display_order`.
    pub async fn wallets(&self) -> ResultEngine<Vec<Wallet>> {
        self.wallets_in(&self.database).await
    }

    pub async fn wallet(&self, id: Uuid) -> ResultEngine<Option<Wallet>> {
        self.find_wallet_in(&self.database, id).await
    }

    /// Overwrites the whole collection.
    pub async fn set_wallets(&self, wallets: Vec<Wallet>) -> ResultEngine<()> {
        with_tx!(self.database, |db_tx| {
            wallets::Entity::delete_many()
                .filter(wallets::Column::Namespace.eq(self.namespace.as_str()))
                .exec(&db_tx)
                .await?;
            self.insert_wallet_rows_in(&db_tx, &wallets).await
        })
    }

    /// Creates a wallet at the end of the display order.
    ///
    /// A non-zero opening balance is recorded as a [`BalanceCorrection`].
    pub async fn create_wallet(&self, draft: WalletDraft) -> ResultEngine<Wallet> {
        with_tx!(self.database, |db_tx| self.create_wallet_in(&db_tx, draft).await)
    }

    pub async fn update_wallet(&self, id: Uuid, patch: WalletPatch) -> ResultEngine<Wallet> {
        with_tx!(self.database, |db_tx| self
            .update_wallet_in(&db_tx, id, patch)
            .await)
    }

    /// Sets the balance of a wallet to `balance`, logging the correction.
    pub async fn correct_wallet_balance(
        &self,
        id: Uuid,
        balance: Money,
        note: Option<String>,
    ) -> ResultEngine<(Wallet, BalanceCorrection)> {
        with_tx!(self.database, |db_tx| self
            .correct_wallet_balance_in(&db_tx, id, balance, note)
            .await)
    }

    /// Corrections recorded for a wallet, oldest first.
    pub async fn balance_corrections(&self, wallet_id: Uuid) -> ResultEngine<Vec<BalanceCorrection>> {
        balance_corrections::Entity::find()
            .filter(balance_corrections::Column::Namespace.eq(self.namespace.as_str()))
            .filter(balance_corrections::Column::WalletId.eq(wallet_id.to_string()))
            .order_by_asc(balance_corrections::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(BalanceCorrection::try_from)
            .collect()
    }

    /// Puts the wallets listed in `ids` first, in that order. The others keep
    /// their relative order after them. Returns the wallets whose order changed.
    pub async fn reorder_wallets(&self, ids: &[Uuid]) -> ResultEngine<Vec<Wallet>> {
        with_tx!(self.database, |db_tx| self.reorder_wallets_in(&db_tx, ids).await)
    }

    /// Removes a wallet and its correction log. Wallets still referenced by
    /// transactions cannot be deleted.
    pub async fn delete_wallet(&self, id: Uuid) -> ResultEngine<Wallet> {
        with_tx!(self.database, |db_tx| {
            self.ensure_wallet_unused_in(&db_tx, id).await?;
            self.delete_wallet_in(&db_tx, id)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("wallet".to_string()))
        })
    }

    /// Rebuilds every balance from the stored transactions plus the logged
    /// corrections. Returns the wallets whose balance changed.
    ///
    /// Only meaningful when the full history is local: a pulled namespace
    /// holds a capped page of transactions.
    pub async fn recompute_balances(&self) -> ResultEngine<Vec<Wallet>> {
        with_tx!(self.database, |db_tx| self.recompute_balances_in(&db_tx).await)
    }

    pub(crate) async fn recompute_balances_in<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> ResultEngine<Vec<Wallet>> {
        let txs = self.transactions_in(db).await?;
        let mut corrections: HashMap<String, Money> = HashMap::new();
        for row in balance_corrections::Entity::find()
            .filter(balance_corrections::Column::Namespace.eq(self.namespace.as_str()))
            .all(db)
            .await?
        {
            *corrections.entry(row.wallet_id).or_default() += Money::new(row.delta_minor);
        }

        let mut changed = Vec::new();
        for mut wallet in self.wallets_in(db).await? {
            let corrected = corrections
                .get(&wallet.id.to_string())
                .copied()
                .unwrap_or_default();
            let balance = derived_balance(&txs, wallet.id) + corrected;
            if balance != wallet.balance {
                tracing::info!(
                    "wallet {} balance {} -> {balance}",
                    wallet.id,
                    wallet.balance
                );
                wallet.balance = balance;
                wallets::ActiveModel::from((&wallet, self.namespace()))
                    .update(db)
                    .await?;
                changed.push(wallet);
            }
        }
        Ok(changed)
    }

    pub(crate) async fn ensure_wallet_unused_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
    ) -> ResultEngine<()> {
        let linked = transactions::Entity::find()
            .filter(transactions::Column::Namespace.eq(self.namespace.as_str()))
            .filter(transactions::Column::WalletId.eq(id.to_string()))
            .count(db)
            .await?;
        if linked > 0 {
            return Err(EngineError::InvalidData(format!(
                "wallet has {linked} transactions"
            )));
        }
        Ok(())
    }

    pub(crate) async fn wallets_in<C: ConnectionTrait>(&self, db: &C) -> ResultEngine<Vec<Wallet>> {
        wallets::Entity::find()
            .filter(wallets::Column::Namespace.eq(self.namespace.as_str()))
            .order_by_asc(wallets::Column::DisplayOrder)
            .order_by_asc(wallets::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(Wallet::try_from)
            .collect()
    }

    pub(crate) async fn find_wallet_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
    ) -> ResultEngine<Option<Wallet>> {
        wallets::Entity::find_by_id((self.namespace.clone(), id.to_string()))
            .one(db)
            .await?
            .map(Wallet::try_from)
            .transpose()
    }

    pub(crate) async fn require_wallet_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
    ) -> ResultEngine<Wallet> {
        self.find_wallet_in(db, id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("wallet".to_string()))
    }

    pub(crate) async fn create_wallet_in<C: ConnectionTrait>(
        &self,
        db: &C,
        draft: WalletDraft,
    ) -> ResultEngine<Wallet> {
        let name = normalize_required_name(&draft.name, "wallet")?;
        let count = wallets::Entity::find()
            .filter(wallets::Column::Namespace.eq(self.namespace.as_str()))
            .count(db)
            .await?;
        let display_order = i32::try_from(count)
            .map_err(|_| EngineError::InvalidData("too many wallets".to_string()))?;

        let mut wallet = Wallet::new(name, draft.wallet_type, display_order);
        wallets::Entity::insert(wallets::ActiveModel::from((&wallet, self.namespace())))
            .exec_without_returning(db)
            .await?;

        if !draft.opening_balance.is_zero() {
            let (corrected, _) = self
                .correct_wallet_balance_in(
                    db,
                    wallet.id,
                    draft.opening_balance,
                    Some(OPENING_BALANCE_NOTE.to_string()),
                )
                .await?;
            wallet = corrected;
        }
        Ok(wallet)
    }

    pub(crate) async fn update_wallet_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
        patch: WalletPatch,
    ) -> ResultEngine<Wallet> {
        let mut wallet = self.require_wallet_in(db, id).await?;
        if let Some(name) = patch.name {
            wallet.name = normalize_required_name(&name, "wallet")?;
        }
        if let Some(wallet_type) = patch.wallet_type {
            wallet.wallet_type = wallet_type;
        }
        if let Some(display_order) = patch.display_order {
            wallet.display_order = display_order;
        }
        wallets::ActiveModel::from((&wallet, self.namespace()))
            .update(db)
            .await?;
        Ok(wallet)
    }

    pub(crate) async fn correct_wallet_balance_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
        balance: Money,
        note: Option<String>,
    ) -> ResultEngine<(Wallet, BalanceCorrection)> {
        let mut wallet = self.require_wallet_in(db, id).await?;
        let correction = BalanceCorrection::new(
            wallet.id,
            wallet.balance,
            balance,
            normalize_optional_text(note.as_deref()),
        );
        balance_corrections::Entity::insert(balance_corrections::ActiveModel::from((
            &correction,
            self.namespace(),
        )))
        .exec_without_returning(db)
        .await?;

        wallet.balance = balance;
        wallets::ActiveModel::from((&wallet, self.namespace()))
            .update(db)
            .await?;
        tracing::debug!(
            "wallet {} corrected by {} ({})",
            wallet.id,
            correction.delta,
            correction.note.as_deref().unwrap_or("no note")
        );
        Ok((wallet, correction))
    }

    pub(crate) async fn reorder_wallets_in<C: ConnectionTrait>(
        &self,
        db: &C,
        ids: &[Uuid],
    ) -> ResultEngine<Vec<Wallet>> {
        let mut current = self.wallets_in(db).await?;
        let mut ordered = Vec::with_capacity(current.len());
        for id in ids {
            let Some(pos) = current.iter().position(|w| w.id == *id) else {
                if ordered.iter().any(|w: &Wallet| w.id == *id) {
                    continue;
                }
                return Err(EngineError::KeyNotFound("wallet".to_string()));
            };
            ordered.push(current.remove(pos));
        }
        ordered.append(&mut current);

        let mut changed = Vec::new();
        for (index, mut wallet) in ordered.into_iter().enumerate() {
            let display_order = i32::try_from(index)
                .map_err(|_| EngineError::InvalidData("too many wallets".to_string()))?;
            if wallet.display_order != display_order {
                wallet.display_order = display_order;
                wallets::ActiveModel::from((&wallet, self.namespace()))
                    .update(db)
                    .await?;
                changed.push(wallet);
            }
        }
        Ok(changed)
    }

    /// Inserts `wallet` when the replica lacks it. A stored row only takes
    /// the descriptive fields: its balance already counts every transaction
    /// the replica holds.
    pub(crate) async fn put_wallet_in<C: ConnectionTrait>(
        &self,
        db: &C,
        wallet: &Wallet,
    ) -> ResultEngine<()> {
        match self.find_wallet_in(db, wallet.id).await? {
            Some(mut stored) => {
                stored.name.clone_from(&wallet.name);
                stored.wallet_type = wallet.wallet_type;
                stored.display_order = wallet.display_order;
                self.store_wallet_in(db, &stored).await
            }
            None => {
                wallets::Entity::insert(wallets::ActiveModel::from((wallet, self.namespace())))
                    .exec_without_returning(db)
                    .await?;
                Ok(())
            }
        }
    }

    /// Applies a queued wallet update to the stored row. The balance moves
    /// only for corrections; a wallet the replica no longer holds is skipped.
    pub(crate) async fn apply_wallet_update_in<C: ConnectionTrait>(
        &self,
        db: &C,
        update: &WalletUpdate,
    ) -> ResultEngine<()> {
        let Some(mut stored) = self.find_wallet_in(db, update.wallet.id).await? else {
            tracing::debug!("wallet {} not in {}, update skipped", update.wallet.id, self.namespace);
            return Ok(());
        };
        stored.name.clone_from(&update.wallet.name);
        stored.wallet_type = update.wallet.wallet_type;
        stored.display_order = update.wallet.display_order;
        if update.sets_balance {
            stored.balance = update.wallet.balance;
        }
        self.store_wallet_in(db, &stored).await
    }

    async fn store_wallet_in<C: ConnectionTrait>(&self, db: &C, wallet: &Wallet) -> ResultEngine<()> {
        wallets::ActiveModel::from((wallet, self.namespace()))
            .update(db)
            .await?;
        Ok(())
    }

    pub(crate) async fn delete_wallet_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
    ) -> ResultEngine<Option<Wallet>> {
        let Some(wallet) = self.find_wallet_in(db, id).await? else {
            return Ok(None);
        };
        balance_corrections::Entity::delete_many()
            .filter(balance_corrections::Column::Namespace.eq(self.namespace.as_str()))
            .filter(balance_corrections::Column::WalletId.eq(id.to_string()))
            .exec(db)
            .await?;
        wallets::Entity::delete_by_id((self.namespace.clone(), id.to_string()))
            .exec(db)
            .await?;
        Ok(Some(wallet))
    }

    /// Moves a wallet balance through `shift`. A missing wallet is left alone:
    /// the transaction may reference a wallet the replica does not hold.
    pub(crate) async fn shift_balance_in<C, F>(
        &self,
        db: &C,
        wallet_id: Uuid,
        shift: F,
    ) -> ResultEngine<()>
    where
        C: ConnectionTrait,
        F: FnOnce(Money) -> Money,
    {
        let Some(model) = wallets::Entity::find_by_id((self.namespace.clone(), wallet_id.to_string()))
            .one(db)
            .await?
        else {
            tracing::debug!("wallet {wallet_id} not in {}, balance untouched", self.namespace);
            return Ok(());
        };
        let balance = shift(Money::new(model.balance));
        let mut active: wallets::ActiveModel = model.into();
        active.balance = ActiveValue::Set(balance.cents());
        active.update(db).await?;
        Ok(())
    }

    pub(crate) async fn insert_wallet_rows_in<C: ConnectionTrait>(
        &self,
        db: &C,
        wallets: &[Wallet],
    ) -> ResultEngine<()> {
        for wallet in wallets {
            wallets::Entity::insert(wallets::ActiveModel::from((wallet, self.namespace())))
                .exec_without_returning(db)
                .await?;
        }
        Ok(())
    }
}
