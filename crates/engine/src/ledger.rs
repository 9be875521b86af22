//! The write path used by hosts.
//!
//! Every write lands in the replica first. For an authenticated identity the
//! full resulting record is queued in the same database transaction, then a
//! background push is started. The caller sees the local outcome only.

use sea_orm::{DatabaseTransaction, TransactionTrait};
use uuid::Uuid;

use crate::{
    BalanceCorrection, Budget, BudgetDraft, BudgetPatch, Category, CategoryDraft, CategoryPatch,
    EngineError, Identity, Money, Mutation, Replica, ResultEngine, SyncCoordinator, Transaction,
    TransactionDraft, TransactionPatch, Wallet, WalletDraft, WalletPatch, WalletUpdate,
    queue::enqueue_in,
    remote::RemoteAuthority,
};

/// An open local write: the acting identity, its replica and the database
/// transaction both the replica change and the queue entries go through.
struct PendingWrite {
    identity: Identity,
    replica: Replica,
    db_tx: DatabaseTransaction,
}

pub struct Ledger<R> {
    coordinator: SyncCoordinator<R>,
}

impl<R> Clone for Ledger<R> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
        }
    }
}

impl<R: RemoteAuthority> Ledger<R> {
    pub fn new(coordinator: SyncCoordinator<R>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &SyncCoordinator<R> {
        &self.coordinator
    }

    pub fn identity(&self) -> Identity {
        self.coordinator.current_identity()
    }

    /// Read view of the acting identity's namespace.
    pub fn replica(&self) -> Replica {
        self.coordinator.store().replica(&self.identity())
    }

    pub async fn create_transaction(&self, draft: TransactionDraft) -> ResultEngine<Transaction> {
        let write = self.begin().await?;
        let tx = write
            .replica
            .create_transaction_in(&write.db_tx, draft)
            .await?;
        self.commit(write, vec![Mutation::CreateTransaction(tx.clone())])
            .await?;
        Ok(tx)
    }

    pub async fn update_transaction(
        &self,
        id: Uuid,
        patch: TransactionPatch,
    ) -> ResultEngine<Transaction> {
        let write = self.begin().await?;
        let tx = write
            .replica
            .update_transaction_in(&write.db_tx, id, patch)
            .await?;
        self.commit(write, vec![Mutation::UpdateTransaction(tx.clone())])
            .await?;
        Ok(tx)
    }

    pub async fn delete_transaction(&self, id: Uuid) -> ResultEngine<Transaction> {
        let write = self.begin().await?;
        let tx = write
            .replica
            .delete_transaction_in(&write.db_tx, id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transaction".to_string()))?;
        self.commit(write, vec![Mutation::DeleteTransaction { id }])
            .await?;
        Ok(tx)
    }

    pub async fn create_wallet(&self, draft: WalletDraft) -> ResultEngine<Wallet> {
        let write = self.begin().await?;
        let wallet = write.replica.create_wallet_in(&write.db_tx, draft).await?;
        self.commit(write, vec![Mutation::CreateWallet(wallet.clone())])
            .await?;
        Ok(wallet)
    }

    pub async fn update_wallet(&self, id: Uuid, patch: WalletPatch) -> ResultEngine<Wallet> {
        let write = self.begin().await?;
        let wallet = write
            .replica
            .update_wallet_in(&write.db_tx, id, patch)
            .await?;
        self.commit(
            write,
            vec![Mutation::UpdateWallet(WalletUpdate::details(wallet.clone()))],
        )
            .await?;
        Ok(wallet)
    }

    /// Manual balance correction, mirrored remotely as a wallet update that
    /// sets the balance.
    pub async fn correct_wallet_balance(
        &self,
        id: Uuid,
        balance: Money,
        note: Option<String>,
    ) -> ResultEngine<(Wallet, BalanceCorrection)> {
        let write = self.begin().await?;
        let (wallet, correction) = write
            .replica
            .correct_wallet_balance_in(&write.db_tx, id, balance, note)
            .await?;
        self.commit(
            write,
            vec![Mutation::UpdateWallet(WalletUpdate::balance(wallet.clone()))],
        )
            .await?;
        Ok((wallet, correction))
    }

    /// Every wallet whose position changed is queued as an update.
    pub async fn reorder_wallets(&self, ids: &[Uuid]) -> ResultEngine<Vec<Wallet>> {
        let write = self.begin().await?;
        let changed = write.replica.reorder_wallets_in(&write.db_tx, ids).await?;
        let mutations = changed
            .iter()
            .cloned()
            .map(|wallet| Mutation::UpdateWallet(WalletUpdate::details(wallet)))
            .collect();
        self.commit(write, mutations).await?;
        Ok(changed)
    }

    pub async fn delete_wallet(&self, id: Uuid) -> ResultEngine<Wallet> {
        let write = self.begin().await?;
        write
            .replica
            .ensure_wallet_unused_in(&write.db_tx, id)
            .await?;
        let wallet = write
            .replica
            .delete_wallet_in(&write.db_tx, id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("wallet".to_string()))?;
        self.commit(write, vec![Mutation::DeleteWallet { id }])
            .await?;
        Ok(wallet)
    }

    /// Rebuilds balances from history; every changed wallet is queued as an
    /// update.
    pub async fn recompute_balances(&self) -> ResultEngine<Vec<Wallet>> {
        let write = self.begin().await?;
        let changed = write.replica.recompute_balances_in(&write.db_tx).await?;
        let mutations = changed
            .iter()
            .cloned()
            .map(|wallet| Mutation::UpdateWallet(WalletUpdate::balance(wallet)))
            .collect();
        self.commit(write, mutations).await?;
        Ok(changed)
    }

    pub async fn create_category(&self, draft: CategoryDraft) -> ResultEngine<Category> {
        let write = self.begin().await?;
        let category = write
            .replica
            .create_category_in(&write.db_tx, draft)
            .await?;
        self.commit(write, vec![Mutation::CreateCategory(category.clone())])
            .await?;
        Ok(category)
    }

    pub async fn update_category(&self, id: Uuid, patch: CategoryPatch) -> ResultEngine<Category> {
        let write = self.begin().await?;
        let category = write
            .replica
            .update_category_in(&write.db_tx, id, patch)
            .await?;
        self.commit(write, vec![Mutation::UpdateCategory(category.clone())])
            .await?;
        Ok(category)
    }

    pub async fn delete_category(&self, id: Uuid) -> ResultEngine<Category> {
        let write = self.begin().await?;
        write
            .replica
            .ensure_category_unused_in(&write.db_tx, id)
            .await?;
        let category = write
            .replica
            .delete_category_in(&write.db_tx, id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("category".to_string()))?;
        self.commit(write, vec![Mutation::DeleteCategory { id }])
            .await?;
        Ok(category)
    }

    pub async fn create_budget(&self, draft: BudgetDraft) -> ResultEngine<Budget> {
        let write = self.begin().await?;
        let budget = write.replica.create_budget_in(&write.db_tx, draft).await?;
        self.commit(write, vec![Mutation::CreateBudget(budget.clone())])
            .await?;
        Ok(budget)
    }

    pub async fn update_budget(&self, id: Uuid, patch: BudgetPatch) -> ResultEngine<Budget> {
        let write = self.begin().await?;
        let budget = write
            .replica
            .update_budget_in(&write.db_tx, id, patch)
            .await?;
        self.commit(write, vec![Mutation::UpdateBudget(budget.clone())])
            .await?;
        Ok(budget)
    }

    pub async fn delete_budget(&self, id: Uuid) -> ResultEngine<Budget> {
        let write = self.begin().await?;
        let budget = write
            .replica
            .delete_budget_in(&write.db_tx, id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("budget".to_string()))?;
        self.commit(write, vec![Mutation::DeleteBudget { id }])
            .await?;
        Ok(budget)
    }

    /// Deletes the local data of `identity` and its queued writes.
    pub async fn wipe(&self, identity: &Identity) -> ResultEngine<()> {
        self.coordinator.store().clear(identity).await?;
        if let Some(owner) = identity.user_id() {
            let dropped = self.coordinator.queue().clear_owner(owner).await?;
            if dropped > 0 {
                tracing::warn!("dropped {dropped} unsynced writes of {identity}");
            }
        }
        Ok(())
    }

    async fn begin(&self) -> ResultEngine<PendingWrite> {
        let identity = self.identity();
        let replica = self.coordinator.store().replica(&identity);
        let db_tx = self.coordinator.store().database().begin().await?;
        Ok(PendingWrite {
            identity,
            replica,
            db_tx,
        })
    }

    /// Queues `mutations` when authenticated, commits, then starts a push.
    /// Guests keep their writes local.
    async fn commit(&self, write: PendingWrite, mutations: Vec<Mutation>) -> ResultEngine<()> {
        let PendingWrite {
            identity, db_tx, ..
        } = write;
        let queued = match identity.user_id() {
            Some(owner) => {
                let queued = mutations.len();
                for mutation in mutations {
                    enqueue_in(&db_tx, mutation, owner).await?;
                }
                queued
            }
            None => 0,
        };
        db_tx.commit().await?;

        if queued > 0
            && self.coordinator.config().push_after_write
            && self.coordinator.presence().is_online()
        {
            self.coordinator.spawn_push(identity);
        }
        Ok(())
    }
}
