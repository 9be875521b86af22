use sea_orm::ConnectionTrait;

use super::{Replica, delete_namespace_collections};
use crate::{Mutation, ResultEngine, remote::Snapshot};

impl Replica {
    /// Replaces the four collections with `snapshot`. Nothing is merged.
    pub(crate) async fn replace_with_snapshot_in<C: ConnectionTrait>(
        &self,
        db: &C,
        snapshot: &Snapshot,
    ) -> ResultEngine<()> {
        delete_namespace_collections(db, &self.namespace).await?;
        self.insert_wallet_rows_in(db, &snapshot.wallets).await?;
        self.insert_category_rows_in(db, &snapshot.categories).await?;
        self.insert_budget_rows_in(db, &snapshot.budgets).await?;
        self.insert_transaction_rows_in(db, &snapshot.transactions)
            .await
    }

    /// Applies a queued write on top of the replica.
    ///
    /// Keyed by entity id, so a write the remote already holds leaves the
    /// replica unchanged. Wallet balances stay those of the snapshot, moved
    /// only by replayed transactions and explicit corrections.
    pub(crate) async fn replay_in<C: ConnectionTrait>(
        &self,
        db: &C,
        mutation: &Mutation,
    ) -> ResultEngine<()> {
        match mutation {
            Mutation::CreateTransaction(tx) | Mutation::UpdateTransaction(tx) => {
                self.put_transaction_in(db, tx).await
            }
            Mutation::DeleteTransaction { id } => {
                self.delete_transaction_in(db, *id).await.map(|_| ())
            }
            Mutation::CreateWallet(wallet) => self.put_wallet_in(db, wallet).await,
            Mutation::UpdateWallet(update) => self.apply_wallet_update_in(db, update).await,
            Mutation::DeleteWallet { id } => self.delete_wallet_in(db, *id).await.map(|_| ()),
            Mutation::CreateCategory(category) | Mutation::UpdateCategory(category) => {
                self.put_category_in(db, category).await
            }
            Mutation::DeleteCategory { id } => {
                self.delete_category_in(db, *id).await.map(|_| ())
            }
            Mutation::CreateBudget(budget) | Mutation::UpdateBudget(budget) => {
                self.put_budget_in(db, budget).await
            }
            Mutation::DeleteBudget { id } => self.delete_budget_in(db, *id).await.map(|_| ()),
        }
    }
}
