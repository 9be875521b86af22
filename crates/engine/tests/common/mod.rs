#![allow(dead_code)]

use std::{
    collections::HashSet,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};

use engine::{
    Budget, Category, Identity, LocalStore, Money, Mutation, Presence, RemoteAuthority,
    RemoteError, Snapshot, SyncConfig, SyncCoordinator, Transaction, TransactionKind, Wallet,
    aggregates::{apply_delta, revert_delta},
    defaults,
};
use migration::MigratorTrait;
use uuid::Uuid;

pub async fn memory_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn store_with_db() -> LocalStore {
    LocalStore::builder()
        .database(memory_db().await)
        .build()
        .await
        .unwrap()
}

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

/// Coordinator acting for `identity`, with background pushes off so tests
/// drive push and pull explicitly.
pub async fn coordinator(
    remote: FakeRemote,
    identity: Identity,
) -> SyncCoordinator<FakeRemote> {
    coordinator_with(
        remote,
        identity,
        SyncConfig {
            push_after_write: false,
            ..SyncConfig::default()
        },
    )
    .await
}

pub async fn coordinator_with(
    remote: FakeRemote,
    identity: Identity,
    config: SyncConfig,
) -> SyncCoordinator<FakeRemote> {
    let store = store_with_db().await;
    store.initialize(&identity).await.unwrap();
    SyncCoordinator::builder(store, remote, Presence::new(Some(identity), true))
        .config(config)
        .build()
}

/// Polls `done` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

pub type Hook = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Runs `action` once, the next time the remote reaches the hook point.
pub fn hook(action: impl Future<Output = ()> + Send + 'static) -> Option<Hook> {
    Some(Box::new(move || Box::pin(action)))
}

#[derive(Default)]
pub struct RemoteState {
    pub transactions: Vec<Transaction>,
    pub wallets: Vec<Wallet>,
    pub categories: Vec<Category>,
    pub budgets: Vec<Budget>,
    /// `(user, label, entity id)` of every write that reached the remote.
    pub writes: Vec<(String, String, Uuid)>,
    /// Entity ids the remote refuses.
    pub rejected_ids: HashSet<Uuid>,
    /// Entity ids whose write never completes.
    pub unreachable_ids: HashSet<Uuid>,
    pub offline: bool,
    pub seed_fails: bool,
    pub seed_calls: usize,
    pub snapshot_calls: usize,
    /// `"write"` or `"snapshot"` for every call that completed, in order.
    pub calls: Vec<&'static str>,
    /// Awaited after a snapshot was taken, before it is returned.
    pub on_snapshot: Option<Hook>,
    /// Awaited after a write was applied.
    pub on_write: Option<Hook>,
}

/// In-memory Remote Authority: idempotent by entity id, keeps wallet
/// balances the way the server does. A wallet update only overwrites the
/// balance when it is flagged as a correction.
#[derive(Clone, Default)]
pub struct FakeRemote {
    pub state: Arc<Mutex<RemoteState>>,
}

impl FakeRemote {
    pub fn with<T>(&self, f: impl FnOnce(&mut RemoteState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn seeded() -> Self {
        let remote = Self::default();
        remote.with(|s| {
            s.wallets.push(defaults::default_wallet());
            s.categories = defaults::default_categories();
        });
        remote
    }

    pub fn written_labels(&self) -> Vec<String> {
        self.with(|s| s.writes.iter().map(|(_, label, _)| label.clone()).collect())
    }
}

fn upsert<T: Clone>(items: &mut Vec<T>, item: &T, same: impl Fn(&T) -> bool) {
    match items.iter_mut().find(|existing| same(existing)) {
        Some(existing) => *existing = item.clone(),
        None => items.push(item.clone()),
    }
}

fn shift(wallets: &mut [Wallet], wallet_id: Uuid, f: impl FnOnce(Money) -> Money) {
    if let Some(wallet) = wallets.iter_mut().find(|w| w.id == wallet_id) {
        wallet.balance = f(wallet.balance);
    }
}

impl RemoteState {
    pub fn apply(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::CreateTransaction(tx) => {
                if self.transactions.iter().all(|t| t.id != tx.id) {
                    shift(&mut self.wallets, tx.wallet_id, |b| {
                        apply_delta(b, tx.amount, tx.kind)
                    });
                    self.transactions.push(tx.clone());
                }
            }
            Mutation::UpdateTransaction(tx) => {
                if let Some(old) = self.transactions.iter().find(|t| t.id == tx.id).cloned() {
                    shift(&mut self.wallets, old.wallet_id, |b| {
                        revert_delta(b, old.amount, old.kind)
                    });
                    shift(&mut self.wallets, tx.wallet_id, |b| {
                        apply_delta(b, tx.amount, tx.kind)
                    });
                    upsert(&mut self.transactions, tx, |t| t.id == tx.id);
                }
            }
            Mutation::DeleteTransaction { id } => {
                if let Some(old) = self.transactions.iter().find(|t| t.id == *id).cloned() {
                    shift(&mut self.wallets, old.wallet_id, |b| {
                        revert_delta(b, old.amount, old.kind)
                    });
                    self.transactions.retain(|t| t.id != *id);
                }
            }
            Mutation::CreateWallet(wallet) => {
                if self.wallets.iter().all(|w| w.id != wallet.id) {
                    self.wallets.push(wallet.clone());
                }
            }
            Mutation::UpdateWallet(update) => {
                if let Some(stored) = self.wallets.iter_mut().find(|w| w.id == update.wallet.id) {
                    let balance = if update.sets_balance {
                        update.wallet.balance
                    } else {
                        stored.balance
                    };
                    *stored = Wallet {
                        balance,
                        ..update.wallet.clone()
                    };
                }
            }
            Mutation::DeleteWallet { id } => self.wallets.retain(|w| w.id != *id),
            Mutation::CreateCategory(category) => {
                if self.categories.iter().all(|c| c.id != category.id) {
                    self.categories.push(category.clone());
                }
            }
            Mutation::UpdateCategory(category) => {
                upsert(&mut self.categories, category, |c| c.id == category.id)
            }
            Mutation::DeleteCategory { id } => self.categories.retain(|c| c.id != *id),
            Mutation::CreateBudget(budget) => {
                if self.budgets.iter().all(|b| b.id != budget.id) {
                    self.budgets.push(budget.clone());
                }
            }
            Mutation::UpdateBudget(budget) => upsert(&mut self.budgets, budget, |b| b.id == budget.id),
            Mutation::DeleteBudget { id } => self.budgets.retain(|b| b.id != *id),
        }
    }
}

impl RemoteAuthority for FakeRemote {
    async fn write(&self, user_id: &str, mutation: &Mutation) -> Result<(), RemoteError> {
        let hook = {
            let mut state = self.state.lock().unwrap();
            let id = mutation.entity_id();
            if state.offline || state.unreachable_ids.contains(&id) {
                return Err(RemoteError::Transport("connection refused".to_string()));
            }
            if state.rejected_ids.contains(&id) {
                return Err(RemoteError::Rejected("invalid reference".to_string()));
            }
            state
                .writes
                .push((user_id.to_string(), mutation.label(), id));
            state.calls.push("write");
            state.apply(mutation);
            state.on_write.take()
        };
        if let Some(hook) = hook {
            hook().await;
        }
        Ok(())
    }

    async fn snapshot(&self, _user_id: &str, transaction_limit: u32) -> Result<Snapshot, RemoteError> {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            state.snapshot_calls += 1;
            if state.offline {
                return Err(RemoteError::Transport("connection refused".to_string()));
            }
            let mut transactions = state.transactions.clone();
            transactions.sort_by(|a, b| b.date.cmp(&a.date));
            transactions.truncate(transaction_limit as usize);
            state.calls.push("snapshot");
            Snapshot {
                transactions,
                wallets: state.wallets.clone(),
                categories: state.categories.clone(),
                budgets: state.budgets.clone(),
            }
        };
        let hook = self.state.lock().unwrap().on_snapshot.take();
        if let Some(hook) = hook {
            hook().await;
        }
        Ok(snapshot)
    }

    async fn seed_defaults(&self, _user_id: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.seed_calls += 1;
        if state.seed_fails {
            return Err(RemoteError::Transport("seed timed out".to_string()));
        }
        if state.wallets.is_empty() {
            state.wallets.push(defaults::default_wallet());
        }
        if state.categories.is_empty() {
            state.categories = defaults::default_categories();
        }
        Ok(())
    }

    async fn wallets(&self, _user_id: &str) -> Result<Vec<Wallet>, RemoteError> {
        Ok(self.state.lock().unwrap().wallets.clone())
    }

    async fn categories(&self, _user_id: &str) -> Result<Vec<Category>, RemoteError> {
        Ok(self.state.lock().unwrap().categories.clone())
    }
}

pub fn remote_tx(wallet: &Wallet, category: &Category, amount: i64, kind: TransactionKind) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        amount: Money::new(amount),
        kind,
        category_id: category.id,
        wallet_id: wallet.id,
        date: Utc::now(),
        note: None,
        created_at: Utc::now(),
    }
}
