//! Offline-first personal finance replica.
//!
//! Writes go to a local, identity-partitioned store and, for authenticated
//! users, into a durable mutation queue. A [`SyncCoordinator`] replays the
//! queue against a [`RemoteAuthority`] and adopts remote snapshots back into
//! the store.

pub use balance_corrections::BalanceCorrection;
pub use budgets::{Budget, BudgetPeriod, BudgetView};
pub use categories::Category;
pub use commands::{
    BudgetDraft, BudgetPatch, CategoryDraft, CategoryPatch, TransactionDraft, TransactionFilter,
    TransactionPatch, WalletDraft, WalletPatch,
};
pub use error::EngineError;
pub use identity::{Identity, Presence};
pub use ledger::Ledger;
pub use money::Money;
pub use mutations::{EntityKind, Mutation, MutationRecord, WalletUpdate, WriteOp};
pub use notifier::{ChangeNotifier, Subscription};
pub use queue::MutationQueue;
pub use remote::{RemoteAuthority, RemoteError, Snapshot};
pub use store::{CategoryTotal, LocalStore, LocalStoreBuilder, Replica, Summary};
pub use sync::{
    Debouncer, PullOutcome, PushOutcome, SyncConfig, SyncCoordinator, SyncCoordinatorBuilder,
    SyncDriver, SyncEvent, SyncOutcome, SyncStatus,
};
pub use transactions::{Transaction, TransactionKind};
pub use wallets::{Wallet, WalletType};

pub mod aggregates;
mod balance_corrections;
mod budgets;
mod categories;
mod commands;
pub mod defaults;
mod error;
mod identity;
mod ledger;
mod money;
mod mutations;
mod namespaces;
mod notifier;
mod queue;
pub mod remote;
mod store;
mod sync;
mod transactions;
mod util;
mod wallets;

pub type ResultEngine<T> = Result<T, EngineError>;
