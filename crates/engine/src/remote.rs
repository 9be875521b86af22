//! The Remote Authority seam: the server-side source of truth the replica
//! syncs against.

use std::future::Future;

use thiserror::Error;

use crate::{Budget, Category, Mutation, Transaction, Wallet};

/// Outcome of a remote call that did not succeed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The call completed and the remote refused the payload. Not retryable.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The call never completed. Retryable.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// A complete read of one identity's collections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Newest first, capped by the requested limit.
    pub transactions: Vec<Transaction>,
    pub wallets: Vec<Wallet>,
    pub categories: Vec<Category>,
    pub budgets: Vec<Budget>,
}

impl Snapshot {
    /// No wallets and no categories: the remote identity looks unseeded.
    pub fn looks_unseeded(&self) -> bool {
        self.wallets.is_empty() && self.categories.is_empty()
    }
}

/// Calls the sync coordinator makes against the remote.
///
/// Implementations own timeouts and transport retries.
pub trait RemoteAuthority: Send + Sync + 'static {
    /// Replays one write. Creates are idempotent by the client-assigned id.
    fn write(
        &self,
        user_id: &str,
        mutation: &Mutation,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Transactions (newest first, at most `transaction_limit`), wallets,
    /// categories and budgets in one round trip.
    fn snapshot(
        &self,
        user_id: &str,
        transaction_limit: u32,
    ) -> impl Future<Output = Result<Snapshot, RemoteError>> + Send;

    /// Creates the default wallet and categories. A no-op when already seeded.
    fn seed_defaults(&self, user_id: &str) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn wallets(&self, user_id: &str) -> impl Future<Output = Result<Vec<Wallet>, RemoteError>> + Send;

    fn categories(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<Category>, RemoteError>> + Send;
}
