//! Sync Coordinator: push (queue → remote) and pull (remote → replica).
//!
//! Failures of either direction never reach the caller of a local write.
//! They are logged and published as [`SyncEvent`]s; the `ResultEngine`
//! returned here only fails for local storage errors.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use sea_orm::TransactionTrait;
use tokio::{
    sync::{Mutex, broadcast, watch},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::{
    ChangeNotifier, EngineError, Identity, LocalStore, MutationQueue, Presence, ResultEngine,
    queue::pending_for_in,
    remote::{RemoteAuthority, RemoteError, Snapshot},
    store::with_tx,
};

mod triggers;

pub use triggers::{Debouncer, SyncDriver};

const EVENT_CAPACITY: usize = 64;

/// Engine-side sync knobs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Newest transactions fetched by a pull.
    pub transaction_limit: u32,
    /// Quiet period coalescing remote-change signals into one cycle.
    pub debounce: Duration,
    /// Start a background push after every authenticated local write.
    pub push_after_write: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            transaction_limit: 500,
            debounce: Duration::from_millis(2000),
            push_after_write: true,
        }
    }
}

/// Asynchronous failure reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    /// The remote refused a queued write; it was dropped from the queue.
    MutationRejected {
        id: Uuid,
        label: String,
        reason: String,
    },
    /// The remote was unreachable; the head entry stays queued.
    PushStalled {
        id: Uuid,
        label: String,
        retry_count: i32,
        reason: String,
    },
    PullFailed { namespace: String, reason: String },
    /// Self-repair failed; the pull went on with what it had.
    SeedFailed { namespace: String, reason: String },
    /// The identity changed while the pull was in flight.
    PullDiscarded { namespace: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub syncing: bool,
    pub last_synced: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Guests have nothing to push.
    Skipped,
    /// Another push or a pull holds the queue.
    Busy,
    Drained { sent: usize, rejected: usize },
    /// Transport failure on the head entry.
    Stalled { sent: usize, rejected: usize },
    /// The identity changed mid-drain.
    Interrupted { sent: usize, rejected: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PullOutcome {
    Skipped,
    Adopted {
        transactions: usize,
        wallets: usize,
        categories: usize,
        budgets: usize,
        /// Still-queued writes applied on top of the snapshot.
        replayed: usize,
    },
    Discarded,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A cycle was already running.
    Busy,
    Offline,
    Completed { push: PushOutcome, pull: PullOutcome },
}

struct Inner<R> {
    store: LocalStore,
    queue: MutationQueue,
    remote: R,
    presence: Presence,
    notifier: ChangeNotifier,
    config: SyncConfig,
    events: broadcast::Sender<SyncEvent>,
    status: watch::Sender<SyncStatus>,
    /// Held by a draining push and by a pull from fetch to replace, so no
    /// queue entry is removed between a snapshot and its replay.
    drain: Mutex<()>,
    cycle: Mutex<()>,
}

/// Owns the queue and drives the replica against one remote.
pub struct SyncCoordinator<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for SyncCoordinator<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: RemoteAuthority> SyncCoordinator<R> {
    /// Return a builder for `SyncCoordinator`.
    pub fn builder(store: LocalStore, remote: R, presence: Presence) -> SyncCoordinatorBuilder<R> {
        SyncCoordinatorBuilder {
            store,
            remote,
            presence,
            queue: None,
            notifier: None,
            config: SyncConfig::default(),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.inner.queue
    }

    pub fn presence(&self) -> &Presence {
        &self.inner.presence
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    /// The acting identity. An unresolved session acts as guest.
    pub fn current_identity(&self) -> Identity {
        self.inner
            .presence
            .current_identity()
            .unwrap_or(Identity::Guest)
    }

    fn is_current(&self, identity: &Identity) -> bool {
        self.inner.presence.current_identity().as_ref() == Some(identity)
    }

    fn emit(&self, event: SyncEvent) {
        // No subscriber is fine, the event was already logged.
        let _ = self.inner.events.send(event);
    }

    /// Drains the queue entries of `identity`, strictly one write at a time.
    pub async fn push(&self, identity: &Identity) -> ResultEngine<PushOutcome> {
        let Some(user_id) = identity.user_id() else {
            return Ok(PushOutcome::Skipped);
        };
        let Ok(_drain) = self.inner.drain.try_lock() else {
            tracing::debug!("queue busy, push for {identity} skipped");
            return Ok(PushOutcome::Busy);
        };

        let (mut sent, mut rejected) = (0, 0);
        loop {
            if !self.is_current(identity) {
                tracing::info!("identity changed, push for {identity} stops");
                return Ok(PushOutcome::Interrupted { sent, rejected });
            }
            let Some(record) = self.inner.queue.peek_for(user_id).await? else {
                break;
            };
            let label = record.mutation.label();
            tracing::debug!("pushing {label} {}", record.mutation.entity_id());

            match self.inner.remote.write(user_id, &record.mutation).await {
                Ok(()) => {
                    self.inner.queue.remove(record.id).await?;
                    sent += 1;
                }
                Err(RemoteError::Rejected(reason)) => {
                    tracing::warn!("{label} {} rejected: {reason}", record.mutation.entity_id());
                    self.inner.queue.remove(record.id).await?;
                    rejected += 1;
                    self.emit(SyncEvent::MutationRejected {
                        id: record.id,
                        label,
                        reason,
                    });
                }
                Err(RemoteError::Transport(reason)) => {
                    tracing::warn!("push stalled on {label}: {reason}");
                    self.inner.queue.retry(record.id).await?;
                    self.emit(SyncEvent::PushStalled {
                        id: record.id,
                        label,
                        retry_count: record.retry_count + 1,
                        reason,
                    });
                    return Ok(PushOutcome::Stalled { sent, rejected });
                }
            }
        }

        if sent + rejected > 0 {
            tracing::info!("push for {identity}: {sent} sent, {rejected} rejected");
        }
        Ok(PushOutcome::Drained { sent, rejected })
    }

    /// Adopts the remote snapshot of `identity` as its replica.
    ///
    /// Waits for a running push, then keeps pushes out until the snapshot
    /// and the still-queued writes are in the replica. Writes queued
    /// meanwhile are pushed once the replica is replaced.
    pub async fn pull(&self, identity: &Identity) -> ResultEngine<PullOutcome> {
        let Some(user_id) = identity.user_id() else {
            return Ok(PullOutcome::Skipped);
        };
        let namespace = identity.namespace();
        let drain = self.inner.drain.lock().await;

        let mut snapshot = match self
            .inner
            .remote
            .snapshot(user_id, self.inner.config.transaction_limit)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!("pull for {namespace} failed: {err}");
                self.set_error(err.to_string());
                self.emit(SyncEvent::PullFailed {
                    namespace,
                    reason: err.to_string(),
                });
                return Ok(PullOutcome::Failed);
            }
        };

        // An empty wallet and category list is taken as "never seeded". A
        // user who deleted all of them gets the defaults back.
        if snapshot.looks_unseeded() {
            tracing::info!("remote data of {namespace} looks unseeded, seeding defaults");
            if let Err(err) = self.self_repair(user_id, &mut snapshot).await {
                tracing::warn!("seeding defaults for {namespace} failed: {err}");
                self.emit(SyncEvent::SeedFailed {
                    namespace: namespace.clone(),
                    reason: err.to_string(),
                });
            }
        }

        if !self.is_current(identity) {
            tracing::info!("identity changed, snapshot of {namespace} discarded");
            self.emit(SyncEvent::PullDiscarded { namespace });
            return Ok(PullOutcome::Discarded);
        }

        let replica = self.inner.store.replica(identity);
        let replayed = with_tx!(self.inner.store.database(), |db_tx| {
            replica.replace_with_snapshot_in(&db_tx, &snapshot).await?;
            let pending = pending_for_in(&db_tx, user_id).await?;
            for record in &pending {
                replica.replay_in(&db_tx, &record.mutation).await?;
            }
            Ok::<_, EngineError>(pending.len())
        })?;
        drop(drain);

        self.inner.notifier.notify(identity);
        self.inner.status.send_modify(|status| {
            status.last_synced = Some(Utc::now());
            status.last_error = None;
        });
        tracing::info!(
            "pulled {namespace}: {} transactions, {} wallets, {} categories, {} budgets, {replayed} replayed",
            snapshot.transactions.len(),
            snapshot.wallets.len(),
            snapshot.categories.len(),
            snapshot.budgets.len()
        );
        if self.inner.config.push_after_write
            && self.inner.queue.pending_for(user_id).await?.len() > replayed
        {
            self.spawn_push(identity.clone());
        }
        Ok(PullOutcome::Adopted {
            transactions: snapshot.transactions.len(),
            wallets: snapshot.wallets.len(),
            categories: snapshot.categories.len(),
            budgets: snapshot.budgets.len(),
            replayed,
        })
    }

    async fn self_repair(&self, user_id: &str, snapshot: &mut Snapshot) -> Result<(), RemoteError> {
        let remote = &self.inner.remote;
        remote.seed_defaults(user_id).await?;
        let (wallets, categories) =
            tokio::try_join!(remote.wallets(user_id), remote.categories(user_id))?;
        snapshot.wallets = wallets;
        snapshot.categories = categories;
        Ok(())
    }

    /// One push then one pull. A cycle started while another runs is a no-op.
    pub async fn sync(&self, identity: &Identity) -> ResultEngine<SyncOutcome> {
        let Ok(_cycle) = self.inner.cycle.try_lock() else {
            tracing::debug!("sync cycle already running");
            return Ok(SyncOutcome::Busy);
        };
        if !self.inner.presence.is_online() {
            tracing::debug!("offline, sync for {identity} skipped");
            return Ok(SyncOutcome::Offline);
        }

        self.inner.status.send_modify(|status| status.syncing = true);
        let push = self.push(identity).await;
        let pull = if push.is_ok() {
            self.pull(identity).await
        } else {
            Ok(PullOutcome::Skipped)
        };
        self.inner.status.send_modify(|status| status.syncing = false);

        Ok(SyncOutcome::Completed {
            push: push?,
            pull: pull?,
        })
    }

    /// Cycle for whoever is acting right now.
    pub async fn sync_current(&self) -> ResultEngine<SyncOutcome> {
        let identity = self.current_identity();
        self.sync(&identity).await
    }

    /// Fire-and-forget push for `identity`.
    pub fn spawn_push(&self, identity: Identity) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(err) = this.push(&identity).await {
                tracing::warn!("background push for {identity} failed: {err}");
            }
        })
    }

    /// Fire-and-forget cycle for the acting identity.
    pub fn spawn_sync(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(err) = this.sync_current().await {
                tracing::warn!("background sync failed: {err}");
            }
        })
    }

    fn set_error(&self, error: String) {
        self.inner
            .status
            .send_modify(|status| status.last_error = Some(error));
    }
}

/// Builder for `SyncCoordinator`.
pub struct SyncCoordinatorBuilder<R> {
    store: LocalStore,
    remote: R,
    presence: Presence,
    queue: Option<MutationQueue>,
    notifier: Option<ChangeNotifier>,
    config: SyncConfig,
}

impl<R: RemoteAuthority> SyncCoordinatorBuilder<R> {
    /// Queue to drain. Defaults to the one stored next to the replica.
    pub fn queue(mut self, queue: MutationQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn notifier(mut self, notifier: ChangeNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> SyncCoordinator<R> {
        let queue = self
            .queue
            .unwrap_or_else(|| MutationQueue::new(self.store.database().clone()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        SyncCoordinator {
            inner: Arc::new(Inner {
                store: self.store,
                queue,
                remote: self.remote,
                presence: self.presence,
                notifier: self.notifier.unwrap_or_default(),
                config: self.config,
                events,
                status: watch::Sender::new(SyncStatus::default()),
                drain: Mutex::new(()),
                cycle: Mutex::new(()),
            }),
        }
    }
}
