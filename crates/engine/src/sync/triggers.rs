//! What starts a sync cycle: identity resolution, coming back online, and
//! debounced remote-change signals.

use std::{
    future::Future,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use tokio::{sync::mpsc, task::JoinHandle};

use super::{SyncCoordinator, SyncOutcome};
use crate::{Identity, remote::RemoteAuthority};

/// Cancellable timer. Each `schedule` cancels the pending one and restarts
/// the wait, so a burst of triggers runs the action once.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached so a later reschedule only cancels the wait, never the action.
            tokio::spawn(action);
        });
        if let Some(previous) = self.lock().replace(timer) {
            previous.abort();
        }
    }

    pub fn cancel(&self) {
        if let Some(previous) = self.lock().take() {
            previous.abort();
        }
    }

    /// `true` while a timer is waiting.
    pub fn is_pending(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Reacts to the host's signals and runs push-then-pull cycles.
pub struct SyncDriver<R> {
    coordinator: SyncCoordinator<R>,
    debouncer: Debouncer,
}

impl<R: RemoteAuthority> SyncDriver<R> {
    pub fn new(coordinator: SyncCoordinator<R>) -> Self {
        let debouncer = Debouncer::new(coordinator.config().debounce);
        Self {
            coordinator,
            debouncer,
        }
    }

    pub fn coordinator(&self) -> &SyncCoordinator<R> {
        &self.coordinator
    }

    /// Switches to `identity`: prepares its namespace, then runs a cycle.
    pub async fn activate(&self, identity: &Identity) {
        match self.coordinator.store().initialize(identity).await {
            Ok(true) => tracing::info!("initialized local data for {identity}"),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!("cannot initialize {identity}: {err}");
                return;
            }
        }
        self.cycle(identity).await;
    }

    /// Runs one cycle for `identity` and logs how it went.
    pub async fn cycle(&self, identity: &Identity) -> Option<SyncOutcome> {
        match self.coordinator.sync(identity).await {
            Ok(outcome) => {
                tracing::debug!("sync for {identity}: {outcome:?}");
                Some(outcome)
            }
            Err(err) => {
                tracing::warn!("sync for {identity} failed: {err}");
                None
            }
        }
    }

    /// Remote-change signal: runs a cycle once the debounce window is quiet.
    pub fn remote_changed(&self) {
        let coordinator = self.coordinator.clone();
        self.debouncer.schedule(async move {
            if let Err(err) = coordinator.sync_current().await {
                tracing::warn!("debounced sync failed: {err}");
            }
        });
    }

    pub fn has_pending_resync(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Starts with the resolved identity, then follows the host's signals
    /// until the remote-change channel closes.
    pub async fn run(&self, mut remote_changes: mpsc::UnboundedReceiver<()>) {
        let presence = self.coordinator.presence();
        let mut identities = presence.identity_changes();
        let mut online = presence.online_changes();
        let mut was_online = *online.borrow_and_update();

        let resolved = identities.borrow_and_update().clone();
        if let Some(identity) = resolved {
            self.activate(&identity).await;
        }

        loop {
            tokio::select! {
                changed = identities.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let identity = identities.borrow_and_update().clone();
                    self.debouncer.cancel();
                    if let Some(identity) = identity {
                        tracing::info!("identity switched to {identity}");
                        self.activate(&identity).await;
                    }
                }
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *online.borrow_and_update();
                    if now_online && !was_online {
                        tracing::info!("back online");
                        let identity = self.coordinator.current_identity();
                        self.cycle(&identity).await;
                    }
                    was_online = now_online;
                }
                signal = remote_changes.recv() => match signal {
                    Some(()) => self.remote_changed(),
                    None => break,
                },
            }
        }
        self.debouncer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    fn counting(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_triggers_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_secs(2));

        for _ in 0..3 {
            debouncer.schedule(counting(&runs));
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert!(debouncer.is_pending());
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_gaps_run_each_time() {
        let runs = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_secs(2));

        debouncer.schedule(counting(&runs));
        tokio::time::sleep(Duration::from_secs(3)).await;
        debouncer.schedule(counting(&runs));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_secs(2));

        debouncer.schedule(counting(&runs));
        debouncer.cancel();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
