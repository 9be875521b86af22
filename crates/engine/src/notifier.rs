//! Change Notifier: tells read-side consumers that a namespace changed.
//!
//! A notification means "drop every cached read for this identity". It never
//! describes what changed.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use tokio::sync::watch;

use crate::Identity;

type Listener = Arc<dyn Fn(&Identity) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

/// Publish/subscribe fan-out. Cloning shares the listener set.
#[derive(Clone)]
pub struct ChangeNotifier {
    listeners: Arc<Mutex<Listeners>>,
    version: Arc<watch::Sender<u64>>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self {
            listeners: Arc::default(),
            version: Arc::new(watch::Sender::new(0)),
        }
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .field("version", &*self.version.borrow())
            .finish()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener`. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Identity) + Send + Sync + 'static,
    {
        let mut listeners = self.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.insert(id, Arc::new(listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Counter bumped on every notification, for async consumers.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().entries.len()
    }

    /// Calls every listener once with the namespace owner.
    pub fn notify(&self, identity: &Identity) {
        // Snapshot the set so a listener may (un)subscribe while being called.
        let listeners: Vec<Listener> = self.lock().entries.values().cloned().collect();
        for listener in listeners {
            listener(identity);
        }
        self.version.send_modify(|version| *version += 1);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by [`ChangeNotifier::subscribe`].
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn every_listener_is_called_once_per_notification() {
        let notifier = ChangeNotifier::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let a = {
            let calls = Arc::clone(&calls);
            notifier.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        let b = {
            let calls = Arc::clone(&calls);
            notifier.subscribe(move |_| {
                calls.fetch_add(10, Ordering::SeqCst);
            })
        };

        notifier.notify(&Identity::Guest);
        assert_eq!(calls.load(Ordering::SeqCst), 11);

        a.unsubscribe();
        notifier.notify(&Identity::Guest);
        assert_eq!(calls.load(Ordering::SeqCst), 21);

        drop(b);
        notifier.notify(&Identity::Guest);
        assert_eq!(calls.load(Ordering::SeqCst), 21);
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn listener_receives_the_identity() {
        let notifier = ChangeNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = Arc::clone(&seen);
            notifier.subscribe(move |identity| {
                seen.lock().unwrap().push(identity.namespace());
            })
        };

        notifier.notify(&Identity::user("u-1"));
        assert_eq!(*seen.lock().unwrap(), vec![String::from("auth:u-1")]);
    }

    #[test]
    fn changes_counter_follows_notifications() {
        let notifier = ChangeNotifier::new();
        let rx = notifier.changes();
        notifier.notify(&Identity::Guest);
        notifier.notify(&Identity::Guest);
        assert_eq!(*rx.borrow(), 2);
    }
}
