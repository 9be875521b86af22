//! Acting principal and connectivity signals.
//!
//! The host (CLI, UI shell) owns a [`Presence`] and pushes identity and
//! connectivity changes into it; the engine only observes them.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

const GUEST_NAMESPACE: &str = "guest";

/// The principal the replica is currently acting for.
///
/// Guests keep data on the device only. Authenticated users mirror every
/// local write into the mutation queue for remote replay.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    Guest,
    User(String),
}

impl Identity {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    /// Storage namespace holding this identity's collections.
    pub fn namespace(&self) -> String {
        match self {
            Self::Guest => GUEST_NAMESPACE.to_string(),
            Self::User(id) => format!("auth:{id}"),
        }
    }

    /// Remote user id, `None` for guests.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Guest => None,
            Self::User(id) => Some(id.as_str()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.namespace())
    }
}

/// Identity and connectivity signal shared between the host and the engine.
///
/// `None` identity means the host has not resolved the session yet.
#[derive(Clone, Debug)]
pub struct Presence {
    identity: watch::Sender<Option<Identity>>,
    online: watch::Sender<bool>,
}

impl Presence {
    pub fn new(identity: Option<Identity>, online: bool) -> Self {
        let (identity, _) = watch::channel(identity);
        let (online, _) = watch::channel(online);
        Self { identity, online }
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Publishes a new identity. Setting the same value again is not a change.
    pub fn set_identity(&self, identity: Option<Identity>) {
        self.identity.send_if_modified(|current| {
            if *current == identity {
                return false;
            }
            *current = identity;
            true
        });
    }

    /// Publishes connectivity. Only real transitions wake observers.
    pub fn set_online(&self, online: bool) {
        self.online.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
    }

    pub fn identity_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    pub fn online_changes(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }
}

impl Default for Presence {
    fn default() -> Self {
        Self::new(None, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_are_partitioned() {
        assert_eq!(Identity::Guest.namespace(), "guest");
        assert_eq!(Identity::user("42").namespace(), "auth:42");
        assert_eq!(Identity::user("42").user_id(), Some("42"));
        assert_eq!(Identity::Guest.user_id(), None);
    }

    #[test]
    fn identity_round_trips_through_json() {
        let json = serde_json::to_string(&Identity::user("abc")).unwrap();
        assert_eq!(json, r#"{"kind":"user","id":"abc"}"#);
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Identity::user("abc"));
    }

    #[tokio::test]
    async fn presence_only_signals_transitions() {
        let presence = Presence::new(Some(Identity::Guest), false);
        let mut online = presence.online_changes();

        presence.set_online(false);
        assert!(!online.has_changed().unwrap());

        presence.set_online(true);
        assert!(online.has_changed().unwrap());
        assert!(*online.borrow_and_update());
        assert!(presence.is_online());
    }
}
