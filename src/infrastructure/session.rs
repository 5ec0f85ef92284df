// Session Provider - current identity plus identity-change notifications

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::core::Uid;
use crate::infrastructure::subscriptions::{lock, Subscription, SubscriptionId};
use crate::infrastructure::viewer::ViewerContext;

pub type IdentityCallback = Box<dyn Fn(Option<&Uid>) + Send + Sync>;

pub trait SessionProvider: Send + Sync {
    fn current_identity(&self) -> Option<Uid>;

    /// Register for identity changes. The callback fires once immediately
    /// with the current identity, then on every change.
    fn on_identity_change(&self, callback: IdentityCallback) -> Subscription;

    fn viewer(&self) -> Option<ViewerContext> {
        self.current_identity().map(ViewerContext::new)
    }
}

struct IdentityListener {
    active: Arc<AtomicBool>,
    callback: IdentityCallback,
}

#[derive(Default)]
struct SessionState {
    identity: Option<Uid>,
    listeners: HashMap<SubscriptionId, Arc<IdentityListener>>,
}

/// In-process session; `sign_in` / `sign_out` stand in for the external auth flow
#[derive(Clone, Default)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(uid: impl Into<Uid>) -> Self {
        let session = Self::new();
        lock(&session.state).identity = Some(uid.into());
        session
    }

    pub fn sign_in(&self, uid: impl Into<Uid>) {
        self.set_identity(Some(uid.into()));
    }

    pub fn sign_out(&self) {
        self.set_identity(None);
    }

    fn set_identity(&self, identity: Option<Uid>) {
        let listeners: Vec<Arc<IdentityListener>> = {
            let mut state = lock(&self.state);
            if state.identity == identity {
                return;
            }
            state.identity = identity.clone();
            state.listeners.values().cloned().collect()
        };

        match &identity {
            Some(uid) => info!(uid = %uid, "session identity available"),
            None => info!("session identity cleared"),
        }
        for listener in listeners {
            if listener.active.load(Ordering::SeqCst) {
                (listener.callback)(identity.as_ref());
            }
        }
    }
}

impl SessionProvider for Session {
    fn current_identity(&self) -> Option<Uid> {
        lock(&self.state).identity.clone()
    }

    fn on_identity_change(&self, callback: IdentityCallback) -> Subscription {
        let id = SubscriptionId::new();
        let active = Arc::new(AtomicBool::new(true));
        let listener = Arc::new(IdentityListener {
            active: Arc::clone(&active),
            callback,
        });

        let current = {
            let mut state = lock(&self.state);
            state.listeners.insert(id, Arc::clone(&listener));
            state.identity.clone()
        };
        (listener.callback)(current.as_ref());

        let registry = Arc::downgrade(&self.state);
        Subscription::new(id, active, move || {
            if let Some(state) = registry.upgrade() {
                lock(&state).listeners.remove(&id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_changes_are_delivered() {
        let session = Session::new();
        let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = session.on_identity_change(Box::new(move |uid: Option<&Uid>| {
            sink.lock().unwrap().push(uid.map(|u| u.to_string()));
        }));

        session.sign_in("alice");
        session.sign_in("alice");
        session.sign_out();
        drop(sub);
        session.sign_in("bob");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("alice".to_string()), None]
        );
    }

    #[test]
    fn test_viewer_follows_identity() {
        let session = Session::signed_in("carol");
        assert_eq!(session.viewer().map(|v| v.uid), Some(Uid::from("carol")));
        session.sign_out();
        assert!(session.viewer().is_none());
    }
}
