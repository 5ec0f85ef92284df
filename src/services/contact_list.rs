// Contact List Builder - live list of the viewer's friends for direct messages
//
// Holds two subscriptions while attached: the viewer's own user document
// (friend set) and the whole users collection (profiles). Either emission
// recomputes the list synchronously and publishes it on a watch channel.

use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::core::{Uid, UidSet};
use crate::error::AppResult;
use crate::infrastructure::document_store::{Document, DocumentStore};
use crate::infrastructure::session::SessionProvider;
use crate::infrastructure::subscriptions::{lock, Subscription};
use crate::models::{Contact, UserProfile};
use crate::navigation::Route;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachState {
    Unattached,
    Attached(Uid),
    Detached,
}

struct ContactState {
    attach: AttachState,
    /// Bumped on every attach/detach; emissions from older subscriptions are ignored
    generation: u64,
    friends: UidSet,
    users: Vec<UserProfile>,
    subscriptions: Vec<Subscription>,
}

impl ContactState {
    fn reset(&mut self, attach: AttachState) -> Vec<Subscription> {
        self.attach = attach;
        self.generation += 1;
        self.friends = UidSet::new();
        self.users.clear();
        std::mem::take(&mut self.subscriptions)
    }
}

/// Users whose uid is in `friends`, in collection order
pub fn derive_contacts(users: &[UserProfile], friends: &UidSet) -> Vec<Contact> {
    users
        .iter()
        .filter(|user| friends.contains(&user.uid))
        .map(Contact::from)
        .collect()
}

fn materialize(documents: &[Document], viewer: &Uid) -> Vec<UserProfile> {
    documents
        .iter()
        .filter(|doc| doc.id != viewer.as_str())
        .map(UserProfile::from_document)
        .collect()
}

/// One-shot contact list, for callers that do not need live updates
pub async fn load_contacts(
    store: &dyn DocumentStore,
    users_collection: &str,
    viewer: &Uid,
) -> AppResult<Vec<Contact>> {
    let (me, everyone) = futures::join!(
        store.get_document(users_collection, viewer.as_str()),
        store.query_collection(users_collection, None)
    );
    let friends = me?
        .map(|doc| UserProfile::from_document(&doc).friends)
        .unwrap_or_default();
    Ok(derive_contacts(&materialize(&everyone?, viewer), &friends))
}

pub struct ContactListBuilder {
    store: Arc<dyn DocumentStore>,
    users: String,
    state: Arc<Mutex<ContactState>>,
    contacts: Arc<watch::Sender<Vec<Contact>>>,
}

impl ContactListBuilder {
    pub fn new(store: Arc<dyn DocumentStore>, users_collection: impl Into<String>) -> Self {
        let (contacts, _) = watch::channel(Vec::new());
        Self {
            store,
            users: users_collection.into(),
            state: Arc::new(Mutex::new(ContactState {
                attach: AttachState::Unattached,
                generation: 0,
                friends: UidSet::new(),
                users: Vec::new(),
                subscriptions: Vec::new(),
            })),
            contacts: Arc::new(contacts),
        }
    }

    pub fn state(&self) -> AttachState {
        lock(&self.state).attach.clone()
    }

    /// Current list
    pub fn contacts(&self) -> Vec<Contact> {
        self.contacts.borrow().clone()
    }

    /// Receiver that observes every recomputed list
    pub fn updates(&self) -> watch::Receiver<Vec<Contact>> {
        self.contacts.subscribe()
    }

    pub fn select_contact(&self, uid: &Uid) -> Route {
        Route::Chat(uid.clone())
    }

    /// Subscribe on behalf of `viewer`, replacing any previous attachment
    #[instrument(skip(self), fields(uid = %viewer))]
    pub async fn attach(&self, viewer: &Uid) -> AppResult<()> {
        let (generation, stale) = {
            let mut state = lock(&self.state);
            let stale = state.reset(AttachState::Attached(viewer.clone()));
            (state.generation, stale)
        };
        drop(stale);
        self.contacts.send_replace(Vec::new());

        let own_doc = {
            let state = Arc::clone(&self.state);
            let contacts = Arc::clone(&self.contacts);
            self.store
                .subscribe_document(
                    &self.users,
                    viewer.as_str(),
                    Box::new(move |doc: Option<&Document>| {
                        let mut state = lock(&state);
                        if state.generation != generation {
                            return;
                        }
                        state.friends = doc
                            .map(|d| UserProfile::from_document(d).friends)
                            .unwrap_or_default();
                        contacts.send_replace(derive_contacts(&state.users, &state.friends));
                    }),
                )
                .await?
        };

        let everyone = {
            let state = Arc::clone(&self.state);
            let contacts = Arc::clone(&self.contacts);
            let viewer = viewer.clone();
            self.store
                .subscribe_collection(
                    &self.users,
                    Box::new(move |docs: &[Document]| {
                        let mut state = lock(&state);
                        if state.generation != generation {
                            return;
                        }
                        state.users = materialize(docs, &viewer);
                        contacts.send_replace(derive_contacts(&state.users, &state.friends));
                    }),
                )
                .await?
        };

        let mut state = lock(&self.state);
        if state.generation == generation {
            state.subscriptions = vec![own_doc, everyone];
            info!("contact list attached");
        } else {
            debug!("attachment superseded before it completed");
        }
        Ok(())
    }

    /// Release both subscriptions and clear the list
    pub fn detach(&self) {
        let released = {
            let mut state = lock(&self.state);
            if state.attach == AttachState::Unattached {
                return;
            }
            state.reset(AttachState::Detached)
        };
        if !released.is_empty() {
            info!("contact list detached");
        }
        drop(released);
        self.contacts.send_replace(Vec::new());
    }

    /// Attach whenever the session has an identity, detach when it clears.
    /// Must be called from within a tokio runtime.
    pub fn follow_session(self: &Arc<Self>, session: &dyn SessionProvider) -> SessionBinding {
        let (tx, mut rx) = mpsc::unbounded_channel::<Option<Uid>>();
        let builder: Weak<Self> = Arc::downgrade(self);

        let worker = tokio::spawn(async move {
            while let Some(identity) = rx.recv().await {
                let Some(builder) = builder.upgrade() else {
                    break;
                };
                match identity {
                    Some(uid) => {
                        if let Err(e) = builder.attach(&uid).await {
                            error!("Error attaching contact list: {}", e);
                        }
                    }
                    None => builder.detach(),
                }
            }
        });

        let subscription = session.on_identity_change(Box::new(move |uid: Option<&Uid>| {
            let _ = tx.send(uid.cloned());
        }));

        SessionBinding {
            _subscription: subscription,
            worker,
        }
    }
}

impl Drop for ContactListBuilder {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Keeps a builder following a session; dropping it stops following
pub struct SessionBinding {
    _subscription: Subscription,
    worker: JoinHandle<()>,
}

impl Drop for SessionBinding {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
