//! Note list synchronizer.
//!
//! Keeps one list per signed-in user, fed by two sources: command results
//! the caller chooses to absorb, and change events from the live feed.
//! Both go through the same merge rule ([`NoteList`]), so arrival order
//! between a load and the feed does not matter.
//!
//! Every user switch bumps a generation counter. Load results and feed
//! events tagged with an older generation are dropped instead of applied.

mod list;

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::AccessTokenSlot;
use crate::error::{Error, Result};
use crate::feed::{ChangeEvent, ChangeFeed, FeedMessage, FeedSubscription};
use crate::models::{DisplayNote, NewNote, Note, NoteChanges, NoteId, UserId};
use crate::session::AuthState;
use crate::store::NoteStore;

pub use list::NoteList;

/// Snapshot published to observers after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotesView {
    pub user_id: Option<UserId>,
    /// Bumped on every user switch
    pub generation: u64,
    pub notes: NoteList,
    pub loading: bool,
}

struct Shared<S> {
    store: S,
    state: watch::Sender<NotesView>,
}

impl<S: NoteStore> Shared<S> {
    fn snapshot(&self) -> (u64, Option<UserId>) {
        let view = self.state.borrow();
        (view.generation, view.user_id.clone())
    }

    /// Run `update` only if the view still belongs to `generation`.
    fn modify_current(&self, generation: u64, update: impl FnOnce(&mut NotesView)) -> bool {
        let mut current = false;
        self.state.send_if_modified(|view| {
            if view.generation != generation {
                return false;
            }
            current = true;
            update(view);
            true
        });
        current
    }

    async fn load(&self, generation: u64, owner: Option<UserId>) -> Result<()> {
        let Some(owner) = owner else {
            self.modify_current(generation, |view| {
                view.notes.clear();
                view.loading = false;
            });
            return Ok(());
        };

        self.modify_current(generation, |view| view.loading = true);
        let result = self.store.query(&owner).await;

        let (notes, outcome) = match result {
            Ok(notes) => (notes, Ok(())),
            Err(error) => {
                tracing::error!("Failed to load notes for {}: {}", owner, error);
                (Vec::new(), Err(error))
            }
        };
        let count = notes.len();
        let now = Utc::now();
        let applied = self.modify_current(generation, |view| {
            view.notes.replace(
                notes
                    .into_iter()
                    .map(|note| DisplayNote::enrich_at(note, now))
                    .collect(),
            );
            view.loading = false;
        });

        if applied {
            tracing::debug!("Loaded {} notes for {}", count, owner);
            outcome
        } else {
            tracing::debug!("Discarding stale load for {}", owner);
            Ok(())
        }
    }

    fn apply(&self, generation: u64, event: ChangeEvent) -> bool {
        let now = Utc::now();
        self.modify_current(generation, |view| view.notes.apply(event, now))
    }
}

/// Drains one feed subscription into the list until it closes or the
/// user changes.
async fn pump<S: NoteStore>(
    shared: Arc<Shared<S>>,
    generation: u64,
    mut subscription: FeedSubscription,
) {
    let owner = subscription.owner().clone();
    while let Some(message) = subscription.next().await {
        match message {
            FeedMessage::Change(event) => {
                if !shared.apply(generation, event) {
                    break;
                }
            }
            FeedMessage::Reconnected => {
                tracing::info!("Change feed for {} reconnected, reloading", owner);
                // Load failures are logged inside.
                let _ = shared.load(generation, Some(owner.clone())).await;
            }
        }
    }
    tracing::debug!("Feed pump for {} stopped", owner);
}

/// Owns the note list for the active user plus that user's feed
/// subscription.
pub struct NoteSynchronizer<S, F> {
    shared: Arc<Shared<S>>,
    feed: F,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<S: NoteStore, F: ChangeFeed> NoteSynchronizer<S, F> {
    pub fn new(store: S, feed: F) -> Self {
        let (state, _) = watch::channel(NotesView::default());
        Self {
            shared: Arc::new(Shared { store, state }),
            feed,
            pump: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &S {
        &self.shared.store
    }

    /// Observe list changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<NotesView> {
        self.shared.state.subscribe()
    }

    pub fn view(&self) -> NotesView {
        self.shared.state.borrow().clone()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.shared.snapshot().1
    }

    /// Switch the active user.
    ///
    /// Tears down the previous feed subscription, subscribes for the new
    /// user and loads their list. Passing the current user again is a
    /// no-op. A failed subscription is logged; the list still loads.
    pub async fn set_user(&self, user_id: Option<UserId>) -> Result<()> {
        let mut generation = 0;
        let changed = self.shared.state.send_if_modified(|view| {
            if view.user_id == user_id && view.generation > 0 {
                return false;
            }
            view.generation += 1;
            view.user_id.clone_from(&user_id);
            view.notes.clear();
            view.loading = user_id.is_some();
            generation = view.generation;
            true
        });
        if !changed {
            return Ok(());
        }

        self.stop_pump();
        if let Some(owner) = &user_id {
            match self.feed.subscribe(owner).await {
                Ok(subscription) => self.start_pump(generation, subscription),
                Err(error) => {
                    tracing::error!("Failed to subscribe to changes for {}: {}", owner, error);
                }
            }
        }

        self.shared.load(generation, user_id).await
    }

    /// Track the session read model: hand the current access token to
    /// the store and feed, then switch to the session's user.
    ///
    /// A refreshed session for the same user only swaps the token. Nothing
    /// changes while the session is still being restored.
    pub async fn follow_session(&self, state: &AuthState, token: &AccessTokenSlot) -> Result<()> {
        if state.initializing {
            return Ok(());
        }
        token.set(state.session.as_ref());
        self.set_user(state.user_id()).await
    }

    /// Full refresh for the current user.
    pub async fn load(&self) -> Result<()> {
        let (generation, owner) = self.shared.snapshot();
        self.shared.load(generation, owner).await
    }

    /// Insert a note owned by the current user.
    ///
    /// The list is not touched; the row arrives through the feed, or the
    /// caller can [`absorb`](Self::absorb) it.
    pub async fn create(&self, note: &NewNote) -> Result<DisplayNote> {
        let owner = self.user_id().ok_or(Error::Unauthenticated)?;
        let stored = self.shared.store.insert(&owner, note).await?;
        tracing::info!("Created note {}", stored.id);
        Ok(DisplayNote::enrich(stored))
    }

    /// Apply `changes` with a fresh `updated_at`. Same list contract as
    /// [`create`](Self::create).
    pub async fn update(&self, id: NoteId, changes: &NoteChanges) -> Result<DisplayNote> {
        if changes.is_empty() {
            return Err(Error::InvalidInput(
                "update needs a title or content change".to_string(),
            ));
        }
        let stored = self.shared.store.update(id, changes, Utc::now()).await?;
        tracing::info!("Updated note {}", stored.id);
        Ok(DisplayNote::enrich(stored))
    }

    pub async fn delete(&self, id: NoteId) -> Result<()> {
        self.shared.store.delete(id).await?;
        tracing::info!("Deleted note {}", id);
        Ok(())
    }

    /// Merge a command result into the list. Rows owned by anyone but the
    /// current user are ignored.
    pub fn absorb(&self, note: &Note) -> bool {
        let (generation, owner) = self.shared.snapshot();
        if owner.as_ref() != Some(&note.user_id) {
            return false;
        }
        self.shared
            .apply(generation, ChangeEvent::Update(note.clone()))
    }

    /// Drop the feed subscription and forget the user.
    pub async fn shutdown(&self) {
        // Clearing the user cannot fail: no store call is made.
        let _ = self.set_user(None).await;
    }

    fn start_pump(&self, generation: u64, subscription: FeedSubscription) {
        let Ok(mut slot) = self.pump.lock() else {
            return;
        };
        // Another switch won the race; its pump stays.
        if self.shared.snapshot().0 != generation {
            subscription.unsubscribe();
            return;
        }
        let handle = tokio::spawn(pump(Arc::clone(&self.shared), generation, subscription));
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    fn stop_pump(&self) {
        if let Ok(mut slot) = self.pump.lock() {
            if let Some(previous) = slot.take() {
                previous.abort();
            }
        }
    }
}

impl<S, F> Drop for NoteSynchronizer<S, F> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.pump.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}
