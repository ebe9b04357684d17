//! In-process note store that doubles as its own change feed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};

use super::NoteStore;
use crate::error::{Error, Result};
use crate::feed::{ChangeEvent, ChangeFeed, FeedMessage, FeedSubscription, FEED_BUFFER};
use crate::models::{NewNote, Note, NoteChanges, NoteId, UserId};

#[derive(Debug, Default)]
struct MemoryState {
    notes: Vec<Note>,
    fail_next: Option<String>,
    query_delays: HashMap<UserId, Duration>,
}

/// Note table held in memory. Every mutation is broadcast to feed
/// subscribers of the row's owner, like the realtime channel does.
///
/// Clones share the same table, so a clone stands in for a second device.
#[derive(Debug, Clone)]
pub struct MemoryNoteStore {
    state: Arc<Mutex<MemoryState>>,
    events: broadcast::Sender<(UserId, ChangeEvent)>,
}

impl Default for MemoryNoteStore {
    fn default() -> Self {
        let (events, _) = broadcast::channel(FEED_BUFFER);
        Self {
            state: Arc::default(),
            events,
        }
    }
}

impl MemoryNoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows without emitting change events.
    pub fn with_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        let store = Self::default();
        if let Ok(mut state) = store.state.lock() {
            state.notes.extend(notes);
        }
        store
    }

    /// Make the next store call fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next = Some(message.into());
        }
    }

    /// Delay queries for `owner`, to stand in for a slow network.
    pub fn delay_queries(&self, owner: &UserId, delay: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.query_delays.insert(owner.clone(), delay);
        }
    }

    /// Push a change event as if another client made it.
    pub fn emit(&self, owner: &UserId, event: ChangeEvent) {
        // No receivers is fine
        let _ = self.events.send((owner.clone(), event));
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        let mut state = self
            .state
            .lock()
            .map_err(|error| Error::Store(error.to_string()))?;
        if let Some(message) = state.fail_next.take() {
            return Err(Error::Store(message));
        }
        Ok(state)
    }
}

impl NoteStore for MemoryNoteStore {
    async fn query(&self, owner: &UserId) -> Result<Vec<Note>> {
        let delay = self.lock()?.query_delays.get(owner).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.lock()?;
        let mut notes: Vec<Note> = state
            .notes
            .iter()
            .filter(|note| &note.user_id == owner)
            .cloned()
            .collect();
        drop(state);
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(notes)
    }

    async fn insert(&self, owner: &UserId, note: &NewNote) -> Result<Note> {
        let now = Utc::now();
        let stored = Note {
            id: NoteId::new(),
            user_id: owner.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
            created_at: now,
            updated_at: now,
        };
        self.lock()?.notes.push(stored.clone());
        self.emit(owner, ChangeEvent::Insert(stored.clone()));
        Ok(stored)
    }

    async fn update(
        &self,
        id: NoteId,
        changes: &NoteChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<Note> {
        let mut state = self.lock()?;
        let slot = state
            .notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        *slot = changes.apply_to(slot, updated_at);
        let updated = slot.clone();
        drop(state);

        self.emit(&updated.user_id, ChangeEvent::Update(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, id: NoteId) -> Result<()> {
        let mut state = self.lock()?;
        let position = state.notes.iter().position(|note| note.id == id);
        let removed = position.map(|index| state.notes.remove(index));
        drop(state);

        if let Some(removed) = removed {
            self.emit(&removed.user_id, ChangeEvent::Delete(id));
        }
        Ok(())
    }
}

impl ChangeFeed for MemoryNoteStore {
    async fn subscribe(&self, owner: &UserId) -> Result<FeedSubscription> {
        let (sender, receiver) = mpsc::channel(FEED_BUFFER);
        let mut events = self.events.subscribe();
        let filter = owner.clone();

        let driver = tokio::spawn(async move {
            loop {
                let message = match events.recv().await {
                    Ok((owner, event)) if owner == filter => FeedMessage::Change(event),
                    Ok(_) => continue,
                    // Missed events; the subscriber has to reload.
                    Err(broadcast::error::RecvError::Lagged(_)) => FeedMessage::Reconnected,
                    Err(broadcast::error::RecvError::Closed) => return,
                };
                if sender.send(message).await.is_err() {
                    return;
                }
            }
        });

        Ok(FeedSubscription::new(owner.clone(), receiver, driver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn query_is_scoped_to_owner_and_newest_first() {
        let store = MemoryNoteStore::new();
        let alice = UserId::new("alice");
        let first = store.insert(&alice, &NewNote::new("first", "")).await.unwrap();
        store
            .insert(&UserId::new("bob"), &NewNote::default())
            .await
            .unwrap();
        let later = first.updated_at + chrono::Duration::seconds(10);
        let second = store.insert(&alice, &NewNote::new("second", "")).await.unwrap();
        store
            .update(first.id, &NoteChanges::default().content("edited"), later)
            .await
            .unwrap();

        let notes = store.query(&alice).await.unwrap();
        let ids: Vec<NoteId> = notes.iter().map(|note| note.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let store = MemoryNoteStore::new();
        let error = store
            .update(NoteId::new(), &NoteChanges::default().title("x"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn fail_next_fails_exactly_one_call() {
        let store = MemoryNoteStore::new();
        store.fail_next("boom");
        let owner = UserId::new("alice");
        assert!(store.query(&owner).await.is_err());
        assert!(store.query(&owner).await.is_ok());
    }

    #[tokio::test]
    async fn feed_delivers_only_the_owners_changes() {
        let store = MemoryNoteStore::new();
        let alice = UserId::new("alice");
        let mut subscription = store.subscribe(&alice).await.unwrap();

        store
            .insert(&UserId::new("bob"), &NewNote::default())
            .await
            .unwrap();
        let note = store.insert(&alice, &NewNote::default()).await.unwrap();
        store.delete(note.id).await.unwrap();

        assert_eq!(
            subscription.next().await,
            Some(FeedMessage::Change(ChangeEvent::Insert(note.clone())))
        );
        assert_eq!(
            subscription.next().await,
            Some(FeedMessage::Change(ChangeEvent::Delete(note.id)))
        );
    }
}
