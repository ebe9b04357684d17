//! Note persistence behind the backend's row-level access rules.

mod memory;
mod postgrest;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{NewNote, Note, NoteChanges, NoteId, UserId};

pub use memory::MemoryNoteStore;
pub use postgrest::PostgrestNoteStore;

/// Trait for remote note storage operations (async)
///
/// Futures are `Send` so a reload can run from the feed task.
pub trait NoteStore: Send + Sync + 'static {
    /// All notes owned by `owner`, most recently updated first
    fn query(&self, owner: &UserId) -> impl Future<Output = Result<Vec<Note>>> + Send;

    /// Insert a note for `owner` and return the stored row
    fn insert(&self, owner: &UserId, note: &NewNote) -> impl Future<Output = Result<Note>> + Send;

    /// Apply `changes` and stamp `updated_at`; returns the stored row
    fn update(
        &self,
        id: NoteId,
        changes: &NoteChanges,
        updated_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Note>> + Send;

    fn delete(&self, id: NoteId) -> impl Future<Output = Result<()>> + Send;
}
