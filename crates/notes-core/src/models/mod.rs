//! Data models for Simple Notes

mod display;
mod note;

pub use display::{avatar_initials, filter_notes, recency_label, DisplayNote};
pub use note::{NewNote, Note, NoteChanges, NoteId, UserId};
