//! notes-core - Core library for Simple Notes
//!
//! Models, Supabase clients (auth, REST store, realtime feed), the session
//! read model, the route guard, and the note list synchronizer shared by
//! every Simple Notes front end.

pub mod auth;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod router;
pub mod session;
pub mod store;
pub mod sync;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use models::{Note, NoteId};
pub use sync::{NoteSynchronizer, NotesView};
