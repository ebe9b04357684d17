//! Change feed: pushed insert/update/delete notifications for one owner.
//!
//! A subscription is a channel receiver paired with the task feeding it.
//! Tearing the subscription down (explicitly or by dropping it) aborts
//! that task, so no callbacks outlive the subscriber.

mod realtime;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::{Note, NoteId, UserId};

pub use realtime::{decode_frame, RealtimeFrame, SupabaseRealtimeFeed};

/// Capacity of the per-subscription event buffer.
pub const FEED_BUFFER: usize = 256;

/// A row change pushed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert(Note),
    Update(Note),
    Delete(NoteId),
}

impl ChangeEvent {
    pub const fn note_id(&self) -> NoteId {
        match self {
            Self::Insert(note) | Self::Update(note) => note.id,
            Self::Delete(id) => *id,
        }
    }
}

/// What a subscription yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    /// The channel dropped and re-joined; events may have been missed.
    Reconnected,
}

#[allow(async_fn_in_trait)]
pub trait ChangeFeed {
    /// Start a live subscription filtered to `owner`'s rows.
    async fn subscribe(&self, owner: &UserId) -> Result<FeedSubscription>;
}

/// Feed that never delivers, for one-shot reads that need no live updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFeed;

impl ChangeFeed for OfflineFeed {
    async fn subscribe(&self, owner: &UserId) -> Result<FeedSubscription> {
        let (_, receiver) = mpsc::channel(1);
        let driver = tokio::spawn(async {});
        Ok(FeedSubscription::new(owner.clone(), receiver, driver))
    }
}

/// A live feed subscription. Dropping it tears the channel down.
#[derive(Debug)]
pub struct FeedSubscription {
    owner: UserId,
    receiver: mpsc::Receiver<FeedMessage>,
    driver: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    pub fn new(
        owner: UserId,
        receiver: mpsc::Receiver<FeedMessage>,
        driver: JoinHandle<()>,
    ) -> Self {
        Self {
            owner,
            receiver,
            driver: Some(driver),
        }
    }

    pub const fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Next message, or `None` once the feed has shut down.
    pub async fn next(&mut self) -> Option<FeedMessage> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.receiver.close();
        if let Some(driver) = self.driver.take() {
            driver.abort();
            tracing::debug!("Feed subscription for {} torn down", self.owner);
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.teardown();
    }
}
