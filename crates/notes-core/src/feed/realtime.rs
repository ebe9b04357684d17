//! Supabase Realtime (Phoenix channel) client for `postgres_changes`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use super::{ChangeEvent, ChangeFeed, FeedMessage, FeedSubscription, FEED_BUFFER};
use crate::auth::AccessTokenSlot;
use crate::config::{ClientConfig, ReconnectConfig};
use crate::error::{Error, Result};
use crate::models::{Note, NoteId, UserId};

const CHANNEL_TOPIC: &str = "realtime:notes-changes";
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Change feed backed by a Supabase Realtime websocket.
#[derive(Debug, Clone)]
pub struct SupabaseRealtimeFeed {
    endpoint: String,
    anon_key: String,
    table: String,
    token: AccessTokenSlot,
    reconnect: ReconnectConfig,
}

impl SupabaseRealtimeFeed {
    pub fn new(config: &ClientConfig, token: AccessTokenSlot) -> Result<Self> {
        Ok(Self {
            endpoint: config.realtime_url()?.to_string(),
            anon_key: config.supabase_anon_key.clone(),
            table: config.notes_table.clone(),
            token,
            reconnect: config.reconnect.clone(),
        })
    }
}

impl ChangeFeed for SupabaseRealtimeFeed {
    async fn subscribe(&self, owner: &UserId) -> Result<FeedSubscription> {
        let (sender, receiver) = mpsc::channel(FEED_BUFFER);
        let driver = ChannelDriver {
            feed: self.clone(),
            owner: owner.clone(),
        };
        let handle = tokio::spawn(driver.run(sender));
        tracing::info!("Subscribed to realtime changes for {}", owner);
        Ok(FeedSubscription::new(owner.clone(), receiver, handle))
    }
}

enum ConnectionEnd {
    Closed,
    SubscriberGone,
}

struct ChannelDriver {
    feed: SupabaseRealtimeFeed,
    owner: UserId,
}

impl ChannelDriver {
    async fn run(self, sender: mpsc::Sender<FeedMessage>) {
        let reconnect = &self.feed.reconnect;
        let mut backoff = reconnect.initial_ms;
        // Any join after the first attempt may have missed events, whether
        // or not that attempt ever joined.
        let mut retrying = false;

        loop {
            let outcome = self.connect_once(&sender, retrying, &mut backoff).await;
            retrying = true;
            match outcome {
                Ok(ConnectionEnd::SubscriberGone) => return,
                Ok(ConnectionEnd::Closed) => {
                    tracing::warn!("Realtime channel for {} closed", self.owner);
                }
                Err(error) => {
                    tracing::warn!("Realtime channel for {} failed: {}", self.owner, error);
                }
            }
            if sender.is_closed() {
                return;
            }

            let delay = jittered_backoff(backoff, reconnect.jitter_ms);
            tracing::debug!("Reconnecting realtime channel in {}ms", delay);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            backoff = reconnect.next_delay(backoff);
        }
    }

    async fn connect_once(
        &self,
        sender: &mpsc::Sender<FeedMessage>,
        retrying: bool,
        backoff: &mut u64,
    ) -> Result<ConnectionEnd> {
        let (stream, _) = tokio_tungstenite::connect_async(self.feed.endpoint.as_str())
            .await
            .map_err(|error| Error::Feed(error.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let mut message_ref: u64 = 1;
        sink.send(Message::Text(self.join_message(message_ref)))
            .await
            .map_err(|error| Error::Feed(error.to_string()))?;

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    message_ref += 1;
                    sink.send(Message::Text(heartbeat_message(message_ref)))
                        .await
                        .map_err(|error| Error::Feed(error.to_string()))?;
                }
                () = sender.closed() => return Ok(ConnectionEnd::SubscriberGone),
                message = source.next() => {
                    let text = match message {
                        None | Some(Ok(Message::Close(_))) => return Ok(ConnectionEnd::Closed),
                        Some(Err(error)) => return Err(Error::Feed(error.to_string())),
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(_)) => continue,
                    };

                    let frame = match decode_frame(&text) {
                        Ok(frame) => frame,
                        Err(error) => {
                            tracing::warn!("Skipping undecodable realtime frame: {}", error);
                            continue;
                        }
                    };

                    match frame {
                        RealtimeFrame::Joined => {
                            *backoff = self.feed.reconnect.initial_ms;
                            if retrying && sender.send(FeedMessage::Reconnected).await.is_err() {
                                return Ok(ConnectionEnd::SubscriberGone);
                            }
                            tracing::debug!("Joined {} for {}", CHANNEL_TOPIC, self.owner);
                        }
                        RealtimeFrame::JoinRejected(reason) => return Err(Error::Feed(reason)),
                        RealtimeFrame::Change(event) => {
                            if sender.send(FeedMessage::Change(event)).await.is_err() {
                                return Ok(ConnectionEnd::SubscriberGone);
                            }
                        }
                        RealtimeFrame::ChannelClosed => return Ok(ConnectionEnd::Closed),
                        RealtimeFrame::Ignored => {}
                    }
                }
            }
        }
    }

    fn join_message(&self, message_ref: u64) -> String {
        let access_token = self
            .feed
            .token
            .get()
            .unwrap_or_else(|| self.feed.anon_key.clone());
        let message_ref = message_ref.to_string();
        serde_json::json!({
            "topic": CHANNEL_TOPIC,
            "event": "phx_join",
            "payload": {
                "config": {
                    "broadcast": { "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [{
                        "event": "*",
                        "schema": "public",
                        "table": self.feed.table,
                        "filter": format!("user_id=eq.{}", self.owner),
                    }],
                },
                "access_token": access_token,
            },
            "ref": message_ref,
            "join_ref": message_ref,
        })
        .to_string()
    }
}

fn heartbeat_message(message_ref: u64) -> String {
    serde_json::json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": message_ref.to_string(),
    })
    .to_string()
}

fn jittered_backoff(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    base_ms.saturating_add(u64::from(nanos) % jitter_ms)
}

/// A decoded server frame, reduced to what the feed acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeFrame {
    Joined,
    JoinRejected(String),
    Change(ChangeEvent),
    ChannelClosed,
    Ignored,
}

#[derive(Debug, Deserialize)]
struct PhoenixFrame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ReplyPayload {
    status: String,
    #[serde(default)]
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SystemPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChangesPayload {
    data: ChangeData,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: String,
    /// `{}` or absent on the side a change type does not use
    #[serde(default)]
    record: serde_json::Value,
    #[serde(default)]
    old_record: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OldRecord {
    id: NoteId,
}

fn present(value: serde_json::Value) -> Option<serde_json::Value> {
    match &value {
        serde_json::Value::Null => None,
        serde_json::Value::Object(fields) if fields.is_empty() => None,
        _ => Some(value),
    }
}

/// Decode one text frame from the realtime socket.
pub fn decode_frame(text: &str) -> Result<RealtimeFrame> {
    let frame: PhoenixFrame = serde_json::from_str(text)?;
    if frame.topic != CHANNEL_TOPIC {
        return Ok(RealtimeFrame::Ignored);
    }

    match frame.event.as_str() {
        "phx_reply" => {
            let reply: ReplyPayload = serde_json::from_value(frame.payload)?;
            if reply.status == "ok" {
                Ok(RealtimeFrame::Joined)
            } else {
                let reason = reply
                    .response
                    .get("reason")
                    .and_then(serde_json::Value::as_str)
                    .map_or_else(|| reply.response.to_string(), str::to_string);
                Ok(RealtimeFrame::JoinRejected(reason))
            }
        }
        "system" => {
            let system: SystemPayload = serde_json::from_value(frame.payload)?;
            if system.status.as_deref() == Some("error") {
                Ok(RealtimeFrame::JoinRejected(
                    system
                        .message
                        .unwrap_or_else(|| "realtime subscription error".to_string()),
                ))
            } else {
                Ok(RealtimeFrame::Ignored)
            }
        }
        "phx_close" | "phx_error" => Ok(RealtimeFrame::ChannelClosed),
        "postgres_changes" => {
            let changes: ChangesPayload = serde_json::from_value(frame.payload)?;
            decode_change(changes.data).map(RealtimeFrame::Change)
        }
        _ => Ok(RealtimeFrame::Ignored),
    }
}

fn decode_change(data: ChangeData) -> Result<ChangeEvent> {
    let missing = |field: &str| Error::Feed(format!("{} event without {field}", data.kind));
    match data.kind.as_str() {
        "INSERT" | "UPDATE" => {
            let record = present(data.record).ok_or_else(|| missing("record"))?;
            let note: Note = serde_json::from_value(record)?;
            if data.kind == "INSERT" {
                Ok(ChangeEvent::Insert(note))
            } else {
                Ok(ChangeEvent::Update(note))
            }
        }
        "DELETE" => {
            let old = present(data.old_record).ok_or_else(|| missing("old_record"))?;
            let old: OldRecord = serde_json::from_value(old)?;
            Ok(ChangeEvent::Delete(old.id))
        }
        other => Err(Error::Feed(format!("unknown change type {other}"))),
    }
}
