//! `NoteStore` over the Supabase REST (`PostgREST`) endpoint.

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};

use super::NoteStore;
use crate::auth::AccessTokenSlot;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{NewNote, Note, NoteChanges, NoteId, UserId};

const MAX_ERROR_BODY: usize = 240;

/// REST-backed note store. Requests carry the signed-in user's bearer
/// token so row-level security scopes every query to its owner.
#[derive(Debug, Clone)]
pub struct PostgrestNoteStore {
    endpoint: String,
    anon_key: String,
    token: AccessTokenSlot,
    client: Client,
}

impl PostgrestNoteStore {
    pub fn new(config: &ClientConfig, token: AccessTokenSlot) -> Result<Self> {
        Ok(Self {
            endpoint: config.rest_url(),
            anon_key: config.supabase_anon_key.clone(),
            token,
            client: Client::builder().build()?,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.get().ok_or(Error::Unauthenticated)?;
        Ok(request
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .header("Accept", "application/json"))
    }

    async fn rows(response: Response) -> Result<Vec<Note>> {
        let response = check_status(response).await?;
        Ok(response.json::<Vec<Note>>().await?)
    }

    async fn single_row(response: Response, id: Option<NoteId>) -> Result<Note> {
        let mut rows = Self::rows(response).await?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(id.map_or_else(
                || Error::Store("store returned no row".to_string()),
                |id| Error::NotFound(id.to_string()),
            )),
            count => Err(Error::Store(format!("expected one row, store returned {count}"))),
        }
    }
}

impl NoteStore for PostgrestNoteStore {
    async fn query(&self, owner: &UserId) -> Result<Vec<Note>> {
        let request = self.authorized(self.client.get(&self.endpoint).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{owner}")),
            ("order", "updated_at.desc".to_string()),
        ]))?;
        let notes = Self::rows(request.send().await?).await?;
        tracing::debug!("Fetched {} notes for {}", notes.len(), owner);
        Ok(notes)
    }

    async fn insert(&self, owner: &UserId, note: &NewNote) -> Result<Note> {
        let payload = serde_json::json!({
            "user_id": owner,
            "title": note.title,
            "content": note.content,
        });
        let request = self.authorized(
            self.client
                .post(&self.endpoint)
                .header("Prefer", "return=representation")
                .json(&payload),
        )?;
        Self::single_row(request.send().await?, None).await
    }

    async fn update(
        &self,
        id: NoteId,
        changes: &NoteChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<Note> {
        let mut payload = serde_json::to_value(changes)?;
        if let Some(fields) = payload.as_object_mut() {
            fields.insert("updated_at".to_string(), serde_json::to_value(updated_at)?);
        }
        let request = self.authorized(
            self.client
                .patch(&self.endpoint)
                .query(&[("id", format!("eq.{id}"))])
                .header("Prefer", "return=representation")
                .json(&payload),
        )?;
        Self::single_row(request.send().await?, Some(id)).await
    }

    async fn delete(&self, id: NoteId) -> Result<()> {
        let request = self.authorized(
            self.client
                .delete(&self.endpoint)
                .query(&[("id", format!("eq.{id}"))]),
        )?;
        check_status(request.send().await?).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Store(format!("{status}: {}", error_detail(&body))))
}

/// Pull the human-readable message out of a `PostgREST` error body.
fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "msg", "error_description", "error", "hint"] {
            if let Some(message) = value.get(key).and_then(serde_json::Value::as_str) {
                return message.to_string();
            }
        }
    }
    compact_body(body)
}

fn compact_body(body: &str) -> String {
    let compact = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.chars().count() <= MAX_ERROR_BODY {
        return compact;
    }
    let truncated: String = compact.chars().take(MAX_ERROR_BODY).collect();
    format!("{truncated}...")
}
