//! Client configuration for the Supabase-backed services.
//!
//! `ClientConfig` carries the public project URL and anon key plus the
//! knobs the clients need (magic-link redirect target, realtime reconnect
//! policy). Secret credentials never live here.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_NOTES_TABLE: &str = "notes";

/// Public project configuration shared by the auth, store and feed clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Where the magic link should send the user after sign-in.
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default = "default_notes_table")]
    pub notes_table: String,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Exponential backoff policy for the realtime websocket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_ms: 500,
            max_ms: 30_000,
            multiplier: 2.0,
            jitter_ms: 250,
        }
    }
}

impl ReconnectConfig {
    /// Delay that follows `current_ms`, capped at `max_ms`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn next_delay(&self, current_ms: u64) -> u64 {
        let next = (current_ms as f64 * self.multiplier.max(1.0)) as u64;
        next.min(self.max_ms)
    }
}

fn default_notes_table() -> String {
    DEFAULT_NOTES_TABLE.to_string()
}

impl ClientConfig {
    /// Build a validated config from raw (possibly padded) values.
    pub fn new(supabase_url: impl Into<String>, supabase_anon_key: impl Into<String>) -> Result<Self> {
        let supabase_url = normalize_text_option(Some(supabase_url.into()))
            .ok_or_else(|| Error::InvalidInput("Supabase URL must not be empty".to_string()))?;
        if !is_http_url(&supabase_url) {
            return Err(Error::InvalidInput(
                "Supabase URL must include http:// or https://".to_string(),
            ));
        }
        let supabase_anon_key = normalize_text_option(Some(supabase_anon_key.into()))
            .ok_or_else(|| Error::InvalidInput("Supabase anon key must not be empty".to_string()))?;

        Ok(Self {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_anon_key,
            redirect_url: None,
            notes_table: default_notes_table(),
            reconnect: ReconnectConfig::default(),
        })
    }

    #[must_use]
    pub fn with_redirect_url(mut self, redirect_url: Option<String>) -> Self {
        self.redirect_url = normalize_text_option(redirect_url);
        self
    }

    /// Read `SUPABASE_URL`, `SUPABASE_ANON_KEY` and `NOTES_REDIRECT_URL`.
    ///
    /// Returns `Ok(None)` when neither value is set, and an error when only
    /// one of the pair is present.
    pub fn from_env() -> Result<Option<Self>> {
        let url = normalize_text_option(std::env::var("SUPABASE_URL").ok());
        let key = normalize_text_option(std::env::var("SUPABASE_ANON_KEY").ok());
        match (url, key) {
            (None, None) => Ok(None),
            (Some(url), Some(key)) => Ok(Some(
                Self::new(url, key)?
                    .with_redirect_url(std::env::var("NOTES_REDIRECT_URL").ok()),
            )),
            _ => Err(Error::InvalidInput(
                "SUPABASE_URL and SUPABASE_ANON_KEY must be set together".to_string(),
            )),
        }
    }

    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1/{}", self.supabase_url, self.notes_table)
    }

    pub fn realtime_url(&self) -> Result<url::Url> {
        let base = url::Url::parse(&self.supabase_url)
            .map_err(|error| Error::InvalidInput(format!("invalid Supabase URL: {error}")))?;
        let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
        let mut realtime = base.join("realtime/v1/websocket").map_err(|error| {
            Error::InvalidInput(format!("invalid realtime endpoint: {error}"))
        })?;
        realtime
            .set_scheme(scheme)
            .map_err(|()| Error::InvalidInput("invalid realtime scheme".to_string()))?;
        realtime
            .query_pairs_mut()
            .append_pair("apikey", &self.supabase_anon_key)
            .append_pair("vsn", "1.0.0");
        Ok(realtime)
    }
}

/// Trim optional text, mapping blank values to `None`.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
