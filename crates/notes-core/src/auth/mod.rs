//! Supabase auth client: magic-link sign-in, session restore and sign-out.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{normalize_text_option, ClientConfig};
use crate::models::UserId;

const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Supabase auth is not configured.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where a signed-in session survives between runs.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Process-local session storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Option<AuthSession>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn with_session(session: AuthSession) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(session))),
        }
    }

    fn lock(&self) -> AuthResult<std::sync::MutexGuard<'_, Option<AuthSession>>> {
        self.slot
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for MemorySessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        Ok(self.lock()?.clone())
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        *self.lock()? = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        *self.lock()? = None;
        Ok(())
    }
}

/// Bearer token shared by the REST and realtime clients.
///
/// An empty slot means signed out: REST calls fail fast and the realtime
/// join presents the anon key instead.
#[derive(Clone, Default)]
pub struct AccessTokenSlot(Arc<RwLock<Option<String>>>);

impl AccessTokenSlot {
    pub fn set(&self, session: Option<&AuthSession>) {
        if let Ok(mut guard) = self.0.write() {
            *guard = session.map(|session| session.access_token.clone());
        }
    }

    pub fn get(&self) -> Option<String> {
        self.0.read().ok().and_then(|guard| guard.clone())
    }
}

impl fmt::Debug for AccessTokenSlot {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.get().is_some() { "[REDACTED]" } else { "empty" };
        formatter.debug_tuple("AccessTokenSlot").field(&state).finish()
    }
}

#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    redirect_url: Option<String>,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(config: &ClientConfig, store: S) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(&config.supabase_url)?;
        let anon_key = config.supabase_anon_key.trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        Ok(Self {
            auth_url,
            anon_key,
            redirect_url: normalize_text_option(config.redirect_url.clone()),
            client: Client::builder().build()?,
            store,
        })
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored_session.is_expired() {
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    /// Ask the provider to email a sign-in link (and one-time code).
    pub async fn request_magic_link(&self, email: &str) -> AuthResult<()> {
        let email = validate_email(email)?;

        let payload = serde_json::json!({
            "email": email,
            "create_user": true,
        });
        let mut request = self
            .client
            .post(format!("{}/otp", self.auth_url))
            .json(&payload);
        if let Some(redirect_url) = &self.redirect_url {
            request = request.query(&[("redirect_to", redirect_url)]);
        }

        let response = self.public_request(request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        tracing::info!("Magic link requested for {}", email);
        Ok(())
    }

    /// Complete sign-in with the one-time code from the magic-link email.
    pub async fn verify_email_otp(&self, email: &str, token: &str) -> AuthResult<AuthSession> {
        let email = validate_email(email)?;
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::InvalidInput("Verification code is required"));
        }

        let payload = serde_json::json!({
            "type": "email",
            "email": email,
            "token": token,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/verify", self.auth_url))
                .json(&payload),
        );
        let response = self.send_auth_request(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Verify response did not include an active session".to_string())
        })?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let payload = serde_json::json!({
            "refresh_token": refresh_token,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "refresh_token")])
                .json(&payload),
        );
        let response = self.send_auth_request(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Refresh response did not include an active session".to_string())
        })?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    /// Revoke the session with the provider, then drop it locally.
    ///
    /// The local copy is cleared even when the provider call fails; the
    /// provider error is still returned so callers can report it.
    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let remote = self.revoke(access_token).await;
        self.store.clear_session()?;
        remote
    }

    async fn revoke(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !(response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED) {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn send_auth_request(&self, request: RequestBuilder) -> AuthResult<SupabaseAuthResponse> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<SupabaseAuthResponse>().await?)
    }
}

pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    if trimmed.ends_with("/auth/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/auth/v1"))
    }
}

fn validate_email(email: &str) -> AuthResult<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::InvalidInput("Email is required"));
    }
    Ok(email)
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
}

impl SupabaseAuthResponse {
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
        });

        match (
            self.access_token,
            self.refresh_token,
            expires_at,
            self.user,
        ) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user: user.into(),
                }))
            }
            (None, None, None, _) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
}

impl From<SupabaseUser> for AuthUser {
    fn from(value: SupabaseUser) -> Self {
        Self {
            id: UserId::new(value.id),
            email: value.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<SupabaseErrorResponse>(body) {
        if let Some(message) = payload
            .msg
            .or(payload.message)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn unix_timestamp_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
pub(crate) fn test_session(user_id: &str, email: Option<&str>) -> AuthSession {
    AuthSession {
        access_token: format!("access-{user_id}"),
        refresh_token: format!("refresh-{user_id}"),
        expires_at: unix_timestamp_now() + 3_600,
        user: AuthUser {
            id: UserId::new(user_id),
            email: email.map(str::to_string),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_auth_url_appends_auth_path() {
        let normalized = normalize_auth_url("https://demo.supabase.co").unwrap();
        assert_eq!(normalized, "https://demo.supabase.co/auth/v1");
    }

    #[test]
    fn normalize_auth_url_keeps_existing_auth_path() {
        let normalized = normalize_auth_url("https://demo.supabase.co/auth/v1/").unwrap();
        assert_eq!(normalized, "https://demo.supabase.co/auth/v1");
    }

    #[test]
    fn verify_response_builds_session_from_expires_in() {
        let payload = r#"{
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": { "id": "user-1", "email": "jane@example.com" }
        }"#;
        let response: SupabaseAuthResponse = serde_json::from_str(payload).unwrap();
        let session = response.into_session().unwrap().unwrap();
        assert_eq!(session.user.id.as_str(), "user-1");
        assert!(!session.is_expired());
    }

    #[test]
    fn partial_session_fields_are_rejected() {
        let response = SupabaseAuthResponse {
            access_token: Some("a".to_string()),
            refresh_token: None,
            expires_at: None,
            expires_in: None,
            user: None,
        };
        assert!(response.into_session().is_err());
    }

    #[test]
    fn api_error_prefers_provider_message() {
        let body = r#"{"code":429,"msg":"Email rate limit exceeded"}"#;
        assert_eq!(
            parse_api_error(StatusCode::TOO_MANY_REQUESTS, body),
            "Email rate limit exceeded (429)"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let session = test_session("user", None);
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("access-user"));
        assert!(!rendered.contains("refresh-user"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemorySessionStore::default();
        assert!(store.load_session().unwrap().is_none());
        store.save_session(&test_session("u", None)).unwrap();
        assert!(store.load_session().unwrap().is_some());
        store.clear_session().unwrap();
        assert!(store.load_session().unwrap().is_none());
    }

    #[test]
    fn access_token_slot_tracks_session() {
        let slot = AccessTokenSlot::default();
        assert_eq!(slot.get(), None);
        slot.set(Some(&test_session("u", None)));
        assert_eq!(slot.get().as_deref(), Some("access-u"));
        assert!(format!("{slot:?}").contains("[REDACTED]"));
        slot.set(None);
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn blank_email_is_rejected_locally() {
        assert!(matches!(
            validate_email("   "),
            Err(AuthError::InvalidInput("Email is required"))
        ));
    }

    #[tokio::test]
    async fn restore_returns_unexpired_session_without_network() {
        let config = ClientConfig::new("http://127.0.0.1:9", "anon").unwrap();
        let store = MemorySessionStore::with_session(test_session("u", None));
        let client = SupabaseAuthClient::new(&config, store).unwrap();
        let restored = client.restore_session().await.unwrap();
        assert_eq!(restored.unwrap().user.id.as_str(), "u");
    }
}
