//! Session read model on top of the auth provider.
//!
//! `SessionManager` folds the one-shot session restore and every later
//! session change into a single `AuthState`, published on a watch channel.
//! Dropping a receiver is the unsubscribe.

use tokio::sync::watch;

use crate::auth::{AuthResult, AuthSession, AuthUser, SessionPersistence, SupabaseAuthClient};
use crate::models::UserId;

/// Operations the session manager needs from an auth backend.
#[allow(async_fn_in_trait)]
pub trait SessionProvider {
    async fn current_session(&self) -> AuthResult<Option<AuthSession>>;
    async fn request_sign_in(&self, email: &str) -> AuthResult<()>;
    async fn verify_sign_in(&self, email: &str, code: &str) -> AuthResult<AuthSession>;
    async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthSession>;
    async fn sign_out(&self, access_token: &str) -> AuthResult<()>;
}

impl<S: SessionPersistence> SessionProvider for SupabaseAuthClient<S> {
    async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
        self.restore_session().await
    }

    async fn request_sign_in(&self, email: &str) -> AuthResult<()> {
        self.request_magic_link(email).await
    }

    async fn verify_sign_in(&self, email: &str, code: &str) -> AuthResult<AuthSession> {
        self.verify_email_otp(email, code).await
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        self.refresh_session(refresh_token).await
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        SupabaseAuthClient::sign_out(self, access_token).await
    }
}

/// Snapshot of the session read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub session: Option<AuthSession>,
    /// True until the first restore attempt resolves.
    pub initializing: bool,
}

impl AuthState {
    const fn initializing() -> Self {
        Self {
            session: None,
            initializing: true,
        }
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.session.as_ref().map(|session| &session.user)
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user().map(|user| user.id.clone())
    }
}

/// How a sign-out ended. Local state is cleared in both cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutOutcome {
    Confirmed,
    /// The provider call failed; the session was only dropped locally.
    LocalOnly(String),
}

pub struct SessionManager<P> {
    provider: P,
    state: watch::Sender<AuthState>,
}

impl<P: SessionProvider> SessionManager<P> {
    pub fn new(provider: P) -> Self {
        let (state, _) = watch::channel(AuthState::initializing());
        Self { provider, state }
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Resolve the initial session. Failures leave the user signed out.
    pub async fn restore(&self) -> AuthResult<Option<AuthSession>> {
        let restored = self.provider.current_session().await;
        let session = match &restored {
            Ok(session) => session.clone(),
            Err(error) => {
                tracing::warn!("Session restore failed: {}", error);
                None
            }
        };
        self.publish(session);
        restored
    }

    pub async fn request_sign_in(&self, email: &str) -> AuthResult<()> {
        self.provider.request_sign_in(email).await
    }

    pub async fn complete_sign_in(&self, email: &str, code: &str) -> AuthResult<AuthSession> {
        let session = self.provider.verify_sign_in(email, code).await?;
        tracing::info!("Signed in as {}", session.user.id);
        self.publish(Some(session.clone()));
        Ok(session)
    }

    /// Refresh the current session when it is about to expire.
    ///
    /// A failed refresh signs the user out locally.
    pub async fn refresh_if_expired(&self) -> AuthResult<Option<AuthSession>> {
        let Some(current) = self.current().session else {
            return Ok(None);
        };
        if !current.is_expired() {
            return Ok(Some(current));
        }

        match self.provider.refresh(&current.refresh_token).await {
            Ok(refreshed) => {
                self.publish(Some(refreshed.clone()));
                Ok(Some(refreshed))
            }
            Err(error) => {
                self.publish(None);
                Err(error)
            }
        }
    }

    pub async fn sign_out(&self) -> SignOutOutcome {
        let Some(session) = self.current().session else {
            self.publish(None);
            return SignOutOutcome::Confirmed;
        };

        let outcome = match self.provider.sign_out(&session.access_token).await {
            Ok(()) => SignOutOutcome::Confirmed,
            Err(error) => {
                tracing::warn!("Provider sign-out failed, clearing local session: {}", error);
                SignOutOutcome::LocalOnly(error.to_string())
            }
        };
        self.publish(None);
        outcome
    }

    fn publish(&self, session: Option<AuthSession>) {
        self.state.send_replace(AuthState {
            session,
            initializing: false,
        });
    }
}
