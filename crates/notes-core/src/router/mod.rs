//! Route table and auth guard for the client views.

use std::fmt;

use crate::models::NoteId;
use crate::session::AuthState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignIn,
    Notes,
    Note(NoteId),
}

impl Route {
    /// Resolve a path. Unknown paths land on the note list.
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim().trim_end_matches('/');
        let mut segments = trimmed.trim_start_matches('/').split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some("auth"), None, None) => Self::SignIn,
            (Some("notes"), Some(id), None) => id.parse().map_or(Self::Notes, Self::Note),
            _ => Self::Notes,
        }
    }

    pub const fn is_protected(self) -> bool {
        !matches!(self, Self::SignIn)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignIn => f.write_str("/auth"),
            Self::Notes => f.write_str("/notes"),
            Self::Note(id) => write!(f, "/notes/{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Initializing,
    Unauthenticated,
    Authenticated,
}

impl From<&AuthState> for AuthPhase {
    fn from(state: &AuthState) -> Self {
        if state.initializing {
            Self::Initializing
        } else if state.session.is_some() {
            Self::Authenticated
        } else {
            Self::Unauthenticated
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Session restore still pending
    Loading,
    Redirect(Route),
    Render(Route),
}

/// Decide what a navigation to `route` shows in the given auth phase.
///
/// The sign-in view renders in every phase, including while signed in.
pub const fn guard(route: Route, phase: AuthPhase) -> RouteDecision {
    if !route.is_protected() {
        return RouteDecision::Render(route);
    }
    match phase {
        AuthPhase::Initializing => RouteDecision::Loading,
        AuthPhase::Unauthenticated => RouteDecision::Redirect(Route::SignIn),
        AuthPhase::Authenticated => RouteDecision::Render(route),
    }
}
