use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use notes_core::auth::AccessTokenSlot;
use notes_core::feed::{OfflineFeed, SupabaseRealtimeFeed};
use notes_core::models::{avatar_initials, filter_notes, DisplayNote, NewNote, Note, NoteId};
use notes_core::router::{guard, AuthPhase, Route, RouteDecision};
use notes_core::session::{AuthState, SessionManager};
use notes_core::store::{NoteStore, PostgrestNoteStore};
use notes_core::{ClientConfig, NoteSynchronizer, NotesView};
use serde::Serialize;

use crate::auth::{session_manager, CliAuthClient};
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

/// Everything a command needs for one resolved profile.
pub struct AppContext {
    pub profile_name: String,
    pub config: ClientConfig,
    pub session: SessionManager<CliAuthClient>,
    token: AccessTokenSlot,
}

impl AppContext {
    /// Resolve the profile and restore its stored session.
    pub async fn open(profile: Option<&str>) -> Result<Self, CliError> {
        let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = profiles.resolve_profile_name(profile);
        let config = profiles
            .client_config(&profile_name)
            .map_err(CliError::Config)?
            .ok_or_else(|| {
                CliError::Config(format!(
                    "Profile '{profile_name}' has no Supabase project. Run `notes config init --profile {profile_name}` or set SUPABASE_URL and SUPABASE_ANON_KEY."
                ))
            })?;
        let session = session_manager(&profile_name, &config)
            .map_err(|error| CliError::Auth(error.to_string()))?;
        tracing::debug!("Using profile '{}' ({})", profile_name, config.supabase_url);

        // A failed restore is logged and leaves the profile signed out.
        let _ = session.restore().await;
        let token = AccessTokenSlot::default();
        token.set(session.current().session.as_ref());

        Ok(Self {
            profile_name,
            config,
            session,
            token,
        })
    }

    /// Token slot shared by the store and feed this context builds.
    pub const fn token(&self) -> &AccessTokenSlot {
        &self.token
    }

    pub fn auth_state(&self) -> AuthState {
        self.session.current()
    }

    /// Run `route` through the auth guard and return the route to render.
    pub fn enter(&self, route: Route) -> Result<Route, CliError> {
        route_or_error(guard(route, AuthPhase::from(&self.auth_state())))
    }

    fn store(&self) -> Result<PostgrestNoteStore, CliError> {
        Ok(PostgrestNoteStore::new(&self.config, self.token.clone())?)
    }

    pub async fn create_note(&self, note: &NewNote) -> Result<Note, CliError> {
        create_owned_note(&self.store()?, &self.auth_state(), note).await
    }

    /// Synchronizer loaded once, without a live feed.
    pub async fn snapshot(&self) -> Result<NoteSynchronizer<PostgrestNoteStore, OfflineFeed>, CliError> {
        let sync = NoteSynchronizer::new(self.store()?, OfflineFeed);
        sync.set_user(self.auth_state().user_id()).await?;
        Ok(sync)
    }

    /// Synchronizer subscribed to realtime changes. Load errors are
    /// returned alongside it so the caller can show them and keep going.
    pub async fn live(
        &self,
    ) -> Result<
        (
            NoteSynchronizer<PostgrestNoteStore, SupabaseRealtimeFeed>,
            Option<notes_core::Error>,
        ),
        CliError,
    > {
        let feed = SupabaseRealtimeFeed::new(&self.config, self.token.clone())?;
        let sync = NoteSynchronizer::new(self.store()?, feed);
        let load_error = sync.set_user(self.auth_state().user_id()).await.err();
        Ok((sync, load_error))
    }
}

/// Insert `note` for the signed-in user. The note list is never loaded.
pub async fn create_owned_note<S: NoteStore>(
    store: &S,
    state: &AuthState,
    note: &NewNote,
) -> Result<Note, CliError> {
    let owner = state.user_id().ok_or(CliError::NotSignedIn)?;
    let created = store.insert(&owner, note).await?;
    tracing::info!("Created note {}", created.id);
    Ok(created)
}

pub fn route_or_error(decision: RouteDecision) -> Result<Route, CliError> {
    match decision {
        RouteDecision::Render(route) => Ok(route),
        RouteDecision::Redirect(_) => Err(CliError::NotSignedIn),
        RouteDecision::Loading => Err(CliError::Auth(
            "session restore has not finished".to_string(),
        )),
    }
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub recency: String,
}

pub fn note_to_list_item(entry: &DisplayNote) -> NoteListItem {
    NoteListItem {
        id: entry.note.id.to_string(),
        title: entry.note.display_title().to_string(),
        preview: note_preview(&entry.note.content, 80),
        content: entry.note.content.clone(),
        created_at: entry.note.created_at,
        updated_at: entry.note.updated_at,
        recency: entry.recency.clone(),
    }
}

pub fn short_id(id: NoteId) -> String {
    id.to_string().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_note_lines(notes: &[&DisplayNote]) -> Vec<String> {
    notes
        .iter()
        .map(|entry| {
            let id = short_id(entry.note.id);
            let title = note_preview(entry.note.display_title(), 24);
            let preview = note_preview(&entry.note.content, 40);
            format!(
                "{id:<13}  {title:<24}  {preview:<40}  Updated {}",
                entry.recency
            )
        })
        .collect()
}

/// The note list view: header, then rows or the empty state.
pub fn render_dashboard(email: Option<&str>, view: &NotesView, search: &str) -> Vec<String> {
    let mut lines = vec![format!(
        "Simple Notes  [{}] {}",
        avatar_initials(email),
        email.unwrap_or("")
    )
    .trim_end()
    .to_string()];

    if view.loading {
        lines.push("Loading...".to_string());
        return lines;
    }

    let visible = filter_notes(view.notes.as_slice(), search);
    if visible.is_empty() {
        lines.push("No notes yet. Create your first note!".to_string());
    } else {
        lines.extend(format_note_lines(&visible));
    }
    lines
}

pub fn note_preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

/// Find a loaded note by full id or unique id prefix.
pub fn resolve_note<'a>(
    note_query: &str,
    notes: &'a [DisplayNote],
) -> Result<&'a DisplayNote, CliError> {
    if let Ok(note_id) = note_query.parse::<NoteId>() {
        if let Some(entry) = notes.iter().find(|entry| entry.note.id == note_id) {
            return Ok(entry);
        }
    }

    let prefix = note_query.to_ascii_lowercase();
    let matching = notes
        .iter()
        .filter(|entry| entry.note.id.to_string().starts_with(&prefix))
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::NoteNotFound(note_query.to_string())),
        [entry] => Ok(entry),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|entry| short_id(entry.note.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{note_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Title and body as edited in a text editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}

/// Title on the first line, a blank line, then the content.
pub fn editor_document(title: &str, content: &str) -> String {
    format!("{title}\n\n{content}")
}

pub fn parse_editor_document(document: &str) -> Option<NoteDraft> {
    let document = normalize_content(document)?;
    let (title, rest) = document.split_once('\n').unwrap_or((document.as_str(), ""));
    Some(NoteDraft {
        title: title.trim().to_string(),
        content: rest.trim_start_matches(['\r', '\n']).trim_end().to_string(),
    })
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("notes-{}-{now}.md", std::process::id()))
}
