use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use notes_core::router::Route;
use notes_core::NotesView;

use crate::commands::common::{render_dashboard, AppContext};
use crate::error::CliError;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Live dashboard: re-rendered on every merge until Ctrl-C.
pub async fn run_watch(search: Option<&str>, profile: Option<&str>) -> Result<(), CliError> {
    let context = AppContext::open(profile).await?;
    context.enter(Route::Notes)?;
    let (sync, load_error) = context.live().await?;
    let mut changes = sync.subscribe();

    let state = context.auth_state();
    let email = state.user().and_then(|user| user.email.as_deref());
    let search = search.unwrap_or("");
    let status = load_error.map(|error| format!("Could not load notes: {error}"));

    let mut sessions = context.session.subscribe();
    let mut session_check = tokio::time::interval(SESSION_CHECK_INTERVAL);
    let mut signed_out = false;

    render(email, &sync.view(), search, status.as_deref())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = changes.borrow_and_update().clone();
                render(email, &view, search, None)?;
            }
            _ = session_check.tick() => {
                // A failed refresh signs out, which the session arm handles.
                if let Err(error) = context.session.refresh_if_expired().await {
                    tracing::warn!("Session refresh failed: {}", error);
                }
            }
            changed = sessions.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = sessions.borrow_and_update().clone();
                if let Err(error) = sync.follow_session(&current, context.token()).await {
                    let status = format!("Could not load notes: {error}");
                    render(email, &sync.view(), search, Some(&status))?;
                }
                if current.session.is_none() {
                    signed_out = true;
                    break;
                }
            }
        }
    }

    sync.shutdown().await;
    if signed_out {
        return Err(CliError::NotSignedIn);
    }
    Ok(())
}

fn render(
    email: Option<&str>,
    view: &NotesView,
    search: &str,
    status: Option<&str>,
) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    if stdout.is_terminal() {
        write!(stdout, "{CLEAR_SCREEN}")?;
    }
    for line in render_dashboard(email, view, search) {
        writeln!(stdout, "{line}")?;
    }
    if let Some(status) = status {
        writeln!(stdout, "{status}")?;
    }
    writeln!(stdout, "Watching for changes. Press Ctrl-C to stop.")?;
    stdout.flush()?;
    Ok(())
}
