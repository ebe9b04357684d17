use notes_core::models::DisplayNote;
use notes_core::router::Route;

use crate::commands::common::{render_dashboard, AppContext};
use crate::error::CliError;

/// Render whatever view `path` routes to, after the auth guard.
pub async fn run_open(path: &str, profile: Option<&str>) -> Result<(), CliError> {
    let context = AppContext::open(profile).await?;
    let route = context.enter(Route::parse(path))?;
    let state = context.auth_state();

    match route {
        Route::SignIn => {
            if let Some(user) = state.user() {
                let email = user.email.as_deref().unwrap_or("(no email)");
                println!("Signed in as {email}");
            }
            println!("Sign in with `notes auth login --email <email>`");
        }
        Route::Notes => {
            let sync = context.snapshot().await?;
            let email = state.user().and_then(|user| user.email.as_deref());
            for line in render_dashboard(email, &sync.view(), "") {
                println!("{line}");
            }
        }
        Route::Note(id) => {
            let sync = context.snapshot().await?;
            let view = sync.view();
            let entry = view
                .notes
                .get(id)
                .ok_or_else(|| CliError::NoteNotFound(id.to_string()))?;
            for line in render_note(entry) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

pub fn render_note(entry: &DisplayNote) -> Vec<String> {
    let mut lines = vec![
        entry.note.display_title().to_string(),
        format!("Updated {}", entry.recency),
        String::new(),
    ];
    if entry.note.content.is_empty() {
        lines.push("(empty)".to_string());
    } else {
        lines.extend(entry.note.content.lines().map(str::to_string));
    }
    lines
}
