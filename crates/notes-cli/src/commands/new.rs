use std::io::{self, IsTerminal};

use notes_core::models::NewNote;
use notes_core::router::Route;

use crate::commands::common::{
    capture_editor_input_with_initial, editor_document, normalize_content, parse_editor_document,
    read_piped_stdin, AppContext,
};
use crate::error::CliError;

/// Create a note from args, piped stdin, or the editor, in that order.
///
/// With nothing to read the note is created as "Untitled" and empty.
pub async fn run_new(
    title: Option<String>,
    content_parts: &[String],
    profile: Option<&str>,
) -> Result<(), CliError> {
    let context = AppContext::open(profile).await?;
    context.enter(Route::Notes)?;

    let note = resolve_new_note(title, content_parts)?;
    let created = context.create_note(&note).await?;
    println!("{}", created.id);
    Ok(())
}

fn resolve_new_note(title: Option<String>, content_parts: &[String]) -> Result<NewNote, CliError> {
    let defaults = NewNote::default();
    let title = title
        .and_then(|title| normalize_content(&title))
        .unwrap_or(defaults.title);

    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(NewNote::new(title, content));
    }
    if let Some(content) = read_piped_stdin()? {
        return Ok(NewNote::new(title, content));
    }
    if io::stdin().is_terminal() {
        if let Some(draft) = capture_editor_input_with_initial(&editor_document(&title, ""))?
            .as_deref()
            .and_then(parse_editor_document)
        {
            return Ok(NewNote::new(draft.title, draft.content));
        }
    }
    Ok(NewNote::new(title, defaults.content))
}
