use notes_core::models::NoteChanges;
use notes_core::router::Route;

use crate::commands::common::{
    capture_editor_input_with_initial, editor_document, normalize_note_identifier,
    parse_editor_document, resolve_note, AppContext,
};
use crate::error::CliError;

pub async fn run_edit(id: &str, profile: Option<&str>) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let context = AppContext::open(profile).await?;
    context.enter(Route::Notes)?;
    let sync = context.snapshot().await?;
    let view = sync.view();
    let note = &resolve_note(&normalized_id, view.notes.as_slice())?.note;
    context.enter(Route::Note(note.id))?;

    let edited = capture_editor_input_with_initial(&editor_document(&note.title, &note.content))?;
    let Some(draft) = edited.as_deref().and_then(parse_editor_document) else {
        return Err(CliError::EmptyEditedContent);
    };

    let mut changes = NoteChanges::default();
    if draft.title != note.title {
        changes = changes.title(draft.title);
    }
    if draft.content != note.content {
        changes = changes.content(draft.content);
    }
    if changes.is_empty() {
        println!("{}", note.id);
        return Ok(());
    }

    let updated = sync.update(note.id, &changes).await?;
    println!("{}", updated.note.id);
    Ok(())
}
