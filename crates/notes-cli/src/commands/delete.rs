use notes_core::router::Route;

use crate::commands::common::{normalize_note_identifier, resolve_note, AppContext};
use crate::error::CliError;

pub async fn run_delete(id: &str, profile: Option<&str>) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let context = AppContext::open(profile).await?;
    context.enter(Route::Notes)?;
    let sync = context.snapshot().await?;
    let view = sync.view();
    let note_id = resolve_note(&normalized_id, view.notes.as_slice())?.note.id;

    sync.delete(note_id).await?;
    println!("{note_id}");
    Ok(())
}
