use notes_core::models::filter_notes;
use notes_core::router::Route;

use crate::commands::common::{note_to_list_item, render_dashboard, AppContext, NoteListItem};
use crate::error::CliError;

pub async fn run_list(
    search: Option<&str>,
    as_json: bool,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let context = AppContext::open(profile).await?;
    context.enter(Route::Notes)?;
    let sync = context.snapshot().await?;
    let view = sync.view();
    let search = search.unwrap_or("");

    if as_json {
        let json_items = filter_notes(view.notes.as_slice(), search)
            .into_iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        let state = context.auth_state();
        let email = state.user().and_then(|user| user.email.as_deref());
        for line in render_dashboard(email, &view, search) {
            println!("{line}");
        }
    }

    Ok(())
}
