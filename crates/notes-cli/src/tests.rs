use chrono::{Duration, TimeZone, Utc};
use clap::Parser;
use notes_core::auth::{AuthSession, AuthUser};
use notes_core::models::{DisplayNote, NewNote, Note, NoteId, UserId};
use notes_core::session::AuthState;
use notes_core::store::{MemoryNoteStore, NoteStore};
use notes_core::router::{Route, RouteDecision};
use notes_core::sync::NoteList;
use notes_core::NotesView;
use pretty_assertions::assert_eq;

use crate::cli::{Cli, Commands, CompletionShell};
use crate::commands::common::{
    create_owned_note, default_editor, editor_document, format_note_lines, normalize_content,
    normalize_note_identifier, note_preview, note_to_list_item, parse_editor_document,
    render_dashboard, resolve_note, route_or_error, NoteDraft,
};
use crate::commands::completions::render_completions;
use crate::commands::config::{describe_profile, missing_fields, redact_key};
use crate::commands::open::render_note;
use crate::config_profiles::CliProfile;
use crate::error::CliError;

fn note(id: &str, title: &str, content: &str, minutes_ago: i64) -> DisplayNote {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let updated_at = now - Duration::minutes(minutes_ago);
    DisplayNote::enrich_at(
        Note {
            id: id.parse().unwrap(),
            user_id: UserId::new("owner"),
            title: title.to_string(),
            content: content.to_string(),
            created_at: updated_at,
            updated_at,
        },
        now,
    )
}

fn view_of(notes: Vec<DisplayNote>) -> NotesView {
    let mut list = NoteList::new();
    list.replace(notes);
    NotesView {
        user_id: Some(UserId::new("owner")),
        generation: 1,
        notes: list,
        loading: false,
    }
}

const ID_A: &str = "11111111-1111-4111-8111-111111111111";
const ID_B: &str = "11111111-1111-4111-8111-222222222222";
const ID_C: &str = "33333333-1111-4111-8111-333333333333";

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn normalize_note_identifier_rejects_empty() {
    assert!(matches!(
        normalize_note_identifier(" \n "),
        Err(CliError::EmptyNoteId)
    ));
    assert_eq!(normalize_note_identifier("  abc123  ").unwrap(), "abc123");
}

#[test]
fn note_preview_truncates_with_ellipsis() {
    let preview = note_preview("This is a very long sentence that should be shortened", 20);
    assert_eq!(preview, "This is a very lo...");
    assert_eq!(note_preview("first line\nsecond line", 40), "first line");
}

#[test]
fn resolve_note_supports_exact_and_prefix_id() {
    let notes = vec![note(ID_A, "A", "", 1), note(ID_B, "B", "", 2), note(ID_C, "C", "", 3)];

    assert_eq!(resolve_note(ID_B, &notes).unwrap().note.title, "B");
    assert_eq!(resolve_note("3333", &notes).unwrap().note.title, "C");

    let ambiguous = resolve_note("11111111", &notes).unwrap_err();
    assert!(matches!(ambiguous, CliError::AmbiguousNoteId(message) if message.contains("11111111-1111")));
    assert!(matches!(
        resolve_note("ffff", &notes),
        Err(CliError::NoteNotFound(_))
    ));
}

#[test]
fn editor_document_puts_title_on_first_line() {
    let document = editor_document("Groceries", "milk\neggs");
    assert_eq!(document, "Groceries\n\nmilk\neggs");
    assert_eq!(
        parse_editor_document(&document),
        Some(NoteDraft {
            title: "Groceries".to_string(),
            content: "milk\neggs".to_string(),
        })
    );
}

#[test]
fn parse_editor_document_handles_title_only_and_blank() {
    assert_eq!(
        parse_editor_document("  Just a title \n"),
        Some(NoteDraft {
            title: "Just a title".to_string(),
            content: String::new(),
        })
    );
    assert_eq!(parse_editor_document("\n \n"), None);
}

#[test]
fn dashboard_shows_empty_state_with_initials() {
    let lines = render_dashboard(Some("ada@example.com"), &view_of(Vec::new()), "");
    assert_eq!(
        lines,
        vec![
            "Simple Notes  [AD] ada@example.com".to_string(),
            "No notes yet. Create your first note!".to_string(),
        ]
    );
}

#[test]
fn dashboard_shows_loading_before_first_load() {
    let mut view = view_of(Vec::new());
    view.loading = true;
    let lines = render_dashboard(None, &view, "");
    assert_eq!(lines, vec!["Simple Notes  [U?]".to_string(), "Loading...".to_string()]);
}

#[test]
fn dashboard_filters_by_search_and_shows_recency() {
    let view = view_of(vec![
        note(ID_A, "Groceries", "milk and eggs", 5),
        note(ID_B, "Ideas", "write a CLI", 90),
    ]);

    let lines = render_dashboard(Some("ada@example.com"), &view, "MILK");
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("Groceries"));
    assert!(lines[1].ends_with("Updated 5 minutes ago"));

    let nothing = render_dashboard(Some("ada@example.com"), &view, "zzz");
    assert_eq!(nothing[1], "No notes yet. Create your first note!");
}

#[test]
fn note_lines_keep_list_order() {
    let first = note(ID_B, "", "body", 120);
    let second = note(ID_A, "Second", "", 1);
    let lines = format_note_lines(&[&first, &second]);
    assert!(lines[0].starts_with("11111111-1111"));
    assert!(lines[0].contains("Untitled"));
    assert!(lines[0].ends_with("Updated about 2 hours ago"));
    assert!(lines[1].contains("Second"));
}

#[test]
fn list_item_json_uses_display_fields() {
    let item = note_to_list_item(&note(ID_A, "", "hello\nworld", 0));
    let value = serde_json::to_value(&item).unwrap();
    assert_eq!(value["id"], ID_A);
    assert_eq!(value["title"], "Untitled");
    assert_eq!(value["preview"], "hello");
    assert_eq!(value["recency"], "less than a minute ago");
}

#[test]
fn note_view_shows_title_recency_and_body() {
    let lines = render_note(&note(ID_A, "Plan", "step one\nstep two", 3));
    assert_eq!(
        lines,
        vec![
            "Plan".to_string(),
            "Updated 3 minutes ago".to_string(),
            String::new(),
            "step one".to_string(),
            "step two".to_string(),
        ]
    );
}

#[test]
fn guard_redirect_becomes_sign_in_hint() {
    assert!(matches!(
        route_or_error(RouteDecision::Redirect(Route::SignIn)),
        Err(CliError::NotSignedIn)
    ));
    let id: NoteId = ID_A.parse().unwrap();
    assert_eq!(
        route_or_error(RouteDecision::Render(Route::Note(id))).unwrap(),
        Route::Note(id)
    );
    assert!(route_or_error(RouteDecision::Loading).is_err());
}

#[test]
fn cli_parses_list_and_new() {
    let cli = Cli::try_parse_from(["notes", "--profile", "work", "list", "--search", "milk"]).unwrap();
    assert_eq!(cli.profile.as_deref(), Some("work"));
    assert!(matches!(
        cli.command,
        Commands::List { search: Some(ref query), json: false } if query == "milk"
    ));

    let cli = Cli::try_parse_from(["notes", "new", "--title", "Todo", "buy", "milk"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::New { title: Some(ref title), ref content } if title == "Todo" && content.len() == 2
    ));
}

#[test]
fn completions_mention_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("notes"));
}

#[test]
fn profile_description_redacts_anon_key() {
    let profile = CliProfile {
        supabase_url: Some("https://demo.supabase.co".to_string()),
        supabase_anon_key: Some("eyJhbGciOiJIUzI1NiJ9.secret".to_string()),
        redirect_url: None,
    };
    let lines = describe_profile("default", &profile);
    assert_eq!(lines[2], "supabase_anon_key: eyJhbG...[REDACTED]");
    assert_eq!(lines[3], "redirect_url: (unset)");
    assert_eq!(redact_key("short"), "[REDACTED]");
    assert!(missing_fields(&profile).is_empty());
    assert_eq!(
        missing_fields(&CliProfile::default()),
        vec!["supabase_url", "supabase_anon_key"]
    );
}

fn signed_in(user: &str) -> AuthState {
    AuthState {
        session: Some(AuthSession {
            access_token: format!("access-{user}"),
            refresh_token: format!("refresh-{user}"),
            expires_at: 4_102_444_800,
            user: AuthUser {
                id: UserId::new(user),
                email: None,
            },
        }),
        initializing: false,
    }
}

#[tokio::test]
async fn create_inserts_for_owner_without_loading_the_list() {
    let owner = UserId::new("owner");
    let store = MemoryNoteStore::new();
    // A list load would stall here for an hour.
    store.delay_queries(&owner, std::time::Duration::from_secs(3_600));

    let created = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        create_owned_note(&store, &signed_in("owner"), &NewNote::new("Todo", "milk")),
    )
    .await
    .expect("create waited on a list load")
    .unwrap();
    assert_eq!(created.user_id, owner);
    assert_eq!(created.title, "Todo");
}

#[tokio::test]
async fn create_requires_a_signed_in_user() {
    let store = MemoryNoteStore::new();
    let signed_out = AuthState {
        session: None,
        initializing: false,
    };
    let result = create_owned_note(&store, &signed_out, &NewNote::default()).await;
    assert!(matches!(result, Err(CliError::NotSignedIn)));
    assert!(store.query(&UserId::new("owner")).await.unwrap().is_empty());
}
