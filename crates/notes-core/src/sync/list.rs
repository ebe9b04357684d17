//! The in-memory note list and its merge rule.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feed::ChangeEvent;
use crate::models::{DisplayNote, Note, NoteId};

/// Ordered, id-unique list of display notes.
///
/// Merge rule: an inserted or updated row replaces any entry with the same
/// id and goes to the front. The rest of the list is not re-sorted, so the
/// head is the most recently touched note even when its timestamp is older
/// than its neighbour's. Only [`NoteList::replace`] establishes timestamp
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NoteList {
    notes: Vec<DisplayNote>,
}

impl NoteList {
    #[must_use]
    pub const fn new() -> Self {
        Self { notes: Vec::new() }
    }

    /// Replace the whole list with a fresh store result.
    pub fn replace(&mut self, notes: Vec<DisplayNote>) {
        let mut seen = HashSet::with_capacity(notes.len());
        self.notes = notes;
        self.notes.retain(|entry| seen.insert(entry.note.id));
    }

    /// Remove any entry with the same id, then prepend.
    pub fn upsert(&mut self, note: DisplayNote) {
        let id = note.note.id;
        self.notes.retain(|existing| existing.note.id != id);
        self.notes.insert(0, note);
    }

    /// Returns whether an entry was removed; absent ids are a no-op.
    pub fn remove(&mut self, id: NoteId) -> bool {
        let before = self.notes.len();
        self.notes.retain(|existing| existing.note.id != id);
        self.notes.len() != before
    }

    /// Fold one change event into the list.
    pub fn apply(&mut self, event: ChangeEvent, now: DateTime<Utc>) {
        match event {
            ChangeEvent::Insert(note) | ChangeEvent::Update(note) => {
                self.upsert(DisplayNote::enrich_at(note, now));
            }
            ChangeEvent::Delete(id) => {
                self.remove(id);
            }
        }
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    pub fn get(&self, id: NoteId) -> Option<&DisplayNote> {
        self.notes.iter().find(|entry| entry.note.id == id)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[DisplayNote] {
        &self.notes
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplayNote> {
        self.notes.iter()
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter().map(|entry| &entry.note)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    fn note(title: &str, updated_at: DateTime<Utc>) -> Note {
        Note {
            id: NoteId::new(),
            user_id: UserId::new("owner"),
            title: title.to_string(),
            content: String::new(),
            created_at: updated_at,
            updated_at,
        }
    }

    fn titles(list: &NoteList) -> Vec<&str> {
        list.notes().map(|note| note.title.as_str()).collect()
    }

    #[test]
    fn applying_the_same_event_twice_is_idempotent() {
        let now = at(30);
        let existing = note("existing", at(1));
        let pushed = note("pushed", at(2));

        let mut once = NoteList::new();
        once.replace(vec![DisplayNote::enrich_at(existing, now)]);
        let mut twice = once.clone();

        once.apply(ChangeEvent::Insert(pushed.clone()), now);
        twice.apply(ChangeEvent::Insert(pushed.clone()), now);
        twice.apply(ChangeEvent::Insert(pushed), now);

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 2);
    }

    #[test]
    fn update_moves_entry_to_front_without_duplicates() {
        let now = at(30);
        let x = note("x", at(5));
        let y = note("y", at(4));
        let mut list = NoteList::new();
        list.replace(vec![
            DisplayNote::enrich_at(x.clone(), now),
            DisplayNote::enrich_at(y.clone(), now),
        ]);

        let mut edited = x.clone();
        edited.title = "x'".to_string();
        list.apply(ChangeEvent::Update(edited), now);

        assert_eq!(titles(&list), vec!["x'", "y"]);
        assert_eq!(list.get(y.id).map(|entry| &entry.note), Some(&y));
    }

    #[test]
    fn deleting_an_absent_id_leaves_list_unchanged() {
        let now = at(30);
        let mut list = NoteList::new();
        list.replace(vec![DisplayNote::enrich_at(note("kept", at(1)), now)]);
        let before = list.clone();

        assert!(!list.remove(NoteId::new()));
        list.apply(ChangeEvent::Delete(NoteId::new()), now);
        assert_eq!(list, before);
    }

    #[test]
    fn live_events_prepend_instead_of_resorting() {
        let now = at(30);
        let first = note("1", at(1));
        let mut list = NoteList::new();
        list.replace(vec![DisplayNote::enrich_at(first.clone(), now)]);

        list.apply(ChangeEvent::Insert(note("2", at(10))), now);
        assert_eq!(titles(&list), vec!["2", "1"]);

        // Older timestamp than "2", still goes to the front.
        let mut touched = first;
        touched.updated_at = at(3);
        list.apply(ChangeEvent::Update(touched), now);
        assert_eq!(titles(&list), vec!["1", "2"]);
    }

    #[test]
    fn merge_commutes_with_load_for_distinct_events() {
        let now = at(30);
        let loaded = note("loaded", at(1));
        let pushed = note("pushed", at(2));

        let mut load_first = NoteList::new();
        load_first.replace(vec![DisplayNote::enrich_at(loaded.clone(), now)]);
        load_first.apply(ChangeEvent::Insert(pushed.clone()), now);

        let mut event_then_echo = load_first.clone();
        event_then_echo.apply(ChangeEvent::Insert(pushed), now);

        assert_eq!(load_first, event_then_echo);
        assert!(load_first.get(loaded.id).is_some());
        assert_eq!(load_first.len(), 2);
    }
}
