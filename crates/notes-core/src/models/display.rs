//! Display-side enrichment of notes.
//!
//! A `DisplayNote` is a stored note plus a recency label derived from
//! `updated_at` at the moment the note entered the in-memory list. The
//! label is never persisted.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::Serialize;

use super::note::Note;

const MINUTES_IN_DAY: i64 = 1_440;
const MINUTES_IN_MONTH: i64 = 43_200;
const MINUTES_IN_TWO_MONTHS: i64 = 86_400;

/// A note enriched with its human-readable recency label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayNote {
    #[serde(flatten)]
    pub note: Note,
    /// e.g. "about 2 hours ago"
    pub recency: String,
}

impl DisplayNote {
    /// Enrich relative to the current wall clock.
    #[must_use]
    pub fn enrich(note: Note) -> Self {
        Self::enrich_at(note, Utc::now())
    }

    #[must_use]
    pub fn enrich_at(note: Note, now: DateTime<Utc>) -> Self {
        let recency = recency_label(note.updated_at, now);
        Self { note, recency }
    }
}

/// Distance between `instant` and `now` in words, with an "ago"/"in" suffix.
///
/// Minutes are rounded to the nearest whole minute before the buckets are
/// picked, so 89 seconds reads "1 minute ago" and 30 seconds "less than a
/// minute ago".
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn recency_label(instant: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let (earlier, later, in_future) = if instant <= now {
        (instant, now, false)
    } else {
        (now, instant, true)
    };

    let seconds = (later - earlier).num_seconds();
    let minutes = (seconds as f64 / 60.0).round() as i64;
    let rounded = |unit: i64| (minutes as f64 / unit as f64).round() as i64;

    let distance = if minutes < 2 {
        if minutes == 0 {
            "less than a minute".to_string()
        } else {
            "1 minute".to_string()
        }
    } else if minutes < 45 {
        format!("{minutes} minutes")
    } else if minutes < 90 {
        "about 1 hour".to_string()
    } else if minutes < MINUTES_IN_DAY {
        format!("about {} hours", rounded(60))
    } else if minutes < 2_520 {
        "1 day".to_string()
    } else if minutes < MINUTES_IN_MONTH {
        format!("{} days", rounded(MINUTES_IN_DAY))
    } else if minutes < MINUTES_IN_TWO_MONTHS {
        with_unit("about ", rounded(MINUTES_IN_MONTH), "month")
    } else {
        let months = calendar_months_between(earlier, later);
        if months < 12 {
            with_unit("", rounded(MINUTES_IN_MONTH), "month")
        } else {
            let years = months / 12;
            match months % 12 {
                0..=2 => with_unit("about ", years, "year"),
                3..=8 => with_unit("over ", years, "year"),
                _ => with_unit("almost ", years + 1, "year"),
            }
        }
    };

    if in_future {
        format!("in {distance}")
    } else {
        format!("{distance} ago")
    }
}

fn with_unit(prefix: &str, count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{prefix}1 {unit}")
    } else {
        format!("{prefix}{count} {unit}s")
    }
}

/// Whole months from `earlier` to `later`, counted the way date-fns
/// `differenceInMonths` counts them.
///
/// `later` is stepped back by the calendar-month difference with JS `Date`
/// overflow (a late-February `later` is first pushed to the 30th, which
/// lands in March). The last month counts only if that lands on or after
/// `earlier`, except that a `later` on the last day of its month always
/// completes a one-month gap.
fn calendar_months_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    let difference = i64::from(later.year() - earlier.year()) * 12 + i64::from(later.month0())
        - i64::from(earlier.month0());
    if difference < 1 {
        return 0;
    }

    let mut anchor = later.date_naive();
    if anchor.month0() == 1 && anchor.day() > 27 {
        anchor = overflowing_date(anchor.year(), 1, 30).unwrap_or(anchor);
    }
    let Some(shifted) = overflowing_date(
        anchor.year(),
        i64::from(anchor.month0()) - difference,
        anchor.day(),
    ) else {
        return difference;
    };

    let mut last_month_partial = shifted.and_time(later.time()) < earlier.naive_utc();
    if difference == 1 && is_last_day_of_month(later.date_naive()) {
        last_month_partial = false;
    }
    difference - i64::from(last_month_partial)
}

/// `Date(year, month0, day)` with JS overflow: out-of-range months roll the
/// year and out-of-range days roll into the following month.
fn overflowing_date(year: i32, month0: i64, day: u32) -> Option<NaiveDate> {
    let total = i64::from(year) * 12 + month0;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12)).ok()? + 1;
    NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_days(Days::new(u64::from(day.saturating_sub(1))))
}

fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt()
        .map_or(true, |next| next.month() != date.month())
}

/// Case-insensitive search over title and content; blank queries match all.
pub fn filter_notes<'a>(notes: &'a [DisplayNote], query: &str) -> Vec<&'a DisplayNote> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return notes.iter().collect();
    }

    notes
        .iter()
        .filter(|entry| {
            entry.note.title.to_lowercase().contains(&query)
                || entry.note.content.to_lowercase().contains(&query)
        })
        .collect()
}

/// Two-letter avatar badge from the user's email.
pub fn avatar_initials(email: Option<&str>) -> String {
    let source = email.filter(|email| !email.is_empty()).unwrap_or("U?");
    source.chars().take(2).collect::<String>().to_uppercase()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::models::{NoteId, UserId};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn ago(duration: Duration) -> String {
        recency_label(now() - duration, now())
    }

    fn note(title: &str, content: &str) -> DisplayNote {
        DisplayNote::enrich_at(
            Note {
                id: NoteId::new(),
                user_id: UserId::new("u"),
                title: title.to_string(),
                content: content.to_string(),
                created_at: now(),
                updated_at: now(),
            },
            now(),
        )
    }

    #[test]
    fn recency_under_two_minutes() {
        assert_eq!(ago(Duration::seconds(10)), "less than a minute ago");
        assert_eq!(ago(Duration::seconds(45)), "1 minute ago");
        assert_eq!(ago(Duration::seconds(89)), "1 minute ago");
    }

    #[test]
    fn recency_minutes_and_hours() {
        assert_eq!(ago(Duration::minutes(5)), "5 minutes ago");
        assert_eq!(ago(Duration::minutes(44)), "44 minutes ago");
        assert_eq!(ago(Duration::minutes(45)), "about 1 hour ago");
        assert_eq!(ago(Duration::minutes(90)), "about 2 hours ago");
        assert_eq!(ago(Duration::hours(23)), "about 23 hours ago");
    }

    #[test]
    fn recency_days_and_months() {
        assert_eq!(ago(Duration::hours(30)), "1 day ago");
        assert_eq!(ago(Duration::days(3)), "3 days ago");
        assert_eq!(ago(Duration::days(31)), "about 1 month ago");
        assert_eq!(ago(Duration::days(50)), "about 2 months ago");
        assert_eq!(ago(Duration::days(120)), "4 months ago");
    }

    #[test]
    fn recency_years() {
        assert_eq!(ago(Duration::days(370)), "about 1 year ago");
        assert_eq!(ago(Duration::days(365 + 180)), "over 1 year ago");
        assert_eq!(ago(Duration::days(365 + 330)), "almost 2 years ago");
    }

    #[test]
    fn month_counting_follows_end_of_month_rules() {
        let at = |year, month, day| Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap();
        assert_eq!(calendar_months_between(at(2024, 1, 31), at(2024, 2, 29)), 1);
        assert_eq!(calendar_months_between(at(2023, 12, 31), at(2024, 2, 29)), 2);
        assert_eq!(calendar_months_between(at(2024, 2, 29), at(2025, 2, 28)), 12);
        assert_eq!(calendar_months_between(at(2024, 1, 20), at(2024, 3, 19)), 1);
        assert_eq!(calendar_months_between(at(2024, 5, 10), at(2024, 5, 30)), 0);
        assert_eq!(
            recency_label(at(2024, 2, 29), at(2025, 2, 28)),
            "about 1 year ago"
        );
    }

    #[test]
    fn recency_future_uses_in_prefix() {
        assert_eq!(
            recency_label(now() + Duration::minutes(5), now()),
            "in 5 minutes"
        );
    }

    #[test]
    fn enrich_labels_from_updated_at() {
        let entry = note("t", "c");
        assert_eq!(entry.recency, "less than a minute ago");
    }

    #[test]
    fn filter_matches_title_or_content_case_insensitively() {
        let notes = vec![note("Groceries", "milk"), note("Work", "Quarterly MILK report"), note("Other", "")];
        let ids = |found: Vec<&DisplayNote>| {
            found.iter().map(|entry| entry.note.title.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(filter_notes(&notes, "  milk ")), vec!["Groceries", "Work"]);
        assert_eq!(ids(filter_notes(&notes, "work")), vec!["Work"]);
        assert_eq!(filter_notes(&notes, "   ").len(), 3);
    }

    #[test]
    fn avatar_initials_uppercases_or_falls_back() {
        assert_eq!(avatar_initials(Some("jane@example.com")), "JA");
        assert_eq!(avatar_initials(None), "U?");
        assert_eq!(avatar_initials(Some("")), "U?");
    }
}
