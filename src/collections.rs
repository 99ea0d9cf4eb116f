//! Collection selectors.
//!
//! Collections are computed once per build from the scan [`Snapshot`], before
//! any page renders. The selectors take `now` explicitly so "future" is a
//! value, not a clock read buried in a filter.

use crate::scan::Snapshot;
use crate::types::{Page, Section, WithYear};
use chrono::{DateTime, Datelike, Utc};

/// Anything with a publication instant.
pub trait Dated {
    fn date(&self) -> DateTime<Utc>;
}

impl Dated for Page {
    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

/// A post is live once its date has passed and it is not a draft.
pub fn is_live(page: &Page, now: DateTime<Utc>) -> bool {
    page.date <= now && !page.draft
}

/// Live posts, newest first.
///
/// The snapshot is ascending, so reversing it yields descending dates.
pub fn live_posts(snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<Page> {
    snapshot
        .pages()
        .iter()
        .rev()
        .filter(|p| p.section == Section::Posts && is_live(p, now))
        .cloned()
        .collect()
}

/// Pages under `books/`, in snapshot order. With `hide_read`, books marked
/// `read: true` are left out.
pub fn books(snapshot: &Snapshot, hide_read: bool) -> Vec<Page> {
    snapshot
        .pages()
        .iter()
        .filter(|p| p.section == Section::Books && !(hide_read && p.read))
        .cloned()
        .collect()
}

/// Four-digit UTC year.
pub fn year_of(date: DateTime<Utc>) -> String {
    format!("{:04}", date.year())
}

/// Bucket items by year, newest first.
///
/// Items are stably ordered by date descending before bucketing, so each
/// bucket is newest first and buckets come out in descending year order
/// regardless of whether the input was ascending or descending.
pub fn group_by_year<T: Dated + Clone>(items: &[T]) -> Vec<(String, Vec<T>)> {
    let mut sorted: Vec<&T> = items.iter().collect();
    sorted.sort_by(|a, b| b.date().cmp(&a.date()));

    let mut groups: Vec<(String, Vec<T>)> = Vec::new();
    for item in sorted {
        let year = year_of(item.date());
        match groups.iter_mut().find(|(y, _)| *y == year) {
            Some((_, bucket)) => bucket.push(item.clone()),
            None => groups.push((year, vec![item.clone()])),
        }
    }
    groups
}

/// Copy of `items`, each paired with its year.
pub fn add_year<T: Dated + Clone>(items: &[T]) -> Vec<WithYear<T>> {
    items
        .iter()
        .map(|item| WithYear {
            year: year_of(item.date()),
            item: item.clone(),
        })
        .collect()
}
