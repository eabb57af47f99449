//! Revision ordering
//!
//! Picks the most recent change across several per-material modification
//! lists. Each list is ordered most-recent-first, so only the heads are
//! compared; revision identifiers of different materials are not comparable
//! and the modification timestamp decides.

use crate::domain::material::Modification;

/// Revision of the latest head across `lists`, or `None` if all are empty.
///
/// Ties on `modified_time` resolve to the earliest list in `lists`.
pub fn latest_revision_from_ordered_lists<'a>(lists: &[&'a [Modification]]) -> Option<&'a str> {
    latest_head(lists).map(|m| m.revision.as_str())
}

/// The head modification with the latest timestamp
pub fn latest_head<'a>(lists: &[&'a [Modification]]) -> Option<&'a Modification> {
    let mut latest: Option<&'a Modification> = None;

    for head in lists.iter().filter_map(|list| list.first()) {
        match latest {
            Some(current) if head.modified_time <= current.modified_time => {}
            _ => latest = Some(head),
        }
    }

    latest
}
