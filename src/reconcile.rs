//! Review deduplication and backfill.
//!
//! The upstream API returns a bounded newest-first window with no cursor, so
//! the window's order is the only ordering signal we have. Reconciliation is
//! a pure function over (window, seen set): it decides which reviews are new,
//! puts them in chronological announce order, and seeds the seen set on the
//! very first run without flooding a channel with history.

use std::collections::HashSet;

use crate::models::Review;

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Reviews to announce, oldest-first.
    pub to_announce: Vec<Review>,
    /// Updated seen list, oldest-first, superset of the input. The caller
    /// applies the retention cap when persisting.
    pub seen: Vec<String>,
    /// True when the input seen set was empty (first run for this state).
    pub is_backfill: bool,
}

impl Reconciliation {
    /// True when nothing changed and no state write is needed.
    pub fn is_noop(&self) -> bool {
        self.to_announce.is_empty()
    }
}

/// Compute what to announce from a newest-first review window.
///
/// On backfill (empty seen set) every review in the window is marked seen,
/// but only the `backfill_cap` most recent are announced, oldest-first. In
/// steady state all unseen reviews are announced, oldest-first, and added to
/// the seen list.
///
/// Never fails: an empty window or a fully-seen window is a valid no-op. A
/// review id that was evicted from the seen list past the retention cap will
/// be treated as new and re-announced; the cap is sized well past the window
/// so this does not happen in practice.
pub fn reconcile(window: &[Review], seen: &[String], backfill_cap: usize) -> Reconciliation {
    let is_backfill = seen.is_empty();

    let seen_set: HashSet<&str> = seen.iter().map(String::as_str).collect();
    let mut window_ids = HashSet::new();

    // Newest-first, matching window order; duplicate ids within one window
    // are announced once.
    let new: Vec<&Review> = window
        .iter()
        .filter(|r| !seen_set.contains(r.id.as_str()) && window_ids.insert(r.id.as_str()))
        .collect();

    if new.is_empty() {
        return Reconciliation {
            to_announce: Vec::new(),
            seen: seen.to_vec(),
            is_backfill,
        };
    }

    let to_announce: Vec<Review> = if is_backfill {
        new.iter().take(backfill_cap).rev().map(|r| (*r).clone()).collect()
    } else {
        new.iter().rev().map(|r| (*r).clone()).collect()
    };

    // Mark everything new as seen, oldest first, so cap eviction drops the
    // oldest ids. On backfill this covers the whole window, announced or not:
    // the intent is "start tracking from now", not "announce all history".
    let mut updated = seen.to_vec();
    updated.extend(new.iter().rev().map(|r| r.id.clone()));

    Reconciliation {
        to_announce,
        seen: updated,
        is_backfill,
    }
}
