use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single professor review as returned by the upstream ratings API.
///
/// Reviews are immutable once fetched. The `id` is opaque and stable across
/// fetches; everything else is display payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Review {
    pub id: String,
    pub comment: String,
    /// Upstream date string, e.g. "2024-03-15 20:21:33 +0000 UTC".
    /// Not guaranteed to parse; ordering never depends on it.
    pub date: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub helpful_rating: f64,
    pub difficulty_rating: f64,
    pub attendance_mandatory: Option<String>,
    pub would_take_again: Option<f64>,
    pub grade: Option<String>,
    pub is_for_online_class: bool,
    pub is_for_credit: bool,
    /// Double-dash separated tag list, upstream format.
    pub rating_tags: String,
    pub thumbs_up_total: i64,
    pub thumbs_down_total: i64,
    /// Optional upstream field; may be dropped from the schema entirely.
    pub textbook_use: Option<i64>,
}

impl Review {
    /// Parse the upstream date string, tolerating its trailing " UTC" suffix.
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        let trimmed = self.date.trim().trim_end_matches(" UTC");
        DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S %z")
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }

    /// Short display date, falling back to the raw string when unparseable.
    pub fn date_display(&self) -> String {
        match self.posted_at() {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None if self.date.trim().is_empty() => "unknown date".to_string(),
            None => self.date.trim().to_string(),
        }
    }

    pub fn tags(&self) -> Vec<&str> {
        self.rating_tags
            .split("--")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Professor profile header fetched alongside the review window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfessorSummary {
    pub first_name: String,
    pub last_name: String,
    pub department: String,
    pub avg_rating: f64,
    pub avg_difficulty: f64,
    pub num_ratings: i64,
    pub would_take_again_percent: f64,
    pub school: School,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct School {
    pub id: String,
    pub name: String,
}

impl ProfessorSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Result of a subscribe request, distinguishing a fresh add from a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Added,
    AlreadySubscribed,
}

/// Result of an unsubscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Removed,
    NotSubscribed,
}

/// Durable bot state: which channels get announcements and which review ids
/// have already been announced. Exclusively owned by this process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotState {
    pub subscribed_channels: Vec<u64>,
    /// Oldest-first; eviction drops from the front.
    pub seen_review_ids: Vec<String>,
}

impl BotState {
    pub fn subscribe(&mut self, channel_id: u64) -> SubscribeOutcome {
        if self.subscribed_channels.contains(&channel_id) {
            SubscribeOutcome::AlreadySubscribed
        } else {
            self.subscribed_channels.push(channel_id);
            SubscribeOutcome::Added
        }
    }

    pub fn unsubscribe(&mut self, channel_id: u64) -> UnsubscribeOutcome {
        let before = self.subscribed_channels.len();
        self.subscribed_channels.retain(|c| *c != channel_id);
        if self.subscribed_channels.len() < before {
            UnsubscribeOutcome::Removed
        } else {
            UnsubscribeOutcome::NotSubscribed
        }
    }

    /// Clear announcement history only; subscriptions are untouched.
    /// Returns how many ids were dropped.
    pub fn reset_history(&mut self) -> usize {
        let dropped = self.seen_review_ids.len();
        self.seen_review_ids.clear();
        dropped
    }

    /// Enforce the seen-set cap, evicting oldest entries first. The cap must
    /// comfortably exceed the fetch window size or evicted reviews could be
    /// re-announced.
    pub fn evict_seen(&mut self, cap: usize) {
        if self.seen_review_ids.len() > cap {
            let excess = self.seen_review_ids.len() - cap;
            self.seen_review_ids.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_with_date(date: &str) -> Review {
        Review {
            id: "r1".to_string(),
            date: date.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_posted_at_parses_upstream_format() {
        let review = review_with_date("2024-03-15 20:21:33 +0000 UTC");
        let parsed = review.posted_at().unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2024-03-15");
        assert_eq!(review.date_display(), "2024-03-15");
    }

    #[test]
    fn test_posted_at_garbage_falls_back() {
        let review = review_with_date("not a date");
        assert!(review.posted_at().is_none());
        assert_eq!(review.date_display(), "not a date");

        let empty = review_with_date("   ");
        assert_eq!(empty.date_display(), "unknown date");
    }

    #[test]
    fn test_tags_split() {
        let review = Review {
            rating_tags: "Tough grader--Amazing lectures--".to_string(),
            ..Default::default()
        };
        assert_eq!(review.tags(), vec!["Tough grader", "Amazing lectures"]);

        let none = Review::default();
        assert!(none.tags().is_empty());
    }

    #[test]
    fn test_review_deserializes_upstream_shape() {
        let json = r#"{
            "id": "UmF0aW5nLTEyMw==",
            "comment": "Great professor",
            "date": "2024-03-15 20:21:33 +0000 UTC",
            "class": "LING301",
            "helpfulRating": 5,
            "difficultyRating": 2,
            "attendanceMandatory": "non_mandatory",
            "wouldTakeAgain": 1,
            "grade": "A",
            "isForOnlineClass": false,
            "isForCredit": true,
            "ratingTags": "Caring--Respected",
            "thumbsUpTotal": 3,
            "thumbsDownTotal": 0
        }"#;

        let review: Review = serde_json::from_str(json).unwrap();
        assert_eq!(review.class_name, "LING301");
        assert_eq!(review.helpful_rating, 5.0);
        assert_eq!(review.textbook_use, None);
        assert_eq!(review.tags().len(), 2);
    }

    #[test]
    fn test_subscribe_distinctness() {
        let mut state = BotState::default();
        assert_eq!(state.subscribe(42), SubscribeOutcome::Added);
        assert_eq!(state.subscribe(42), SubscribeOutcome::AlreadySubscribed);
        assert_eq!(state.subscribed_channels, vec![42]);
    }

    #[test]
    fn test_unsubscribe_distinctness() {
        let mut state = BotState::default();
        state.subscribe(42);
        assert_eq!(state.unsubscribe(7), UnsubscribeOutcome::NotSubscribed);
        assert_eq!(state.unsubscribe(42), UnsubscribeOutcome::Removed);
        assert!(state.subscribed_channels.is_empty());
    }

    #[test]
    fn test_reset_history_leaves_subscriptions() {
        let mut state = BotState {
            subscribed_channels: vec![1, 2],
            seen_review_ids: vec!["a".into(), "b".into()],
        };
        assert_eq!(state.reset_history(), 2);
        assert!(state.seen_review_ids.is_empty());
        assert_eq!(state.subscribed_channels, vec![1, 2]);
    }

    #[test]
    fn test_evict_seen_drops_oldest_first() {
        let mut state = BotState {
            subscribed_channels: vec![],
            seen_review_ids: (0..10).map(|i| format!("r{i}")).collect(),
        };
        state.evict_seen(4);
        assert_eq!(state.seen_review_ids, vec!["r6", "r7", "r8", "r9"]);

        state.evict_seen(10);
        assert_eq!(state.seen_review_ids.len(), 4);
    }
}
