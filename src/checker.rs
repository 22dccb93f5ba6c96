use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::models::{BotState, SubscribeOutcome, UnsubscribeOutcome};
use crate::notifications::Notifier;
use crate::reconcile::reconcile;
use crate::rmp::ReviewSource;
use crate::store::StateStore;

/// Tuning knobs for the poll cycle.
#[derive(Debug, Clone)]
pub struct CheckerSettings {
    /// How many reviews to request per window.
    pub fetch_count: usize,
    /// Max reviews announced on the very first cycle.
    pub backfill_cap: usize,
    /// Seen-list retention cap; must exceed `fetch_count` by a wide margin.
    pub seen_cap: usize,
    /// Pause between individual deliveries, for the platform's rate limits.
    pub delivery_delay: Duration,
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            fetch_count: 10,
            backfill_cap: 5,
            seen_cap: 200,
            delivery_delay: Duration::from_secs(1),
        }
    }
}

/// What a poll cycle did, reported deterministically so callers (timer loop,
/// force-check command) can message accurately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle holds the state lock; nothing was fetched.
    Busy,
    /// No subscribed channels; the remote call was skipped.
    NoSubscribers,
    /// Window fetched, nothing new.
    UpToDate,
    Announced { count: usize, backfill: bool },
}

/// Drives fetch → reconcile → announce → persist on a fixed timer and on
/// manual trigger. One state mutex serializes cycles against each other and
/// against subscription changes; a cycle that finds the lock held reports
/// `Busy` instead of queueing.
pub struct UpdateChecker<R, S, N> {
    source: R,
    store: S,
    notifier: N,
    settings: CheckerSettings,
    state: Mutex<BotState>,
}

impl<R, S, N> UpdateChecker<R, S, N>
where
    R: ReviewSource,
    S: StateStore,
    N: Notifier,
{
    pub fn new(source: R, store: S, notifier: N, state: BotState, settings: CheckerSettings) -> Self {
        Self {
            source,
            store,
            notifier,
            settings,
            state: Mutex::new(state),
        }
    }

    /// Run cycles forever at a fixed cadence. The first cycle runs
    /// immediately.
    pub async fn run_loop(self: Arc<Self>, interval: Duration) {
        info!(interval_secs = interval.as_secs(), "Starting poll loop");

        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(outcome) => debug!(?outcome, "Poll cycle finished"),
                Err(e) => error!(error = %e, "Poll cycle failed, will retry next tick"),
            }
        }
    }

    /// One full cycle: fetch the review window, reconcile against the seen
    /// set, announce anything new to every subscribed channel, then persist.
    ///
    /// State is persisted only after all deliveries complete; a crash mid
    /// announcement re-announces at most one cycle's worth of reviews on the
    /// next run.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let mut state = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Cycle already in flight, skipping");
                return Ok(CycleOutcome::Busy);
            }
        };

        if state.subscribed_channels.is_empty() {
            debug!("No subscribed channels, skipping fetch");
            return Ok(CycleOutcome::NoSubscribers);
        }

        let window = self
            .source
            .fetch_reviews(self.settings.fetch_count)
            .await
            .context("Failed to fetch review window")?;

        let outcome = reconcile(&window, &state.seen_review_ids, self.settings.backfill_cap);

        if outcome.is_noop() {
            debug!(window = window.len(), "No new reviews");
            return Ok(CycleOutcome::UpToDate);
        }

        if outcome.is_backfill {
            info!(
                window = window.len(),
                announcing = outcome.to_announce.len(),
                "First cycle: seeding seen set, announcing most recent reviews only"
            );
        }

        // Cosmetic header for the embeds; a failure here must not cost us the
        // announcements.
        let professor = match self.source.fetch_professor_summary().await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, "Could not fetch professor summary, announcing without it");
                None
            }
        };

        let count = outcome.to_announce.len();
        for review in &outcome.to_announce {
            for &channel in &state.subscribed_channels {
                if let Err(e) = self
                    .notifier
                    .announce(channel, review, professor.as_ref())
                    .await
                {
                    warn!(channel, review = %review.id, error = %e, "Delivery failed, continuing");
                }
                tokio::time::sleep(self.settings.delivery_delay).await;
            }
        }

        state.seen_review_ids = outcome.seen;
        state.evict_seen(self.settings.seen_cap);
        self.persist(&state);

        info!(count, backfill = outcome.is_backfill, "Announced new reviews");

        Ok(CycleOutcome::Announced {
            count,
            backfill: outcome.is_backfill,
        })
    }

    pub async fn subscribe(&self, channel_id: u64) -> SubscribeOutcome {
        let mut state = self.state.lock().await;
        let outcome = state.subscribe(channel_id);
        if outcome == SubscribeOutcome::Added {
            info!(channel = channel_id, "Channel subscribed");
            self.persist(&state);
        }
        outcome
    }

    pub async fn unsubscribe(&self, channel_id: u64) -> UnsubscribeOutcome {
        let mut state = self.state.lock().await;
        let outcome = state.unsubscribe(channel_id);
        if outcome == UnsubscribeOutcome::Removed {
            info!(channel = channel_id, "Channel unsubscribed");
            self.persist(&state);
        }
        outcome
    }

    /// Clear announcement history so the next cycle runs a fresh backfill.
    /// Returns how many ids were dropped.
    pub async fn reset_history(&self) -> usize {
        let mut state = self.state.lock().await;
        let dropped = state.reset_history();
        if dropped > 0 {
            info!(dropped, "Announcement history cleared");
            self.persist(&state);
        }
        dropped
    }

    /// Point-in-time copy of the current state, for status reporting.
    pub async fn snapshot(&self) -> BotState {
        self.state.lock().await.clone()
    }

    fn persist(&self, state: &BotState) {
        // A failed write keeps the in-memory state authoritative; worst case
        // the latest mutation is lost on crash.
        if let Err(e) = self.store.save(state) {
            error!(error = %e, "Failed to persist state, keeping in-memory copy");
        }
    }
}
