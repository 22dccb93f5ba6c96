use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, error, info};

use super::StateStore;
use crate::models::BotState;

/// Flat JSON file persistence for `BotState`.
pub struct JsonStateStore {
    path: PathBuf,
}

/// On-disk shape, superset of `BotState`: older deployments stored a single
/// optional `channel_id` instead of the channel list. Migrated on load,
/// non-destructively; the list form wins if both are present.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoredState {
    subscribed_channels: Vec<u64>,
    seen_review_ids: Vec<String>,
    channel_id: Option<u64>,
}

impl StoredState {
    fn into_state(self) -> BotState {
        let mut state = BotState {
            subscribed_channels: self.subscribed_channels,
            seen_review_ids: self.seen_review_ids,
        };
        if let Some(legacy) = self.channel_id {
            if !state.subscribed_channels.contains(&legacy) {
                info!(channel = legacy, "Migrating legacy single-channel state");
                state.subscribed_channels.push(legacy);
            }
        }
        state
    }
}

impl JsonStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load state, degrading to the empty default on any read or parse
    /// failure. A corrupt file means losing dedup history, so it is logged
    /// loudly, but it never stops the bot.
    pub fn load_or_default(&self) -> BotState {
        match self.load() {
            Ok(state) => state,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to load state, starting from empty default");
                BotState::default()
            }
        }
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<BotState> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "State file not found, starting fresh");
            return Ok(BotState::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;

        let stored: StoredState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))?;

        let state = stored.into_state();

        debug!(
            channels = state.subscribed_channels.len(),
            seen = state.seen_review_ids.len(),
            "Loaded state"
        );

        Ok(state)
    }

    fn save(&self, state: &BotState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create state directory: {}", parent.display())
                })?;
            }
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        debug!(path = %self.path.display(), "Saved state");

        Ok(())
    }
}
