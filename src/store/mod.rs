pub mod json;

pub use json::JsonStateStore;

use anyhow::Result;

use crate::models::BotState;

/// Trait for bot-state persistence backends.
pub trait StateStore: Send + Sync {
    /// Load persisted state. Missing state is not an error; backends return
    /// the empty default.
    fn load(&self) -> Result<BotState>;

    /// Persist the full state. Called after every mutation batch.
    fn save(&self, state: &BotState) -> Result<()>;
}
