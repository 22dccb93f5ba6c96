//! Random canned messages, reloaded from disk on every invocation so the
//! lists can be edited without restarting the bot.

use std::fs;
use std::path::Path;

use rand::seq::SliceRandom;
use tracing::warn;

pub const FALLBACK_MESSAGE: &str = "No messages are configured yet.";

/// Load a JSON array of strings. Any failure degrades to an empty list,
/// logged; callers fall back to `FALLBACK_MESSAGE`.
pub fn load_messages(path: impl AsRef<Path>) -> Vec<String> {
    let path = path.as_ref();

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read message list");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<String>>(&content) {
        Ok(messages) => messages,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not parse message list");
            Vec::new()
        }
    }
}

/// One uniformly random entry from the list at `path`.
pub fn random_message(path: impl AsRef<Path>) -> String {
    load_messages(path)
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}
