pub mod client;

pub use client::RmpClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ProfessorSummary, Review};

/// Failures talking to the review source. A cycle that hits one of these is
/// aborted and retried on the next tick; state is never touched.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to review source failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("review source returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("review source reported an error: {0}")]
    GraphQl(String),

    #[error("review source response missing expected data")]
    MissingData,
}

/// Contract for the remote review source: a profile summary plus a bounded,
/// newest-first window of the most recent reviews. No cursor, no guarantee
/// of completeness beyond the window.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn fetch_professor_summary(&self) -> Result<ProfessorSummary, UpstreamError>;

    async fn fetch_reviews(&self, count: usize) -> Result<Vec<Review>, UpstreamError>;
}
