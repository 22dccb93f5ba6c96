pub mod checker;
pub mod config;
pub mod discord;
pub mod models;
pub mod notifications;
pub mod reconcile;
pub mod responses;
pub mod rmp;
pub mod store;

pub use checker::{CheckerSettings, CycleOutcome, UpdateChecker};
pub use config::Config;
pub use discord::{BotChecker, Handler};
pub use models::{BotState, ProfessorSummary, Review, SubscribeOutcome, UnsubscribeOutcome};
pub use notifications::{build_review_embed, DeliveryError, DiscordNotifier, Notifier};
pub use reconcile::{reconcile, Reconciliation};
pub use rmp::{ReviewSource, RmpClient, UpstreamError};
pub use store::{JsonStateStore, StateStore};
