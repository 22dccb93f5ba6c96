//! Discord gateway glue: slash-command registration and dispatch.
//!
//! Everything here is thin; command handlers call straight into
//! [`UpdateChecker`] or the message lists and format a one-line reply.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serenity::all::{
    Command, CommandInteraction, Context, CreateCommand, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, EventHandler,
    Interaction, Ready,
};
use serenity::async_trait;
use tracing::{error, info};

use crate::checker::{CycleOutcome, UpdateChecker};
use crate::config::Config;
use crate::models::{SubscribeOutcome, UnsubscribeOutcome};
use crate::notifications::DiscordNotifier;
use crate::rmp::RmpClient;
use crate::store::JsonStateStore;
use crate::responses;

/// The checker as wired in production.
pub type BotChecker = UpdateChecker<RmpClient, JsonStateStore, DiscordNotifier>;

pub struct Handler {
    checker: Arc<BotChecker>,
    config: Config,
    poll_started: AtomicBool,
}

impl Handler {
    pub fn new(checker: Arc<BotChecker>, config: Config) -> Self {
        Self {
            checker,
            config,
            poll_started: AtomicBool::new(false),
        }
    }

    fn command_definitions() -> Vec<CreateCommand> {
        vec![
            CreateCommand::new("wsnd").description("Draw a random response"),
            CreateCommand::new("fortune").description("Draw a random fortune"),
            CreateCommand::new("subscribe-here")
                .description("Announce new professor reviews in this channel"),
            CreateCommand::new("unsubscribe-here")
                .description("Stop announcing reviews in this channel"),
            CreateCommand::new("force-check").description("Check for new reviews right now"),
            CreateCommand::new("status").description("Show subscribed channels and tracking state"),
            CreateCommand::new("reset-history")
                .description("Forget announced reviews so the next check backfills"),
            CreateCommand::new("sync").description("Re-register the bot's slash commands"),
        ]
    }

    async fn dispatch(&self, ctx: &Context, command: &CommandInteraction) {
        match command.data.name.as_str() {
            "wsnd" => {
                let message = responses::random_message(&self.config.messages.responses_path);
                respond(ctx, command, message).await;
            }
            "fortune" => {
                let message = responses::random_message(&self.config.messages.fortunes_path);
                respond(ctx, command, message).await;
            }
            "subscribe-here" => {
                let reply = match self.checker.subscribe(command.channel_id.get()).await {
                    SubscribeOutcome::Added => {
                        "Subscribed. New reviews will be announced here.".to_string()
                    }
                    SubscribeOutcome::AlreadySubscribed => {
                        "This channel is already subscribed.".to_string()
                    }
                };
                respond(ctx, command, reply).await;
            }
            "unsubscribe-here" => {
                let reply = match self.checker.unsubscribe(command.channel_id.get()).await {
                    UnsubscribeOutcome::Removed => "Unsubscribed.".to_string(),
                    UnsubscribeOutcome::NotSubscribed => {
                        "This channel was not subscribed.".to_string()
                    }
                };
                respond(ctx, command, reply).await;
            }
            "force-check" => {
                // A cycle can outlive the three-second interaction window.
                if let Err(e) = command.defer(&ctx.http).await {
                    error!(error = %e, "Failed to defer force-check");
                    return;
                }

                let reply = match self.checker.run_cycle().await {
                    Ok(CycleOutcome::Busy) => "A check is already running.".to_string(),
                    Ok(CycleOutcome::NoSubscribers) => {
                        "No channels are subscribed; nothing to check.".to_string()
                    }
                    Ok(CycleOutcome::UpToDate) => "No new reviews.".to_string(),
                    Ok(CycleOutcome::Announced { count, backfill: false }) => {
                        format!("Announced {count} new review(s).")
                    }
                    Ok(CycleOutcome::Announced { count, backfill: true }) => {
                        format!("First check: announced the {count} most recent review(s).")
                    }
                    Err(e) => {
                        error!(error = %e, "Manual check failed");
                        "Check failed; see the logs. Will retry on the next tick.".to_string()
                    }
                };

                let followup = CreateInteractionResponseFollowup::new().content(reply);
                if let Err(e) = command.create_followup(&ctx.http, followup).await {
                    error!(error = %e, "Failed to send force-check result");
                }
            }
            "status" => {
                let state = self.checker.snapshot().await;
                let reply = if state.subscribed_channels.is_empty() {
                    "No channels subscribed.".to_string()
                } else {
                    let channels: Vec<String> = state
                        .subscribed_channels
                        .iter()
                        .map(|id| format!("<#{id}>"))
                        .collect();
                    format!(
                        "Subscribed channels: {} · {} review(s) tracked.",
                        channels.join(", "),
                        state.seen_review_ids.len()
                    )
                };
                respond(ctx, command, reply).await;
            }
            "reset-history" => {
                let dropped = self.checker.reset_history().await;
                let reply = format!(
                    "History cleared ({dropped} id(s) dropped). The next check will backfill."
                );
                respond(ctx, command, reply).await;
            }
            "sync" => {
                let reply =
                    match Command::set_global_commands(&ctx.http, Self::command_definitions())
                        .await
                    {
                        Ok(commands) => format!("Synced {} command(s).", commands.len()),
                        Err(e) => {
                            error!(error = %e, "Command sync failed");
                            "Command sync failed; see the logs.".to_string()
                        }
                    };
                respond(ctx, command, reply).await;
            }
            other => {
                respond(ctx, command, format!("Unknown command: {other}")).await;
            }
        }
    }
}

async fn respond(ctx: &Context, command: &CommandInteraction, content: String) {
    let response =
        CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().content(content));
    if let Err(e) = command.create_response(&ctx.http, response).await {
        error!(command = %command.data.name, error = %e, "Failed to respond to interaction");
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, "Connected to Discord");

        match Command::set_global_commands(&ctx.http, Self::command_definitions()).await {
            Ok(commands) => info!(count = commands.len(), "Registered slash commands"),
            Err(e) => error!(error = %e, "Failed to register slash commands"),
        }

        // ready can fire again on reconnect; the poll loop starts once.
        if !self.poll_started.swap(true, Ordering::SeqCst) {
            let checker = Arc::clone(&self.checker);
            let interval = self.config.poll_interval();
            tokio::spawn(checker.run_loop(interval));
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            self.dispatch(&ctx, &command).await;
        }
    }
}
