use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serenity::all::GatewayIntents;
use serenity::http::Http;
use tracing_subscriber::EnvFilter;

use rmp_watch::{
    reconcile, Config, DiscordNotifier, Handler, JsonStateStore, ReviewSource, RmpClient,
    StateStore, UpdateChecker,
};

#[derive(Parser)]
#[command(name = "rmp-watch")]
#[command(about = "Discord bot that announces new RateMyProfessors reviews")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the YAML config file
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and start polling
    Run,

    /// Fetch the review window and print what a cycle would announce,
    /// without sending or persisting anything
    Check,

    /// Fetch and print the professor's profile summary
    Professor,

    /// Print subscribed channels and tracking state from the state file
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rmp_watch=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_bot(cli.config).await?,
        Commands::Check => dry_run(cli.config).await?,
        Commands::Professor => show_professor(cli.config).await?,
        Commands::Status => show_status(cli.config)?,
    }

    Ok(())
}

async fn run_bot(config_path: PathBuf) -> Result<()> {
    let config = Config::load(&config_path)?;
    let token = std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN not set")?;

    let source = RmpClient::new(config.professor.id)?;
    let store = JsonStateStore::new(&config.state.path);
    let state = store.load_or_default();

    let http = Arc::new(Http::new(&token));
    let notifier = DiscordNotifier::new(http);

    let checker = Arc::new(UpdateChecker::new(
        source,
        store,
        notifier,
        state,
        config.checker_settings(),
    ));

    let handler = Handler::new(checker, config);

    // Slash-command interactions arrive without any gateway intents.
    let mut client = serenity::Client::builder(&token, GatewayIntents::empty())
        .event_handler(handler)
        .await
        .context("Failed to build Discord client")?;

    client.start().await.context("Discord client stopped")?;

    Ok(())
}

async fn dry_run(config_path: PathBuf) -> Result<()> {
    let config = Config::load(&config_path)?;
    let source = RmpClient::new(config.professor.id)?;
    let store = JsonStateStore::new(&config.state.path);
    let state = store.load_or_default();

    let window = source.fetch_reviews(config.polling.fetch_count).await?;
    let result = reconcile(&window, &state.seen_review_ids, config.polling.backfill_cap);

    println!(
        "Window: {} review(s); {} id(s) already tracked.",
        window.len(),
        state.seen_review_ids.len()
    );

    if result.is_noop() {
        println!("Nothing new to announce.");
        return Ok(());
    }

    if result.is_backfill {
        println!(
            "First run: would seed {} id(s) and announce the {} most recent.",
            result.seen.len(),
            result.to_announce.len()
        );
    }

    println!("Would announce (oldest first):");
    for review in &result.to_announce {
        println!(
            "  {}  {:<10}  {}",
            review.date_display(),
            review.class_name,
            review.id
        );
    }

    Ok(())
}

async fn show_professor(config_path: PathBuf) -> Result<()> {
    let config = Config::load(&config_path)?;
    let source = RmpClient::new(config.professor.id)?;

    let summary = source.fetch_professor_summary().await?;

    println!("{} — {}", summary.full_name(), summary.department);
    println!("School: {}", summary.school.name);
    println!(
        "Rating {:.1}/5 across {} rating(s) · difficulty {:.1}/5 · {:.0}% would take again",
        summary.avg_rating,
        summary.num_ratings,
        summary.avg_difficulty,
        summary.would_take_again_percent
    );

    Ok(())
}

fn show_status(config_path: PathBuf) -> Result<()> {
    let config = Config::load(&config_path)?;
    let store = JsonStateStore::new(&config.state.path);
    let state = store.load()?;

    if state.subscribed_channels.is_empty() {
        println!("No channels subscribed.");
    } else {
        println!("Subscribed channels:");
        for channel in &state.subscribed_channels {
            println!("  {channel}");
        }
    }
    println!("{} review id(s) tracked.", state.seen_review_ids.len());

    Ok(())
}
