use anyhow::Context;
use background_service::{ServiceConfig, WatchService};
use discord_client::DiscordApiClient;
use reddit_client::RedditApiClient;
use std::path::PathBuf;
use subwatch_core::{KeywordMatcher, SeenLedger, WatchConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            "subwatch=debug,subwatch_core=debug,background_service=debug,reddit_client=debug,discord_client=debug",
        )
        .init();

    tracing::info!("Starting Subwatch - subreddit keyword notifier");

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("subwatch.toml"));
    let config = WatchConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let matcher = KeywordMatcher::new(&config.keywords)?;
    let ledger = SeenLedger::load(&config.ledger_path);

    let reddit = RedditApiClient::new(config.reddit.clone(), config.subreddit.clone());
    reddit
        .verify_access()
        .await
        .context("Reddit authentication failed")?;

    let discord = DiscordApiClient::new(config.discord.clone(), config.channel_id);
    if config.announce_startup {
        let greeting = format!(
            "Hello! Now online and monitoring r/{} for {}",
            config.subreddit,
            config.keywords.join(", ")
        );
        // Announcement failure is cosmetic; the watcher still starts
        if let Err(e) = discord.announce(&greeting).await {
            tracing::warn!("Startup announcement failed: {}", e);
        }
    }

    let service = WatchService::start(
        reddit,
        discord,
        matcher,
        ledger,
        ServiceConfig {
            fetch_limit: config.fetch_limit,
            poll_interval: config.poll_interval,
            expire_after: config.expire_after,
            sweep_interval: config.sweep_interval,
        },
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Received shutdown signal");
    service.shutdown().await;

    Ok(())
}
