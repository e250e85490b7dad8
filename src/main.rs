use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use beholder::config::Config;
use beholder::jobs::RedisJobStore;
use beholder::progress::sweep::spawn_sweeper;
use beholder::progress::{DownloadSweep, ProgressTracker};
use beholder::router::{Router, Topic};
use beholder::sink::HttpNotifier;
use beholder::status::StatusHandler;
use beholder::store::{RedisStore, StateStore};

#[derive(Parser)]
#[command(name = "beholder", version, about = "Pipeline telemetry watcher")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "beholder.toml")]
    config: PathBuf,

    /// Redis URL override
    #[arg(long)]
    redis_url: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "beholder=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = Config::load(&cli.config)?;
    config.overlay_env(|key| std::env::var(key).ok());
    if let Some(url) = cli.redis_url {
        config.redis_url = url;
    }

    let redis = RedisStore::connect(&config.redis_url)
        .await
        .context("Failed to connect to the state store")?;
    let store: Arc<dyn StateStore> = Arc::new(redis.clone());
    let jobs = Arc::new(RedisJobStore::new(redis.connection()));
    let notifier = Arc::new(HttpNotifier::new(
        config.trello.clone(),
        config.chat_webhook.clone(),
        config.media_server.clone(),
    ));
    if !config.notify_tracker {
        info!("tracker notifications are disabled");
    }

    let router = Router::new(
        ProgressTracker::new(store.clone()),
        StatusHandler::new(jobs, config.status_lists()),
        notifier.clone(),
        config.notify_tracker,
    );

    let sweep = DownloadSweep::new(store, config.download_stage.clone());
    let _sweeper = spawn_sweeper(
        sweep,
        notifier,
        config.notify_tracker,
        config.sweep_interval(),
    );
    info!(
        stage = %config.download_stage,
        minutes = config.sweep_interval_minutes,
        "started download watcher"
    );

    // Pub/sub needs its own connection; the multiplexed one stays with the
    // stores.
    let client =
        redis::Client::open(config.redis_url.as_str()).context("Invalid redis URL")?;
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .context("Failed to open the pub/sub connection")?;
    for channel in Topic::channels() {
        info!(channel, "listening on pubsub queue");
        pubsub
            .subscribe(channel)
            .await
            .with_context(|| format!("Failed to subscribe to {channel}"))?;
    }

    info!("initialized");

    let mut messages = pubsub.on_message();
    while let Some(message) = messages.next().await {
        let channel = message.get_channel_name().to_string();
        let payload: String = match message.get_payload() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, %channel, "failed to read message payload");
                continue;
            }
        };

        // Store failures are the one fatal path: bail and let the
        // supervisor restart us, so the unacknowledged work is redone
        // against a healthy store.
        router
            .dispatch(&channel, &payload)
            .await
            .context("State store failure while handling an event")?;
    }

    Ok(())
}
