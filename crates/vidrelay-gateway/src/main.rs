use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use vidrelay_channels::{DeliveryChannel, Notifier};
use vidrelay_core::VidrelayConfig;
use vidrelay_downloader::{ErrorClassifier, Executor, YtDlpExtractor};
use vidrelay_scheduler::{IntentQueue, Scheduler, SchedulerSettings, Supervisor, Sweeper};
use vidrelay_store::{InlineCache, IntentStore, Persistence, ResourceCache, SqlitePersistence};
use vidrelay_telegram::{ProducerContext, TelegramAdapter, TelegramDelivery};

#[derive(Debug, Parser)]
#[command(name = "vidrelay-gateway", version, about = "Fetch-and-deliver video relay")]
struct Cli {
    /// Path to vidrelay.toml (defaults to $VIDRELAY_CONFIG, then ~/.vidrelay/vidrelay.toml).
    #[arg(long, short)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vidrelay_gateway=info,vidrelay_scheduler=info,vidrelay_downloader=info".into()
            }),
        )
        .init();

    // load config: --config > VIDRELAY_CONFIG env > ~/.vidrelay/vidrelay.toml
    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("VIDRELAY_CONFIG").ok());
    let config = VidrelayConfig::load(config_path.as_deref())?;

    let db_path = config.storage.db_path();
    let media_dir = config.storage.media_dir();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&media_dir)?;
    info!(path = %db_path.display(), "opening SQLite database");

    let db = rusqlite::Connection::open(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    let persistence: Arc<dyn Persistence> = Arc::new(SqlitePersistence::new(db)?);

    // repositories are rebuilt from SQLite; the inline cache starts empty
    let cache = Arc::new(ResourceCache::load(Arc::clone(&persistence))?);
    let intents = Arc::new(IntentStore::load(persistence)?);
    let inline = Arc::new(InlineCache::new());
    let queue = IntentQueue::new(Arc::clone(&intents));

    let extractor = Arc::new(YtDlpExtractor::new(&config.downloader, &media_dir));
    let executor = Arc::new(Executor::new(
        extractor,
        Arc::clone(&cache),
        Arc::clone(&intents),
        Arc::clone(&inline),
        ErrorClassifier::new(&config.downloader.permanent_errors),
        Duration::from_secs(config.downloader.fetch_timeout_secs),
    ));

    let bot = vidrelay_telegram::build_bot(&config.telegram)?;
    let telegram = Arc::new(TelegramDelivery::new(bot.clone(), &config.telegram));
    let channel: Arc<dyn DeliveryChannel> = telegram.clone();
    let notifier: Arc<dyn Notifier> = telegram;

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&executor),
        queue.clone(),
        channel,
        Arc::clone(&notifier),
        SchedulerSettings::from_config(&config),
    ));
    let mut supervisor = Supervisor::new(
        scheduler,
        notifier,
        Duration::from_secs(config.scheduler.restart_delay_secs),
    );
    if config.scheduler.empty_media_folder {
        supervisor = supervisor.with_media_cleanup(&media_dir);
    }
    let sweeper = Sweeper::new(
        inline,
        Duration::from_secs(config.scheduler.sweep_interval_secs),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let supervisor_task = tokio::spawn(supervisor.run(shutdown_rx.clone()));
    tokio::spawn(sweeper.run(shutdown_rx.clone()));

    let restored = queue.resume();
    info!(restored, cached = cache.len(), "intent queue ready");

    let adapter = TelegramAdapter::new(
        bot,
        Arc::new(ProducerContext {
            executor,
            queue,
            placeholder_file_id: config.telegram.placeholder_file_id.clone(),
        }),
    );
    let adapter_task = tokio::spawn(adapter.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    // signal every loop to stop; an in-flight fetch is abandoned
    let _ = shutdown_tx.send(true);
    let _ = adapter_task.await;
    let _ = supervisor_task.await;
    Ok(())
}
