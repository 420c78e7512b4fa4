use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use vidrelay_channels::Notifier;
use vidrelay_downloader::media;

use crate::engine::{pause, Scheduler};

/// Keeps the scheduler running: any failure that ends a run, panics
/// included, is logged and reported, and the scheduler starts again after
/// a delay. Queued intents are durable, so a restart loses only time.
pub struct Supervisor {
    scheduler: Arc<Scheduler>,
    notifier: Arc<dyn Notifier>,
    restart_delay: Duration,
    /// Emptied after every crash when set.
    media_dir: Option<PathBuf>,
}

impl Supervisor {
    pub fn new(scheduler: Arc<Scheduler>, notifier: Arc<dyn Notifier>, restart_delay: Duration) -> Self {
        Self {
            scheduler,
            notifier,
            restart_delay,
            media_dir: None,
        }
    }

    /// Delete leftover downloads in `dir` after each crash.
    pub fn with_media_cleanup(mut self, dir: impl Into<PathBuf>) -> Self {
        self.media_dir = Some(dir.into());
        self
    }

    /// Returns only once `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut restarts: u64 = 0;
        loop {
            let scheduler = Arc::clone(&self.scheduler);
            let rx = shutdown.clone();
            let task = tokio::spawn(async move { scheduler.run(rx).await });

            let failure = match task.await {
                Ok(Ok(())) => break,
                Ok(Err(e)) => e.to_string(),
                Err(e) if e.is_panic() => format!("panic: {}", panic_message(e.into_panic())),
                Err(e) => e.to_string(),
            };
            restarts += 1;
            error!(restarts, error = %failure, "scheduler crashed");

            if let Some(dir) = &self.media_dir {
                let removed = media::empty_media_folder(dir).await;
                warn!(removed, "media folder emptied after crash");
            }
            if pause(self.restart_delay, &mut shutdown).await {
                break;
            }
            self.notifier
                .notify(&format!("[error_monitor_process_intents]\n{failure}"), true)
                .await;
            info!(restarts, "restarting scheduler");
        }
        info!("supervisor stopped");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
