use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use vidrelay_channels::{DeliveryChannel, MediaFile, Notifier, Receipt};
use vidrelay_core::{Intent, ResourceRecord, Target, VidrelayConfig};
use vidrelay_downloader::{extractor::DATETIME_FORMAT, media, ExecError, Executor};
use vidrelay_store::{IntentStore, ResourceCache};

use crate::{error::Result, fallback, queue::IntentQueue};

/// Timing and routing knobs for the [`Scheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub cycle_delay: Duration,
    pub idle_wait: Duration,
    pub retry_delay: Duration,
    /// Chat that receives the first upload of every asset.
    pub primary_chat: String,
    pub operator_chat: String,
    pub export_dir: Option<PathBuf>,
    /// Hosts whose resources can be re-fetched at lower quality.
    pub degraded_hosts: Vec<String>,
}

impl SchedulerSettings {
    pub fn from_config(config: &VidrelayConfig) -> Self {
        Self {
            cycle_delay: Duration::from_secs(config.scheduler.cycle_delay_secs),
            idle_wait: Duration::from_secs(config.scheduler.idle_wait_secs),
            retry_delay: Duration::from_secs(config.scheduler.retry_delay_secs),
            primary_chat: config.telegram.primary_chat_id.clone(),
            operator_chat: config.telegram.operator_chat_id().to_string(),
            export_dir: config.storage.export_dir.clone(),
            degraded_hosts: config.downloader.degraded_hosts.clone(),
        }
    }
}

/// What one [`Scheduler::process_next`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Nothing selectable is queued.
    Idle,
    /// Transient failure; the intent stays queued.
    Retry,
    /// Permanent failure; the intent is now ignored.
    Ignored,
    /// The intent was abandoned after a failed first delivery.
    Dropped,
    /// The asset went out; counts are per target.
    Delivered { delivered: usize, failed: usize },
}

/// A record whose first upload succeeded.
pub(crate) struct Delivered {
    /// Carries the upload handle.
    pub record: ResourceRecord,
    /// Local file the record no longer references.
    pub freed: Option<PathBuf>,
}

/// The single worker that turns queued intents into deliveries.
pub struct Scheduler {
    pub(crate) executor: Arc<Executor>,
    pub(crate) intents: Arc<IntentStore>,
    pub(crate) cache: Arc<ResourceCache>,
    pub(crate) channel: Arc<dyn DeliveryChannel>,
    pub(crate) notifier: Arc<dyn Notifier>,
    queue: IntentQueue,
    pub(crate) settings: SchedulerSettings,
}

impl Scheduler {
    pub fn new(
        executor: Arc<Executor>,
        queue: IntentQueue,
        channel: Arc<dyn DeliveryChannel>,
        notifier: Arc<dyn Notifier>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            cache: Arc::clone(executor.cache()),
            intents: Arc::clone(queue.store()),
            executor,
            channel,
            notifier,
            queue,
            settings,
        }
    }

    /// Process intents until `shutdown` flips to `true`.
    ///
    /// Only a store failure ends the loop early; the supervisor restarts it.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(channel = self.channel.name(), "scheduler started");
        loop {
            if pause(self.settings.cycle_delay, &mut shutdown).await {
                break;
            }
            match self.process_next().await? {
                Step::Idle => {
                    tokio::select! {
                        _ = self.queue.wake().notified() => {}
                        _ = tokio::time::sleep(self.settings.idle_wait) => {}
                        res = shutdown.changed() => {
                            if res.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
                Step::Retry => {
                    if pause(self.settings.retry_delay, &mut shutdown).await {
                        break;
                    }
                }
                _ => {}
            }
        }
        info!("scheduler stopped");
        Ok(())
    }

    /// Run one select → resolve → deliver → retire cycle.
    pub async fn process_next(&self) -> Result<Step> {
        let Some(key) = self.intents.select_max_priority() else {
            return Ok(Step::Idle);
        };
        self.process(&key).await
    }

    #[instrument(skip(self, key), fields(key = %key))]
    async fn process(&self, key: &str) -> Result<Step> {
        info!("processing intent");
        let record = match self.executor.resolve(key, true).await {
            Ok(record) => record,
            Err(ExecError::Store(e)) => return Err(e.into()),
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "intent left queued");
                return Ok(Step::Retry);
            }
            Err(e) => {
                info!(error = %e, "intent ignored");
                return Ok(Step::Ignored);
            }
        };

        let (mut record, first) = if record.handle().is_none() {
            match self.first_delivery(key, record).await? {
                Some(Delivered { record, freed }) => (record, Some(freed)),
                None => return Ok(Step::Dropped),
            }
        } else {
            (record, None)
        };

        // Cache before popping: a store fault must leave the intent queued.
        if let Some(freed) = &first {
            record.source = self.intents.get(key).and_then(|intent| intent.source);
            record.processed_at = Some(Utc::now().format(DATETIME_FORMAT).to_string());
            if let Err(e) = self.retire(key, &record) {
                if let Some(path) = freed {
                    media::remove_file(path).await;
                }
                return Err(e);
            }
        }

        let intent = match self.intents.pop(key)? {
            Some(intent) => intent,
            None => {
                warn!("intent vanished before delivery");
                Intent::new(0)
            }
        };

        if let Some(Some(path)) = first {
            self.dispose(&intent, &path).await;
        }

        Ok(self.fan_out(&intent, &record).await)
    }

    /// Upload a freshly fetched asset to the primary chat to get a handle.
    ///
    /// Returns `None` when the intent was abandoned (and popped).
    async fn first_delivery(&self, key: &str, record: ResourceRecord) -> Result<Option<Delivered>> {
        let Some(file) = MediaFile::from_record(&record) else {
            error!("fetched record has no local file");
            self.notifier
                .notify(&format!("[error_no_video_path]\n{key}"), true)
                .await;
            self.intents.pop(key)?;
            return Ok(None);
        };

        let primary = Target::broadcast(self.settings.primary_chat.as_str());
        match self.channel.send_new(&primary, file, &record.caption).await {
            Ok(upload) => {
                self.retract(upload.receipt).await;
                let mut record = record;
                let freed = record.attach_handle(upload.handle);
                Ok(Some(Delivered { record, freed }))
            }
            Err(e) if e.is_size_exceeded() && self.is_degradable(key, &record) => {
                warn!(error = %e, "first upload too large, trying degraded rendition");
                fallback::run(self, key, record).await
            }
            Err(e) => {
                error!(error = %e, "first upload failed, dropping intent");
                self.intents.pop(key)?;
                if let Some(path) = record.local_path() {
                    media::remove_file(path).await;
                }
                Ok(None)
            }
        }
    }

    pub(crate) async fn retract(&self, receipt: Option<Receipt>) {
        if let Some(receipt) = receipt {
            if let Err(e) = self.channel.retract(&receipt).await {
                warn!(chat_id = %receipt.chat_id, error = %e, "staging message not removed");
            }
        }
    }

    fn is_degradable(&self, key: &str, record: &ResourceRecord) -> bool {
        let url = record.canonical_url(key);
        self.settings
            .degraded_hosts
            .iter()
            .any(|host| !host.is_empty() && url.contains(host.as_str()))
    }

    /// Move the file to the export folder if the operator asked for it,
    /// otherwise delete it.
    async fn dispose(&self, intent: &Intent, path: &std::path::Path) {
        if let Some(export_dir) = &self.settings.export_dir {
            let operator = self.settings.operator_chat.as_str();
            if intent.broadcast_chats().any(|chat| chat == operator) {
                match media::export_file(path, export_dir).await {
                    Ok(_) => return,
                    Err(e) => warn!(path = %path.display(), error = %e, "export failed"),
                }
            }
        }
        media::remove_file(path).await;
    }

    /// Cache the delivered record under the key and its canonical url.
    fn retire(&self, key: &str, record: &ResourceRecord) -> Result<()> {
        self.cache.put(key, record.clone())?;
        let canonical = record.canonical_url(key);
        if canonical != key {
            self.cache.put(canonical, record.clone())?;
        }
        info!(canonical, "record cached");
        Ok(())
    }

    async fn fan_out(&self, intent: &Intent, record: &ResourceRecord) -> Step {
        let Some(handle) = record.handle() else {
            return Step::Dropped;
        };
        let mut delivered = 0;
        let mut failed = 0;
        for target in &intent.targets {
            match self
                .channel
                .send_existing(target, handle, &record.caption)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => {
                    error!(%target, error = %e, "delivery failed");
                    failed += 1;
                }
            }
        }
        info!(delivered, failed, "intent retired");
        Step::Delivered { delivered, failed }
    }
}

/// Sleep for `duration`. Returns `true` if shutdown was requested meanwhile.
pub(crate) async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        res = shutdown.changed() => res.is_err() || *shutdown.borrow(),
    }
}
