use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use vidrelay_core::{Payload, ResourceRecord};
use vidrelay_store::{InlineCache, IntentStore, ResourceCache};

use crate::{
    classify::{ErrorClass, ErrorClassifier},
    error::{ExecError, ExtractError},
    extractor::{Extractor, QualityProfile},
    gate::SingleFlight,
};

/// Resolves resource keys to records, fetching at most one at a time.
///
/// Share one `Executor` (behind an `Arc`) between the scheduler and any
/// interactive caller: the single-flight gate is per instance, so a second
/// instance would allow a second concurrent fetch.
pub struct Executor {
    extractor: Arc<dyn Extractor>,
    cache: Arc<ResourceCache>,
    intents: Arc<IntentStore>,
    inline: Arc<InlineCache>,
    classifier: ErrorClassifier,
    gate: SingleFlight,
    fetch_timeout: Duration,
}

impl Executor {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        cache: Arc<ResourceCache>,
        intents: Arc<IntentStore>,
        inline: Arc<InlineCache>,
        classifier: ErrorClassifier,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            cache,
            intents,
            inline,
            classifier,
            gate: SingleFlight::new(),
            fetch_timeout,
        }
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    /// Return the record for `key`, downloading it if `want_fetch` and no
    /// uploaded handle is cached yet.
    ///
    /// Cache hits take no lock and make no external call. A metadata probe
    /// runs outside the gate. Only the download itself holds the gate, and
    /// only for at most the configured fetch timeout.
    ///
    /// A freshly downloaded record carries a local path and no handle; it is
    /// *not* cached here. The caller caches it after the first delivery.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn resolve(&self, key: &str, want_fetch: bool) -> Result<ResourceRecord, ExecError> {
        let cached = self.cache.get(key);
        if let Some(record) = &cached {
            if record.handle().is_some() || !want_fetch {
                return Ok(record.clone());
            }
        }

        if cached.is_none() {
            let metadata = match self.extractor.probe(key).await {
                Ok(metadata) => metadata,
                Err(e) => return Err(self.fail(key, e)?),
            };

            if let Some(canonical) = metadata.canonical_url().filter(|url| *url != key) {
                if let Some(record) = self.cache.get(canonical) {
                    self.cache.put_alias(key, canonical)?;
                    if record.handle().is_some() || !want_fetch {
                        info!(%canonical, "resolved through canonical url");
                        return Ok(record);
                    }
                }
            }

            if !want_fetch {
                return Ok(metadata.into_record(Payload::Metadata));
            }
        }

        self.fetch(key, QualityProfile::Standard).await
    }

    /// Download a lower-quality rendition of `key` under its own filename.
    ///
    /// Used after an upload was rejected for size. Same gate and timeout as
    /// a regular fetch.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn fetch_degraded(&self, key: &str) -> Result<ResourceRecord, ExecError> {
        self.fetch(key, QualityProfile::Degraded).await
    }

    async fn fetch(&self, key: &str, profile: QualityProfile) -> Result<ResourceRecord, ExecError> {
        let outcome = self
            .gate
            .run(tokio::time::timeout(
                self.fetch_timeout,
                self.extractor.fetch(key, profile),
            ))
            .await;

        match outcome {
            Ok(Ok(fetched)) => {
                info!(?profile, path = %fetched.path.display(), "extract_info downloaded");
                Ok(fetched.into_record())
            }
            Ok(Err(e)) => Err(self.fail(key, e)?),
            Err(_) => {
                // The extractor process is not cancelled; it may finish in the
                // background and leave a file behind.
                let secs = self.fetch_timeout.as_secs();
                warn!(secs, "extract_info timeout");
                Err(ExecError::Timeout {
                    key: key.to_string(),
                    secs,
                })
            }
        }
    }

    /// Classify an extractor failure, recording permanent ones.
    ///
    /// Returns the error to hand back to the caller; the outer `Result` only
    /// fails if recording the classification fails.
    fn fail(&self, key: &str, err: ExtractError) -> Result<ExecError, ExecError> {
        let reason = err.to_string();
        match self.classifier.classify(&err) {
            ErrorClass::Permanent => {
                warn!(%reason, "resource permanently unavailable");
                self.intents.mark_ignored(key)?;
                self.inline.mark_ignored(key);
                Ok(ExecError::Permanent {
                    key: key.to_string(),
                    reason,
                })
            }
            ErrorClass::Transient => {
                error!(%reason, "extract_info error");
                Ok(ExecError::Transient {
                    key: key.to_string(),
                    reason,
                })
            }
        }
    }
}
