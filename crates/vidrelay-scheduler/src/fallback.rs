//! Second chance for assets the primary chat rejected as too large.

use tracing::{error, info, warn};

use vidrelay_channels::MediaFile;
use vidrelay_core::{ResourceRecord, Target};
use vidrelay_downloader::{media, ExecError};

use crate::engine::{Delivered, Scheduler};
use crate::error::Result;

/// Re-fetch `key` at degraded quality and upload that instead.
///
/// Tried once. On failure the intent is abandoned and popped, except when the
/// degraded fetch failed permanently: as with any permanent extraction error
/// the executor has already marked the intent ignored, and it stays that way
/// so later requests for the resource are not requeued. Both the original and
/// the degraded file are gone from disk when this returns.
pub(crate) async fn run(
    scheduler: &Scheduler,
    key: &str,
    original: ResourceRecord,
) -> Result<Option<Delivered>> {
    scheduler
        .notifier
        .notify(&format!("[error_large_video]\n{}", original.caption), true)
        .await;
    if let Some(path) = original.local_path() {
        media::remove_file(path).await;
    }

    let (delivered, ignored) = match scheduler.executor.fetch_degraded(key).await {
        Ok(degraded) => (upload(scheduler, degraded, &original).await, false),
        Err(ExecError::Store(e)) => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "degraded fetch failed");
            (None, matches!(e, ExecError::Permanent { .. }))
        }
    };

    match delivered {
        Some(record) => {
            info!("degraded rendition delivered");
            scheduler
                .notifier
                .notify(&format!("[error_fixed_large_video]\n{}", record.caption), false)
                .await;
            Ok(Some(Delivered {
                record,
                freed: None,
            }))
        }
        None => {
            error!("large asset abandoned");
            scheduler
                .notifier
                .notify(&format!("[error_abandoned_large_video]\n{}", original.caption), true)
                .await;
            if !ignored {
                scheduler.intents.pop(key)?;
            }
            Ok(None)
        }
    }
}

/// Upload the degraded record to the primary chat, then delete its file.
async fn upload(
    scheduler: &Scheduler,
    mut degraded: ResourceRecord,
    original: &ResourceRecord,
) -> Option<ResourceRecord> {
    let Some(file) = MediaFile::from_record(&degraded) else {
        warn!("degraded fetch produced no file");
        return None;
    };
    let path = file.path.to_path_buf();

    let primary = Target::broadcast(scheduler.settings.primary_chat.as_str());
    let sent = scheduler
        .channel
        .send_new(&primary, file, &degraded.caption)
        .await;
    media::remove_file(&path).await;

    match sent {
        Ok(upload) => {
            scheduler.retract(upload.receipt).await;
            degraded.attach_handle(upload.handle);
            degraded.origin = Some(original.origin_info());
            Some(degraded)
        }
        Err(e) => {
            warn!(error = %e, "degraded upload failed");
            None
        }
    }
}
