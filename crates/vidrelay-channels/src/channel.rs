use async_trait::async_trait;

use vidrelay_core::{MediaHandle, Target};

use crate::{
    error::DeliveryError,
    types::{MediaFile, Receipt, Upload},
};

/// Interface implemented by every delivery backend (Telegram, test doubles, …).
///
/// Implementations must be `Send + Sync` so one instance can be shared by the
/// scheduler and the producers.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"telegram"`).
    fn name(&self) -> &str;

    /// Upload a local file to `target` and return a reusable handle.
    ///
    /// Must return [`DeliveryError::SizeExceeded`] when the failure is due to
    /// the asset size, so the caller can try a smaller rendition.
    async fn send_new(
        &self,
        target: &Target,
        file: MediaFile<'_>,
        caption: &str,
    ) -> Result<Upload, DeliveryError>;

    /// Deliver an already-uploaded asset to `target`.
    async fn send_existing(
        &self,
        target: &Target,
        handle: &MediaHandle,
        caption: &str,
    ) -> Result<(), DeliveryError>;

    /// Remove the message left behind by [`send_new`](Self::send_new).
    ///
    /// The default does nothing.
    async fn retract(&self, _receipt: &Receipt) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// Fire-and-forget operator alerts.
///
/// Implementations swallow their own failures; callers never see them.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// `urgent = false` delivers silently where the platform supports it.
    async fn notify(&self, message: &str, urgent: bool);
}
