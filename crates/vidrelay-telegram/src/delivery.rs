//! Telegram implementation of [`DeliveryChannel`] and [`Notifier`].

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, InputMedia, InputMediaVideo, MessageId, Recipient};
use teloxide::{ApiError, RequestError};
use tracing::{info, warn};

use vidrelay_channels::{DeliveryChannel, DeliveryError, MediaFile, Notifier, Receipt, Upload};
use vidrelay_core::config::TelegramConfig;
use vidrelay_core::{MediaHandle, Target};

/// Sends videos through the Bot API.
///
/// Uploads are silent; the staging message they create is deleted again by
/// [`retract`](DeliveryChannel::retract) once its `file_id` is known.
#[derive(Clone)]
pub struct TelegramDelivery {
    bot: Bot,
    operator_chat: String,
    max_upload_bytes: u64,
}

impl TelegramDelivery {
    pub fn new(bot: Bot, config: &TelegramConfig) -> Self {
        Self {
            bot,
            operator_chat: config.operator_chat_id().to_string(),
            max_upload_bytes: config.max_upload_bytes(),
        }
    }
}

/// Chat ids are numeric; public channels may also be addressed as `@name`.
pub fn recipient(chat_id: &str) -> Result<Recipient, DeliveryError> {
    if chat_id.starts_with('@') {
        return Ok(Recipient::ChannelUsername(chat_id.to_string()));
    }
    chat_id
        .parse::<i64>()
        .map(|id| Recipient::Id(ChatId(id)))
        .map_err(|_| DeliveryError::Unsupported(format!("bad chat id {chat_id:?}")))
}

fn message_id(id: &str) -> Result<MessageId, DeliveryError> {
    id.parse::<i32>()
        .map(MessageId)
        .map_err(|_| DeliveryError::Unsupported(format!("bad message id {id:?}")))
}

fn video_media(handle: &MediaHandle, caption: &str) -> InputMedia {
    InputMedia::Video(InputMediaVideo::new(InputFile::file_id(handle.as_str())).caption(caption))
}

fn request_failed(e: RequestError, size: u64, max: u64) -> DeliveryError {
    match e {
        RequestError::Api(ApiError::RequestEntityTooLarge) => DeliveryError::SizeExceeded { size, max },
        other => DeliveryError::Failed(other.to_string()),
    }
}

#[async_trait]
impl DeliveryChannel for TelegramDelivery {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_new(
        &self,
        target: &Target,
        file: MediaFile<'_>,
        caption: &str,
    ) -> Result<Upload, DeliveryError> {
        let Target::Broadcast { chat_id } = target else {
            return Err(DeliveryError::Unsupported(format!("upload to {target}")));
        };
        let max = self.max_upload_bytes;
        let size = tokio::fs::metadata(file.path)
            .await
            .map_err(|e| DeliveryError::Failed(format!("{}: {e}", file.path.display())))?
            .len();
        if size > max {
            return Err(DeliveryError::SizeExceeded { size, max });
        }

        let mut input = InputFile::file(file.path.to_path_buf());
        if let Some(name) = file.filename {
            input = input.file_name(name.to_string());
        }
        let mut request = self
            .bot
            .send_video(recipient(chat_id)?, input)
            .caption(caption)
            .duration(file.duration)
            .supports_streaming(true)
            .disable_notification(true);
        if let Some(width) = file.width {
            request = request.width(width);
        }
        if let Some(height) = file.height {
            request = request.height(height);
        }

        let msg = request.await.map_err(|e| request_failed(e, size, max))?;
        let handle = msg
            .video()
            .map(|v| v.file.id.clone())
            .or_else(|| msg.document().map(|d| d.file.id.clone()))
            .ok_or_else(|| DeliveryError::Failed("upload reply carries no video".to_string()))?;
        info!(%chat_id, size, "send_video uploaded");

        Ok(Upload {
            handle: MediaHandle(handle.to_string()),
            receipt: Some(Receipt {
                chat_id: msg.chat.id.0.to_string(),
                message_id: msg.id.0.to_string(),
            }),
        })
    }

    async fn send_existing(
        &self,
        target: &Target,
        handle: &MediaHandle,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        let sent = match target {
            Target::Broadcast { chat_id } => self
                .bot
                .send_video(recipient(chat_id)?, InputFile::file_id(handle.as_str()))
                .caption(caption)
                .await
                .map(|_| ()),
            Target::InlinePlaceholder { inline_message_id } => self
                .bot
                .edit_message_media_inline(inline_message_id.clone(), video_media(handle, caption))
                .await
                .map(|_| ()),
            Target::ChatMessage {
                chat_id,
                message_id: id,
            } => self
                .bot
                .edit_message_media(recipient(chat_id)?, message_id(id)?, video_media(handle, caption))
                .await
                .map(|_| ()),
        };
        sent.map_err(|e| DeliveryError::Failed(e.to_string()))?;
        info!(%target, "video delivered");
        Ok(())
    }

    async fn retract(&self, receipt: &Receipt) -> Result<(), DeliveryError> {
        self.bot
            .delete_message(recipient(&receipt.chat_id)?, message_id(&receipt.message_id)?)
            .await
            .map_err(|e| DeliveryError::Failed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramDelivery {
    async fn notify(&self, message: &str, urgent: bool) {
        let chat = match recipient(&self.operator_chat) {
            Ok(chat) => chat,
            Err(e) => {
                warn!(error = %e, "operator chat misconfigured");
                return;
            }
        };
        if let Err(e) = self
            .bot
            .send_message(chat, message)
            .disable_notification(!urgent)
            .await
        {
            warn!(error = %e, "operator notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_username_recipients() {
        assert_eq!(recipient("-100123").unwrap(), Recipient::Id(ChatId(-100123)));
        assert_eq!(
            recipient("@channel").unwrap(),
            Recipient::ChannelUsername("@channel".to_string())
        );
        assert!(matches!(recipient("nope"), Err(DeliveryError::Unsupported(_))));
    }

    #[test]
    fn message_ids_must_be_numeric() {
        assert_eq!(message_id("42").unwrap(), MessageId(42));
        assert!(message_id("x").is_err());
    }

    #[test]
    fn entity_too_large_maps_to_size_exceeded() {
        let err = request_failed(RequestError::Api(ApiError::RequestEntityTooLarge), 10, 5);
        assert!(err.is_size_exceeded());
        let err = request_failed(RequestError::Api(ApiError::BotBlocked), 10, 5);
        assert!(!err.is_size_exceeded());
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.mp4");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let delivery = TelegramDelivery {
            bot: Bot::new("0:test"),
            operator_chat: "1".to_string(),
            max_upload_bytes: 1024,
        };
        let file = MediaFile {
            path: &path,
            filename: None,
            duration: 1,
            width: None,
            height: None,
        };
        let err = delivery
            .send_new(&Target::broadcast("1"), file, "c")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::SizeExceeded { size: 2048, max: 1024 }));

        let err = delivery
            .send_new(&Target::inline("abc"), file, "c")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Unsupported(_)));
    }
}
