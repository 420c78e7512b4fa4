//! `/download` producer registered in the teloxide Dispatcher.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{info, warn};

use vidrelay_core::types::SOURCE_DOWNLOAD;
use vidrelay_core::Target;
use vidrelay_downloader::Executor;
use vidrelay_scheduler::IntentQueue;

const UNSUPPORTED: &str = "Unsupported url";

/// Shared state handed to every handler invocation.
pub struct ProducerContext {
    pub executor: Arc<Executor>,
    pub queue: IntentQueue,
    /// Already-uploaded animation shown while the real video is fetched.
    pub placeholder_file_id: Option<String>,
}

/// Pull the requested URL out of `/download <url>` or a bare URL message.
pub fn extract_url(text: &str) -> Option<&str> {
    let text = text.trim();
    let rest = match text.split_once(char::is_whitespace) {
        Some((cmd, rest)) if is_download_command(cmd) => rest.trim(),
        None if is_download_command(text) => return None,
        _ => text,
    };
    let url = rest.split_whitespace().next()?;
    (url.starts_with("http://") || url.starts_with("https://")).then_some(url)
}

fn is_download_command(word: &str) -> bool {
    word == "/download" || word.starts_with("/download@")
}

/// Handles every incoming `Message`:
/// 1. Extract a URL (ignore the message if there is none)
/// 2. Probe it without downloading
/// 3. Already uploaded → reply with the cached video straight away
/// 4. Otherwise queue an intent targeting a placeholder reply, or the chat
pub async fn handle_message(bot: Bot, msg: Message, ctx: Arc<ProducerContext>) -> ResponseResult<()> {
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        return Ok(());
    }
    let Some(url) = msg.text().and_then(extract_url) else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    let record = match ctx.executor.resolve(url, false).await {
        Ok(record) => record,
        Err(e) => {
            warn!(%url, error = %e, "download request rejected");
            bot.send_message(chat_id, UNSUPPORTED).await?;
            return Ok(());
        }
    };

    if let Some(handle) = record.handle() {
        bot.send_video(chat_id, InputFile::file_id(handle.as_str()))
            .caption(record.caption.as_str())
            .await?;
        info!(%url, "served from cache");
        return Ok(());
    }

    let target = match ctx.placeholder_file_id.as_deref() {
        Some(placeholder) => {
            let reply = bot
                .send_animation(chat_id, InputFile::file_id(placeholder))
                .caption(record.caption.as_str())
                .await?;
            Target::message(chat_id.0.to_string(), reply.id.0.to_string())
        }
        None => Target::broadcast(chat_id.0.to_string()),
    };

    if let Err(e) = ctx.queue.append_intent(url, &[target], Some(SOURCE_DOWNLOAD)) {
        warn!(%url, error = %e, "could not queue download");
        bot.send_message(chat_id, "Could not queue the download, try again later")
            .await?;
    }
    Ok(())
}
