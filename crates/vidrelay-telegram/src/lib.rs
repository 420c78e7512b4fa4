//! `vidrelay-telegram` — Telegram binding of the delivery seams plus the
//! `/download` producer.

pub mod adapter;
pub mod delivery;
pub mod error;
pub mod handler;

pub use adapter::TelegramAdapter;
pub use delivery::TelegramDelivery;
pub use error::TelegramError;
pub use handler::ProducerContext;

use teloxide::Bot;

use vidrelay_core::config::TelegramConfig;

/// Build a `Bot` for `config`, pointed at a local Bot API server if set.
pub fn build_bot(config: &TelegramConfig) -> Result<Bot, TelegramError> {
    if config.bot_token.is_empty() {
        return Err(TelegramError::NoToken);
    }
    let bot = Bot::new(&config.bot_token);
    match config.api_url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => {
            let url = reqwest::Url::parse(url)
                .map_err(|e| TelegramError::InvalidApiUrl(format!("{url}: {e}")))?;
            Ok(bot.set_api_url(url))
        }
        None => Ok(bot),
    }
}
