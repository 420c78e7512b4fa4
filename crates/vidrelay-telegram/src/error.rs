/// Errors produced by the Telegram adapter.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("no bot token configured")]
    NoToken,

    #[error("invalid Bot API url {0}")]
    InvalidApiUrl(String),
}
