//! Telegram channel adapter.
//!
//! Drives the teloxide long-polling Dispatcher for the `/download` producer
//! until shutdown is requested.

use std::sync::Arc;

use teloxide::prelude::*;
use tokio::sync::watch;
use tracing::info;

use crate::handler::{handle_message, ProducerContext};

/// Long polling; no public URL required.
pub struct TelegramAdapter {
    bot: Bot,
    ctx: Arc<ProducerContext>,
}

impl TelegramAdapter {
    pub fn new(bot: Bot, ctx: Arc<ProducerContext>) -> Self {
        Self { bot, ctx }
    }

    /// Run the dispatcher until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Telegram: starting long-polling dispatcher");

        let handler = Update::filter_message().endpoint(handle_message);
        let mut dispatcher = Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![Arc::clone(&self.ctx)])
            .default_handler(|_upd| async {})
            .build();

        let stop = dispatcher.shutdown_token();
        tokio::spawn(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
            // Errors only if the dispatcher is not running yet or already idle.
            if let Ok(done) = stop.shutdown() {
                done.await;
            }
        });

        dispatcher.dispatch().await;
        info!("Telegram dispatcher stopped");
    }
}
