//! Telegram long-polling loop for the admin surface.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::BotError;

use super::telegram::types::{
    CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update,
};
use super::telegram::TelegramClient;
use super::{AdminAction, AdminService, Button, Reply};

/// Long-poll timeout in seconds for `getUpdates`.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Delay before retrying after a polling error.
const ERROR_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct AdminBot {
    client: TelegramClient,
    service: AdminService,
    /// Offset for the next `getUpdates` call (update_id + 1).
    offset: AtomicI64,
    retry_delay: Duration,
}

impl AdminBot {
    pub fn new(client: TelegramClient, service: AdminService) -> Self {
        Self {
            client,
            service,
            offset: AtomicI64::new(0),
            retry_delay: ERROR_RETRY_DELAY,
        }
    }

    /// Override the pause after a failed poll.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Poll until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), BotError> {
        let me = self.client.get_me().await?;
        info!(bot_id = me.id, bot_name = %me.first_name, "Telegram bot authenticated");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("admin bot received cancellation");
                    break;
                }
                result = self.client.get_updates(
                    self.offset.load(Ordering::SeqCst),
                    POLL_TIMEOUT_SECS,
                ) => match result {
                    Ok(updates) => {
                        for update in &updates {
                            if let Err(e) = self.process_update(update).await {
                                error!(update_id = update.update_id, error = %e, "failed to process update");
                            }
                            // Advance past the update even when processing failed.
                            self.offset.store(update.update_id + 1, Ordering::SeqCst);
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "getUpdates failed");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(self.retry_delay) => {}
                        }
                    }
                },
            }
        }

        info!("admin bot stopped");
        Ok(())
    }

    pub async fn process_update(&self, update: &Update) -> Result<(), BotError> {
        if let Some(ref cb) = update.callback_query {
            return self.process_callback(cb).await;
        }
        if let Some(ref msg) = update.message {
            return self.process_message(msg).await;
        }
        debug!(update_id = update.update_id, "skipping unsupported update");
        Ok(())
    }

    async fn process_message(&self, msg: &Message) -> Result<(), BotError> {
        let (Some(from), Some(text)) = (msg.from.as_ref(), msg.text.as_deref()) else {
            debug!(message_id = msg.message_id, "skipping message without sender or text");
            return Ok(());
        };

        let reply = self
            .service
            .handle(from.id, AdminAction::from_message(text))
            .await;
        self.send_reply(msg.chat.id, Some(msg.message_id), reply).await
    }

    async fn process_callback(&self, cb: &CallbackQuery) -> Result<(), BotError> {
        let Some(action) = cb.data.as_deref().and_then(AdminAction::from_callback) else {
            debug!(callback_id = %cb.id, "ignoring unknown callback payload");
            self.client.answer_callback_query(&cb.id, None).await?;
            return Ok(());
        };

        let reply = self.service.handle(cb.from.id, action).await;
        if reply.denied {
            self.client
                .answer_callback_query(&cb.id, Some(&reply.text))
                .await?;
            return Ok(());
        }

        let chat_id = cb.message.as_ref().map_or(cb.from.id, |m| m.chat.id);
        self.send_reply(chat_id, None, reply).await?;
        self.client.answer_callback_query(&cb.id, None).await?;
        Ok(())
    }

    async fn send_reply(
        &self,
        chat_id: i64,
        reply_to: Option<i64>,
        reply: Reply,
    ) -> Result<(), BotError> {
        let parse_mode = reply.markdown.then_some("Markdown");
        let markup = reply.keyboard.map(to_markup);
        self.client
            .send_message(chat_id, &reply.text, parse_mode, reply_to, markup)
            .await?;
        Ok(())
    }
}

fn to_markup(rows: Vec<Vec<Button>>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|b| InlineKeyboardButton {
                        text: b.label,
                        callback_data: b.data,
                    })
                    .collect()
            })
            .collect(),
    }
}
