//! HTTP client for the Telegram Bot API methods the admin bot uses:
//! `getMe`, `getUpdates`, `sendMessage`, `answerCallbackQuery`.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::errors::BotError;

use super::types::{
    AnswerCallbackQueryRequest, InlineKeyboardMarkup, Message, SendMessageRequest,
    TelegramResponse, Update, User,
};

pub struct TelegramClient {
    http: Client,
    /// `https://api.telegram.org/bot{token}` by default. Holds the token; never logged.
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(format!("https://api.telegram.org/bot{token}"))
    }

    /// Point at a custom base URL (mock servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Verify the bot token.
    pub async fn get_me(&self) -> Result<User, BotError> {
        debug!("verifying bot token");
        let resp = self
            .http
            .get(format!("{}/getMe", self.base_url))
            .send()
            .await
            .map_err(|e| BotError::ConnectionFailed(e.to_string()))?;

        let body: TelegramResponse<User> = resp
            .json()
            .await
            .map_err(|e| BotError::AuthFailed(e.to_string()))?;
        unwrap_result(body, BotError::AuthFailed)
    }

    /// Long-poll for updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, BotError> {
        trace!(offset, "polling for updates");
        let resp = self
            .http
            .get(format!("{}/getUpdates", self.base_url))
            .query(&[("offset", offset.to_string()), ("timeout", timeout.to_string())])
            .send()
            .await
            .map_err(|e| BotError::ConnectionFailed(e.to_string()))?;

        let body: TelegramResponse<Vec<Update>> = resp
            .json()
            .await
            .map_err(|e| BotError::ReceiveFailed(e.to_string()))?;
        if !body.ok {
            let desc = body.description.unwrap_or_else(|| "unknown error".into());
            return Err(BotError::ReceiveFailed(desc));
        }

        let updates = body.result.unwrap_or_default();
        debug!(count = updates.len(), "received updates");
        Ok(updates)
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<&str>,
        reply_to: Option<i64>,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<Message, BotError> {
        let req = SendMessageRequest {
            chat_id,
            text: text.to_owned(),
            parse_mode: parse_mode.map(str::to_owned),
            reply_to_message_id: reply_to,
            reply_markup,
        };
        debug!(chat_id, "sending message");
        self.post("sendMessage", &req).await
    }

    /// Acknowledge a button press, optionally with a toast.
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<bool, BotError> {
        let req = AnswerCallbackQueryRequest {
            callback_query_id: callback_query_id.to_owned(),
            text: text.map(str::to_owned),
        };
        self.post("answerCallbackQuery", &req).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, BotError> {
        let resp = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await
            .map_err(|e| BotError::SendFailed(e.to_string()))?;

        let body: TelegramResponse<T> = resp
            .json()
            .await
            .map_err(|e| BotError::SendFailed(e.to_string()))?;
        unwrap_result(body, BotError::SendFailed)
    }
}

fn unwrap_result<T>(
    body: TelegramResponse<T>,
    err: impl Fn(String) -> BotError,
) -> Result<T, BotError> {
    if !body.ok {
        return Err(err(body.description.unwrap_or_else(|| "unknown error".into())));
    }
    body.result
        .ok_or_else(|| err("missing result in response".into()))
}
