//! Administrator control surface.
//!
//! Transport-agnostic: [`AdminService::handle`] takes the caller's identity and
//! a parsed [`AdminAction`] and returns a [`Reply`]. The Telegram adapter in
//! [`bot`] is the only transport today.

use chrono::Utc;
use tracing::warn;

use crate::errors::TokenError;
use crate::lifecycle::LifecycleManager;
use crate::models::token::{parse_ttl, TTL_PRESETS};

pub mod bot;
pub mod messages;
pub mod telegram;

/// Callback payloads carried by inline buttons.
pub const CB_LIST: &str = "list_tokens";
pub const CB_CLEAN: &str = "clean_tokens";
pub const CB_CHOOSE_TTL: &str = "generate_token";
pub const CB_GENERATE_PREFIX: &str = "gen_";

/// The single authorization predicate for the admin surface.
#[derive(Debug, Clone, Copy)]
pub struct AdminGuard {
    admin_id: i64,
}

impl AdminGuard {
    pub fn new(admin_id: i64) -> Self {
        Self { admin_id }
    }

    pub fn is_authorized(&self, principal_id: i64) -> bool {
        principal_id == self.admin_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    /// `/start`: welcome plus the main menu.
    Start,
    /// `/gen`: ask for a freeform TTL.
    PromptTtl,
    ListTokens,
    CleanTokens,
    /// Show the TTL presets.
    ChooseTtl,
    Generate { ttl: i64 },
    /// Text that was neither a command nor a positive integer.
    InvalidTtl(String),
}

impl AdminAction {
    /// Parse a chat message. Anything that isn't a known command is a TTL attempt.
    pub fn from_message(text: &str) -> Self {
        let text = text.trim();
        // "/start@SomeBot" in group chats
        let command = text.split('@').next().unwrap_or(text);
        match command {
            "/start" => AdminAction::Start,
            "/gen" => AdminAction::PromptTtl,
            "/list_tokens" => AdminAction::ListTokens,
            "/clean_tokens" => AdminAction::CleanTokens,
            _ => match parse_ttl(text) {
                Ok(ttl) => AdminAction::Generate { ttl },
                Err(_) => AdminAction::InvalidTtl(text.to_string()),
            },
        }
    }

    /// Parse an inline-button payload. Unknown payloads yield `None`.
    pub fn from_callback(data: &str) -> Option<Self> {
        match data {
            CB_LIST => Some(AdminAction::ListTokens),
            CB_CLEAN => Some(AdminAction::CleanTokens),
            CB_CHOOSE_TTL => Some(AdminAction::ChooseTtl),
            _ => data
                .strip_prefix(CB_GENERATE_PREFIX)
                .and_then(|secs| parse_ttl(secs).ok())
                .map(|ttl| AdminAction::Generate { ttl }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    fn new(label: &str, data: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Render as Telegram Markdown.
    pub markdown: bool,
    /// Rows of inline buttons.
    pub keyboard: Option<Vec<Vec<Button>>>,
    /// The caller was refused; nothing else happened.
    pub denied: bool,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
            keyboard: None,
            denied: false,
        }
    }

    fn with_keyboard(mut self, rows: Vec<Vec<Button>>) -> Self {
        self.keyboard = Some(rows);
        self
    }

    fn denied() -> Self {
        Self {
            denied: true,
            ..Self::text(messages::NOT_ADMIN)
        }
    }
}

fn main_menu() -> Vec<Vec<Button>> {
    vec![
        vec![
            Button::new(messages::BUTTON_LIST, CB_LIST),
            Button::new(messages::BUTTON_CLEAN, CB_CLEAN),
        ],
        vec![Button::new(messages::BUTTON_CREATE, CB_CHOOSE_TTL)],
    ]
}

fn ttl_menu() -> Vec<Vec<Button>> {
    TTL_PRESETS
        .iter()
        .map(|(label, secs)| vec![Button::new(label, format!("{}{}", CB_GENERATE_PREFIX, secs))])
        .collect()
}

#[derive(Clone)]
pub struct AdminService {
    tokens: LifecycleManager,
    guard: AdminGuard,
}

impl AdminService {
    pub fn new(tokens: LifecycleManager, guard: AdminGuard) -> Self {
        Self { tokens, guard }
    }

    pub async fn handle(&self, principal_id: i64, action: AdminAction) -> Reply {
        if !self.guard.is_authorized(principal_id) {
            warn!(principal_id, "admin action refused: not an administrator");
            return Reply::denied();
        }

        match action {
            AdminAction::Start => Reply::text(messages::WELCOME).with_keyboard(main_menu()),
            AdminAction::PromptTtl => Reply::text(messages::PROMPT_TTL),
            AdminAction::ChooseTtl => Reply::text(messages::CHOOSE_TTL).with_keyboard(ttl_menu()),
            AdminAction::ListTokens => match self.tokens.list().await {
                Ok(records) if records.is_empty() => Reply::text(messages::NO_TOKENS),
                Ok(records) => Reply::text(messages::token_list(&records, Utc::now())),
                Err(TokenError::Store(e)) => Reply::text(messages::database_error(e)),
                Err(e) => Reply::text(messages::generic_error(e)),
            },
            AdminAction::CleanTokens => match self.tokens.sweep().await {
                Ok(removed) => Reply::text(messages::tokens_cleaned(removed)),
                Err(e) => Reply::text(messages::cleanup_error(e)),
            },
            AdminAction::Generate { ttl } => match self.tokens.create(ttl, None).await {
                Ok(issued) => Reply {
                    markdown: true,
                    ..Reply::text(messages::token_created(&issued))
                },
                Err(TokenError::InvalidInput(_)) => Reply::text(messages::INVALID_TTL),
                Err(TokenError::Store(e)) => Reply::text(messages::database_error(e)),
                Err(e) => {
                    tracing::error!("token creation failed: {}", e);
                    Reply::text(messages::generic_error(e))
                }
            },
            AdminAction::InvalidTtl(_) => Reply::text(messages::INVALID_TTL),
        }
    }
}
