//! Minimal Telegram Bot API transport.

pub mod client;
pub mod types;

pub use client::TelegramClient;
