//! Administrator-facing notices (Russian).

use chrono::{DateTime, Utc};

use crate::models::token::{mask_secret, IssuedToken, TokenRecord};

pub const NOT_ADMIN: &str = "Вы не администратор!";
pub const WELCOME: &str = "Добро пожаловать в бот для управления токенами! Выберите действие:";
pub const PROMPT_TTL: &str = "Введите время жизни токена в секундах (например, 3600 для 1 часа):";
pub const CHOOSE_TTL: &str = "Выберите продолжительность жизни токена:";
pub const NO_TOKENS: &str = "Нет активных токенов.";
pub const INVALID_TTL: &str = "Пожалуйста, введите число для времени жизни токена в секундах.";

pub const BUTTON_LIST: &str = "Список токенов";
pub const BUTTON_CLEAN: &str = "Очистить просроченные токены";
pub const BUTTON_CREATE: &str = "Создать новый токен";

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Creation notice. The one place a full secret is shown; Markdown code span
/// so it copies cleanly.
pub fn token_created(issued: &IssuedToken) -> String {
    format!(
        "✅ Ключ создан:\n🔑 Токен: `{}`\n⏰ Действителен до: {}",
        issued.secret,
        format_timestamp(&issued.expiration)
    )
}

pub fn token_list(records: &[TokenRecord], now: DateTime<Utc>) -> String {
    let lines: Vec<String> = records
        .iter()
        .map(|r| {
            let marker = if r.is_expired_at(now) { " (просрочен)" } else { "" };
            format!(
                "🔑 {}\n⏰ Действителен до: {}{}",
                mask_secret(&r.secret),
                format_timestamp(&r.expiration),
                marker
            )
        })
        .collect();
    format!("📜 Список токенов:\n{}", lines.join("\n"))
}

pub fn tokens_cleaned(removed: u64) -> String {
    format!("✅ Удалены все просроченные токены. Удалено: {}.", removed)
}

pub fn database_error(err: impl std::fmt::Display) -> String {
    format!("Ошибка при доступе к базе данных: {}", err)
}

pub fn cleanup_error(err: impl std::fmt::Display) -> String {
    format!("Ошибка при очистке токенов: {}", err)
}

pub fn generic_error(err: impl std::fmt::Display) -> String {
    format!("Ошибка: {}", err)
}
