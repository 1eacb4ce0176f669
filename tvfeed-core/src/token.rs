use rand::Rng;

use crate::constants::{TOKEN_CHARS, TOKEN_LENGTH};

/// Случайный токен `[a-z0-9]{12}`
pub fn create_token() -> String {
    let mut rng = rand::rng();

    (0..TOKEN_LENGTH)
        .map(|_| TOKEN_CHARS[rng.random_range(0..TOKEN_CHARS.len())] as char)
        .collect()
}

/// Идентификаторы сессий одного соединения.
///
/// Обе quote-сессии строятся от одного токена, chart-сессия от своего.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    /// `cs_<token>`
    pub chart: String,
    /// `qs_<token>`
    pub quote: String,
    /// `qs_snapshoter_basic-symbol-quotes_<token>`, для лёгких тикающих подписок
    pub fast_symbols: String,
}

impl SessionTokens {
    /// Новые случайные токены
    pub fn generate() -> Self {
        Self::from_parts(&create_token(), &create_token())
    }

    /// Детерминированно собирает имена из готовых токенов
    pub fn from_parts(chart_token: &str, quote_token: &str) -> Self {
        Self {
            chart: format!("cs_{chart_token}"),
            quote: format!("qs_{quote_token}"),
            fast_symbols: format!("qs_snapshoter_basic-symbol-quotes_{quote_token}"),
        }
    }
}
