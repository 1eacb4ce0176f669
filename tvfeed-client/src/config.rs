use std::time::Duration;

use tvfeed_core::constants::{
    ANONYMOUS_AUTH_TOKEN, DEFAULT_ORIGIN, DEFAULT_URL, INITIAL_HISTORY_CANDLES,
};

/// Сколько по умолчанию ждём подтверждение команды
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Ёмкость очереди исходящих команд
pub const DEFAULT_COMMAND_QUEUE: usize = 64;

/// Настройки одной сессии
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// websocket endpoint
    pub url: String,
    /// значение заголовка `Origin` при handshake
    pub origin: String,
    /// токен для `set_auth_token`
    pub auth_token: String,
    /// предел ожидания подтверждения; `None` - ждать бесконечно
    pub ack_timeout: Option<Duration>,
    /// свечей в первом `create_series`
    pub initial_history_candles: u32,
    /// ёмкость очереди команд к писателю
    pub command_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            auth_token: ANONYMOUS_AUTH_TOKEN.to_string(),
            ack_timeout: Some(DEFAULT_ACK_TIMEOUT),
            initial_history_candles: INITIAL_HISTORY_CANDLES,
            command_queue: DEFAULT_COMMAND_QUEUE,
        }
    }
}

impl SessionConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = token.into();
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_initial_history_candles(mut self, candles: u32) -> Self {
        self.initial_history_candles = candles;
        self
    }

    pub fn with_command_queue(mut self, capacity: usize) -> Self {
        // mpsc::channel(0) паникует
        self.command_queue = capacity.max(1);
        self
    }
}
