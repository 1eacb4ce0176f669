use std::time::Duration;

use thiserror::Error;
use tvfeed_core::{FatalKind, WireError};

/// Ошибки транспорта (websocket или in-memory)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Не удалось установить соединение
    #[error("connect failed: {0}")]
    Connect(String),

    /// Ошибка записи
    #[error("send failed: {0}")]
    Send(String),

    /// Ошибка чтения
    #[error("receive failed: {0}")]
    Receive(String),

    /// Соединение закрыто
    #[error("connection closed")]
    Closed,
}

impl TransportError {
    /// После такой ошибки соединение уже не оживёт
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportError::Closed | TransportError::Receive(_))
    }
}

/// Ошибки сессии.
///
/// `Clone`, потому что одна и та же ошибка уходит и вызывающему,
/// и в канал уведомлений об ошибках.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Сбой транспорта, фатален для сессии
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Команда не сериализовалась; сессия продолжает работу
    #[error(transparent)]
    Encoding(#[from] WireError),

    /// `critical_error` / `protocol_error` от сервера
    #[error("server {kind}: {payload}")]
    ProtocolFatal { kind: FatalKind, payload: String },

    /// Подтверждение не пришло вовремя; сессия продолжает работу
    #[error("no {awaiting:?} within {after:?}")]
    CorrelationTimeout { awaiting: String, after: Duration },

    /// Попытка ждать второе подтверждение, пока не пришло первое
    #[error("already awaiting {awaiting:?}")]
    GateBusy { awaiting: String },

    /// Аргументы вызова нарушают предусловие
    #[error("invalid argument: {0}")]
    Validation(String),

    /// Сессия закрыта, диспетчеры остановлены
    #[error("session closed")]
    TransportClosed,
}

impl SessionError {
    /// Завершает ли ошибка сессию целиком
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::Transport(e) => e.is_terminal(),
            SessionError::ProtocolFatal { .. } | SessionError::TransportClosed => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
