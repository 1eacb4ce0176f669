//! Транспорт: единственный писатель и единственный читатель соединения.
//!
//! Диспетчеры работают с трейтами, поэтому websocket в тестах
//! подменяется in-memory парой из [`memory`].

pub mod memory;
pub mod ws;

use async_trait::async_trait;

use crate::error::TransportError;

/// Запись текстовых сообщений в соединение
#[async_trait]
pub trait FrameSink: Send {
    /// Отправить одно сообщение (может содержать один фрейм)
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Закрыть соединение со своей стороны
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Чтение текстовых сообщений из соединения
#[async_trait]
pub trait FrameSource: Send {
    /// Следующее сообщение; `None` - соединение закрыто
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;
}
