//! # tvfeed-core
//!
//! Протокол и типы для клиента потокового фида графиков/котировок.
//!
//! Этот крейт содержит:
//!
//! - [`wire`] - кодек фреймов `~m~<len>~m~<json>` и классификация фрагментов
//! - [`protocol`] - имена команд, таблица подтверждений, сборка аргументов
//! - [`events`] - разбор входящих событий в типизированные варианты
//! - [`types`] - доменные типы (таймфрейм, тип сессии, тик, пачка свечей)
//! - [`token`] - генерация токенов сессий
//! - [`symbols`] - чтение и нормализация списка символов
//! - [`error`] - типы ошибок
//!
//! ## Пример: команда на проводе
//!
//! ```rust
//! use tvfeed_core::protocol;
//!
//! let cmd = protocol::request_more_data("cs_abc", 5);
//! assert_eq!(cmd.required_ack(), Some("series_completed"));
//!
//! let frame = cmd.encode().unwrap();
//! assert_eq!(
//!     frame,
//!     r#"~m~50~m~{"m":"request_more_data","p":["cs_abc","sds_1",5]}"#
//! );
//! ```
//!
//! ## Пример: разбор входящего буфера
//!
//! ```rust
//! use tvfeed_core::wire::{decode, Fragment};
//!
//! let buf = "~m~4~m~~h~1~m~31~m~{\"m\":\"series_completed\",\"p\":[]}";
//! let kinds: Vec<_> = decode(buf).collect();
//! assert_eq!(kinds[0], Fragment::Heartbeat("~h~1"));
//! assert!(matches!(&kinds[1], Fragment::Event(obj) if obj["m"] == "series_completed"));
//! ```
//!
//! ## Дизайн
//!
//! `tvfeed-core` не тянет runtime/async: здесь только чистые типы,
//! сериализация и разбор. Соединение, диспетчеры и ожидание подтверждений
//! живут в `tvfeed-client`.

#![forbid(unsafe_code)]

/// Кодек фреймов
pub mod wire;

/// Команды и таблица подтверждений
pub mod protocol;

/// Входящие события
pub mod events;

/// Доменные типы
pub mod types;

/// Токены сессий
pub mod token;

/// Чтение/нормализация списка символов
pub mod symbols;

/// Ошибки `tvfeed-core`
pub mod error;

/// Общие константы
pub mod constants;

// --- Re-exports (публичный фасад API) ---

pub use crate::error::{CoreError, EventError, SymbolListError, WireError};
pub use crate::events::{FatalKind, ServerEvent, TimescaleUpdate, decode_event};
pub use crate::protocol::{Command, SeriesRange};
pub use crate::token::SessionTokens;
pub use crate::types::{Bar, HistoryBatch, PriceTick, SessionType, Timeframe};
