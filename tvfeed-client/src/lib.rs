//! # tvfeed-client
//!
//! Сессия поверх websocket: авторизация, резолв символов, история
//! свечей и realtime-котировки.
//!
//! Внутри два диспетчера на tokio-задачах:
//!
//! - писатель - единственный, кто пишет в соединение; команды идут по одной,
//!   команда с подтверждением держит очередь до прихода события
//! - читатель - единственный, кто читает; отвечает на heartbeat, отпускает
//!   ожидание подтверждения и раздаёт тики и пачки свечей
//!
//! Данные и асинхронные ошибки приходят в `crossbeam`-каналы, их удобно
//! читать из обычного потока.
//!
//! ```no_run
//! use tvfeed_client::{FeedEvent, Session, SessionConfig};
//! use tvfeed_core::{SessionType, Timeframe};
//!
//! # async fn run() -> tvfeed_client::Result<()> {
//! let session = Session::open(SessionConfig::default()).await?;
//! session
//!     .get_history("NASDAQ:AAPL", Timeframe::FourHours, None, SessionType::Regular)
//!     .await?;
//!
//! if let Ok(FeedEvent::History(batch)) = session.events().try_recv() {
//!     println!("{batch}");
//! }
//! session.close().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod session;
pub mod transport;

mod gate;
mod reader;
mod shutdown;
mod state;
mod writer;

pub use crate::config::SessionConfig;
pub use crate::error::{Result, SessionError, TransportError};
pub use crate::reader::FeedEvent;
pub use crate::session::Session;
