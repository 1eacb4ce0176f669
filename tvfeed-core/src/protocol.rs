use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::constants::{BAR_COUNT_ANCHOR, HISTORY_SLOT};
use crate::error::WireError;
use crate::types::{SessionType, Timeframe};
use crate::wire;

/// Имена исходящих команд
pub mod command {
    pub const SET_AUTH_TOKEN: &str = "set_auth_token";
    pub const CHART_CREATE_SESSION: &str = "chart_create_session";
    pub const QUOTE_CREATE_SESSION: &str = "quote_create_session";
    pub const QUOTE_SET_FIELDS: &str = "quote_set_fields";
    pub const QUOTE_ADD_SYMBOLS: &str = "quote_add_symbols";
    pub const QUOTE_REMOVE_SYMBOLS: &str = "quote_remove_symbols";
    pub const QUOTE_FAST_SYMBOLS: &str = "quote_fast_symbols";
    pub const RESOLVE_SYMBOL: &str = "resolve_symbol";
    pub const CREATE_SERIES: &str = "create_series";
    pub const MODIFY_SERIES: &str = "modify_series";
    pub const REQUEST_MORE_DATA: &str = "request_more_data";
    pub const SWITCH_TIMEZONE: &str = "switch_timezone";
}

/// Имена входящих событий
pub mod event {
    pub const QUOTE_DATA: &str = "qsd";
    pub const TIMESCALE_UPDATE: &str = "timescale_update";
    pub const SERIES_COMPLETED: &str = "series_completed";
    pub const SYMBOL_RESOLVED: &str = "symbol_resolved";
    pub const TICKMARK_UPDATE: &str = "tickmark_update";
    pub const CRITICAL_ERROR: &str = "critical_error";
    pub const PROTOCOL_ERROR: &str = "protocol_error";
}

/// Команда -> событие, которое её завершает.
///
/// Команды вне таблицы не ждут подтверждения.
pub const ACK_TABLE: &[(&str, &str)] = &[
    (command::CREATE_SERIES, event::SERIES_COMPLETED),
    (command::MODIFY_SERIES, event::SERIES_COMPLETED),
    (command::REQUEST_MORE_DATA, event::SERIES_COMPLETED),
    (command::RESOLVE_SYMBOL, event::SYMBOL_RESOLVED),
    (command::SWITCH_TIMEZONE, event::TICKMARK_UPDATE),
];

/// Какое событие ждать после отправки команды
pub fn required_ack(command: &str) -> Option<&'static str> {
    ACK_TABLE
        .iter()
        .find(|(name, _)| *name == command)
        .map(|(_, ack)| *ack)
}

/// Исходящая команда: имя + список аргументов
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub args: Vec<Value>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Событие-подтверждение из [`ACK_TABLE`], если нужно
    pub fn required_ack(&self) -> Option<&'static str> {
        required_ack(&self.name)
    }

    /// Готовый к отправке фрейм
    pub fn encode(&self) -> Result<String, WireError> {
        wire::encode(&self.name, &self.args)
    }

    /// Обратное преобразование из JSON-объекта `{"m", "p"}`
    pub fn from_object(obj: &Map<String, Value>) -> Option<Self> {
        let name = obj.get("m")?.as_str()?;
        let args = obj.get("p")?.as_array()?.clone();
        Some(Self::new(name, args))
    }
}

/// Объём истории для `create_series`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesRange {
    /// последние N свечей
    Count(u32),
    /// N свечей, заканчивая моментом `to` (unix-секунды)
    Anchored { to: i64, count: u32 },
}

impl SeriesRange {
    fn to_value(self) -> Value {
        match self {
            SeriesRange::Count(n) => json!(n),
            SeriesRange::Anchored { to, count } => json!([BAR_COUNT_ANCHOR, to, count]),
        }
    }
}

/// Подзапрос `resolve_symbol`, передаётся строкой с префиксом `=`
#[derive(Serialize)]
struct ResolveRequest<'a> {
    symbol: &'a str,
    adjustment: &'static str,
    session: &'static str,
}

fn strings<S: AsRef<str>>(head: &str, tail: &[S]) -> Vec<Value> {
    let mut out = Vec::with_capacity(tail.len() + 1);
    out.push(Value::from(head));
    for s in tail {
        let s: &str = s.as_ref();
        out.push(Value::from(s));
    }
    out
}

pub fn set_auth_token(token: &str) -> Command {
    Command::new(command::SET_AUTH_TOKEN, vec![json!(token)])
}

pub fn chart_create_session(chart_session: &str) -> Command {
    Command::new(command::CHART_CREATE_SESSION, vec![json!(chart_session), json!("")])
}

pub fn quote_create_session(quote_session: &str) -> Command {
    Command::new(command::QUOTE_CREATE_SESSION, vec![json!(quote_session)])
}

pub fn quote_set_fields<S: AsRef<str>>(quote_session: &str, fields: &[S]) -> Command {
    Command::new(command::QUOTE_SET_FIELDS, strings(quote_session, fields))
}

pub fn quote_add_symbols<S: AsRef<str>>(quote_session: &str, symbols: &[S]) -> Command {
    Command::new(command::QUOTE_ADD_SYMBOLS, strings(quote_session, symbols))
}

pub fn quote_remove_symbols<S: AsRef<str>>(quote_session: &str, symbols: &[S]) -> Command {
    Command::new(command::QUOTE_REMOVE_SYMBOLS, strings(quote_session, symbols))
}

/// Полный набор realtime-символов (сервер не умеет инкрементальный diff)
pub fn quote_fast_symbols<S: AsRef<str>>(quote_session: &str, symbols: &[S]) -> Command {
    Command::new(command::QUOTE_FAST_SYMBOLS, strings(quote_session, symbols))
}

pub fn resolve_symbol(
    chart_session: &str,
    symbol_id: &str,
    symbol: &str,
    session: SessionType,
) -> Result<Command, WireError> {
    let request = serde_json::to_string(&ResolveRequest {
        symbol,
        adjustment: "splits",
        session: session.as_str(),
    })
    .map_err(|e| WireError::Encode {
        command: command::RESOLVE_SYMBOL.to_string(),
        reason: e.to_string(),
    })?;

    Ok(Command::new(
        command::RESOLVE_SYMBOL,
        vec![json!(chart_session), json!(symbol_id), json!(format!("={request}"))],
    ))
}

pub fn create_series(
    chart_session: &str,
    series_id: &str,
    symbol_id: &str,
    timeframe: Timeframe,
    range: SeriesRange,
) -> Command {
    Command::new(
        command::CREATE_SERIES,
        vec![
            json!(chart_session),
            json!(HISTORY_SLOT),
            json!(series_id),
            json!(symbol_id),
            json!(timeframe.as_str()),
            range.to_value(),
            json!(""),
        ],
    )
}

pub fn modify_series(
    chart_session: &str,
    series_id: &str,
    symbol_id: &str,
    timeframe: Timeframe,
) -> Command {
    Command::new(
        command::MODIFY_SERIES,
        vec![
            json!(chart_session),
            json!(HISTORY_SLOT),
            json!(series_id),
            json!(symbol_id),
            json!(timeframe.as_str()),
            json!(""),
        ],
    )
}

pub fn request_more_data(chart_session: &str, candle_count: u32) -> Command {
    Command::new(
        command::REQUEST_MORE_DATA,
        vec![json!(chart_session), json!(HISTORY_SLOT), json!(candle_count)],
    )
}

pub fn switch_timezone(chart_session: &str, timezone: &str) -> Command {
    Command::new(
        command::SWITCH_TIMEZONE,
        vec![json!(chart_session), json!(timezone)],
    )
}
