use std::fmt;

use serde_json::{Map, Value};

use crate::constants::HISTORY_SLOT;
use crate::error::EventError;
use crate::protocol::event;
use crate::types::{Bar, PriceTick};

/// Какая из фатальных ошибок пришла от сервера
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalKind {
    Critical,
    Protocol,
}

impl fmt::Display for FatalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalKind::Critical => f.write_str("critical error"),
            FatalKind::Protocol => f.write_str("protocol error"),
        }
    }
}

/// Пачка свечей до сопоставления серии с символом
#[derive(Debug, Clone, PartialEq)]
pub struct TimescaleUpdate {
    pub series_id: String,
    pub bars: Vec<Bar>,
}

/// Разобранное событие сервера
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// `qsd`
    Quote(PriceTick),
    /// `timescale_update`
    Timescale(TimescaleUpdate),
    /// `critical_error` / `protocol_error`
    Fatal { kind: FatalKind, payload: String },
    /// любое другое именованное событие (в т.ч. подтверждения)
    Named(String),
    /// JSON без `m`, например приветствие с `session_id`
    Untagged,
}

/// Разбирает JSON-объект события.
///
/// Отсутствующие необязательные поля и поля не того типа считаются
/// отсутствующими; ошибка только если нет того, без чего событие бессмысленно.
pub fn decode_event(obj: &Map<String, Value>) -> Result<ServerEvent, EventError> {
    let Some(name) = obj.get("m").and_then(Value::as_str) else {
        return Ok(ServerEvent::Untagged);
    };

    match name {
        event::QUOTE_DATA => decode_quote(name, obj).map(ServerEvent::Quote),
        event::TIMESCALE_UPDATE => decode_timescale(name, obj).map(ServerEvent::Timescale),
        event::CRITICAL_ERROR => Ok(fatal(FatalKind::Critical, obj)),
        event::PROTOCOL_ERROR => Ok(fatal(FatalKind::Protocol, obj)),
        other => Ok(ServerEvent::Named(other.to_string())),
    }
}

fn fatal(kind: FatalKind, obj: &Map<String, Value>) -> ServerEvent {
    ServerEvent::Fatal {
        kind,
        payload: Value::Object(obj.clone()).to_string(),
    }
}

/// `p[1]` как объект: у `qsd` и `timescale_update` полезная нагрузка там
fn body<'a>(name: &str, obj: &'a Map<String, Value>) -> Result<&'a Map<String, Value>, EventError> {
    let params = obj
        .get("p")
        .ok_or_else(|| missing(name, "p"))?
        .as_array()
        .ok_or_else(|| wrong(name, "p"))?;

    params
        .get(1)
        .ok_or_else(|| missing(name, "p[1]"))?
        .as_object()
        .ok_or_else(|| wrong(name, "p[1]"))
}

fn decode_quote(name: &str, obj: &Map<String, Value>) -> Result<PriceTick, EventError> {
    let info = body(name, obj)?;

    let symbol = info
        .get("n")
        .ok_or_else(|| missing(name, "p[1].n"))?
        .as_str()
        .ok_or_else(|| wrong(name, "p[1].n"))?
        .to_string();

    let values = info.get("v").and_then(Value::as_object);
    let num = |key: &str| values.and_then(|v| v.get(key)).and_then(Value::as_f64);

    Ok(PriceTick {
        symbol,
        volume: num("volume"),
        price: num("lp"),
        change: num("ch"),
        change_percent: num("chp"),
        timestamp: values.and_then(|v| v.get("lp_time")).and_then(lenient_i64),
    })
}

fn decode_timescale(name: &str, obj: &Map<String, Value>) -> Result<TimescaleUpdate, EventError> {
    let info = body(name, obj)?;

    let slot = info
        .get(HISTORY_SLOT)
        .ok_or_else(|| missing(name, "p[1].sds_1"))?
        .as_object()
        .ok_or_else(|| wrong(name, "p[1].sds_1"))?;

    let records = slot
        .get("s")
        .ok_or_else(|| missing(name, "p[1].sds_1.s"))?
        .as_array()
        .ok_or_else(|| wrong(name, "p[1].sds_1.s"))?;

    let series_id = slot
        .get("t")
        .ok_or_else(|| missing(name, "p[1].sds_1.t"))?
        .as_str()
        .ok_or_else(|| wrong(name, "p[1].sds_1.t"))?
        .to_string();

    let bars = records.iter().filter_map(decode_bar).collect();

    Ok(TimescaleUpdate { series_id, bars })
}

/// `{"i": n, "v": [time, open, high, low, close, volume?]}`
///
/// Запись короче пяти чисел пропускается целиком, чтобы массивы пачки
/// не разъехались по индексам.
fn decode_bar(record: &Value) -> Option<Bar> {
    let v = record.get("v")?.as_array()?;

    Some(Bar {
        timestamp: lenient_i64(v.first()?)?,
        open: v.get(1)?.as_f64()?,
        high: v.get(2)?.as_f64()?,
        low: v.get(3)?.as_f64()?,
        close: v.get(4)?.as_f64()?,
        volume: v.get(5).and_then(Value::as_f64),
    })
}

// время приходит то целым, то дробным
fn lenient_i64(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
}

fn missing(event: &str, field: &'static str) -> EventError {
    EventError::MissingField {
        event: event.to_string(),
        field,
    }
}

fn wrong(event: &str, field: &'static str) -> EventError {
    EventError::WrongType {
        event: event.to_string(),
        field,
    }
}
