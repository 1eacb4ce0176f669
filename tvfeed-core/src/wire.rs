use serde::Serialize;
use serde_json::{Map, Value};

use crate::constants::{HEARTBEAT_MARKER, SEPARATOR};
use crate::error::WireError;

/// Конверт команды на проводе: `{"m": name, "p": args}`
#[derive(Serialize)]
struct Envelope<'a, A: ?Sized> {
    m: &'a str,
    p: &'a A,
}

/// Один фрагмент входящего буфера после классификации
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment<'a> {
    /// keep-alive, нужно отправить обратно тем же фреймом
    Heartbeat(&'a str),
    /// JSON-объект события
    Event(Map<String, Value>),
    /// мусор на границе разбиения, игнорируем
    Unparseable,
}

/// Оборачивает payload: `~m~<байтовая длина>~m~<payload>`
pub fn frame(payload: &str) -> String {
    format!("{SEPARATOR}{}{SEPARATOR}{payload}", payload.len())
}

/// Кодирует команду в готовый к отправке фрейм
pub fn encode<A>(command: &str, args: &A) -> Result<String, WireError>
where
    A: Serialize + ?Sized,
{
    let json = serde_json::to_string(&Envelope { m: command, p: args }).map_err(|e| {
        WireError::Encode {
            command: command.to_string(),
            reason: e.to_string(),
        }
    })?;

    Ok(frame(&json))
}

/// Режет буфер по разделителю.
///
/// В одном websocket-сообщении может прийти несколько фреймов подряд;
/// префиксы длины и пустые куски отсеиваются на этапе [`classify`].
pub fn split_frames(buffer: &str) -> std::str::Split<'_, &'static str> {
    buffer.split(SEPARATOR)
}

/// Классифицирует фрагмент: событие, heartbeat или мусор
pub fn classify(fragment: &str) -> Fragment<'_> {
    match serde_json::from_str::<Value>(fragment) {
        Ok(Value::Object(obj)) => Fragment::Event(obj),
        // числа (префиксы длины) и прочий JSON не-объект сюда же
        _ if fragment.contains(HEARTBEAT_MARKER) => Fragment::Heartbeat(fragment),
        _ => Fragment::Unparseable,
    }
}

/// Разбирает буфер целиком (удобно в тестах и в скриптованном сервере)
pub fn decode(buffer: &str) -> impl Iterator<Item = Fragment<'_>> {
    split_frames(buffer)
        .map(classify)
        .filter(|f| !matches!(f, Fragment::Unparseable))
}
