use thiserror::Error;

/// Верхнеуровневый тип ошибок крейта
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Ошибки кодирования фреймов
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Входящее событие неожиданной формы
    #[error(transparent)]
    Event(#[from] EventError),

    /// Ошибки чтения списка символов
    #[error(transparent)]
    Symbols(#[from] SymbolListError),
}

/// Ошибки кодирования
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Аргументы команды не сериализуются в JSON
    #[error("failed to encode command {command:?}: {reason}")]
    Encode {
        /// имя команды
        command: String,
        /// сообщение сериализатора
        reason: String,
    },
}

/// Событие от сервера не той формы (MalformedEvent).
///
/// Никогда не фатально: фрагмент отбрасывается, цикл чтения продолжает работу.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// Нет обязательного поля
    #[error("event {event:?}: missing field {field}")]
    MissingField {
        /// имя события (`m`)
        event: String,
        /// путь до поля
        field: &'static str,
    },

    /// Поле есть, но другого типа
    #[error("event {event:?}: field {field} has unexpected type")]
    WrongType {
        /// имя события (`m`)
        event: String,
        /// путь до поля
        field: &'static str,
    },
}

/// Ошибки чтения списка символов
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolListError {
    /// Ошибка ввода-вывода (храним текст, чтобы тип оставался `Clone`)
    #[error("failed to read symbols: {0}")]
    Io(String),

    /// Символ содержит недопустимые знаки
    #[error("invalid symbol {symbol:?} at line {line}")]
    InvalidSymbol {
        /// номер строки (с единицы)
        line: usize,
        /// символ после нормализации
        symbol: String,
    },
}

impl From<std::io::Error> for SymbolListError {
    fn from(e: std::io::Error) -> Self {
        SymbolListError::Io(e.to_string())
    }
}
