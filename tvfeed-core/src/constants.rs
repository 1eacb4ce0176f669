/// Разделитель фреймов: `~m~<len>~m~<payload>`
pub const SEPARATOR: &str = "~m~";

/// Маркер heartbeat-фрагмента (не JSON, отправляется обратно как есть)
pub const HEARTBEAT_MARKER: &str = "~h~";

/// Единственный исторический слот на сессию
pub const HISTORY_SLOT: &str = "sds_1";

/// Сколько свечей грузим при первом `create_series`
pub const INITIAL_HISTORY_CANDLES: u32 = 10;

/// Режим якоря для `create_series` со стартовым временем
pub const BAR_COUNT_ANCHOR: &str = "bar_count";

/// Длина случайного токена сессии
pub const TOKEN_LENGTH: usize = 12;

/// Алфавит токена
pub const TOKEN_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Адрес websocket по умолчанию
pub const DEFAULT_URL: &str = "wss://data.tradingview.com/socket.io/websocket";

/// Заголовок Origin по умолчанию
pub const DEFAULT_ORIGIN: &str = "https://www.tradingview.com";

/// Анонимный токен авторизации
pub const ANONYMOUS_AUTH_TOKEN: &str = "unauthorized_user_token";

/// Поля, которые просим в обновлениях котировок (`quote_set_fields`)
pub const QUOTE_FIELDS: &[&str] = &[
    "base-currency-logoid",
    "ch",
    "chp",
    "currency-logoid",
    "currency_code",
    "currency_id",
    "base_currency_id",
    "current_session",
    "description",
    "exchange",
    "format",
    "fractional",
    "is_tradable",
    "language",
    "local_description",
    "listed_exchange",
    "logoid",
    "lp",
    "lp_time",
    "minmov",
    "minmove2",
    "original_name",
    "pricescale",
    "pro_name",
    "short_name",
    "type",
    "typespecs",
    "update_mode",
    "volume",
    "variable_tick_size",
    "value_unit_id",
];
