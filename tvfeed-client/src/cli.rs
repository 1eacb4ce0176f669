use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Parser};
use tvfeed_client::SessionConfig;
use tvfeed_core::constants::{ANONYMOUS_AUTH_TOKEN, DEFAULT_ORIGIN, DEFAULT_URL, INITIAL_HISTORY_CANDLES};
use tvfeed_core::{SessionType, Timeframe};

/// tvfeed - история свечей и realtime-котировки из websocket-фида.
///
/// Подписывает символы на котировки и (по --history) запрашивает
/// историю, всё полученное пишет в лог. Остановка по Ctrl+C.
#[derive(Parser, Debug, Clone)]
#[command(name = "tvfeed", version, about)]
#[command(
    group(
        ArgGroup::new("symbols_source")
            .required(true)
            .args(["symbols_file", "symbols"])
    )
)]
pub(crate) struct Args {
    /// websocket endpoint
    #[arg(long, default_value = DEFAULT_URL)]
    pub(crate) url: String,

    /// Заголовок Origin при handshake
    #[arg(long, default_value = DEFAULT_ORIGIN)]
    pub(crate) origin: String,

    /// Токен авторизации; по умолчанию анонимный
    #[arg(long, default_value = ANONYMOUS_AUTH_TOKEN)]
    pub(crate) auth_token: String,

    /// Файл символов (по одному на строку, `#` - комментарий). Нельзя вместе с --symbols
    #[arg(long, conflicts_with = "symbols")]
    pub(crate) symbols_file: Option<PathBuf>,

    /// Символы строкой, например "NASDAQ:AAPL,BINANCE:BTCUSDT"
    #[arg(long, conflicts_with = "symbols_file")]
    pub(crate) symbols: Option<String>,

    /// Запросить историю с этим таймфреймом (1, 5, 60, 240, 1D, 1W, ...)
    #[arg(long)]
    pub(crate) history: Option<Timeframe>,

    /// Начало истории (RFC 3339), только вместе с --history
    #[arg(long)]
    pub(crate) from: Option<DateTime<Utc>>,

    /// Догрузить ещё N свечей после первой пачки
    #[arg(long)]
    pub(crate) more: Option<u32>,

    /// Свечей в первом запросе истории
    #[arg(long, default_value_t = INITIAL_HISTORY_CANDLES)]
    pub(crate) history_candles: u32,

    /// regular или extended
    #[arg(long, default_value = "regular")]
    pub(crate) session: SessionType,

    /// Часовой пояс графика, например "America/New_York"
    #[arg(long)]
    pub(crate) timezone: Option<String>,

    /// Не подписываться на realtime-котировки
    #[arg(long)]
    pub(crate) no_realtime: bool,

    /// Предел ожидания подтверждения, мс; 0 - ждать бесконечно
    #[arg(long, default_value_t = 30_000)]
    pub(crate) ack_timeout_ms: u64,
}

impl Args {
    /// Проверки, которые clap не выражает
    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            bail!("--url must start with ws:// or wss:// (got: {})", self.url);
        }

        if let Some(path) = &self.symbols_file {
            let md = std::fs::metadata(path)
                .with_context(|| format!("symbols file not found: {:?}", path))?;
            if !md.is_file() {
                bail!("--symbols-file must point to a file: {:?}", path);
            }
        }

        if self.history.is_none() && (self.from.is_some() || self.more.is_some()) {
            bail!("--from and --more require --history");
        }
        if let Some(from) = self.from {
            if from > Utc::now() {
                bail!("--from is in the future: {from}");
            }
        }
        if self.more == Some(0) {
            bail!("--more must be positive");
        }
        if self.history_candles == 0 {
            bail!("--history-candles must be positive");
        }
        if self.history.is_none() && self.no_realtime {
            bail!("nothing to do: --no-realtime without --history");
        }

        Ok(())
    }

    pub(crate) fn ack_timeout(&self) -> Option<Duration> {
        match self.ack_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub(crate) fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_url(self.url.clone())
            .with_origin(self.origin.clone())
            .with_auth_token(self.auth_token.clone())
            .with_ack_timeout(self.ack_timeout())
            .with_initial_history_candles(self.history_candles)
    }
}
