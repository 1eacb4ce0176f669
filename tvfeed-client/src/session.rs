use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tvfeed_core::constants::QUOTE_FIELDS;
use tvfeed_core::protocol::{self, SeriesRange};
use tvfeed_core::{Command, SessionTokens, SessionType, Timeframe};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::gate::CorrelationGate;
use crate::reader::{FeedEvent, ReadDispatcher};
use crate::shutdown::Shutdown;
use crate::state::{SeriesRegistry, SessionState};
use crate::transport::{FrameSink, FrameSource, ws};
use crate::writer::{Outbound, WriteDispatcher};

/// Одна сессия поверх одного соединения.
///
/// Все методы принимают `&self`: сессию можно держать в `Arc` и звать из
/// нескольких задач. Команды уходят строго по одной, команда с
/// подтверждением блокирует следующую до его получения.
pub struct Session {
    config: SessionConfig,
    tokens: SessionTokens,
    state: Mutex<SessionState>,
    commands: mpsc::Sender<Outbound>,
    events: crossbeam_channel::Receiver<FeedEvent>,
    errors: crossbeam_channel::Receiver<SessionError>,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Подключается по websocket и проходит авторизацию
    pub async fn open(config: SessionConfig) -> Result<Self> {
        let (sink, source) = ws::connect(&config).await?;
        Self::with_transport(config, sink, source).await
    }

    /// То же поверх произвольного транспорта
    pub async fn with_transport<W, R>(config: SessionConfig, sink: W, source: R) -> Result<Self>
    where
        W: FrameSink + 'static,
        R: FrameSource + 'static,
    {
        let session = Self::start(config, SessionTokens::generate(), Box::new(sink), Box::new(source));
        session.authenticate().await?;
        Ok(session)
    }

    fn start(
        config: SessionConfig,
        tokens: SessionTokens,
        sink: Box<dyn FrameSink>,
        source: Box<dyn FrameSource>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_queue.max(1));
        let (echo_tx, echo_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = crossbeam_channel::unbounded();
        let (err_tx, err_rx) = crossbeam_channel::unbounded();

        let gate = Arc::new(CorrelationGate::new());
        let series = SeriesRegistry::default();
        let shutdown = Shutdown::new();

        let writer = WriteDispatcher {
            sink,
            commands: cmd_rx,
            echoes: echo_rx,
            gate: Arc::clone(&gate),
            errors: err_tx.clone(),
            ack_timeout: config.ack_timeout,
            shutdown: shutdown.clone(),
        };
        let reader = ReadDispatcher {
            source,
            echoes: echo_tx,
            gate,
            series: series.clone(),
            events: ev_tx,
            errors: err_tx,
            shutdown: shutdown.clone(),
        };

        let tasks = vec![tokio::spawn(writer.run()), tokio::spawn(reader.run())];

        Self {
            state: Mutex::new(SessionState::new(tokens.clone(), series)),
            tokens,
            config,
            commands: cmd_tx,
            events: ev_rx,
            errors: err_rx,
            shutdown,
            tasks,
        }
    }

    async fn authenticate(&self) -> Result<()> {
        let t = &self.tokens;
        let sequence = [
            protocol::set_auth_token(&self.config.auth_token),
            protocol::chart_create_session(&t.chart),
            protocol::quote_create_session(&t.quote),
            protocol::quote_create_session(&t.fast_symbols),
            protocol::quote_set_fields(&t.fast_symbols, QUOTE_FIELDS),
        ];

        for command in sequence {
            if let Err(e) = self.submit(command).await {
                warn!("authentication aborted: {e}");
                self.shutdown.trigger();
                return Err(e);
            }
        }

        info!("session ready: chart={} quote={}", t.chart, t.quote);
        Ok(())
    }

    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Поток тиков и пачек истории
    pub fn events(&self) -> crossbeam_channel::Receiver<FeedEvent> {
        self.events.clone()
    }

    /// Асинхронные ошибки: обрыв соединения, фатальные ошибки сервера
    pub fn errors(&self) -> crossbeam_channel::Receiver<SessionError> {
        self.errors.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// После остановки любой вызов отвечает `TransportClosed`,
    /// даже если мог бы обойтись локальным состоянием
    fn ensure_open(&self) -> Result<()> {
        if self.shutdown.is_triggered() {
            return Err(SessionError::TransportClosed);
        }
        Ok(())
    }

    /// Ставит команду в очередь писателя и ждёт результат отправки
    /// (и подтверждения, если оно нужно)
    pub async fn submit(&self, command: Command) -> Result<()> {
        self.submit_with_slack(command, Duration::ZERO).await
    }

    /// `submit` с запасом сверх `ack_timeout` для долгих ответов
    async fn submit_with_slack(&self, command: Command, slack: Duration) -> Result<()> {
        self.ensure_open()?;

        let (reply, result) = oneshot::channel();
        self.commands
            .send(Outbound {
                command,
                reply,
                slack,
            })
            .await
            .map_err(|_| SessionError::TransportClosed)?;

        result.await.map_err(|_| SessionError::TransportClosed)?
    }

    /// Резолвит символ, если он ещё не резолвился в этой сессии
    pub async fn resolve_symbol(&self, symbol: &str, session: SessionType) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state.lock().await;
        self.resolve_locked(&mut state, symbol, session).await?;
        Ok(())
    }

    async fn resolve_locked(
        &self,
        state: &mut SessionState,
        symbol: &str,
        session: SessionType,
    ) -> Result<String> {
        if let Some(id) = state.symbol_id(symbol) {
            return Ok(id.to_string());
        }

        let symbol_id = state.next_symbol_id();
        let command = protocol::resolve_symbol(&state.tokens.chart, &symbol_id, symbol, session)?;
        self.submit(command).await?;

        debug!("{symbol} resolved as {symbol_id}");
        state.record_symbol(symbol, symbol_id.clone());
        Ok(symbol_id)
    }

    /// Запрашивает историю по символу.
    ///
    /// Первый вызов создаёт серию (`create_series`), последующие
    /// переключают её (`modify_series`) на новый `sN`. `start_from`
    /// учитывается только при создании.
    pub async fn get_history(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_from: Option<DateTime<Utc>>,
        session: SessionType,
    ) -> Result<()> {
        self.ensure_open()?;
        if let Some(from) = start_from {
            if from > Utc::now() {
                return Err(SessionError::Validation(format!(
                    "start_from {from} is in the future"
                )));
            }
        }

        let mut state = self.state.lock().await;
        let symbol_id = self.resolve_locked(&mut state, symbol, session).await?;
        let step = state.next_series(symbol);
        let chart = state.tokens.chart.clone();

        if !step.create {
            if start_from.is_some() {
                warn!("start_from ignored: series already exists, sending modify_series");
            }
            let command = protocol::modify_series(&chart, &step.series_id, &symbol_id, timeframe);
            return self.submit(command).await;
        }

        let count = self.config.initial_history_candles;
        let range = match start_from {
            Some(from) => SeriesRange::Anchored {
                to: from.timestamp(),
                count,
            },
            None => SeriesRange::Count(count),
        };

        let command = protocol::create_series(&chart, &step.series_id, &symbol_id, timeframe, range);
        let result = self.submit(command).await;
        // по таймауту команда уже на сервере, слот считаем созданным
        if matches!(result, Ok(()) | Err(SessionError::CorrelationTimeout { .. })) {
            state.mark_series_created();
        }
        result
    }

    /// Догружает ещё `candle_count` свечей в текущую серию.
    ///
    /// Ожидание `series_completed` растёт на 1 мс за свечу.
    pub async fn request_more_data(&self, candle_count: u32) -> Result<()> {
        self.ensure_open()?;
        if candle_count == 0 {
            return Err(SessionError::Validation("candle_count must be positive".into()));
        }

        let state = self.state.lock().await;
        if !state.has_series() {
            return Err(SessionError::Validation(
                "request_more_data needs a prior get_history".into(),
            ));
        }

        let command = protocol::request_more_data(&state.tokens.chart, candle_count);
        self.submit_with_slack(command, per_candle_slack(candle_count))
            .await
    }

    /// Подписывает символы на realtime-котировки
    pub async fn add_realtime_symbols<S: AsRef<str>>(&self, symbols: &[S]) -> Result<()> {
        self.ensure_open()?;
        if symbols.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        let fast = state.tokens.fast_symbols.clone();
        self.submit(protocol::quote_add_symbols(&fast, symbols)).await?;

        state.add_realtime(symbols);
        let all = state.realtime();
        self.submit(protocol::quote_fast_symbols(&state.tokens.quote, &all))
            .await
    }

    /// Снимает realtime-подписку и забывает резолв символов
    pub async fn remove_realtime_symbols<S: AsRef<str>>(&self, symbols: &[S]) -> Result<()> {
        self.ensure_open()?;
        if symbols.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        let fast = state.tokens.fast_symbols.clone();
        self.submit(protocol::quote_remove_symbols(&fast, symbols)).await?;

        state.remove_realtime(symbols);
        for s in symbols {
            state.forget_symbol(s.as_ref());
        }
        let all = state.realtime();
        self.submit(protocol::quote_fast_symbols(&state.tokens.quote, &all))
            .await
    }

    pub async fn switch_timezone(&self, timezone: &str) -> Result<()> {
        self.ensure_open()?;
        if timezone.trim().is_empty() {
            return Err(SessionError::Validation("timezone must not be empty".into()));
        }

        self.submit(protocol::switch_timezone(&self.tokens.chart, timezone))
            .await
    }

    /// Останавливает диспетчеры и закрывает соединение
    pub async fn close(mut self) {
        self.shutdown.trigger();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!("session task failed: {e}");
            }
        }
        info!("session closed");
    }
}

fn per_candle_slack(candle_count: u32) -> Duration {
    Duration::from_millis(u64::from(candle_count))
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
