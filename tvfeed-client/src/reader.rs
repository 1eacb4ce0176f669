use std::sync::Arc;

use log::{debug, error, info, trace, warn};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tvfeed_core::wire::{self, Fragment};
use tvfeed_core::{HistoryBatch, PriceTick, ServerEvent, TimescaleUpdate, decode_event};

use crate::error::{SessionError, TransportError};
use crate::gate::CorrelationGate;
use crate::shutdown::Shutdown;
use crate::state::SeriesRegistry;
use crate::transport::FrameSource;

/// Данные для вызывающего
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// realtime-котировка
    Tick(PriceTick),
    /// пачка исторических свечей
    History(HistoryBatch),
}

/// Единственный читатель соединения
pub(crate) struct ReadDispatcher {
    pub(crate) source: Box<dyn FrameSource>,
    pub(crate) echoes: mpsc::UnboundedSender<String>,
    pub(crate) gate: Arc<CorrelationGate>,
    pub(crate) series: SeriesRegistry,
    pub(crate) events: crossbeam_channel::Sender<FeedEvent>,
    pub(crate) errors: crossbeam_channel::Sender<SessionError>,
    pub(crate) shutdown: Shutdown,
}

impl ReadDispatcher {
    pub(crate) async fn run(mut self) {
        let failure = loop {
            let msg = tokio::select! {
                biased;
                _ = self.shutdown.wait() => break None,
                msg = self.source.recv() => msg,
            };

            match msg {
                Some(Ok(text)) => {
                    if let Err(e) = self.handle_message(&text) {
                        break Some(e);
                    }
                }
                Some(Err(e)) => break Some(SessionError::Transport(e)),
                None => break Some(SessionError::Transport(TransportError::Closed)),
            }
        };

        match failure {
            Some(err) => {
                error!("session terminated: {err}");
                self.gate.fail(err.clone());
                self.shutdown.trigger();
                let _ = self.errors.send(err);
            }
            None => {
                self.gate.fail(SessionError::TransportClosed);
            }
        }
        info!("reader stopped");
    }

    /// Одно websocket-сообщение: фреймы разбираются по порядку
    fn handle_message(&self, text: &str) -> Result<(), SessionError> {
        for fragment in wire::split_frames(text) {
            match wire::classify(fragment) {
                Fragment::Heartbeat(beat) => {
                    trace!("heartbeat {beat}");
                    let _ = self.echoes.send(wire::frame(beat));
                }
                Fragment::Event(obj) => self.dispatch(&obj)?,
                Fragment::Unparseable => {}
            }
        }
        Ok(())
    }

    fn dispatch(&self, obj: &Map<String, Value>) -> Result<(), SessionError> {
        // подтверждение важнее любой другой обработки
        if let Some(name) = obj.get("m").and_then(Value::as_str) {
            if self.gate.release(name) {
                debug!("<- {name} (ack)");
                return Ok(());
            }
        }

        let event = match decode_event(obj) {
            Ok(ev) => ev,
            Err(e) => {
                warn!("dropping malformed event: {e}");
                return Ok(());
            }
        };

        match event {
            ServerEvent::Quote(tick) => self.emit(FeedEvent::Tick(tick)),
            ServerEvent::Timescale(update) => self.history(update),
            ServerEvent::Fatal { kind, payload } => {
                return Err(SessionError::ProtocolFatal { kind, payload });
            }
            ServerEvent::Named(name) => trace!("<- {name} (ignored)"),
            ServerEvent::Untagged => trace!("<- untagged {}", Value::Object(obj.clone())),
        }
        Ok(())
    }

    fn history(&self, update: TimescaleUpdate) {
        let Some(symbol) = self.series.symbol_for(&update.series_id) else {
            warn!("timescale_update for unknown series {}", update.series_id);
            return;
        };

        let mut batch = HistoryBatch {
            symbol,
            series_id: update.series_id,
            ..HistoryBatch::default()
        };
        for bar in update.bars {
            batch.push(bar);
        }
        self.emit(FeedEvent::History(batch));
    }

    fn emit(&self, event: FeedEvent) {
        // сессия держит свой получатель, так что ошибка тут только после её удаления
        let _ = self.events.send(event);
    }
}
