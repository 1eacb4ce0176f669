use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tvfeed_core::Command;

use crate::error::{Result, SessionError};
use crate::gate::{AckReceiver, CorrelationGate};
use crate::shutdown::Shutdown;
use crate::transport::FrameSink;

/// Команда в очереди писателя вместе с каналом для результата
pub(crate) struct Outbound {
    pub(crate) command: Command,
    pub(crate) reply: oneshot::Sender<Result<()>>,
    /// Добавка к `ack_timeout` для этой команды
    pub(crate) slack: Duration,
}

/// Отправленная команда, ждущая подтверждения
struct Pending {
    awaiting: &'static str,
    ack: AckReceiver,
    reply: oneshot::Sender<Result<()>>,
    deadline: Option<Instant>,
    after: Duration,
}

enum Step {
    Stop,
    Echo(String),
    Command(Outbound),
    Acked(Result<()>),
    Deadline,
}

/// Единственный писатель соединения.
///
/// Команды берёт из очереди по одной; пока команда ждёт подтверждения,
/// очередь не читается, но heartbeat-эхо от читателя уходит сразу.
pub(crate) struct WriteDispatcher {
    pub(crate) sink: Box<dyn FrameSink>,
    pub(crate) commands: mpsc::Receiver<Outbound>,
    pub(crate) echoes: mpsc::UnboundedReceiver<String>,
    pub(crate) gate: Arc<CorrelationGate>,
    pub(crate) errors: crossbeam_channel::Sender<SessionError>,
    pub(crate) ack_timeout: Option<Duration>,
    pub(crate) shutdown: Shutdown,
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl WriteDispatcher {
    pub(crate) async fn run(mut self) {
        let mut pending: Option<Pending> = None;

        loop {
            let step = match pending.as_mut() {
                Some(p) => tokio::select! {
                    biased;
                    _ = self.shutdown.wait() => Step::Stop,
                    echo = self.echoes.recv() => echo.map_or(Step::Stop, Step::Echo),
                    res = &mut p.ack => Step::Acked(res.unwrap_or(Err(SessionError::TransportClosed))),
                    _ = until(p.deadline) => Step::Deadline,
                },
                None => tokio::select! {
                    biased;
                    _ = self.shutdown.wait() => Step::Stop,
                    echo = self.echoes.recv() => echo.map_or(Step::Stop, Step::Echo),
                    cmd = self.commands.recv() => cmd.map_or(Step::Stop, Step::Command),
                },
            };

            match step {
                Step::Stop => break,
                Step::Echo(frame) => {
                    debug!("heartbeat echo");
                    if let Err(e) = self.sink.send(frame).await {
                        self.notify(SessionError::Transport(e.clone()));
                        if e.is_terminal() {
                            self.shutdown.trigger();
                            break;
                        }
                    }
                }
                Step::Command(out) => {
                    pending = self.transmit(out).await;
                    if self.shutdown.is_triggered() {
                        break;
                    }
                }
                Step::Acked(res) => {
                    if let Some(p) = pending.take() {
                        debug!("{} received", p.awaiting);
                        let _ = p.reply.send(res);
                    }
                }
                Step::Deadline => {
                    if let Some(p) = pending.take() {
                        self.expire(p);
                    }
                }
            }
        }

        if let Some(mut p) = pending.take() {
            self.gate.cancel();
            // читатель мог успеть завершить ожидание своей ошибкой
            let res = p.ack.try_recv().unwrap_or(Err(SessionError::TransportClosed));
            let _ = p.reply.send(res);
        }
        self.drain_queue();

        if let Err(e) = self.sink.close().await {
            debug!("close: {e}");
        }
        info!("writer stopped");
    }

    /// Отправляет команду; `Some`, если теперь ждём подтверждение
    async fn transmit(&mut self, out: Outbound) -> Option<Pending> {
        let Outbound {
            command,
            reply,
            slack,
        } = out;

        let frame = match command.encode() {
            Ok(f) => f,
            Err(e) => {
                warn!("{e}");
                let _ = reply.send(Err(e.into()));
                return None;
            }
        };

        // взводим до отправки: ответ может прийти раньше, чем send вернётся
        let ack = match command.required_ack() {
            Some(name) => match self.gate.arm(name) {
                Ok(rx) => Some((name, rx)),
                Err(e) => {
                    let _ = reply.send(Err(e));
                    return None;
                }
            },
            None => None,
        };

        debug!("-> {}", command.name);
        if let Err(e) = self.sink.send(frame).await {
            if ack.is_some() {
                self.gate.cancel();
            }
            error!("send {} failed: {e}", command.name);
            let err = SessionError::Transport(e.clone());
            if e.is_terminal() {
                self.shutdown.trigger();
            }
            self.notify(err.clone());
            let _ = reply.send(Err(err));
            return None;
        }

        match ack {
            Some((awaiting, ack)) => {
                let limit = self.ack_timeout.map(|t| t + slack);
                Some(Pending {
                    awaiting,
                    ack,
                    reply,
                    deadline: limit.map(|t| Instant::now() + t),
                    after: limit.unwrap_or_default(),
                })
            }
            None => {
                let _ = reply.send(Ok(()));
                None
            }
        }
    }

    fn expire(&self, mut p: Pending) {
        if self.gate.cancel().is_none() {
            // подтверждение успело прийти одновременно с таймаутом
            let res = p.ack.try_recv().unwrap_or(Err(SessionError::TransportClosed));
            let _ = p.reply.send(res);
            return;
        }

        warn!("no {} within {:?}", p.awaiting, p.after);
        let _ = p.reply.send(Err(SessionError::CorrelationTimeout {
            awaiting: p.awaiting.to_string(),
            after: p.after,
        }));
    }

    fn drain_queue(&mut self) {
        self.commands.close();
        while let Ok(out) = self.commands.try_recv() {
            let _ = out.reply.send(Err(SessionError::TransportClosed));
        }
    }

    fn notify(&self, err: SessionError) {
        // получатель живёт в сессии; после её удаления слать некому
        let _ = self.errors.send(err);
    }
}
