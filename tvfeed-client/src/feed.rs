use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use log::{debug, error, info};
use tvfeed_client::{FeedEvent, SessionError};

const TICK_RATE_MS: u64 = 200;

/// Печатает тики и пачки свечей, пока не выставлен `shutdown`
/// или не пришла фатальная ошибка сессии.
pub(crate) fn run_feed_printer(
    events: Receiver<FeedEvent>,
    errors: Receiver<SessionError>,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let tick = Duration::from_millis(TICK_RATE_MS);

    let result: anyhow::Result<()> = loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("shutting down...");
            break Ok(());
        }

        match errors.try_recv() {
            Ok(e) if e.is_fatal() => break Err(e.into()),
            Ok(e) => {
                error!("{e}");
                continue;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break Err(SessionError::TransportClosed.into()),
        }

        match events.recv_timeout(tick) {
            Ok(ev) => handle_event(ev),
            Err(RecvTimeoutError::Timeout) => {
                // просто "тик" цикла, ничего не делаем
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break Err(SessionError::TransportClosed.into()),
        }
    };

    // всё, что успело прийти до остановки
    while let Ok(ev) = events.try_recv() {
        handle_event(ev);
    }

    shutdown.store(true, Ordering::Relaxed);
    result
}

fn handle_event(ev: FeedEvent) {
    match ev {
        FeedEvent::Tick(tick) => info!("{tick}"),
        FeedEvent::History(batch) => {
            info!("{batch}");
            for bar in batch.bars() {
                debug!(
                    "  {} o={} h={} l={} c={} v={}",
                    bar.timestamp,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume.map_or_else(|| "-".to_string(), |v| v.to_string())
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvfeed_core::{FatalKind, PriceTick};

    #[test]
    fn stops_on_flag() {
        let (_ev_tx, ev_rx) = crossbeam_channel::unbounded();
        let (_err_tx, err_rx) = crossbeam_channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(true));

        assert!(run_feed_printer(ev_rx, err_rx, shutdown).is_ok());
    }

    #[test]
    fn fatal_error_ends_loop() {
        let (ev_tx, ev_rx) = crossbeam_channel::unbounded();
        let (err_tx, err_rx) = crossbeam_channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        ev_tx
            .send(FeedEvent::Tick(PriceTick {
                symbol: "EXCH:ABC".into(),
                volume: None,
                price: Some(1.0),
                change: None,
                change_percent: None,
                timestamp: None,
            }))
            .unwrap();
        err_tx
            .send(SessionError::Validation("not fatal".into()))
            .unwrap();
        err_tx
            .send(SessionError::ProtocolFatal {
                kind: FatalKind::Critical,
                payload: "{}".into(),
            })
            .unwrap();

        let err = run_feed_printer(ev_rx, err_rx, shutdown.clone()).unwrap_err();
        assert!(err.to_string().contains("critical error"));
        assert!(shutdown.load(Ordering::Relaxed));
    }
}
