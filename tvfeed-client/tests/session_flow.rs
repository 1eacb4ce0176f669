//! Сценарии сессии поверх in-memory транспорта со скриптованным сервером.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use crossbeam_channel::Receiver;
use serde_json::{Value, json};
use tvfeed_client::transport::memory::{self, VendorEnd};
use tvfeed_client::{FeedEvent, Session, SessionConfig, SessionError, TransportError};
use tvfeed_core::{Command, FatalKind, SessionType, Timeframe};

const AUTH_SEQUENCE: [&str; 5] = [
    "set_auth_token",
    "chart_create_session",
    "quote_create_session",
    "quote_create_session",
    "quote_set_fields",
];

fn config() -> SessionConfig {
    SessionConfig::default().with_ack_timeout(Some(Duration::from_secs(5)))
}

async fn open_with(config: SessionConfig) -> (Session, VendorEnd) {
    let _ = env_logger::try_init();

    let (sink, source, mut vendor) = memory::pair();
    let session = Session::with_transport(config, sink, source).await.unwrap();

    for name in AUTH_SEQUENCE {
        assert_eq!(vendor.next_command().await.unwrap().name, name);
    }
    (session, vendor)
}

async fn open() -> (Session, VendorEnd) {
    open_with(config()).await
}

async fn expect(vendor: &mut VendorEnd, name: &str) -> Command {
    let cmd = vendor.next_command().await.expect("connection closed");
    assert_eq!(cmd.name, name, "unexpected command {cmd:?}");
    cmd
}

async fn next_event(events: &Receiver<FeedEvent>) -> FeedEvent {
    for _ in 0..400 {
        if let Ok(ev) = events.try_recv() {
            return ev;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no feed event");
}

async fn next_error(errors: &Receiver<SessionError>) -> SessionError {
    for _ in 0..400 {
        if let Ok(e) = errors.try_recv() {
            return e;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no session error");
}

fn timescale(series_id: &str) -> Value {
    json!(["cs_x", {"sds_1": {
        "s": [
            {"i": 0, "v": [1700000000.0, 10.0, 12.0, 9.5, 11.0]},
            {"i": 1, "v": [1700014400.0, 11.0, 13.0, 10.5, 12.5, 1500.0]},
            {"i": 2, "v": [1700028800.0, 12.5, 12.9, 11.0, 11.2]},
            {"i": 3, "v": [1700043200.0, 11.2, 11.8, 10.9, 11.7, 900.0]}
        ],
        "t": series_id,
        "ns": {"d": "", "indexes": []}
    }}])
}

#[tokio::test]
async fn auth_sequence_is_sent_in_order() {
    let (sink, source, mut vendor) = memory::pair();
    let session = Session::with_transport(config(), sink, source).await.unwrap();
    let t = session.tokens().clone();

    let cmd = expect(&mut vendor, "set_auth_token").await;
    assert_eq!(cmd.args, vec![json!("unauthorized_user_token")]);

    let cmd = expect(&mut vendor, "chart_create_session").await;
    assert_eq!(cmd.args, vec![json!(t.chart), json!("")]);

    let cmd = expect(&mut vendor, "quote_create_session").await;
    assert_eq!(cmd.args, vec![json!(t.quote)]);

    let cmd = expect(&mut vendor, "quote_create_session").await;
    assert_eq!(cmd.args, vec![json!(t.fast_symbols)]);

    let cmd = expect(&mut vendor, "quote_set_fields").await;
    assert_eq!(cmd.args[0], json!(t.fast_symbols));
    assert_eq!(cmd.args.len(), 32);
    assert!(cmd.args.contains(&json!("lp")));
    assert!(cmd.args.contains(&json!("volume")));

    assert!(t.chart.starts_with("cs_"));
    assert!(t.fast_symbols.starts_with("qs_snapshoter_basic-symbol-quotes_"));
    assert!(!session.is_closed());
}

#[tokio::test]
async fn history_end_to_end() {
    let (session, mut vendor) = open().await;
    let chart = session.tokens().chart.clone();
    let events = session.events();

    let (res, ()) = tokio::join!(
        session.get_history("EXCH:ABC", Timeframe::FourHours, None, SessionType::Regular),
        async {
            let cmd = expect(&mut vendor, "resolve_symbol").await;
            assert_eq!(
                cmd.args,
                vec![
                    json!(chart),
                    json!("symbol_1"),
                    json!(r#"={"symbol":"EXCH:ABC","adjustment":"splits","session":"regular"}"#),
                ]
            );
            vendor.push_event("symbol_resolved", json!([chart, "symbol_1", {}]));

            let cmd = expect(&mut vendor, "create_series").await;
            assert_eq!(
                cmd.args,
                vec![
                    json!(chart),
                    json!("sds_1"),
                    json!("s1"),
                    json!("symbol_1"),
                    json!("240"),
                    json!(10),
                    json!(""),
                ]
            );
            vendor.push_event("timescale_update", timescale("s1"));
            vendor.push_event("series_completed", json!([chart, "sds_1", "streaming"]));
        }
    );
    res.unwrap();

    let FeedEvent::History(batch) = next_event(&events).await else {
        panic!("expected history batch");
    };
    assert_eq!(batch.symbol, "EXCH:ABC");
    assert_eq!(batch.series_id, "s1");
    assert_eq!(batch.len(), 4);
    assert_eq!(batch.volume, vec![None, Some(1500.0), None, Some(900.0)]);
    assert_eq!(batch.close, vec![11.0, 12.5, 11.2, 11.7]);

    let (res, ()) = tokio::join!(session.request_more_data(5), async {
        let cmd = expect(&mut vendor, "request_more_data").await;
        assert_eq!(cmd.args, vec![json!(chart), json!("sds_1"), json!(5)]);
        vendor.push_event("series_completed", json!([chart, "sds_1"]));
    });
    res.unwrap();
}

#[tokio::test]
async fn resolve_is_idempotent() {
    let (session, mut vendor) = open().await;

    let (res, ()) = tokio::join!(
        session.resolve_symbol("EXCH:ABC", SessionType::Regular),
        async {
            expect(&mut vendor, "resolve_symbol").await;
            vendor.push_event("symbol_resolved", json!(["cs", "symbol_1", {}]));
        }
    );
    res.unwrap();

    session
        .resolve_symbol("EXCH:ABC", SessionType::Regular)
        .await
        .unwrap();
    assert_eq!(vendor.try_next_frame(), None);
}

#[tokio::test]
async fn series_are_created_once_then_modified() {
    let (session, mut vendor) = open().await;

    let (res, ()) = tokio::join!(
        session.get_history("EXCH:AAA", Timeframe::OneDay, None, SessionType::Regular),
        async {
            expect(&mut vendor, "resolve_symbol").await;
            vendor.push_event("symbol_resolved", json!([]));
            let cmd = expect(&mut vendor, "create_series").await;
            assert_eq!(cmd.args[2], json!("s1"));
            vendor.push_event("series_completed", json!([]));
        }
    );
    res.unwrap();

    let (res, ()) = tokio::join!(
        session.get_history("EXCH:BBB", Timeframe::OneHour, None, SessionType::Extended),
        async {
            let cmd = expect(&mut vendor, "resolve_symbol").await;
            assert_eq!(cmd.args[1], json!("symbol_2"));
            vendor.push_event("symbol_resolved", json!([]));

            let cmd = expect(&mut vendor, "modify_series").await;
            assert_eq!(cmd.args[1..], [json!("sds_1"), json!("s2"), json!("symbol_2"), json!("60"), json!("")]);
            vendor.push_event("series_completed", json!([]));
        }
    );
    res.unwrap();

    // уже резолвленный символ: сразу modify_series
    let (res, ()) = tokio::join!(
        session.get_history("EXCH:AAA", Timeframe::OneDay, None, SessionType::Regular),
        async {
            let cmd = expect(&mut vendor, "modify_series").await;
            assert_eq!(cmd.args[2], json!("s3"));
            assert_eq!(cmd.args[3], json!("symbol_1"));
            vendor.push_event("series_completed", json!([]));
        }
    );
    res.unwrap();
}

#[tokio::test]
async fn start_from_anchors_first_series() {
    let (session, mut vendor) = open().await;
    let from = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

    let (res, ()) = tokio::join!(
        session.get_history("EXCH:ABC", Timeframe::FourHours, Some(from), SessionType::Regular),
        async {
            expect(&mut vendor, "resolve_symbol").await;
            vendor.push_event("symbol_resolved", json!([]));
            let cmd = expect(&mut vendor, "create_series").await;
            assert_eq!(cmd.args[5], json!(["bar_count", 1_704_153_600, 10]));
            vendor.push_event("series_completed", json!([]));
        }
    );
    res.unwrap();
}

#[tokio::test]
async fn future_start_from_is_rejected_locally() {
    let (session, mut vendor) = open().await;
    let from = Utc::now() + chrono::Duration::days(1);

    let err = session
        .get_history("EXCH:ABC", Timeframe::FourHours, Some(from), SessionType::Regular)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)));
    assert_eq!(vendor.try_next_frame(), None);
    assert!(!session.is_closed());
}

#[tokio::test]
async fn more_data_needs_history() {
    let (session, mut vendor) = open().await;

    let err = session.request_more_data(5).await.unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)));
    assert_eq!(vendor.try_next_frame(), None);
}

#[tokio::test]
async fn heartbeat_is_echoed_while_ack_pending() {
    let (session, mut vendor) = open().await;

    let (res, ()) = tokio::join!(
        session.resolve_symbol("EXCH:ABC", SessionType::Regular),
        async {
            expect(&mut vendor, "resolve_symbol").await;
            vendor.push_heartbeat(42);
            assert_eq!(vendor.next_frame().await.unwrap(), "~m~5~m~~h~42");
            vendor.push_event("symbol_resolved", json!([]));
        }
    );
    res.unwrap();
}

#[tokio::test]
async fn commands_wait_for_pending_ack() {
    let (session, mut vendor) = open().await;

    let (first, second, ()) = tokio::join!(
        session.resolve_symbol("EXCH:ABC", SessionType::Regular),
        session.switch_timezone("Etc/UTC"),
        async {
            expect(&mut vendor, "resolve_symbol").await;

            // пока нет symbol_resolved, следующая команда не уходит
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(vendor.try_next_frame(), None);

            // чужое событие гейт не отпускает
            vendor.push_event("series_completed", json!([]));
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(vendor.try_next_frame(), None);

            vendor.push_event("symbol_resolved", json!([]));
            let cmd = expect(&mut vendor, "switch_timezone").await;
            assert_eq!(cmd.args[1], json!("Etc/UTC"));
            vendor.push_event("tickmark_update", json!([]));
        }
    );
    first.unwrap();
    second.unwrap();
}

#[tokio::test(start_paused = true)]
async fn missing_ack_times_out_and_session_survives() {
    let cfg = config().with_ack_timeout(Some(Duration::from_secs(1)));
    let (session, mut vendor) = open_with(cfg).await;

    let (res, ()) = tokio::join!(
        session.resolve_symbol("EXCH:ABC", SessionType::Regular),
        async {
            expect(&mut vendor, "resolve_symbol").await;
        }
    );
    assert_eq!(
        res.unwrap_err(),
        SessionError::CorrelationTimeout {
            awaiting: "symbol_resolved".into(),
            after: Duration::from_secs(1),
        }
    );
    assert!(!session.is_closed());

    // не запомнен: следующий вызов резолвит заново с новым id
    let (res, ()) = tokio::join!(
        session.resolve_symbol("EXCH:ABC", SessionType::Regular),
        async {
            let cmd = expect(&mut vendor, "resolve_symbol").await;
            assert_eq!(cmd.args[1], json!("symbol_2"));
            vendor.push_event("symbol_resolved", json!([]));
        }
    );
    res.unwrap();
}

#[tokio::test(start_paused = true)]
async fn more_data_wait_grows_with_candle_count() {
    let cfg = config().with_ack_timeout(Some(Duration::from_secs(1)));
    let (session, mut vendor) = open_with(cfg).await;

    let (res, ()) = tokio::join!(
        session.get_history("EXCH:ABC", Timeframe::OneHour, None, SessionType::Regular),
        async {
            expect(&mut vendor, "resolve_symbol").await;
            vendor.push_event("symbol_resolved", json!([]));
            expect(&mut vendor, "create_series").await;
            vendor.push_event("series_completed", json!([]));
        }
    );
    res.unwrap();

    let started = tokio::time::Instant::now();
    let (res, ()) = tokio::join!(session.request_more_data(2500), async {
        expect(&mut vendor, "request_more_data").await;
    });
    assert_eq!(
        res,
        Err(SessionError::CorrelationTimeout {
            awaiting: "series_completed".into(),
            after: Duration::from_millis(3500),
        })
    );
    assert!(started.elapsed() >= Duration::from_millis(3500));
    assert!(!session.is_closed());
}

#[tokio::test]
async fn critical_error_closes_session() {
    let (session, mut vendor) = open().await;
    let errors = session.errors();

    let (res, ()) = tokio::join!(
        session.resolve_symbol("EXCH:ABC", SessionType::Regular),
        async {
            expect(&mut vendor, "resolve_symbol").await;
            vendor.push_event("symbol_resolved", json!([]));
        }
    );
    res.unwrap();

    vendor.push_event("critical_error", json!(["cs_x", "bad request"]));

    match next_error(&errors).await {
        SessionError::ProtocolFatal { kind, payload } => {
            assert_eq!(kind, FatalKind::Critical);
            assert!(payload.contains("bad request"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(session.is_closed());

    // даже то, что можно ответить из кэша, уже не отвечает
    let closed = Err(SessionError::TransportClosed);
    assert_eq!(
        session.resolve_symbol("EXCH:ABC", SessionType::Regular).await,
        closed
    );
    assert_eq!(session.add_realtime_symbols::<&str>(&[]).await, closed);
    assert_eq!(session.remove_realtime_symbols::<&str>(&[]).await, closed);
    assert_eq!(session.request_more_data(5).await, closed);
    assert_eq!(session.request_more_data(0).await, closed);
    assert_eq!(session.switch_timezone("").await, closed);
    assert_eq!(
        session
            .get_history("EXCH:ABC", Timeframe::OneDay, None, SessionType::Regular)
            .await,
        closed
    );
}

#[tokio::test]
async fn failed_send_is_returned_reported_and_closes_session() {
    let (session, mut vendor) = open().await;
    let errors = session.errors();

    vendor.refuse_frames();

    assert_eq!(
        session.switch_timezone("Etc/UTC").await,
        Err(SessionError::Transport(TransportError::Closed))
    );
    assert_eq!(
        next_error(&errors).await,
        SessionError::Transport(TransportError::Closed)
    );
    assert!(session.is_closed());
    assert_eq!(
        session.switch_timezone("Etc/UTC").await,
        Err(SessionError::TransportClosed)
    );
}

#[tokio::test]
async fn receive_failure_fails_pending_call() {
    let (session, mut vendor) = open().await;
    let errors = session.errors();
    let reset = SessionError::Transport(TransportError::Receive("reset".into()));

    let (res, ()) = tokio::join!(
        session.resolve_symbol("EXCH:ABC", SessionType::Regular),
        async {
            expect(&mut vendor, "resolve_symbol").await;
            vendor.fail(TransportError::Receive("reset".into()));
        }
    );
    assert_eq!(res, Err(reset.clone()));
    assert_eq!(next_error(&errors).await, reset);
    assert!(session.is_closed());
}

#[tokio::test]
async fn fatal_error_fails_pending_call() {
    let (session, mut vendor) = open().await;

    let (res, ()) = tokio::join!(
        session.resolve_symbol("EXCH:ABC", SessionType::Regular),
        async {
            expect(&mut vendor, "resolve_symbol").await;
            vendor.push_event("protocol_error", json!(["wrong data"]));
        }
    );
    assert!(matches!(
        res.unwrap_err(),
        SessionError::ProtocolFatal {
            kind: FatalKind::Protocol,
            ..
        }
    ));
}

#[tokio::test]
async fn dropped_connection_is_reported() {
    let (session, mut vendor) = open().await;
    let errors = session.errors();

    vendor.hang_up();

    assert_eq!(
        next_error(&errors).await,
        SessionError::Transport(TransportError::Closed)
    );
    assert_eq!(
        session.switch_timezone("Etc/UTC").await.unwrap_err(),
        SessionError::TransportClosed
    );
}

#[tokio::test]
async fn realtime_set_is_resent_in_full() {
    let (session, mut vendor) = open().await;
    let fast = session.tokens().fast_symbols.clone();
    let quote = session.tokens().quote.clone();

    let (res, ()) = tokio::join!(session.add_realtime_symbols(&["B:2", "A:1"]), async {
        let cmd = expect(&mut vendor, "quote_add_symbols").await;
        assert_eq!(cmd.args, vec![json!(fast), json!("B:2"), json!("A:1")]);
        let cmd = expect(&mut vendor, "quote_fast_symbols").await;
        assert_eq!(cmd.args, vec![json!(quote), json!("A:1"), json!("B:2")]);
    });
    res.unwrap();

    let (res, ()) = tokio::join!(session.add_realtime_symbols(&["C:3"]), async {
        let cmd = expect(&mut vendor, "quote_add_symbols").await;
        assert_eq!(cmd.args, vec![json!(fast), json!("C:3")]);
        let cmd = expect(&mut vendor, "quote_fast_symbols").await;
        assert_eq!(
            cmd.args,
            vec![json!(quote), json!("A:1"), json!("B:2"), json!("C:3")]
        );
    });
    res.unwrap();

    let (res, ()) = tokio::join!(session.remove_realtime_symbols(&["A:1"]), async {
        let cmd = expect(&mut vendor, "quote_remove_symbols").await;
        assert_eq!(cmd.args, vec![json!(fast), json!("A:1")]);
        let cmd = expect(&mut vendor, "quote_fast_symbols").await;
        assert_eq!(cmd.args, vec![json!(quote), json!("B:2"), json!("C:3")]);
    });
    res.unwrap();
}

#[tokio::test]
async fn quotes_reach_caller() {
    let (session, vendor) = open().await;
    let events = session.events();

    vendor.push_event(
        "qsd",
        json!(["qs_x", {"n": "EXCH:ABC", "s": "ok", "v": {"lp": 101.5, "ch": 0.5}}]),
    );

    let FeedEvent::Tick(tick) = next_event(&events).await else {
        panic!("expected tick");
    };
    assert_eq!(tick.symbol, "EXCH:ABC");
    assert_eq!(tick.price, Some(101.5));
    assert_eq!(tick.change, Some(0.5));
    assert_eq!(tick.volume, None);
}

#[tokio::test]
async fn close_shuts_the_connection() {
    let (session, mut vendor) = open().await;

    session.close().await;
    assert_eq!(vendor.next_frame().await, None);
}
