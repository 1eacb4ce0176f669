//! Точка входа `tvfeed`.
//!
//! Жизненный цикл:
//! - парсинг CLI и загрузка списка символов
//! - открытие websocket-сессии и авторизация
//! - realtime-подписка и (по `--history`) запрос истории
//! - печать тиков и свечей до `Ctrl+C` или фатальной ошибки

mod cli;
mod feed;
mod symbols;

use std::sync::{Arc, atomic::AtomicBool, atomic::Ordering};

use clap::Parser;
use log::{info, warn};
use tvfeed_client::Session;

fn main() -> anyhow::Result<()> {
    // Логи через RUST_LOG=info/debug/trace
    env_logger::init();

    let shutdown = Arc::new(AtomicBool::new(false));

    // Ctrl+C => ставим shutdown=true
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
            info!("shutting down...");
        })?;
    }

    let args = cli::Args::parse();
    args.validate()?;

    let symbols = symbols::load_symbols(&args)?;

    info!(
        "Starting tvfeed: url={}, history={}, symbols={}",
        args.url,
        args.history.map_or_else(|| "-".to_string(), |tf| tf.to_string()),
        symbols.join(",")
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let session = runtime.block_on(Session::open(args.session_config()))?;

    let printed = match runtime.block_on(subscribe(&session, &args, &symbols)) {
        Ok(()) => feed::run_feed_printer(session.events(), session.errors(), shutdown),
        Err(e) => Err(e),
    };

    runtime.block_on(session.close());
    printed
}

/// Команды по флагам CLI, по порядку
async fn subscribe(session: &Session, args: &cli::Args, symbols: &[String]) -> anyhow::Result<()> {
    if let Some(tz) = &args.timezone {
        session.switch_timezone(tz).await?;
    }

    if !args.no_realtime {
        session.add_realtime_symbols(symbols).await?;
    }

    if let Some(timeframe) = args.history {
        for symbol in symbols {
            if let Err(e) = session
                .get_history(symbol, timeframe, args.from, args.session)
                .await
            {
                if e.is_fatal() {
                    return Err(e.into());
                }
                warn!("history for {symbol}: {e}");
                continue;
            }

            if let Some(more) = args.more {
                session.request_more_data(more).await?;
            }
        }
    }

    Ok(())
}
