use std::path::{Path, PathBuf};

use log::warn;
use thiserror::Error;
use tvfeed_core::SymbolListError;

use crate::cli::Args;

#[derive(Debug, Error)]
pub(crate) enum SymbolsError {
    /// Clap-логика должна гарантировать источник символов
    #[error("symbols source is missing: provide either --symbols-file or --symbols")]
    MissingSource,

    #[error("no EXCHANGE:TICKER entries in {path:?} (only blanks and comments)")]
    EmptyFromFile { path: PathBuf },

    #[error("no EXCHANGE:TICKER entries in --symbols {raw:?}")]
    EmptyFromArg { raw: String },

    #[error("bad symbols file {path:?}")]
    File {
        path: PathBuf,
        #[source]
        source: SymbolListError,
    },

    #[error(transparent)]
    Arg(SymbolListError),
}

pub(crate) type Result<T> = std::result::Result<T, SymbolsError>;

/// Загружает символы из источника, выбранного в CLI:
/// - `--symbols-file` -> tvfeed_core::symbols::read_symbols_from_path
/// - `--symbols`      -> tvfeed_core::symbols::parse_symbols_csv
pub(crate) fn load_symbols(args: &Args) -> Result<Vec<String>> {
    let symbols = if let Some(path) = &args.symbols_file {
        load_from_file(path)?
    } else if let Some(raw) = &args.symbols {
        load_from_arg(raw)?
    } else {
        return Err(SymbolsError::MissingSource);
    };

    let bare = bare_tickers(&symbols);
    if !bare.is_empty() {
        warn!(
            "no exchange prefix for {}: the server picks the exchange itself",
            bare.join(", ")
        );
    }
    Ok(symbols)
}

/// Символы без `EXCHANGE:` - их биржу выбирает сервер
fn bare_tickers(symbols: &[String]) -> Vec<&str> {
    symbols
        .iter()
        .map(String::as_str)
        .filter(|s| !s.contains(':'))
        .collect()
}

fn load_from_file(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref().to_path_buf();

    let symbols = tvfeed_core::symbols::read_symbols_from_path(&path).map_err(|e| {
        SymbolsError::File {
            path: path.clone(),
            source: e,
        }
    })?;

    if symbols.is_empty() {
        return Err(SymbolsError::EmptyFromFile { path });
    }

    Ok(symbols)
}

fn load_from_arg(raw: &str) -> Result<Vec<String>> {
    let symbols = tvfeed_core::symbols::parse_symbols_csv(raw).map_err(SymbolsError::Arg)?;

    if symbols.is_empty() {
        return Err(SymbolsError::EmptyFromArg {
            raw: raw.to_string(),
        });
    }

    Ok(symbols)
}
