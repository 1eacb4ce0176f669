use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::SymbolListError;

/// Читает символы по одному на строку (`EXCHANGE:TICKER`, `#` - комментарий).
///
/// Результат отсортирован и без повторов.
pub fn read_symbols<R: Read>(reader: R) -> Result<Vec<String>, SymbolListError> {
    let mut set = BTreeSet::new();

    for (idx, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        if let Some(symbol) = normalize(&line) {
            set.insert(validate(idx + 1, symbol)?);
        }
    }

    Ok(set.into_iter().collect())
}

/// То же из файла
pub fn read_symbols_from_path(path: impl AsRef<Path>) -> Result<Vec<String>, SymbolListError> {
    read_symbols(File::open(path)?)
}

/// Символы из строки вида `"nasdaq:aapl, BINANCE:BTCUSDT,,"`.
///
/// Номер "строки" в ошибке - позиция элемента в списке.
pub fn parse_symbols_csv(raw: &str) -> Result<Vec<String>, SymbolListError> {
    let mut set = BTreeSet::new();

    for (idx, part) in raw.split(',').enumerate() {
        if let Some(symbol) = normalize(part) {
            set.insert(validate(idx + 1, symbol)?);
        }
    }

    Ok(set.into_iter().collect())
}

fn normalize(line: &str) -> Option<String> {
    let s = line.split('#').next().unwrap_or("").trim();
    if s.is_empty() {
        return None;
    }
    Some(s.to_ascii_uppercase())
}

fn validate(line: usize, symbol: String) -> Result<String, SymbolListError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, ':' | '.' | '_' | '!' | '-' | '/');

    // максимум один префикс биржи, и он не пустой
    let bad_prefix = match symbol.split_once(':') {
        Some((exchange, ticker)) => exchange.is_empty() || ticker.is_empty() || ticker.contains(':'),
        None => false,
    };

    if bad_prefix || !symbol.chars().all(allowed) {
        return Err(SymbolListError::InvalidSymbol { line, symbol });
    }
    Ok(symbol)
}
