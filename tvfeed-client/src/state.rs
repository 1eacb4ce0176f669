use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use log::warn;
use tvfeed_core::SessionTokens;

/// series id -> символ.
///
/// Пишет сессия (при выдаче нового `sN`), читает диспетчер чтения
/// при сопоставлении `timescale_update`.
#[derive(Debug, Clone, Default)]
pub(crate) struct SeriesRegistry {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl SeriesRegistry {
    pub(crate) fn insert(&self, series_id: &str, symbol: &str) {
        let mut map = match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("series registry lock poisoned; continuing");
                poisoned.into_inner()
            }
        };
        map.insert(series_id.to_string(), symbol.to_string());
    }

    pub(crate) fn symbol_for(&self, series_id: &str) -> Option<String> {
        let map = match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.get(series_id).cloned()
    }
}

/// Следующий шаг истории: какой `sN` и создавать ли слот
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SeriesStep {
    pub(crate) series_id: String,
    pub(crate) create: bool,
}

/// Изменяемое состояние сессии, кроме того, что нужно читателю
#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) tokens: SessionTokens,
    /// символ -> `symbol_N`
    symbols: HashMap<String, String>,
    symbol_counter: u64,
    series: SeriesRegistry,
    series_counter: u64,
    series_created: bool,
    /// realtime-подписки, отсортированы для стабильного `quote_fast_symbols`
    realtime: BTreeSet<String>,
}

impl SessionState {
    pub(crate) fn new(tokens: SessionTokens, series: SeriesRegistry) -> Self {
        Self {
            tokens,
            symbols: HashMap::new(),
            symbol_counter: 0,
            series,
            series_counter: 0,
            series_created: false,
            realtime: BTreeSet::new(),
        }
    }

    pub(crate) fn symbol_id(&self, symbol: &str) -> Option<&str> {
        self.symbols.get(symbol).map(String::as_str)
    }

    /// Новый `symbol_N`; счётчик растёт даже если resolve потом не удался
    pub(crate) fn next_symbol_id(&mut self) -> String {
        self.symbol_counter += 1;
        format!("symbol_{}", self.symbol_counter)
    }

    pub(crate) fn record_symbol(&mut self, symbol: &str, symbol_id: String) {
        self.symbols.insert(symbol.to_string(), symbol_id);
    }

    pub(crate) fn forget_symbol(&mut self, symbol: &str) -> bool {
        self.symbols.remove(symbol).is_some()
    }

    /// Выдаёт следующий `sN` и сразу регистрирует его, чтобы первая
    /// пачка свечей не обогнала запись в реестре
    pub(crate) fn next_series(&mut self, symbol: &str) -> SeriesStep {
        self.series_counter += 1;
        let series_id = format!("s{}", self.series_counter);
        self.series.insert(&series_id, symbol);

        SeriesStep {
            series_id,
            create: !self.series_created,
        }
    }

    pub(crate) fn mark_series_created(&mut self) {
        self.series_created = true;
    }

    pub(crate) fn has_series(&self) -> bool {
        self.series_created
    }

    pub(crate) fn add_realtime<S: AsRef<str>>(&mut self, symbols: &[S]) {
        for s in symbols {
            self.realtime.insert(s.as_ref().to_string());
        }
    }

    pub(crate) fn remove_realtime<S: AsRef<str>>(&mut self, symbols: &[S]) {
        for s in symbols {
            self.realtime.remove(s.as_ref());
        }
    }

    pub(crate) fn realtime(&self) -> Vec<String> {
        self.realtime.iter().cloned().collect()
    }
}
