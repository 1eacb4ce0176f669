use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Тип торговой сессии для `resolve_symbol`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// только основная сессия
    #[default]
    Regular,
    /// с пре/пост-маркетом
    Extended,
}

impl SessionType {
    /// Значение на проводе
    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Regular => "regular",
            SessionType::Extended => "extended",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(SessionType::Regular),
            "extended" => Ok(SessionType::Extended),
            other => Err(format!("unknown session type: {other}")),
        }
    }
}

/// Таймфрейм свечей
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    OneMinute,
    ThreeMinutes,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    FortyFiveMinutes,
    OneHour,
    TwoHours,
    ThreeHours,
    FourHours,
    OneDay,
    OneWeek,
    OneMonth,
    ThreeMonths,
    SixMonths,
    TwelveMonths,
}

impl Timeframe {
    /// Все таймфреймы в порядке возрастания
    pub const ALL: [Timeframe; 16] = [
        Timeframe::OneMinute,
        Timeframe::ThreeMinutes,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::ThirtyMinutes,
        Timeframe::FortyFiveMinutes,
        Timeframe::OneHour,
        Timeframe::TwoHours,
        Timeframe::ThreeHours,
        Timeframe::FourHours,
        Timeframe::OneDay,
        Timeframe::OneWeek,
        Timeframe::OneMonth,
        Timeframe::ThreeMonths,
        Timeframe::SixMonths,
        Timeframe::TwelveMonths,
    ];

    /// Значение на проводе
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1",
            Timeframe::ThreeMinutes => "3",
            Timeframe::FiveMinutes => "5",
            Timeframe::FifteenMinutes => "15",
            Timeframe::ThirtyMinutes => "30",
            Timeframe::FortyFiveMinutes => "45",
            Timeframe::OneHour => "60",
            Timeframe::TwoHours => "120",
            Timeframe::ThreeHours => "180",
            Timeframe::FourHours => "240",
            Timeframe::OneDay => "1D",
            Timeframe::OneWeek => "1W",
            Timeframe::OneMonth => "1M",
            Timeframe::ThreeMonths => "3M",
            Timeframe::SixMonths => "6M",
            Timeframe::TwelveMonths => "12M",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_uppercase();
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| format!("unknown timeframe: {s}"))
    }
}

/// Realtime-обновление котировки (`qsd`).
///
/// Сервер присылает только изменившиеся поля, поэтому всё кроме символа
/// опционально; отсутствующее поле не подменяется нулём.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTick {
    pub symbol: String,
    pub volume: Option<f64>,
    pub price: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    /// unix-секунды последней сделки (`lp_time`)
    pub timestamp: Option<i64>,
}

impl fmt::Display for PriceTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map_or_else(|| "-".to_string(), T::to_string)
        }

        write!(
            f,
            "{} price={} ch={} chp={} volume={} ts={}",
            self.symbol,
            opt(&self.price),
            opt(&self.change),
            opt(&self.change_percent),
            opt(&self.volume),
            opt(&self.timestamp)
        )
    }
}

/// Одна свеча из пачки истории
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

/// Пачка исторических свечей (`timescale_update`).
///
/// Параллельные массивы, выровненные по индексу.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryBatch {
    pub symbol: String,
    pub series_id: String,
    pub timestamp: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<Option<f64>>,
}

impl HistoryBatch {
    /// Добавляет свечу во все массивы сразу
    pub fn push(&mut self, bar: Bar) {
        self.timestamp.push(bar.timestamp);
        self.open.push(bar.open);
        self.high.push(bar.high);
        self.low.push(bar.low);
        self.close.push(bar.close);
        self.volume.push(bar.volume);
    }

    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamp.is_empty()
    }

    /// Свечи по одной; на массивах разной длины обрывается по самому короткому
    pub fn bars(&self) -> impl Iterator<Item = Bar> + '_ {
        self.timestamp
            .iter()
            .zip(&self.open)
            .zip(&self.high)
            .zip(&self.low)
            .zip(&self.close)
            .zip(&self.volume)
            .map(|(((((&timestamp, &open), &high), &low), &close), &volume)| Bar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            })
    }
}

impl fmt::Display for HistoryBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] bars={}", self.symbol, self.series_id, self.len())?;
        if let (Some(first), Some(last)) = (self.timestamp.first(), self.timestamp.last()) {
            write!(f, " from={first} to={last}")?;
        }
        Ok(())
    }
}
