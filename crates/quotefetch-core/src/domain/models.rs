use serde::{Deserialize, Serialize};

use crate::UtcDateTime;

/// One OHLCV observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub const fn new(
        timestamp: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// All-zero bar at the Unix epoch.
    pub const fn zero() -> Self {
        Self::new(UtcDateTime::epoch(), 0.0, 0.0, 0.0, 0.0, 0.0)
    }
}

/// Price history for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn with_capacity(symbol: impl Into<String>, capacity: usize) -> Self {
        Self::new(symbol, Vec::with_capacity(capacity))
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// True when every timestamp is strictly later than the previous one.
    pub fn is_chronological(&self) -> bool {
        self.bars
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp)
    }
}

/// Series in arrival order. Duplicate symbols are kept side by side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesCollection(Vec<BarSeries>);

impl SeriesCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, series: BarSeries) {
        self.0.push(series);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BarSeries> {
        self.0.iter()
    }

    /// First series whose symbol matches exactly.
    pub fn get(&self, symbol: &str) -> Option<&BarSeries> {
        self.0.iter().find(|series| series.symbol == symbol)
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.0.iter().map(|series| series.symbol.as_str()).collect()
    }

    pub fn as_slice(&self) -> &[BarSeries] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<BarSeries> {
        self.0
    }
}

impl From<Vec<BarSeries>> for SeriesCollection {
    fn from(value: Vec<BarSeries>) -> Self {
        Self(value)
    }
}

impl FromIterator<BarSeries> for SeriesCollection {
    fn from_iter<I: IntoIterator<Item = BarSeries>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for SeriesCollection {
    type Item = BarSeries;
    type IntoIter = std::vec::IntoIter<BarSeries>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a SeriesCollection {
    type Item = &'a BarSeries;
    type IntoIter = std::slice::Iter<'a, BarSeries>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
