use thiserror::Error;

use crate::codec::CodecError;
use crate::data_source::SourceError;

/// Validation and contract errors exposed by `quotefetch-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid period '{value}', expected one of 1m, 5m, 15m, 30m, 60m, d, w, m")]
    InvalidPeriod { value: String },
    #[error("invalid source '{value}', expected one of yahoo, tiingo, gdax")]
    InvalidSource { value: String },
    #[error("invalid market '{value}'")]
    InvalidMarket { value: String },
    #[error("invalid output format '{value}', expected one of csv, json, highstock")]
    InvalidFormat { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("unparseable date '{value}'")]
    InvalidDate { value: String },
    #[error("timestamp {value} is out of range")]
    TimestampOutOfRange { value: i64 },

    #[error("range start {start} is after range end {end}")]
    InvertedRange { start: String, end: String },
    #[error("batch request must include at least one symbol")]
    EmptyBatch,
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
