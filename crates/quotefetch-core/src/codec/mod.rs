//! # Codecs
//!
//! Encoders and decoders between [`BarSeries`](crate::BarSeries) and the
//! flat-file dialects the crate reads and writes.
//!
//! | Dialect | Encode | Decode |
//! |---------|--------|--------|
//! | Delimited text | [`encode_delimited`], [`DelimitedFormat`] | [`decode_delimited`], [`decode_delimited_multi`] |
//! | Structured JSON | [`encode_json`], [`encode_collection_json`] | [`decode_json`], [`decode_collection_json`] |
//! | Charting JSON | [`encode_charting_json`], [`encode_charting_json_collection`] | none |
//!
//! ## Leniency
//!
//! Decoders default to [`ParseMode::Lenient`]: a numeric or date field that does
//! not parse becomes its zero value (`0.0`, Unix epoch) and a [`FieldIssue`] is
//! recorded. The `_with` variants accept [`ParseMode::Strict`], which turns the
//! first such field into [`CodecError::Field`]. Rows that are too short are a
//! [`CodecError::ShortRecord`] and rows with extra columns a
//! [`CodecError::WideRecord`] in both modes.

mod charting;
mod delimited;
mod fields;
mod json;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use charting::{encode_charting_json, encode_charting_json_collection};
pub use delimited::{
    decode_delimited, decode_delimited_multi, decode_delimited_multi_with, decode_delimited_with,
    encode_delimited, DelimitedFormat,
};
pub(crate) use fields::FieldReader;
pub use json::{
    decode_collection_json, decode_collection_json_with, decode_json, decode_json_with,
    encode_collection_json, encode_json,
};

/// How decoders treat fields that fail to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Substitute the zero value and record a [`FieldIssue`].
    #[default]
    Lenient,
    /// Fail on the first unparseable field.
    Strict,
}

impl ParseMode {
    pub const fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }
}

/// A field that was replaced by its zero value during decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// 1-based record number within the payload.
    pub row: usize,
    pub column: String,
    pub raw: String,
}

/// Decoded value plus the fields that were defaulted along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub diagnostics: Vec<FieldIssue>,
}

impl<T> Decoded<T> {
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("delimited codec error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: column '{column}' has unparseable value '{raw}'")]
    Field {
        row: usize,
        column: String,
        raw: String,
    },

    #[error("row {row}: expected at least {expected} fields, found {found}")]
    ShortRecord {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {row}: expected at most {expected} fields, found {found}")]
    WideRecord {
        row: usize,
        expected: usize,
        found: usize,
    },
}

impl From<FieldIssue> for CodecError {
    fn from(issue: FieldIssue) -> Self {
        Self::Field {
            row: issue.row,
            column: issue.column,
            raw: issue.raw,
        }
    }
}
