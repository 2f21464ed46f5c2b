use tracing::warn;

use super::{CodecError, FieldIssue, ParseMode};
use crate::UtcDateTime;

/// Field-level parser that applies the zero-value policy of a [`ParseMode`].
#[derive(Debug)]
pub(crate) struct FieldReader {
    mode: ParseMode,
    row: usize,
    issues: Vec<FieldIssue>,
}

impl FieldReader {
    pub(crate) fn new(mode: ParseMode) -> Self {
        Self {
            mode,
            row: 0,
            issues: Vec::new(),
        }
    }

    pub(crate) fn set_row(&mut self, row: usize) {
        self.row = row;
    }

    pub(crate) fn number(&mut self, column: &str, raw: &str) -> Result<f64, CodecError> {
        match raw.trim().parse::<f64>() {
            Ok(value) => Ok(value),
            Err(_) => self.defaulted(column, raw, 0.0),
        }
    }

    /// Value that a structured payload may leave out or set to null.
    pub(crate) fn present(&mut self, column: &str, value: Option<f64>) -> Result<f64, CodecError> {
        match value {
            Some(value) => Ok(value),
            None => self.defaulted(column, "null", 0.0),
        }
    }

    /// `YYYY-MM-DD HH:MM`, falling back to a bare `YYYY-MM-DD`.
    pub(crate) fn minutes(&mut self, column: &str, raw: &str) -> Result<UtcDateTime, CodecError> {
        if let Ok(value) = UtcDateTime::parse_minutes(raw) {
            return Ok(value);
        }
        match UtcDateTime::parse_date(raw) {
            Ok(value) => Ok(value),
            Err(_) => self.defaulted(column, raw, UtcDateTime::epoch()),
        }
    }

    pub(crate) fn date(&mut self, column: &str, raw: &str) -> Result<UtcDateTime, CodecError> {
        match UtcDateTime::parse_date(raw) {
            Ok(value) => Ok(value),
            Err(_) => self.defaulted(column, raw, UtcDateTime::epoch()),
        }
    }

    pub(crate) fn rfc3339(&mut self, column: &str, raw: &str) -> Result<UtcDateTime, CodecError> {
        match UtcDateTime::parse(raw) {
            Ok(value) => Ok(value),
            Err(_) => self.defaulted(column, raw, UtcDateTime::epoch()),
        }
    }

    /// Whole Unix seconds carried as a JSON number.
    pub(crate) fn unix_seconds(&mut self, column: &str, value: f64) -> Result<UtcDateTime, CodecError> {
        let converted = (value.is_finite() && value.fract() == 0.0)
            .then(|| UtcDateTime::from_unix_timestamp(value as i64).ok())
            .flatten();
        match converted {
            Some(timestamp) => Ok(timestamp),
            None => self.defaulted(column, &value.to_string(), UtcDateTime::epoch()),
        }
    }

    pub(crate) fn finish(self) -> Vec<FieldIssue> {
        self.issues
    }

    fn defaulted<T>(&mut self, column: &str, raw: &str, zero: T) -> Result<T, CodecError> {
        let issue = FieldIssue {
            row: self.row,
            column: column.to_owned(),
            raw: raw.to_owned(),
        };
        if self.mode.is_strict() {
            return Err(issue.into());
        }

        warn!(row = issue.row, column = %issue.column, raw = %issue.raw, "defaulting unparseable field");
        self.issues.push(issue);
        Ok(zero)
    }
}
