use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::ValidationError;

const BAR_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");
const DATE_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Template used to complete partial `yyyy[-mm[-dd]]` inputs.
const PARTIAL_TEMPLATE: &str = "0000-01-01 00:00";

/// RFC3339 timestamp guaranteed to be UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Zero value used when a field cannot be parsed.
    pub const fn epoch() -> Self {
        Self(OffsetDateTime::UNIX_EPOCH)
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }
        })?;

        Self::from_offset_datetime(parsed).map_err(|_| ValidationError::TimestampNotUtc {
            value: input.to_owned(),
        })
    }

    /// Parses the `YYYY-MM-DD HH:MM` form used by delimited files.
    pub fn parse_minutes(input: &str) -> Result<Self, ValidationError> {
        PrimitiveDateTime::parse(input.trim(), BAR_FORMAT)
            .map(|value| Self(value.assume_utc()))
            .map_err(|_| ValidationError::InvalidDate {
                value: input.to_owned(),
            })
    }

    /// Parses a plain `YYYY-MM-DD` calendar date at midnight UTC.
    pub fn parse_date(input: &str) -> Result<Self, ValidationError> {
        time::Date::parse(input.trim(), DATE_FORMAT)
            .map(|date| Self(date.midnight().assume_utc()))
            .map_err(|_| ValidationError::InvalidDate {
                value: input.to_owned(),
            })
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Result<Self, ValidationError> {
        if value.offset() != UtcOffset::UTC {
            return Err(ValidationError::TimestampNotUtc {
                value: value
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| String::from("<unformattable>")),
            });
        }

        Ok(Self(value))
    }

    pub fn from_unix_timestamp(seconds: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|_| ValidationError::TimestampOutOfRange { value: seconds })
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn unix_timestamp(self) -> i64 {
        self.0.unix_timestamp()
    }

    pub fn unix_millis(self) -> i64 {
        (self.0.unix_timestamp_nanos() / 1_000_000) as i64
    }

    pub fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration))
    }

    pub fn saturating_sub(self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration))
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("<unformattable>"))
    }

    /// `YYYY-MM-DD HH:MM`, zero padded, 24h clock.
    pub fn format_minutes(self) -> String {
        self.0
            .format(BAR_FORMAT)
            .unwrap_or_else(|_| String::from("0000-00-00 00:00"))
    }

    pub fn format_date(self) -> String {
        self.0
            .format(DATE_FORMAT)
            .unwrap_or_else(|_| String::from("0000-00-00"))
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

/// Parses a possibly partial `yyyy[-mm[-dd[ hh:mm]]]` string.
///
/// Missing components are filled from `0000-01-01 00:00`, so `"2016"` means
/// midnight on 2016-01-01. An empty string yields the current time.
pub fn parse_partial_date(input: &str) -> Result<UtcDateTime, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(UtcDateTime::now());
    }
    if trimmed.len() > PARTIAL_TEMPLATE.len() || !trimmed.is_ascii() {
        return Err(ValidationError::InvalidDate {
            value: input.to_owned(),
        });
    }

    let completed = format!("{trimmed}{}", &PARTIAL_TEMPLATE[trimmed.len()..]);
    UtcDateTime::parse_minutes(&completed).map_err(|_| ValidationError::InvalidDate {
        value: input.to_owned(),
    })
}

/// Start of a look-back window of `years * 365` days ending at `end`.
pub fn lookback_years(years: u32, end: UtcDateTime) -> UtcDateTime {
    end.saturating_sub(Duration::days(365 * i64::from(years)))
}
