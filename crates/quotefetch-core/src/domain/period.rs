use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Bar period requested from an upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "60m", alias = "1h")]
    Min60,
    #[serde(rename = "d")]
    Daily,
    #[serde(rename = "w")]
    Weekly,
    #[serde(rename = "m")]
    Monthly,
}

impl Period {
    pub const ALL: [Self; 8] = [
        Self::Min1,
        Self::Min5,
        Self::Min15,
        Self::Min30,
        Self::Min60,
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Min1 => "1m",
            Self::Min5 => "5m",
            Self::Min15 => "15m",
            Self::Min30 => "30m",
            Self::Min60 => "60m",
            Self::Daily => "d",
            Self::Weekly => "w",
            Self::Monthly => "m",
        }
    }

    /// Candle width in seconds. Periods without a fixed width fall back to one day.
    pub const fn granularity_seconds(self) -> i64 {
        match self {
            Self::Min1 => 60,
            Self::Min5 => 300,
            Self::Min15 => 900,
            Self::Min30 => 1_800,
            Self::Min60 => 3_600,
            Self::Daily => 86_400,
            Self::Weekly => 604_800,
            Self::Monthly => 86_400,
        }
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // `m` alone is monthly, so no lowercasing of the whole input.
        match value.trim() {
            "1m" => Ok(Self::Min1),
            "5m" => Ok(Self::Min5),
            "15m" => Ok(Self::Min15),
            "30m" => Ok(Self::Min30),
            "60m" | "1h" => Ok(Self::Min60),
            "d" | "D" => Ok(Self::Daily),
            "w" | "W" => Ok(Self::Weekly),
            "m" | "M" => Ok(Self::Monthly),
            other => Err(ValidationError::InvalidPeriod {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_period() {
        assert_eq!(Period::from_str("d").expect("must parse"), Period::Daily);
        assert_eq!(Period::from_str("1h").expect("alias"), Period::Min60);
    }

    #[test]
    fn rejects_invalid_period() {
        let err = Period::from_str("2h").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidPeriod { .. }));
    }

    #[test]
    fn granularity_table() {
        let seconds: Vec<i64> = Period::ALL
            .iter()
            .map(|period| period.granularity_seconds())
            .collect();
        assert_eq!(
            seconds,
            vec![60, 300, 900, 1_800, 3_600, 86_400, 604_800, 86_400]
        );
    }

    #[test]
    fn text_form_round_trips() {
        for period in Period::ALL {
            assert_eq!(Period::from_str(period.as_str()).expect("parse"), period);
        }
    }
}
