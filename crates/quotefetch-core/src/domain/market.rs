use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Symbol universes that can be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Etf,
    Nasdaq,
    Nyse,
    Amex,
    MegaCap,
    LargeCap,
    MidCap,
    SmallCap,
    MicroCap,
    NanoCap,
    BasicIndustries,
    CapitalGoods,
    ConsumerDurables,
    ConsumerNonDurable,
    ConsumerServices,
    Energy,
    Finance,
    Healthcare,
    Miscellaneous,
    Utilities,
    Technology,
    Transportation,
}

/// Screener query parameter that selects a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenerFilter {
    Exchange(&'static str),
    MarketCap(&'static str),
    /// Already URL-encoded industry name.
    Industry(&'static str),
}

impl Market {
    pub const ALL: [Self; 22] = [
        Self::Etf,
        Self::Nasdaq,
        Self::Nyse,
        Self::Amex,
        Self::MegaCap,
        Self::LargeCap,
        Self::MidCap,
        Self::SmallCap,
        Self::MicroCap,
        Self::NanoCap,
        Self::BasicIndustries,
        Self::CapitalGoods,
        Self::ConsumerDurables,
        Self::ConsumerNonDurable,
        Self::ConsumerServices,
        Self::Energy,
        Self::Finance,
        Self::Healthcare,
        Self::Miscellaneous,
        Self::Utilities,
        Self::Technology,
        Self::Transportation,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Etf => "etf",
            Self::Nasdaq => "nasdaq",
            Self::Nyse => "nyse",
            Self::Amex => "amex",
            Self::MegaCap => "megacap",
            Self::LargeCap => "largecap",
            Self::MidCap => "midcap",
            Self::SmallCap => "smallcap",
            Self::MicroCap => "microcap",
            Self::NanoCap => "nanocap",
            Self::BasicIndustries => "basicindustries",
            Self::CapitalGoods => "capitalgoods",
            Self::ConsumerDurables => "consumerdurables",
            Self::ConsumerNonDurable => "consumernondurable",
            Self::ConsumerServices => "consumerservices",
            Self::Energy => "energy",
            Self::Finance => "finance",
            Self::Healthcare => "healthcare",
            Self::Miscellaneous => "miscellaneous",
            Self::Utilities => "utilities",
            Self::Technology => "technology",
            Self::Transportation => "transportation",
        }
    }

    /// Screener filter for listing-backed markets; `None` for the ETF directory.
    pub const fn screener_filter(self) -> Option<ScreenerFilter> {
        let filter = match self {
            Self::Etf => return None,
            Self::Nasdaq => ScreenerFilter::Exchange("nasdaq"),
            Self::Nyse => ScreenerFilter::Exchange("nyse"),
            Self::Amex => ScreenerFilter::Exchange("amex"),
            Self::MegaCap => ScreenerFilter::MarketCap("Mega-cap"),
            Self::LargeCap => ScreenerFilter::MarketCap("Large-cap"),
            Self::MidCap => ScreenerFilter::MarketCap("Mid-cap"),
            Self::SmallCap => ScreenerFilter::MarketCap("Small-cap"),
            Self::MicroCap => ScreenerFilter::MarketCap("Micro-cap"),
            Self::NanoCap => ScreenerFilter::MarketCap("Nano-cap"),
            Self::BasicIndustries => ScreenerFilter::Industry("Basic%20Industries"),
            Self::CapitalGoods => ScreenerFilter::Industry("Capital%20Goods"),
            Self::ConsumerDurables => ScreenerFilter::Industry("Consumer%20Durables"),
            Self::ConsumerNonDurable => ScreenerFilter::Industry("Consumer%20Non-Durables"),
            Self::ConsumerServices => ScreenerFilter::Industry("Consumer%20Services"),
            Self::Energy => ScreenerFilter::Industry("Energy"),
            Self::Finance => ScreenerFilter::Industry("Finance"),
            Self::Healthcare => ScreenerFilter::Industry("Health-Care"),
            Self::Miscellaneous => ScreenerFilter::Industry("Miscellaneous"),
            Self::Utilities => ScreenerFilter::Industry("Utilities"),
            Self::Technology => ScreenerFilter::Industry("Technology"),
            Self::Transportation => ScreenerFilter::Industry("Transportation"),
        };
        Some(filter)
    }

    /// Default listing file name, `{market}.txt`.
    pub fn default_file_name(self) -> String {
        format!("{}.txt", self.as_str())
    }
}

impl Display for Market {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|market| market.as_str() == normalized)
            .ok_or(ValidationError::InvalidMarket { value: normalized })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_market_round_trips_through_text() {
        for market in Market::ALL {
            assert_eq!(Market::from_str(market.as_str()).expect("parse"), market);
        }
    }

    #[test]
    fn only_etf_lacks_a_screener_filter() {
        let without: Vec<Market> = Market::ALL
            .into_iter()
            .filter(|market| market.screener_filter().is_none())
            .collect();
        assert_eq!(without, vec![Market::Etf]);
    }

    #[test]
    fn rejects_unknown_market() {
        let err = Market::from_str("allmarkets").expect_err("not a single market");
        assert!(matches!(err, ValidationError::InvalidMarket { .. }));
    }
}
