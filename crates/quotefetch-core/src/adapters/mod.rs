mod gdax;
mod nasdaq;
mod tiingo;
mod yahoo;

#[cfg(test)]
pub(crate) mod testing;

pub use gdax::GdaxAdapter;
pub use nasdaq::{
    parse_etf_listing, parse_market_listing, EtfDirectory, MarketDirectory, NasdaqListingAdapter,
};
pub use tiingo::TiingoAdapter;
pub use yahoo::YahooAdapter;
