//! # Quotefetch Core
//!
//! Historical OHLCV acquisition from heterogeneous quote providers.
//!
//! ## Overview
//!
//! Each provider has its own handshake, pagination, column layout and failure
//! modes. This crate adapts all of them to one canonical [`BarSeries`] with a
//! single ascending-order and price-adjustment contract, then serializes the
//! result to delimited text, JSON or a charting-library JSON dialect.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Yahoo, Tiingo, GDAX, Nasdaq listings) |
//! | [`codec`] | Delimited, JSON and charting-JSON encode/decode |
//! | [`config`] | Environment-driven settings and the adapter registry |
//! | [`data_source`] | Adapter traits and request/response types |
//! | [`domain`] | Bars, series, symbols, periods, markets, timestamps |
//! | [`error`] | Core error types |
//! | [`ftp`] | Anonymous FTP retrieval |
//! | [`http_client`] | HTTP client abstraction |
//! | [`orchestrator`] | Single and batch fetches with pacing |
//! | [`persist`] | Flat-file dumps and symbol lists |
//! | [`provider_policy`] | Per-provider capability table |
//! | [`session`] | Cookie and crumb handshake for the finance portal |
//! | [`source`] | Provider identifiers |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quotefetch_core::{
//!     parse_partial_date, write_series, BatchRequest, FetchConfig, OutputFormat, Period,
//!     ProviderId, SourceRegistry,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = SourceRegistry::from_config(&FetchConfig::from_env());
//!     let orchestrator = registry
//!         .orchestrator(ProviderId::Gdax)
//!         .ok_or("gdax not registered")?;
//!
//!     let batch = BatchRequest::from_tickers(
//!         &["BTC-USD", "ETH-USD"],
//!         parse_partial_date("2018-01")?,
//!         parse_partial_date("2018-02")?,
//!         Period::Min60,
//!         true,
//!     )?;
//!     let report = orchestrator.fetch_batch(batch).await?;
//!     for series in &report.series {
//!         write_series(None, series, OutputFormat::Csv)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Orchestrator   │──── RequestPacing
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ HistorySource   │────▶│ Session (portal) │
//! │ (Adapter Trait) │     └────────┬─────────┘
//! └────────┬────────┘              ▼
//!          │              ┌──────────────────┐
//!          └─────────────▶│ HttpClient / FTP │
//!                         └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ BarSeries       │────▶│ codec / persist  │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Adapters return [`SourceError`] values classified by [`SourceErrorKind`]:
//!
//! ```rust
//! use quotefetch_core::{SourceError, SourceErrorKind};
//!
//! fn handle_error(error: SourceError) {
//!     match error.kind() {
//!         SourceErrorKind::InvalidRequest => {
//!             // Fix the request; nothing was sent
//!         }
//!         SourceErrorKind::Unavailable | SourceErrorKind::Unauthenticated => {
//!             // Network or session problem for this symbol
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! Fields that fail to parse default to zero and are reported as
//! [`FieldIssue`]s unless [`ParseMode::Strict`] is selected.
//!
//! ## Logging
//!
//! The crate emits `tracing` events and never installs a subscriber. Tokens
//! and crumbs are never logged.

pub mod adapters;
pub mod codec;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod ftp;
pub mod http_client;
pub mod orchestrator;
pub mod persist;
pub mod provider_policy;
pub mod session;
pub mod source;

// Adapter implementations
pub use adapters::{
    parse_etf_listing, parse_market_listing, EtfDirectory, GdaxAdapter, MarketDirectory,
    NasdaqListingAdapter, TiingoAdapter, YahooAdapter,
};

// Codecs
pub use codec::{
    decode_collection_json, decode_collection_json_with, decode_delimited, decode_delimited_multi,
    decode_delimited_multi_with, decode_delimited_with, decode_json, decode_json_with,
    encode_charting_json, encode_charting_json_collection, encode_collection_json,
    encode_delimited, encode_json, CodecError, Decoded, DelimitedFormat, FieldIssue, ParseMode,
};

// Configuration
pub use config::{FetchConfig, SourceRegistry};

// Data source traits and types
pub use data_source::{
    BatchRequest, FetchOutcome, HistorySource, ProviderRequest, SourceError, SourceErrorKind,
    SourceFuture, SymbolDirectory,
};

// Domain models
pub use domain::{
    lookback_years, parse_partial_date, Bar, BarSeries, Market, Period, ScreenerFilter,
    SeriesCollection, Symbol, UtcDateTime,
};

// Error types
pub use error::{CoreError, ValidationError};

// FTP
pub use ftp::{parse_pasv_reply, AnonymousFtp, FileRetriever, FtpError, FtpReply};

// HTTP client types
pub use http_client::{
    CookieSessionFactory, HttpAuth, HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse,
    ReqwestHttpClient, ReqwestSessionFactory,
};

// Orchestration
pub use orchestrator::{
    BatchReport, Orchestrator, RequestPacing, SymbolDiagnostics, SymbolFailure,
};

// Persistence
pub use persist::{
    read_collection_csv, read_collection_json, read_series_csv, read_series_json, read_symbols,
    write_all_market_files, write_collection, write_collection_with, write_market_file,
    write_series, write_series_with, write_symbols, DumpLayout, MarketDump, OutputFormat,
};

// Provider policies
pub use provider_policy::ProviderPolicy;

// Session
pub use session::{Session, SessionState};

// Source identifiers
pub use source::ProviderId;
