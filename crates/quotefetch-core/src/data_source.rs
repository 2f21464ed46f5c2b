//! History-source contract and the request/response types around it.
//!
//! | Type | Role |
//! |------|------|
//! | [`ProviderRequest`] | One symbol over a date range |
//! | [`BatchRequest`] | Many symbols sharing range, period and adjustment |
//! | [`FetchOutcome`] | Series plus defaulted-field diagnostics |
//! | [`HistorySource`] | Adapter trait for bar providers |
//! | [`SymbolDirectory`] | Adapter trait for symbol listings |
//! | [`SourceError`] | Structured adapter error |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::codec::{CodecError, FieldIssue};
use crate::ftp::FtpError;
use crate::http_client::HttpError;
use crate::{BarSeries, Market, Period, ProviderId, ProviderPolicy, Symbol, UtcDateTime};
use crate::ValidationError;

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Rejected before any network call.
    InvalidRequest,
    /// Session or credential handshake failed.
    Unauthenticated,
    /// Network failure or non-success status.
    Unavailable,
    /// Payload did not have the expected shape.
    Parse,
    Internal,
}

/// Structured source error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unauthenticated,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Parse,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    /// Maps a non-success HTTP status.
    pub fn from_status(status: u16, context: &str) -> Self {
        let mut error = Self::unavailable(format!("{context} returned status {status}"));
        error.retryable = status == 429 || status >= 500;
        error
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Hint for callers that schedule their own re-runs. Fetches are never
    /// retried inside this crate.
    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Unauthenticated => "source.unauthenticated",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::Parse => "source.parse",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<ValidationError> for SourceError {
    fn from(error: ValidationError) -> Self {
        Self::invalid_request(error.to_string())
    }
}

impl From<CodecError> for SourceError {
    fn from(error: CodecError) -> Self {
        Self::parse(error.to_string())
    }
}

impl From<HttpError> for SourceError {
    fn from(error: HttpError) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: error.message().to_owned(),
            retryable: error.retryable(),
        }
    }
}

impl From<FtpError> for SourceError {
    fn from(error: FtpError) -> Self {
        Self::unavailable(error.to_string())
    }
}

/// One symbol over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub symbol: Symbol,
    pub start: UtcDateTime,
    pub end: UtcDateTime,
    pub period: Period,
    pub adjust_prices: bool,
}

impl ProviderRequest {
    pub fn new(
        symbol: Symbol,
        start: UtcDateTime,
        end: UtcDateTime,
        period: Period,
        adjust_prices: bool,
    ) -> Result<Self, ValidationError> {
        ensure_ordered(start, end)?;
        Ok(Self {
            symbol,
            start,
            end,
            period,
            adjust_prices,
        })
    }
}

/// Many symbols sharing range, period and adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub symbols: Vec<Symbol>,
    pub start: UtcDateTime,
    pub end: UtcDateTime,
    pub period: Period,
    pub adjust_prices: bool,
}

impl BatchRequest {
    pub fn new(
        symbols: Vec<Symbol>,
        start: UtcDateTime,
        end: UtcDateTime,
        period: Period,
        adjust_prices: bool,
    ) -> Result<Self, ValidationError> {
        if symbols.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        ensure_ordered(start, end)?;
        Ok(Self {
            symbols,
            start,
            end,
            period,
            adjust_prices,
        })
    }

    /// Parses raw tickers (e.g. from a symbols file) into a batch.
    pub fn from_tickers<S: AsRef<str>>(
        tickers: &[S],
        start: UtcDateTime,
        end: UtcDateTime,
        period: Period,
        adjust_prices: bool,
    ) -> Result<Self, ValidationError> {
        let symbols = tickers
            .iter()
            .map(|ticker| Symbol::parse(ticker.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(symbols, start, end, period, adjust_prices)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// One request per symbol, in input order.
    pub fn requests(&self) -> impl Iterator<Item = ProviderRequest> + '_ {
        self.symbols.iter().map(|symbol| ProviderRequest {
            symbol: symbol.clone(),
            start: self.start,
            end: self.end,
            period: self.period,
            adjust_prices: self.adjust_prices,
        })
    }
}

fn ensure_ordered(start: UtcDateTime, end: UtcDateTime) -> Result<(), ValidationError> {
    if start > end {
        return Err(ValidationError::InvertedRange {
            start: start.format_rfc3339(),
            end: end.format_rfc3339(),
        });
    }
    Ok(())
}

/// Series returned by an adapter with the fields it had to default.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub series: BarSeries,
    pub diagnostics: Vec<FieldIssue>,
}

impl FetchOutcome {
    pub fn new(series: BarSeries) -> Self {
        Self {
            series,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostics(series: BarSeries, diagnostics: Vec<FieldIssue>) -> Self {
        Self {
            series,
            diagnostics,
        }
    }
}

/// Bar-history adapter contract.
///
/// | Method | Description |
/// |--------|-------------|
/// | [`id`](HistorySource::id) | Provider identifier |
/// | [`policy`](HistorySource::policy) | Capability entry used for period checks |
/// | [`preflight`](HistorySource::preflight) | Request-independent checks, e.g. a missing token |
/// | [`fetch`](HistorySource::fetch) | Retrieve one symbol's bars |
///
/// Implementations check the period against their policy and fail with
/// [`SourceErrorKind::InvalidRequest`] before touching the network. Returned
/// series are strictly ascending.
pub trait HistorySource: Send + Sync {
    fn id(&self) -> ProviderId;

    fn policy(&self) -> ProviderPolicy {
        ProviderPolicy::default_for(self.id())
    }

    fn preflight(&self) -> Result<(), SourceError> {
        Ok(())
    }

    fn fetch<'a>(&'a self, request: ProviderRequest) -> SourceFuture<'a, FetchOutcome>;
}

/// Symbol-listing adapter contract.
pub trait SymbolDirectory: Send + Sync {
    /// Markets this directory can list.
    fn markets(&self) -> &'static [Market];

    /// Lower-cased, sorted tickers for `market`.
    fn list<'a>(&'a self, market: Market) -> SourceFuture<'a, Vec<String>>;
}
