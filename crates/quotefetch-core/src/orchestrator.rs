//! Single-symbol and batch acquisition over one [`HistorySource`].
//!
//! Batches run sequentially. A failing symbol is logged and recorded in the
//! [`BatchReport`]; the remaining symbols still run. Successive fetches are
//! separated by the current [`RequestPacing`] delay.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::codec::{FieldIssue, ParseMode};
use crate::data_source::{
    BatchRequest, FetchOutcome, HistorySource, ProviderRequest, SourceError,
};
use crate::SeriesCollection;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

/// Shared delay between successive symbol fetches.
///
/// Clones share one value; a change is seen by the next batch iteration.
#[derive(Debug, Clone)]
pub struct RequestPacing {
    delay_ms: Arc<AtomicU64>,
}

impl RequestPacing {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay_ms: Arc::new(AtomicU64::new(duration_millis(delay))),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.load(Ordering::Relaxed))
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(duration_millis(delay), Ordering::Relaxed);
    }
}

impl Default for RequestPacing {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

fn duration_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: SourceError,
}

/// Fields defaulted while decoding one symbol's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolDiagnostics {
    pub symbol: String,
    pub issues: Vec<FieldIssue>,
}

/// Outcome of a batch: successful series in request order plus what failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub series: SeriesCollection,
    pub failures: Vec<SymbolFailure>,
    pub diagnostics: Vec<SymbolDiagnostics>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_symbols(&self) -> Vec<&str> {
        self.failures
            .iter()
            .map(|failure| failure.symbol.as_str())
            .collect()
    }
}

pub struct Orchestrator {
    source: Arc<dyn HistorySource>,
    pacing: RequestPacing,
    parse_mode: ParseMode,
}

impl Orchestrator {
    pub fn new(source: Arc<dyn HistorySource>) -> Self {
        Self {
            source,
            pacing: RequestPacing::default(),
            parse_mode: ParseMode::Lenient,
        }
    }

    pub fn with_pacing(mut self, pacing: RequestPacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// `Strict` turns a fetch that defaulted any field into a parse failure.
    pub fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    pub fn pacing(&self) -> &RequestPacing {
        &self.pacing
    }

    pub fn source(&self) -> &dyn HistorySource {
        self.source.as_ref()
    }

    pub async fn fetch(&self, request: ProviderRequest) -> Result<FetchOutcome, SourceError> {
        self.source.policy().ensure_supported(request.period)?;
        self.source.preflight()?;
        self.fetch_one(request).await
    }

    /// Fetches every symbol in order. Only request-independent problems
    /// (unsupported period, failed preflight) abort the batch.
    pub async fn fetch_batch(&self, batch: BatchRequest) -> Result<BatchReport, SourceError> {
        self.source.policy().ensure_supported(batch.period)?;
        self.source.preflight()?;

        let provider = self.source.id();
        let total = batch.len();
        let mut report = BatchReport::default();

        for (index, request) in batch.requests().enumerate() {
            if index > 0 {
                let delay = self.pacing.delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let symbol = request.symbol.to_string();
            debug!(%provider, %symbol, position = index + 1, total, "fetching symbol");
            match self.fetch_one(request).await {
                Ok(outcome) => {
                    if !outcome.diagnostics.is_empty() {
                        report.diagnostics.push(SymbolDiagnostics {
                            symbol: symbol.clone(),
                            issues: outcome.diagnostics,
                        });
                    }
                    report.series.push(outcome.series);
                }
                Err(error) => {
                    warn!(
                        %provider,
                        %symbol,
                        code = error.code(),
                        retryable = error.retryable(),
                        error = %error.message(),
                        "symbol fetch failed"
                    );
                    report.failures.push(SymbolFailure { symbol, error });
                }
            }
        }

        info!(
            %provider,
            fetched = report.series.len(),
            failed = report.failures.len(),
            "batch complete"
        );
        Ok(report)
    }

    async fn fetch_one(&self, request: ProviderRequest) -> Result<FetchOutcome, SourceError> {
        let outcome = self.source.fetch(request).await?;
        if self.parse_mode.is_strict() {
            if let Some(issue) = outcome.diagnostics.first() {
                return Err(SourceError::parse(format!(
                    "{}: row {} column '{}' has unparseable value '{}'",
                    outcome.series.symbol, issue.row, issue.column, issue.raw
                )));
            }
        }
        Ok(outcome)
    }
}
