use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::codec::{FieldReader, ParseMode};
use crate::data_source::{FetchOutcome, HistorySource, ProviderRequest, SourceError, SourceFuture};
use crate::http_client::{CookieSessionFactory, ReqwestSessionFactory, DEFAULT_TIMEOUT_MS};
use crate::session::Session;
use crate::{Bar, BarSeries, ProviderId};

const DOWNLOAD_BASE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/download";
/// `Date,Open,High,Low,Close,Adj Close,Volume`
const DOWNLOAD_COLUMNS: usize = 7;

/// Daily history from the finance portal's CSV download endpoint.
///
/// Every fetch opens its own cookie-jar session and performs the crumb
/// handshake before downloading.
#[derive(Clone)]
pub struct YahooAdapter {
    sessions: Arc<dyn CookieSessionFactory>,
    timeout_ms: u64,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self {
            sessions: Arc::new(ReqwestSessionFactory::default()),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl YahooAdapter {
    pub fn with_session_factory(sessions: Arc<dyn CookieSessionFactory>) -> Self {
        Self {
            sessions,
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn download_url(request: &ProviderRequest, crumb: &str) -> String {
        format!(
            "{DOWNLOAD_BASE_URL}/{}?period1={}&period2={}&interval=1d&events=history&crumb={}",
            urlencoding::encode(request.symbol.as_str()),
            request.start.unix_timestamp(),
            request.end.unix_timestamp(),
            urlencoding::encode(crumb)
        )
    }

    async fn fetch_history(&self, request: ProviderRequest) -> Result<FetchOutcome, SourceError> {
        self.policy().ensure_supported(request.period)?;

        let session = Session::open(self.sessions.as_ref(), self.timeout_ms).await?;
        let crumb = session
            .crumb()
            .ok_or_else(|| SourceError::unauthenticated("portal session has no crumb"))?;
        let url = Self::download_url(&request, crumb);

        debug!(symbol = %request.symbol, "downloading daily history");
        let response = session.get(&url).await?;
        if !response.is_success() {
            return Err(SourceError::from_status(response.status, "yahoo download"));
        }
        if response.looks_like_html() {
            return Err(SourceError::parse(
                "yahoo download returned an HTML page instead of CSV",
            ));
        }

        parse_download(request.symbol.as_str(), &response.body, request.adjust_prices)
    }
}

impl HistorySource for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn fetch<'a>(&'a self, request: ProviderRequest) -> SourceFuture<'a, FetchOutcome> {
        Box::pin(self.fetch_history(request))
    }
}

/// Parses the download CSV.
///
/// With `adjust_prices` the close is replaced by the adjusted close and the
/// other prices are left raw. Without it, open/high/low are scaled by
/// `close / adj_close` and the raw close is kept.
pub(crate) fn parse_download(
    symbol: &str,
    body: &str,
    adjust_prices: bool,
) -> Result<FetchOutcome, SourceError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut records: Vec<(usize, StringRecord)> = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| SourceError::parse(format!("yahoo csv error: {e}")))?;
        if index == 0 && record.get(0).is_some_and(|f| f.trim().eq_ignore_ascii_case("date")) {
            continue;
        }
        if record.len() != DOWNLOAD_COLUMNS {
            return Err(SourceError::parse(format!(
                "yahoo row {} has {} columns, expected {DOWNLOAD_COLUMNS}",
                index + 1,
                record.len()
            )));
        }
        records.push((index + 1, record));
    }

    let mut fields = FieldReader::new(ParseMode::Lenient);
    let mut series = BarSeries::with_capacity(symbol, records.len());
    for (row, record) in &records {
        fields.set_row(*row);
        let date = fields.date("date", &record[0])?;
        let open = fields.number("open", &record[1])?;
        let high = fields.number("high", &record[2])?;
        let low = fields.number("low", &record[3])?;
        let close = fields.number("close", &record[4])?;
        let adj_close = fields.number("adj_close", &record[5])?;
        let volume = fields.number("volume", &record[6])?;

        let bar = if adjust_prices {
            Bar::new(date, open, high, low, adj_close, volume)
        } else {
            let ratio = if adj_close == 0.0 { 1.0 } else { close / adj_close };
            Bar::new(date, open * ratio, high * ratio, low * ratio, close, volume)
        };
        series.bars.push(bar);
    }

    let descending = matches!(
        (series.bars.first(), series.bars.last()),
        (Some(first), Some(last)) if first.timestamp > last.timestamp
    );
    if descending {
        series.bars.reverse();
    }

    Ok(FetchOutcome::with_diagnostics(series, fields.finish()))
}
