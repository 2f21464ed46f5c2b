use std::sync::Arc;

use csv::ReaderBuilder;
use regex::Regex;
use tracing::{debug, info};

use crate::data_source::{SourceError, SourceFuture, SymbolDirectory};
use crate::ftp::{AnonymousFtp, FileRetriever, DEFAULT_FTP_PORT};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient, DEFAULT_TIMEOUT_MS};
use crate::{Market, ScreenerFilter};

pub const ETF_FTP_HOST: &str = "ftp.nasdaqtrader.com";
pub const ETF_DIRECTORY: &str = "symboldirectory";
pub const ETF_FILE: &str = "otherlisted.txt";

const SCREENER_BASE_URL: &str = "http://www.nasdaq.com/screening";
const TICKER_PATTERN: &str = "^[a-z]+$";

// `Market::ALL` lists the FTP-served `Etf` first.
static ALL_MARKETS: [Market; 22] = Market::ALL;

/// ETF symbols from the Nasdaq Trader `otherlisted.txt` directory file.
#[derive(Clone)]
pub struct EtfDirectory {
    retriever: Arc<dyn FileRetriever>,
}

impl Default for EtfDirectory {
    fn default() -> Self {
        Self {
            retriever: Arc::new(AnonymousFtp::new(ETF_FTP_HOST, DEFAULT_FTP_PORT)),
        }
    }
}

impl EtfDirectory {
    pub fn with_retriever(retriever: Arc<dyn FileRetriever>) -> Self {
        Self { retriever }
    }

    pub async fn symbols(&self) -> Result<Vec<String>, SourceError> {
        let raw = self.retriever.retrieve(ETF_DIRECTORY, ETF_FILE).await?;
        let symbols = parse_etf_listing(&String::from_utf8_lossy(&raw));
        info!(count = symbols.len(), "loaded etf directory");
        Ok(symbols)
    }
}

impl SymbolDirectory for EtfDirectory {
    fn markets(&self) -> &'static [Market] {
        &[Market::Etf]
    }

    fn list<'a>(&'a self, market: Market) -> SourceFuture<'a, Vec<String>> {
        Box::pin(async move {
            if market != Market::Etf {
                return Err(unsupported_market(market, "etf directory"));
            }
            self.symbols().await
        })
    }
}

/// Pipe-delimited rows with ETF = `Y` (column 5) and test issue = `N`
/// (column 7). Symbols are lower-cased and sorted.
pub fn parse_etf_listing(text: &str) -> Vec<String> {
    let mut symbols: Vec<String> = text
        .lines()
        .filter_map(|line| {
            let columns: Vec<&str> = line.trim_end_matches('\r').split('|').collect();
            (columns.len() > 6 && columns[4] == "Y" && columns[6] == "N")
                .then(|| columns[0].to_ascii_lowercase())
        })
        .collect();
    symbols.sort();
    symbols
}

/// Exchange, market-cap and sector listings from the Nasdaq screener download.
#[derive(Clone)]
pub struct NasdaqListingAdapter {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl Default for NasdaqListingAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(ReqwestHttpClient::default()),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl NasdaqListingAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn listing_url(market: Market) -> Option<String> {
        let url = match market.screener_filter()? {
            ScreenerFilter::Exchange(exchange) => format!(
                "{SCREENER_BASE_URL}/companies-by-name.aspx?letter=0&exchange={exchange}&render=download"
            ),
            ScreenerFilter::MarketCap(cap) => format!(
                "{SCREENER_BASE_URL}/companies-by-industry.aspx?marketcap={cap}&render=download"
            ),
            ScreenerFilter::Industry(industry) => format!(
                "{SCREENER_BASE_URL}/companies-by-industry.aspx?industry={industry}&render=download"
            ),
        };
        Some(url)
    }

    async fn download(&self, market: Market) -> Result<Vec<String>, SourceError> {
        let url = Self::listing_url(market)
            .ok_or_else(|| unsupported_market(market, "nasdaq screener"))?;
        debug!(%market, "downloading market listing");

        let request = HttpRequest::get(url).with_timeout_ms(self.timeout_ms);
        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(SourceError::from_status(response.status, "nasdaq screener"));
        }
        let symbols = parse_market_listing(&response.body)?;
        info!(%market, count = symbols.len(), "loaded market listing");
        Ok(symbols)
    }
}

impl SymbolDirectory for NasdaqListingAdapter {
    fn markets(&self) -> &'static [Market] {
        &ALL_MARKETS[1..]
    }

    fn list<'a>(&'a self, market: Market) -> SourceFuture<'a, Vec<String>> {
        Box::pin(self.download(market))
    }
}

/// Skips the header, keeps first-column tickers made only of letters after
/// trimming and lower-casing, and sorts them.
pub fn parse_market_listing(body: &str) -> Result<Vec<String>, SourceError> {
    let pattern = Regex::new(TICKER_PATTERN)
        .map_err(|e| SourceError::internal(format!("invalid ticker pattern: {e}")))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut symbols = Vec::new();
    for result in reader.records() {
        let record =
            result.map_err(|e| SourceError::parse(format!("nasdaq listing csv error: {e}")))?;
        let Some(first) = record.get(0) else {
            continue;
        };
        let symbol = first.trim().to_ascii_lowercase();
        if pattern.is_match(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols.sort();
    Ok(symbols)
}

/// Routes each [`Market`] to the directory that can list it.
#[derive(Clone)]
pub struct MarketDirectory {
    etf: Arc<dyn SymbolDirectory>,
    listings: Arc<dyn SymbolDirectory>,
}

impl Default for MarketDirectory {
    fn default() -> Self {
        Self {
            etf: Arc::new(EtfDirectory::default()),
            listings: Arc::new(NasdaqListingAdapter::default()),
        }
    }
}

impl MarketDirectory {
    pub fn new(etf: Arc<dyn SymbolDirectory>, listings: Arc<dyn SymbolDirectory>) -> Self {
        Self { etf, listings }
    }

    fn route(&self, market: Market) -> &dyn SymbolDirectory {
        if market == Market::Etf {
            self.etf.as_ref()
        } else {
            self.listings.as_ref()
        }
    }
}

impl SymbolDirectory for MarketDirectory {
    fn markets(&self) -> &'static [Market] {
        &ALL_MARKETS
    }

    fn list<'a>(&'a self, market: Market) -> SourceFuture<'a, Vec<String>> {
        self.route(market).list(market)
    }
}

fn unsupported_market(market: Market, directory: &str) -> SourceError {
    SourceError::invalid_request(format!("market '{market}' is not served by the {directory}"))
}
