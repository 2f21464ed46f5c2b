use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::codec::{FieldReader, ParseMode};
use crate::data_source::{FetchOutcome, HistorySource, ProviderRequest, SourceError, SourceFuture};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, ReqwestHttpClient, DEFAULT_TIMEOUT_MS};
use crate::{Bar, BarSeries, ProviderId};

const API_BASE_URL: &str = "https://api.tiingo.com";

/// One element of the daily prices array. Only the adjusted fields are read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TiingoPrice {
    date: String,
    adj_open: Option<f64>,
    adj_high: Option<f64>,
    adj_low: Option<f64>,
    adj_close: Option<f64>,
    adj_volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TiingoErrorBody {
    detail: String,
}

/// Daily adjusted prices from the Tiingo REST API.
#[derive(Clone)]
pub struct TiingoAdapter {
    http_client: Arc<dyn HttpClient>,
    token: Option<String>,
    timeout_ms: u64,
}

impl Default for TiingoAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(ReqwestHttpClient::default()),
            token: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl TiingoAdapter {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>, token: Option<String>) -> Self {
        Self {
            http_client,
            token,
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn token(&self) -> Result<&str, SourceError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| SourceError::invalid_request("tiingo requires an API token"))
    }

    async fn fetch_history(&self, request: ProviderRequest) -> Result<FetchOutcome, SourceError> {
        self.policy().ensure_supported(request.period)?;
        let token = self.token()?;

        let url = format!(
            "{API_BASE_URL}/tiingo/daily/{}/prices?startDate={}&endDate={}",
            urlencoding::encode(request.symbol.as_str()),
            request.start.format_date(),
            request.end.format_date()
        );
        debug!(symbol = %request.symbol, "requesting daily prices");

        let http_request = HttpRequest::get(url)
            .with_auth(&HttpAuth::Token(token.to_owned()))
            .with_header("content-type", "application/json")
            .with_timeout_ms(self.timeout_ms);
        let response = self.http_client.execute(http_request).await?;

        if !response.is_success() {
            let context = match serde_json::from_str::<TiingoErrorBody>(&response.body) {
                Ok(body) => format!("tiingo prices ({})", body.detail),
                Err(_) => String::from("tiingo prices"),
            };
            return Err(SourceError::from_status(response.status, &context));
        }

        parse_prices(request.symbol.as_str(), &response.body)
    }
}

impl HistorySource for TiingoAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Tiingo
    }

    fn preflight(&self) -> Result<(), SourceError> {
        self.token().map(|_| ())
    }

    fn fetch<'a>(&'a self, request: ProviderRequest) -> SourceFuture<'a, FetchOutcome> {
        Box::pin(self.fetch_history(request))
    }
}

/// Maps the adjusted fields 1:1 in received order.
pub(crate) fn parse_prices(symbol: &str, body: &str) -> Result<FetchOutcome, SourceError> {
    let prices: Vec<TiingoPrice> = serde_json::from_str(body).map_err(|e| {
        match serde_json::from_str::<TiingoErrorBody>(body) {
            Ok(error) => SourceError::parse(format!("tiingo error: {}", error.detail)),
            Err(_) => SourceError::parse(format!("failed to parse tiingo prices: {e}")),
        }
    })?;

    let mut fields = FieldReader::new(ParseMode::Lenient);
    let mut series = BarSeries::with_capacity(symbol, prices.len());
    for (index, price) in prices.iter().enumerate() {
        fields.set_row(index + 1);
        let day = price.date.get(..10).unwrap_or(price.date.as_str());
        series.bars.push(Bar::new(
            fields.date("date", day)?,
            fields.present("adjOpen", price.adj_open)?,
            fields.present("adjHigh", price.adj_high)?,
            fields.present("adjLow", price.adj_low)?,
            fields.present("adjClose", price.adj_close)?,
            fields.present("adjVolume", price.adj_volume)?,
        ));
    }

    Ok(FetchOutcome::with_diagnostics(series, fields.finish()))
}
