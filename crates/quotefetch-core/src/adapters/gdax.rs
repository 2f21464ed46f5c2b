use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::codec::{FieldReader, ParseMode};
use crate::data_source::{FetchOutcome, HistorySource, ProviderRequest, SourceError, SourceFuture};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient, DEFAULT_TIMEOUT_MS};
use crate::{Bar, BarSeries, ProviderId, ProviderPolicy, UtcDateTime};

const API_BASE_URL: &str = "https://api.exchange.coinbase.com";
const DEFAULT_MAX_BARS: u32 = 200;
const CANDLE_FIELDS: usize = 6;

#[derive(Debug, Deserialize)]
struct GdaxErrorBody {
    message: String,
}

/// One request window of the candle pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CandleWindow {
    pub(crate) start: UtcDateTime,
    pub(crate) end: UtcDateTime,
}

/// Lazily splits `[start, end]` into windows of `max_bars * granularity`
/// seconds. Each window starts one granularity step after the previous one
/// ends.
#[derive(Debug, Clone)]
pub(crate) struct CandleWindows {
    next_start: UtcDateTime,
    end: UtcDateTime,
    step: time::Duration,
    span: time::Duration,
}

impl Iterator for CandleWindows {
    type Item = CandleWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_start >= self.end {
            return None;
        }
        let window = CandleWindow {
            start: self.next_start,
            end: self.next_start.saturating_add(self.span).min(self.end),
        };
        self.next_start = window.end.saturating_add(self.step);
        Some(window)
    }
}

pub(crate) fn candle_windows(
    start: UtcDateTime,
    end: UtcDateTime,
    granularity: i64,
    max_bars: u32,
) -> CandleWindows {
    CandleWindows {
        next_start: start,
        end,
        step: time::Duration::seconds(granularity),
        span: time::Duration::seconds(granularity.saturating_mul(i64::from(max_bars))),
    }
}

/// Paginated candles from the GDAX (Coinbase Exchange) API.
#[derive(Clone)]
pub struct GdaxAdapter {
    http_client: Arc<dyn HttpClient>,
    window_pause: Duration,
    timeout_ms: u64,
}

impl Default for GdaxAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(ReqwestHttpClient::default()),
            window_pause: ProviderPolicy::gdax_default().window_pause,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl GdaxAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            ..Self::default()
        }
    }

    /// Pause between consecutive window requests.
    pub fn with_window_pause(mut self, window_pause: Duration) -> Self {
        self.window_pause = window_pause;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    async fn fetch_history(&self, request: ProviderRequest) -> Result<FetchOutcome, SourceError> {
        let policy = self.policy();
        policy.ensure_supported(request.period)?;

        let granularity = request.period.granularity_seconds();
        let max_bars = policy.max_bars_per_request.unwrap_or(DEFAULT_MAX_BARS);
        let windows = candle_windows(request.start, request.end, granularity, max_bars);

        let mut fields = FieldReader::new(ParseMode::Lenient);
        let mut series = BarSeries::new(request.symbol.as_str(), Vec::new());

        for (index, window) in windows.enumerate() {
            if index > 0 && !self.window_pause.is_zero() {
                tokio::time::sleep(self.window_pause).await;
            }

            let url = format!(
                "{API_BASE_URL}/products/{}/candles?start={}&end={}&granularity={granularity}",
                urlencoding::encode(request.symbol.as_str()),
                urlencoding::encode(&window.start.format_rfc3339()),
                urlencoding::encode(&window.end.format_rfc3339()),
            );
            debug!(
                symbol = %request.symbol,
                window = index + 1,
                start = %window.start,
                "requesting candle window"
            );

            let http_request = HttpRequest::get(url).with_timeout_ms(self.timeout_ms);
            let response = self.http_client.execute(http_request).await?;
            if !response.is_success() {
                return Err(SourceError::from_status(response.status, "gdax candles"));
            }

            let candles = parse_candles(&response.body, &mut fields)?;
            append_ascending(&mut series, candles);
        }

        Ok(FetchOutcome::with_diagnostics(series, fields.finish()))
    }
}

impl HistorySource for GdaxAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Gdax
    }

    fn fetch<'a>(&'a self, request: ProviderRequest) -> SourceFuture<'a, FetchOutcome> {
        Box::pin(self.fetch_history(request))
    }
}

/// Parses `[time, low, high, open, close, volume]` tuples and returns them
/// oldest first.
fn parse_candles(body: &str, fields: &mut FieldReader) -> Result<Vec<Bar>, SourceError> {
    let rows: Vec<Vec<Option<f64>>> = serde_json::from_str(body).map_err(|e| {
        match serde_json::from_str::<GdaxErrorBody>(body) {
            Ok(error) => SourceError::parse(format!("gdax error: {}", error.message)),
            Err(_) => SourceError::parse(format!("failed to parse gdax candles: {e}")),
        }
    })?;

    let mut bars = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        if row.len() < CANDLE_FIELDS {
            return Err(SourceError::parse(format!(
                "gdax candle {} has {} fields, expected {CANDLE_FIELDS}",
                index + 1,
                row.len()
            )));
        }
        fields.set_row(index + 1);
        let seconds = fields.present("time", row[0])?;
        let timestamp = fields.unix_seconds("time", seconds)?;
        // [time, low, high, open, close, volume]
        let low = fields.present("low", row[1])?;
        let high = fields.present("high", row[2])?;
        let open = fields.present("open", row[3])?;
        let close = fields.present("close", row[4])?;
        let volume = fields.present("volume", row[5])?;
        bars.push(Bar::new(timestamp, open, high, low, close, volume));
    }
    bars.reverse();
    Ok(bars)
}

/// Appends bars that are strictly later than the current last bar.
fn append_ascending(series: &mut BarSeries, bars: Vec<Bar>) {
    series.bars.reserve(bars.len());
    for bar in bars {
        if series
            .last()
            .is_some_and(|last| bar.timestamp <= last.timestamp)
        {
            continue;
        }
        series.bars.push(bar);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::ScriptedHttpClient;
    use crate::http_client::HttpResponse;
    use crate::{Period, SourceErrorKind, Symbol};

    fn ts(raw: &str) -> UtcDateTime {
        UtcDateTime::parse(raw).expect("valid timestamp")
    }

    fn request(start: &str, end: &str, period: Period) -> ProviderRequest {
        ProviderRequest::new(
            Symbol::parse("BTC-USD").expect("valid symbol"),
            ts(start),
            ts(end),
            period,
            false,
        )
        .expect("valid request")
    }

    #[test]
    fn windows_step_past_previous_end() {
        let windows = candle_windows(
            ts("2018-01-01T00:00:00Z"),
            ts("2018-01-01T10:00:00Z"),
            3_600,
            4,
        );
        let bounds: Vec<(String, String)> = windows
            .map(|w| (w.start.format_minutes(), w.end.format_minutes()))
            .collect();
        assert_eq!(
            bounds,
            vec![
                ("2018-01-01 00:00".to_owned(), "2018-01-01 04:00".to_owned()),
                ("2018-01-01 05:00".to_owned(), "2018-01-01 09:00".to_owned()),
            ]
        );
    }

    #[test]
    fn empty_range_has_no_windows() {
        let at = ts("2018-01-01T00:00:00Z");
        assert_eq!(candle_windows(at, at, 60, 200).count(), 0);
    }

    #[test]
    fn candles_map_low_high_open_close_and_reverse() {
        let mut fields = FieldReader::new(ParseMode::Lenient);
        let body = "[[1514768400,9,12,10,11,5.5],[1514764800,8,11,9,10,4.25]]";
        let bars = parse_candles(body, &mut fields).expect("parse");
        assert_eq!(bars[0].timestamp, ts("2018-01-01T00:00:00Z"));
        assert_eq!(
            (bars[0].open, bars[0].high, bars[0].low, bars[0].close, bars[0].volume),
            (9.0, 11.0, 8.0, 10.0, 4.25)
        );
        assert_eq!(bars[1].close, 11.0);
    }

    #[test]
    fn null_candle_fields_default_with_diagnostics() {
        let mut fields = FieldReader::new(ParseMode::Lenient);
        let bars = parse_candles("[[1514764800,8,11,9,null,4.25]]", &mut fields).expect("parse");
        assert_eq!(bars[0].close, 0.0);
        let issues = fields.finish();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].column, "close");
    }

    #[test]
    fn error_message_payload_is_parse_error() {
        let mut fields = FieldReader::new(ParseMode::Lenient);
        let err = parse_candles(r#"{"message":"NotFound"}"#, &mut fields).expect_err("object");
        assert_eq!(err.kind(), SourceErrorKind::Parse);
        assert!(err.message().contains("NotFound"));
    }

    #[tokio::test]
    async fn paginates_and_drops_duplicate_boundaries() {
        // 2018-01-01T00:00Z = 1514764800; 200 daily bars per window.
        let day = 86_400;
        let base = 1_514_764_800_i64;
        let first: Vec<String> = (0..3)
            .rev()
            .map(|i| format!("[{},1,1,1,{},1]", base + i * day, i))
            .collect();
        let second: Vec<String> = (2..4)
            .rev()
            .map(|i| format!("[{},1,1,1,{},1]", base + (200 + i) * day, 200 + i))
            .chain(std::iter::once(format!("[{},1,1,1,2,1]", base + 2 * day)))
            .collect();

        let client = Arc::new(
            ScriptedHttpClient::new()
                .respond(
                    "start=2018-01-01T00%3A00%3A00Z",
                    HttpResponse::ok(format!("[{}]", first.join(","))),
                )
                .respond(
                    "start=2018-07-21T00%3A00%3A00Z",
                    HttpResponse::ok(format!("[{}]", second.join(","))),
                ),
        );
        let adapter =
            GdaxAdapter::with_http_client(client.clone()).with_window_pause(Duration::ZERO);

        let outcome = adapter
            .fetch(request("2018-01-01T00:00:00Z", "2018-09-01T00:00:00Z", Period::Daily))
            .await
            .expect("fetch");

        let urls = client.recorded_urls();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].starts_with(
            "https://api.exchange.coinbase.com/products/BTC-USD/candles?start=2018-01-01T00%3A00%3A00Z&end=2018-07-20T00%3A00%3A00Z&granularity=86400"
        ));

        let closes: Vec<f64> = outcome.series.bars.iter().map(|bar| bar.close).collect();
        assert_eq!(closes, vec![0.0, 1.0, 2.0, 202.0, 203.0]);
        assert!(outcome.series.is_chronological());
    }

    #[tokio::test]
    async fn failed_window_aborts_fetch() {
        let client = Arc::new(
            ScriptedHttpClient::new().respond("/candles", HttpResponse::with_status(500, "")),
        );
        let adapter = GdaxAdapter::with_http_client(client).with_window_pause(Duration::ZERO);

        let err = adapter
            .fetch(request("2018-01-01T00:00:00Z", "2018-01-02T00:00:00Z", Period::Min60))
            .await
            .expect_err("status 500");
        assert_eq!(err.kind(), SourceErrorKind::Unavailable);
        assert!(err.retryable());
    }

    #[tokio::test]
    async fn minute_candles_over_centuries_fail_on_first_window() {
        let client = Arc::new(
            ScriptedHttpClient::new().respond("/candles", HttpResponse::with_status(500, "")),
        );
        let adapter =
            GdaxAdapter::with_http_client(client.clone()).with_window_pause(Duration::ZERO);

        let err = adapter
            .fetch(request("0001-01-01T00:00:00Z", "2026-01-01T00:00:00Z", Period::Min1))
            .await
            .expect_err("status 500");
        assert_eq!(err.kind(), SourceErrorKind::Unavailable);
        assert_eq!(client.recorded_urls().len(), 1);
    }

    #[test]
    fn windows_are_generated_on_demand() {
        let mut windows = candle_windows(
            ts("0001-01-01T00:00:00Z"),
            ts("2026-01-01T00:00:00Z"),
            60,
            300,
        );
        let first = windows.next().expect("first window");
        assert_eq!(first.start, ts("0001-01-01T00:00:00Z"));
        assert_eq!(first.end, ts("0001-01-01T05:00:00Z"));
        let second = windows.next().expect("second window");
        assert_eq!(second.start, ts("0001-01-01T05:01:00Z"));
    }

    #[tokio::test]
    async fn monthly_is_not_supported() {
        let client = Arc::new(ScriptedHttpClient::new());
        let adapter = GdaxAdapter::with_http_client(client.clone());

        let err = adapter
            .fetch(request("2018-01-01T00:00:00Z", "2018-06-01T00:00:00Z", Period::Monthly))
            .await
            .expect_err("monthly");
        assert_eq!(err.kind(), SourceErrorKind::InvalidRequest);
        assert!(client.recorded_requests().is_empty());
    }
}
