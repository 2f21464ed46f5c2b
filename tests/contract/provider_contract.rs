#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use quotefetch_core::{
    GdaxAdapter, HistorySource, Period, ProviderId, ProviderRequest, SourceErrorKind, Symbol,
    TiingoAdapter, UtcDateTime, YahooAdapter,
};

use support::{all_providers, ScriptedSessions, ScriptedTransport};

#[derive(Clone)]
struct ProviderCase {
    id: ProviderId,
    source: Arc<dyn HistorySource>,
    symbol: &'static str,
    unsupported: Period,
}

fn provider_cases(transport: Arc<ScriptedTransport>) -> Vec<ProviderCase> {
    vec![
        ProviderCase {
            id: ProviderId::Yahoo,
            source: Arc::new(YahooAdapter::with_session_factory(Arc::new(
                ScriptedSessions {
                    transport: transport.clone(),
                },
            ))),
            symbol: "spy",
            unsupported: Period::Min5,
        },
        ProviderCase {
            id: ProviderId::Tiingo,
            source: Arc::new(TiingoAdapter::with_http_client(
                transport.clone(),
                Some(String::from("secret-token")),
            )),
            symbol: "spy",
            unsupported: Period::Weekly,
        },
        ProviderCase {
            id: ProviderId::Gdax,
            source: Arc::new(
                GdaxAdapter::with_http_client(transport).with_window_pause(Duration::ZERO),
            ),
            symbol: "BTC-USD",
            unsupported: Period::Monthly,
        },
    ]
}

fn request(symbol: &str, period: Period) -> ProviderRequest {
    ProviderRequest::new(
        Symbol::parse(symbol).expect("valid symbol"),
        UtcDateTime::parse_date("2017-01-01").expect("date"),
        UtcDateTime::parse_date("2017-01-31").expect("date"),
        period,
        true,
    )
    .expect("valid request")
}

#[tokio::test]
async fn every_provider_returns_ascending_series_for_requested_symbol() {
    let transport = Arc::new(all_providers());

    for case in provider_cases(transport) {
        assert_eq!(case.source.id(), case.id);
        let outcome = case
            .source
            .fetch(request(case.symbol, Period::Daily))
            .await
            .unwrap_or_else(|error| panic!("provider '{}' fetch failed: {error}", case.id));

        assert_eq!(outcome.series.symbol, case.symbol, "provider '{}': symbol", case.id);
        assert_eq!(outcome.series.len(), 2, "provider '{}': bar count", case.id);
        assert!(
            outcome.series.is_chronological(),
            "provider '{}': bars must ascend",
            case.id
        );
        assert!(
            outcome.diagnostics.is_empty(),
            "provider '{}': clean payload",
            case.id
        );
        assert_eq!(
            outcome.series.bars[0].timestamp.format_date(),
            "2017-01-03",
            "provider '{}': first day",
            case.id
        );
    }
}

#[tokio::test]
async fn unsupported_period_is_rejected_before_any_request() {
    let case_count = provider_cases(Arc::new(all_providers())).len();

    for index in 0..case_count {
        let transport = Arc::new(all_providers());
        let case = provider_cases(transport.clone()).swap_remove(index);

        let error = case
            .source
            .fetch(request(case.symbol, case.unsupported))
            .await
            .expect_err("period must be rejected");
        assert_eq!(
            error.kind(),
            SourceErrorKind::InvalidRequest,
            "provider '{}'",
            case.id
        );
        assert!(
            transport.urls().is_empty(),
            "provider '{}': no network call",
            case.id
        );
    }
}

#[tokio::test]
async fn upstream_outage_maps_to_unavailable() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .respond("/v1/test/getcrumb", "abc123")
            .respond("https://finance.yahoo.com", "<html>home</html>")
            .status("/v7/finance/download/", 503)
            .status("/tiingo/daily/", 503)
            .fail("/candles?", "connection reset"),
    );

    for case in provider_cases(transport) {
        let error = case
            .source
            .fetch(request(case.symbol, Period::Daily))
            .await
            .expect_err("outage must fail");
        assert_eq!(
            error.kind(),
            SourceErrorKind::Unavailable,
            "provider '{}'",
            case.id
        );
        assert!(error.retryable(), "provider '{}': retryable", case.id);
    }
}

#[tokio::test]
async fn tiingo_requires_token_before_network() {
    let transport = Arc::new(all_providers());
    let adapter = TiingoAdapter::with_http_client(transport.clone(), None);

    let error = adapter.preflight().expect_err("token required");
    assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
    assert!(transport.urls().is_empty());
}

#[tokio::test]
async fn tiingo_sends_token_header_and_date_bounds() {
    let transport = Arc::new(all_providers());
    let adapter =
        TiingoAdapter::with_http_client(transport.clone(), Some(String::from("secret-token")));

    let outcome = adapter
        .fetch(request("spy", Period::Daily))
        .await
        .expect("fetch succeeds");
    assert_eq!(outcome.series.bars[0].close, 5.5);
    assert_eq!(outcome.series.bars[1].volume, 4000.0);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .url
        .ends_with("/tiingo/daily/spy/prices?startDate=2017-01-01&endDate=2017-01-31"));
    assert_eq!(
        requests[0].headers.get("authorization").map(String::as_str),
        Some("Token secret-token")
    );
}
