#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use quotefetch_core::{
    CookieSessionFactory, HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse,
};

/// In-memory transport answering by URL substring, first match wins.
#[derive(Default)]
pub struct ScriptedTransport {
    rules: Vec<(String, Result<HttpResponse, HttpError>)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, pattern: &str, body: &str) -> Self {
        self.rules
            .push((pattern.to_owned(), Ok(HttpResponse::ok(body))));
        self
    }

    pub fn status(mut self, pattern: &str, status: u16) -> Self {
        self.rules
            .push((pattern.to_owned(), Ok(HttpResponse::with_status(status, ""))));
        self
    }

    pub fn fail(mut self, pattern: &str, message: &str) -> Self {
        self.rules
            .push((pattern.to_owned(), Err(HttpError::new(message))));
        self
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("request log should not be poisoned")
            .iter()
            .map(|request| request.url.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request log should not be poisoned")
            .clone()
    }
}

impl HttpClient for ScriptedTransport {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        let response = self
            .rules
            .iter()
            .find(|(pattern, _)| request.url.contains(pattern))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Ok(HttpResponse::with_status(404, "")));
        self.requests
            .lock()
            .expect("request log should not be poisoned")
            .push(request);
        Box::pin(async move { response })
    }
}

/// Every session shares one scripted transport.
pub struct ScriptedSessions {
    pub transport: Arc<ScriptedTransport>,
}

impl CookieSessionFactory for ScriptedSessions {
    fn open_session(&self) -> Result<Arc<dyn HttpClient>, HttpError> {
        Ok(self.transport.clone())
    }
}

pub const PORTAL_CSV: &str = "Date,Open,High,Low,Close,Adj Close,Volume\n\
2017-01-04,11.00,13.00,10.00,12.00,6.00,2000\n\
2017-01-03,10.00,12.00,9.00,11.00,5.50,1000\n";

pub const TIINGO_JSON: &str = r#"[
  {"date":"2017-01-03T00:00:00.000Z","close":11.0,"high":12.0,"low":9.0,"open":10.0,"volume":1000,
   "adjClose":5.5,"adjHigh":6.0,"adjLow":4.5,"adjOpen":5.0,"adjVolume":2000,"divCash":0.0,"splitFactor":1.0},
  {"date":"2017-01-04T00:00:00.000Z","close":12.0,"high":13.0,"low":10.0,"open":11.0,"volume":2000,
   "adjClose":6.0,"adjHigh":6.5,"adjLow":5.0,"adjOpen":5.5,"adjVolume":4000,"divCash":0.0,"splitFactor":1.0}
]"#;

/// Two daily candles, newest first, as `[time, low, high, open, close, volume]`.
pub const CANDLES_JSON: &str =
    "[[1483488000,9.5,13.0,11.0,12.0,20.5],[1483401600,8.5,12.0,10.0,11.0,10.25]]";

/// Transport that serves every provider's canned payload.
pub fn all_providers() -> ScriptedTransport {
    ScriptedTransport::new()
        .respond("/v1/test/getcrumb", "abc123\n")
        .respond("/v7/finance/download/", PORTAL_CSV)
        .respond("https://finance.yahoo.com", "<html>home</html>")
        .respond("/tiingo/daily/", TIINGO_JSON)
        .respond("/candles?", CANDLES_JSON)
}
