//! Cookie and crumb handshake for the finance portal.
//!
//! A [`Session`] starts `Unauthenticated`. [`Session::authenticate`] loads the
//! portal home page so the cookie jar receives its session cookies, then asks
//! the crumb endpoint for the anti-forgery token that download URLs must
//! carry. One attempt, no retry.

use std::sync::Arc;

use csv::ReaderBuilder;
use tracing::debug;

use crate::data_source::SourceError;
use crate::http_client::{CookieSessionFactory, HttpClient, HttpRequest, HttpResponse};

pub const PORTAL_HOME_URL: &str = "https://finance.yahoo.com";
pub const CRUMB_URL: &str = "https://query1.finance.yahoo.com/v1/test/getcrumb";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated { crumb: String },
}

/// Portal session owning a cookie-jar client.
pub struct Session {
    client: Arc<dyn HttpClient>,
    state: SessionState,
    timeout_ms: u64,
}

impl Session {
    pub fn new(client: Arc<dyn HttpClient>, timeout_ms: u64) -> Self {
        Self {
            client,
            state: SessionState::Unauthenticated,
            timeout_ms,
        }
    }

    /// Opens a fresh cookie jar and authenticates it.
    pub async fn open(
        factory: &dyn CookieSessionFactory,
        timeout_ms: u64,
    ) -> Result<Self, SourceError> {
        let client = factory.open_session().map_err(|error| {
            SourceError::unauthenticated(format!("failed to open portal session: {error}"))
        })?;
        let mut session = Self::new(client, timeout_ms);
        session.authenticate().await?;
        Ok(session)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    pub fn crumb(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { crumb } => Some(crumb),
            SessionState::Unauthenticated => None,
        }
    }

    /// Runs the home-page and crumb requests. The state only changes on success.
    pub async fn authenticate(&mut self) -> Result<(), SourceError> {
        debug!(url = PORTAL_HOME_URL, "opening portal session");
        self.handshake_get(PORTAL_HOME_URL, "portal home page").await?;

        debug!(url = CRUMB_URL, "requesting crumb");
        let response = self.handshake_get(CRUMB_URL, "crumb endpoint").await?;
        if response.looks_like_html() {
            return Err(SourceError::unauthenticated(
                "crumb endpoint returned an HTML page",
            ));
        }
        if response.body.to_ascii_lowercase().contains("too many requests") {
            return Err(SourceError::unauthenticated(
                "crumb endpoint is rate limiting this client",
            ));
        }

        let crumb = parse_crumb(&response.body)
            .ok_or_else(|| SourceError::unauthenticated("crumb endpoint returned an empty crumb"))?;
        self.state = SessionState::Authenticated { crumb };
        Ok(())
    }

    /// GET through the session's cookie jar. Requires an authenticated session.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, SourceError> {
        if !self.is_authenticated() {
            return Err(SourceError::unauthenticated(
                "portal session is not authenticated",
            ));
        }
        let request = HttpRequest::get(url)
            .with_header("referer", PORTAL_HOME_URL)
            .with_timeout_ms(self.timeout_ms);
        Ok(self.client.execute(request).await?)
    }

    async fn handshake_get(&self, url: &str, what: &str) -> Result<HttpResponse, SourceError> {
        let request = HttpRequest::get(url).with_timeout_ms(self.timeout_ms);
        let response = self.client.execute(request).await.map_err(|error| {
            SourceError::unauthenticated(format!("{what} request failed: {}", error.message()))
        })?;
        if !response.is_success() {
            return Err(SourceError::unauthenticated(format!(
                "{what} returned status {}",
                response.status
            )));
        }
        Ok(response)
    }
}

/// First field of the first CSV record, trimmed.
pub(crate) fn parse_crumb(body: &str) -> Option<String> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());
    let record = reader.records().next()?.ok()?;
    let crumb = record.get(0)?.trim();
    (!crumb.is_empty()).then(|| crumb.to_owned())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::http_client::{HttpError, HttpFuture};
    use crate::SourceErrorKind;

    struct CannedClient {
        responses: Mutex<Vec<Result<HttpResponse, HttpError>>>,
        urls: Mutex<Vec<String>>,
    }

    impl CannedClient {
        fn new(mut responses: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                urls: Mutex::new(Vec::new()),
            })
        }
    }

    impl HttpClient for CannedClient {
        fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
            self.urls.lock().expect("lock").push(request.url);
            let next = self
                .responses
                .lock()
                .expect("lock")
                .pop()
                .unwrap_or_else(|| Err(HttpError::new("no canned response")));
            Box::pin(async move { next })
        }
    }

    #[test]
    fn crumb_is_first_csv_field() {
        assert_eq!(parse_crumb("AbC/dEf1\n").as_deref(), Some("AbC/dEf1"));
        assert_eq!(parse_crumb("\"quoted,crumb\",x").as_deref(), Some("quoted,crumb"));
        assert_eq!(parse_crumb(""), None);
        assert_eq!(parse_crumb("   \n"), None);
    }

    #[tokio::test]
    async fn authenticate_stores_crumb() {
        let client = CannedClient::new(vec![
            Ok(HttpResponse::ok("<html>home</html>")),
            Ok(HttpResponse::ok("crumb123\n")),
        ]);
        let mut session = Session::new(client.clone(), 1_000);

        session.authenticate().await.expect("handshake succeeds");

        assert_eq!(session.crumb(), Some("crumb123"));
        assert_eq!(
            *client.urls.lock().expect("lock"),
            vec![PORTAL_HOME_URL.to_owned(), CRUMB_URL.to_owned()]
        );
    }

    #[tokio::test]
    async fn html_crumb_keeps_session_unauthenticated() {
        let client = CannedClient::new(vec![
            Ok(HttpResponse::ok("home")),
            Ok(HttpResponse::ok("<!DOCTYPE html><html>consent</html>")),
        ]);
        let mut session = Session::new(client, 1_000);

        let err = session.authenticate().await.expect_err("html body");
        assert_eq!(err.kind(), SourceErrorKind::Unauthenticated);
        assert_eq!(session.state(), &SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn failed_home_page_stops_handshake() {
        let client = CannedClient::new(vec![Ok(HttpResponse::with_status(503, ""))]);
        let mut session = Session::new(client.clone(), 1_000);

        let err = session.authenticate().await.expect_err("status 503");
        assert_eq!(err.kind(), SourceErrorKind::Unauthenticated);
        assert_eq!(client.urls.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn get_requires_authentication() {
        let client = CannedClient::new(Vec::new());
        let session = Session::new(client.clone(), 1_000);

        let err = session.get("https://example.test/data").await.expect_err("no crumb");
        assert_eq!(err.kind(), SourceErrorKind::Unauthenticated);
        assert!(client.urls.lock().expect("lock").is_empty());
    }
}
