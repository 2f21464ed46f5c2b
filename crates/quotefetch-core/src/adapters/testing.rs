use std::sync::{Arc, Mutex};

use crate::http_client::{
    CookieSessionFactory, HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse,
};

/// Transport that answers by URL substring and records every request.
#[derive(Debug, Default)]
pub(crate) struct ScriptedHttpClient {
    once: Mutex<Vec<(String, Result<HttpResponse, HttpError>)>>,
    always: Vec<(String, Result<HttpResponse, HttpError>)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(mut self, pattern: &str, response: HttpResponse) -> Self {
        self.always.push((pattern.to_owned(), Ok(response)));
        self
    }

    pub(crate) fn fail(mut self, pattern: &str, error: HttpError) -> Self {
        self.always.push((pattern.to_owned(), Err(error)));
        self
    }

    /// Answers the first matching request only; checked before `respond` rules.
    pub(crate) fn respond_once(self, pattern: &str, response: HttpResponse) -> Self {
        self.once
            .lock()
            .expect("rule store should not be poisoned")
            .push((pattern.to_owned(), Ok(response)));
        self
    }

    pub(crate) fn recorded_requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .clone()
    }

    pub(crate) fn recorded_urls(&self) -> Vec<String> {
        self.recorded_requests()
            .into_iter()
            .map(|request| request.url)
            .collect()
    }

    fn answer(&self, url: &str) -> Result<HttpResponse, HttpError> {
        let mut once = self.once.lock().expect("rule store should not be poisoned");
        if let Some(index) = once.iter().position(|(pattern, _)| url.contains(pattern)) {
            return once.remove(index).1;
        }
        self.always
            .iter()
            .find(|(pattern, _)| url.contains(pattern))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Ok(HttpResponse::with_status(404, "")))
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        let response = self.answer(&request.url);
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .push(request);
        Box::pin(async move { response })
    }
}

/// Hands out the same scripted client for every session.
pub(crate) struct SharedSessionFactory {
    pub(crate) client: Arc<ScriptedHttpClient>,
    pub(crate) opened: Mutex<usize>,
}

impl SharedSessionFactory {
    pub(crate) fn new(client: Arc<ScriptedHttpClient>) -> Self {
        Self {
            client,
            opened: Mutex::new(0),
        }
    }

    pub(crate) fn sessions_opened(&self) -> usize {
        *self.opened.lock().expect("counter should not be poisoned")
    }
}

impl CookieSessionFactory for SharedSessionFactory {
    fn open_session(&self) -> Result<Arc<dyn HttpClient>, HttpError> {
        *self.opened.lock().expect("counter should not be poisoned") += 1;
        Ok(self.client.clone())
    }
}
