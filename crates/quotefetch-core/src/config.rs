use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::adapters::{
    EtfDirectory, GdaxAdapter, MarketDirectory, NasdaqListingAdapter, TiingoAdapter, YahooAdapter,
};
use crate::codec::ParseMode;
use crate::data_source::HistorySource;
use crate::http_client::{
    HttpClient, ReqwestHttpClient, ReqwestSessionFactory, BROWSER_USER_AGENT, DEFAULT_TIMEOUT_MS,
};
use crate::orchestrator::{Orchestrator, RequestPacing, DEFAULT_DELAY};
use crate::{ProviderId, ProviderPolicy};

/// Runtime settings shared by every adapter and orchestrator.
///
/// # Environment Variables
///
/// | Setting | Primary Env Var | Fallback Env Var |
/// |---------|-----------------|------------------|
/// | Inter-symbol delay (ms) | `QUOTEFETCH_DELAY_MS` | - |
/// | Candle window pause (ms) | `QUOTEFETCH_WINDOW_PAUSE_MS` | - |
/// | Request timeout (ms) | `QUOTEFETCH_TIMEOUT_MS` | - |
/// | Tiingo token | `QUOTEFETCH_TIINGO_TOKEN` | `TIINGO_API_TOKEN` |
/// | Strict parsing | `QUOTEFETCH_STRICT` | - |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub delay: Duration,
    pub window_pause: Duration,
    pub timeout_ms: u64,
    pub tiingo_token: Option<String>,
    pub user_agent: String,
    pub parse_mode: ParseMode,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            window_pause: ProviderPolicy::gdax_default().window_pause,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            tiingo_token: None,
            user_agent: String::from(BROWSER_USER_AGENT),
            parse_mode: ParseMode::Lenient,
        }
    }
}

impl FetchConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Unparseable values
    /// are logged and replaced by the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |name: &str, fallback: Duration| {
            read_millis(&lookup, name).map_or(fallback, Duration::from_millis)
        };

        let tiingo_token = lookup("QUOTEFETCH_TIINGO_TOKEN")
            .or_else(|| lookup("TIINGO_API_TOKEN"))
            .map(|token| token.trim().to_owned())
            .filter(|token| !token.is_empty());

        let strict = lookup("QUOTEFETCH_STRICT").map(|value| value.trim().to_ascii_lowercase());
        let parse_mode = match strict.as_deref() {
            Some("1" | "true" | "yes") => ParseMode::Strict,
            _ => ParseMode::Lenient,
        };

        Self {
            delay: millis("QUOTEFETCH_DELAY_MS", defaults.delay),
            window_pause: millis("QUOTEFETCH_WINDOW_PAUSE_MS", defaults.window_pause),
            timeout_ms: read_millis(&lookup, "QUOTEFETCH_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
            tiingo_token,
            user_agent: defaults.user_agent,
            parse_mode,
        }
    }

    pub fn with_tiingo_token(mut self, token: impl Into<String>) -> Self {
        self.tiingo_token = Some(token.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }
}

fn read_millis<F>(lookup: &F, name: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring non-numeric setting");
            None
        }
    }
}

/// History adapters keyed by provider, plus the symbol directory.
///
/// Every orchestrator handed out shares the registry's [`RequestPacing`].
pub struct SourceRegistry {
    adapters: HashMap<ProviderId, Arc<dyn HistorySource>>,
    directory: MarketDirectory,
    pacing: RequestPacing,
    parse_mode: ParseMode,
}

impl SourceRegistry {
    pub fn new(adapters: Vec<Arc<dyn HistorySource>>, directory: MarketDirectory) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.id(), adapter))
            .collect();
        Self {
            adapters,
            directory,
            pacing: RequestPacing::default(),
            parse_mode: ParseMode::Lenient,
        }
    }

    /// Real-transport adapters for every [`ProviderId`].
    pub fn from_config(config: &FetchConfig) -> Self {
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new(&config.user_agent));
        let sessions = Arc::new(ReqwestSessionFactory::new(
            config.user_agent.clone(),
            config.timeout_ms,
        ));

        let adapters: Vec<Arc<dyn HistorySource>> = vec![
            Arc::new(YahooAdapter::with_session_factory(sessions).with_timeout_ms(config.timeout_ms)),
            Arc::new(
                TiingoAdapter::with_http_client(http.clone(), config.tiingo_token.clone())
                    .with_timeout_ms(config.timeout_ms),
            ),
            Arc::new(
                GdaxAdapter::with_http_client(http.clone())
                    .with_window_pause(config.window_pause)
                    .with_timeout_ms(config.timeout_ms),
            ),
        ];
        let directory = MarketDirectory::new(
            Arc::new(EtfDirectory::default()),
            Arc::new(NasdaqListingAdapter::with_http_client(http).with_timeout_ms(config.timeout_ms)),
        );

        let mut registry = Self::new(adapters, directory);
        registry.pacing.set_delay(config.delay);
        registry.parse_mode = config.parse_mode;
        registry
    }

    pub fn get(&self, provider: ProviderId) -> Option<Arc<dyn HistorySource>> {
        self.adapters.get(&provider).cloned()
    }

    pub fn providers(&self) -> Vec<ProviderId> {
        let mut providers: Vec<ProviderId> = self.adapters.keys().copied().collect();
        providers.sort_by_key(|provider| provider.as_str());
        providers
    }

    pub fn orchestrator(&self, provider: ProviderId) -> Option<Orchestrator> {
        self.get(provider).map(|source| {
            Orchestrator::new(source)
                .with_pacing(self.pacing.clone())
                .with_parse_mode(self.parse_mode)
        })
    }

    pub fn directory(&self) -> &MarketDirectory {
        &self.directory
    }

    pub fn pacing(&self) -> &RequestPacing {
        &self.pacing
    }
}
