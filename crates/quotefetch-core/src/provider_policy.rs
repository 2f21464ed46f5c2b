use std::time::Duration;

use crate::{Period, ProviderId, SourceError};

/// Static capability entry for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub supported_periods: &'static [Period],
    /// Upper bound on bars returned by a single upstream request, if any.
    pub max_bars_per_request: Option<u32>,
    /// Pause between consecutive paginated requests.
    pub window_pause: Duration,
    pub requires_token: bool,
}

impl ProviderPolicy {
    pub fn yahoo_default() -> Self {
        Self {
            provider_id: ProviderId::Yahoo,
            supported_periods: &[Period::Daily],
            max_bars_per_request: None,
            window_pause: Duration::ZERO,
            requires_token: false,
        }
    }

    pub fn tiingo_default() -> Self {
        Self {
            provider_id: ProviderId::Tiingo,
            supported_periods: &[Period::Daily],
            max_bars_per_request: None,
            window_pause: Duration::ZERO,
            requires_token: true,
        }
    }

    pub fn gdax_default() -> Self {
        Self {
            provider_id: ProviderId::Gdax,
            supported_periods: &[
                Period::Min1,
                Period::Min5,
                Period::Min15,
                Period::Min30,
                Period::Min60,
                Period::Daily,
                Period::Weekly,
            ],
            max_bars_per_request: Some(200),
            window_pause: Duration::from_secs(1),
            requires_token: false,
        }
    }

    pub fn default_for(provider_id: ProviderId) -> Self {
        match provider_id {
            ProviderId::Yahoo => Self::yahoo_default(),
            ProviderId::Tiingo => Self::tiingo_default(),
            ProviderId::Gdax => Self::gdax_default(),
        }
    }

    pub fn supports(&self, period: Period) -> bool {
        self.supported_periods.contains(&period)
    }

    /// Rejects a period before any network traffic.
    pub fn ensure_supported(&self, period: Period) -> Result<(), SourceError> {
        if self.supports(period) {
            return Ok(());
        }
        let supported = self
            .supported_periods
            .iter()
            .map(|period| period.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Err(SourceError::invalid_request(format!(
            "period '{period}' is not supported by {} (supported: {supported})",
            self.provider_id
        )))
    }
}
