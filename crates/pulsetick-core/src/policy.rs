use std::time::Duration;

use crate::ProviderId;

/// Rate-limit and retry policy for one upstream provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub quota_window: Duration,
    pub quota_limit: u32,
    /// Fixed pacing delay inserted between requests in batch mode.
    pub pacing_delay: Duration,
    pub retry_backoff: BackoffPolicy,
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_retries: u32,
}

impl ProviderPolicy {
    /// Schwab market data: generous per-minute quota, short pacing.
    pub fn schwab_default() -> Self {
        Self {
            provider_id: ProviderId::Schwab,
            quota_window: Duration::from_secs(60),
            quota_limit: 120,
            pacing_delay: Duration::from_millis(100),
            retry_backoff: BackoffPolicy {
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(30),
                multiplier: 2.0,
                max_retries: 3,
            },
        }
    }

    /// Alpha Vantage free tier: 5 requests per minute.
    pub fn alphavantage_default() -> Self {
        Self {
            provider_id: ProviderId::Alphavantage,
            quota_window: Duration::from_secs(60),
            quota_limit: 5,
            pacing_delay: Duration::from_secs(1),
            retry_backoff: BackoffPolicy {
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(60),
                multiplier: 2.0,
                max_retries: 3,
            },
        }
    }

    pub fn default_for(provider_id: ProviderId) -> Option<Self> {
        match provider_id {
            ProviderId::Schwab => Some(Self::schwab_default()),
            ProviderId::Alphavantage => Some(Self::alphavantage_default()),
            ProviderId::Synthetic => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphavantage_policy_matches_free_tier() {
        let policy = ProviderPolicy::alphavantage_default();

        assert_eq!(policy.provider_id, ProviderId::Alphavantage);
        assert_eq!(policy.quota_window, Duration::from_secs(60));
        assert_eq!(policy.quota_limit, 5);
    }

    #[test]
    fn synthetic_source_is_never_throttled() {
        assert!(ProviderPolicy::default_for(ProviderId::Synthetic).is_none());
    }
}
