//! Ordered source fallback with a synthetic last resort.
//!
//! The chain tries each registered [`MarketDataSource`] in priority order,
//! skipping sources whose health check reports them unusable, and returns
//! the first success. When every real source fails it falls back to the
//! deterministic synthetic generator and tags the outcome `degraded` so
//! downstream consumers can surface the reduced data quality. Data is never
//! fabricated without that flag.

use std::env;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use crate::adapters::{AlphaVantageAdapter, SchwabAdapter, SyntheticSource};
use crate::data_source::{
    CandlesRequest, CapabilitySet, Endpoint, HealthState, HealthStatus, MarketDataSource,
    QuoteRequest, SourceError,
};
use crate::fetcher::{BlockingMode, RateLimitedFetcher};
use crate::http_client::ReqwestHttpClient;
use crate::policy::ProviderPolicy;
use crate::retry::RetryConfig;
use crate::{CandleSeries, ProviderId, Quote};

/// One failed attempt recorded while walking the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainAttempt {
    pub provider: ProviderId,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ChainAttempt {
    fn from_error(provider: ProviderId, error: &SourceError) -> Self {
        Self {
            provider,
            code: error.code(),
            message: error.message().to_owned(),
            retryable: error.retryable(),
        }
    }
}

/// Successful chain fetch with provenance metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome<T> {
    pub data: T,
    pub selected_source: ProviderId,
    /// True when the payload came from the synthetic fallback rather than a
    /// live provider.
    pub degraded: bool,
    /// Providers attempted, in order, including the one that succeeded.
    pub source_chain: Vec<ProviderId>,
    pub errors: Vec<ChainAttempt>,
    pub latency_ms: u64,
}

/// Capability/health snapshot for one registered source.
#[derive(Debug, Clone, Copy)]
pub struct SourceSnapshot {
    pub id: ProviderId,
    pub capabilities: CapabilitySet,
    pub health: HealthStatus,
}

impl SourceSnapshot {
    pub fn status_label(self) -> &'static str {
        if !self.health.rate_available {
            return "rate_limited";
        }
        match self.health.state {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

type InvokeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Ordered list of sources plus the synthetic fallback.
pub struct SourceChain {
    sources: Vec<Arc<dyn MarketDataSource>>,
    fallback: Arc<dyn MarketDataSource>,
}

impl Default for SourceChain {
    fn default() -> Self {
        SourceChainBuilder::new().build()
    }
}

impl SourceChain {
    pub fn new(sources: Vec<Arc<dyn MarketDataSource>>) -> Self {
        Self {
            sources,
            fallback: Arc::new(SyntheticSource),
        }
    }

    pub async fn fetch_quote(&self, req: &QuoteRequest) -> Result<ChainOutcome<Quote>, SourceError> {
        let req = req.clone();
        self.walk(Endpoint::Quote, move |source| {
            source.fetch_quote(req.clone())
        })
        .await
    }

    pub async fn fetch_candles(
        &self,
        req: &CandlesRequest,
    ) -> Result<ChainOutcome<CandleSeries>, SourceError> {
        let req = req.clone();
        self.walk(Endpoint::Candles, move |source| {
            source.fetch_candles(req.clone())
        })
        .await
    }

    /// Snapshots for the `sources` command, fallback included.
    pub async fn snapshots(&self) -> Vec<SourceSnapshot> {
        let mut out = Vec::with_capacity(self.sources.len() + 1);
        for source in self.sources.iter().chain(std::iter::once(&self.fallback)) {
            out.push(SourceSnapshot {
                id: source.id(),
                capabilities: source.capabilities(),
                health: source.health().await,
            });
        }
        out
    }

    async fn walk<T, F>(&self, endpoint: Endpoint, mut invoke: F) -> Result<ChainOutcome<T>, SourceError>
    where
        F: for<'a> FnMut(&'a dyn MarketDataSource) -> InvokeFuture<'a, T>,
    {
        let started = Instant::now();
        let mut source_chain = Vec::with_capacity(self.sources.len() + 1);
        let mut errors = Vec::new();

        for source in &self.sources {
            let provider = source.id();

            if !source.capabilities().supports(endpoint) {
                errors.push(ChainAttempt::from_error(
                    provider,
                    &SourceError::unsupported_endpoint(endpoint),
                ));
                continue;
            }

            let health = source.health().await;
            if health.state == HealthState::Unhealthy {
                errors.push(ChainAttempt::from_error(
                    provider,
                    &SourceError::unavailable("source health check reported unhealthy"),
                ));
                continue;
            }
            if !health.rate_available {
                errors.push(ChainAttempt::from_error(
                    provider,
                    &SourceError::rate_limited("source has no rate budget available"),
                ));
                continue;
            }

            source_chain.push(provider);
            match invoke(source.as_ref()).await {
                Ok(data) => {
                    return Ok(ChainOutcome {
                        data,
                        selected_source: provider,
                        degraded: false,
                        source_chain,
                        errors,
                        latency_ms: elapsed_ms(started),
                    });
                }
                Err(error) => {
                    errors.push(ChainAttempt::from_error(provider, &error));
                }
            }
        }

        // Every real source failed or was skipped: deterministic synthetic
        // data, explicitly flagged.
        tracing::warn!(
            endpoint = endpoint.as_str(),
            attempts = errors.len(),
            "all live sources failed, serving synthetic data"
        );

        source_chain.push(self.fallback.id());
        let data = invoke(self.fallback.as_ref()).await?;

        Ok(ChainOutcome {
            data,
            selected_source: self.fallback.id(),
            degraded: true,
            source_chain,
            errors,
            latency_ms: elapsed_ms(started),
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

/// Builder assembling the chain from configured credentials.
///
/// # Environment Variables
///
/// | Provider | Primary Env Var | Fallback Env Var |
/// |----------|-----------------|------------------|
/// | Schwab | `PULSETICK_SCHWAB_BEARER_TOKEN` | `SCHWAB_BEARER_TOKEN` |
/// | Alpha Vantage | `PULSETICK_ALPHAVANTAGE_API_KEY` | `ALPHAVANTAGE_API_KEY` |
///
/// Providers without credentials fall back to mock mode (deterministic
/// offline data); `with_mock_mode` forces it for all of them.
#[derive(Debug, Default)]
pub struct SourceChainBuilder {
    use_mock: bool,
    schwab_token: Option<String>,
    alphavantage_key: Option<String>,
    blocking: Option<BlockingMode>,
    quota_overrides: Vec<(ProviderId, u32)>,
}

impl SourceChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// All adapters use deterministic offline data.
    pub fn with_mock_mode(mut self) -> Self {
        self.use_mock = true;
        self
    }

    /// Read provider credentials from the environment.
    pub fn with_env_credentials(mut self) -> Self {
        self.schwab_token = env::var("PULSETICK_SCHWAB_BEARER_TOKEN")
            .or_else(|_| env::var("SCHWAB_BEARER_TOKEN"))
            .ok();
        self.alphavantage_key = env::var("PULSETICK_ALPHAVANTAGE_API_KEY")
            .or_else(|_| env::var("ALPHAVANTAGE_API_KEY"))
            .ok();
        self
    }

    pub fn with_schwab_token(mut self, token: impl Into<String>) -> Self {
        self.schwab_token = Some(token.into());
        self
    }

    pub fn with_alphavantage_key(mut self, key: impl Into<String>) -> Self {
        self.alphavantage_key = Some(key.into());
        self
    }

    /// Behavior of the rate limiter wrappers when a bucket is empty.
    pub fn with_blocking_mode(mut self, blocking: BlockingMode) -> Self {
        self.blocking = Some(blocking);
        self
    }

    /// Override a provider's per-minute request quota (configuration
    /// surface; the built-in policy applies otherwise).
    pub fn with_quota_per_minute(mut self, provider: ProviderId, quota: u32) -> Self {
        self.quota_overrides.push((provider, quota));
        self
    }

    fn wrap(&self, source: Arc<dyn MarketDataSource>, blocking: BlockingMode) -> Arc<dyn MarketDataSource> {
        let Some(mut policy) = ProviderPolicy::default_for(source.id()) else {
            return source;
        };
        if let Some((_, quota)) = self
            .quota_overrides
            .iter()
            .find(|(provider, _)| *provider == source.id())
        {
            policy.quota_limit = (*quota).max(1);
        }
        Arc::new(RateLimitedFetcher::new(
            source,
            &policy,
            RetryConfig::default(),
            blocking,
        ))
    }

    pub fn build(self) -> SourceChain {
        let blocking = self.blocking.unwrap_or(BlockingMode::Fail);

        let schwab: Arc<dyn MarketDataSource> = if !self.use_mock {
            if let Some(token) = &self.schwab_token {
                Arc::new(SchwabAdapter::with_http_client(
                    Arc::new(ReqwestHttpClient::new()),
                    token.clone(),
                ))
            } else {
                Arc::new(SchwabAdapter::default())
            }
        } else {
            Arc::new(SchwabAdapter::default())
        };

        let alphavantage: Arc<dyn MarketDataSource> = if !self.use_mock {
            if let Some(key) = &self.alphavantage_key {
                Arc::new(AlphaVantageAdapter::with_http_client(
                    Arc::new(ReqwestHttpClient::new()),
                    key.clone(),
                ))
            } else {
                Arc::new(AlphaVantageAdapter::default())
            }
        } else {
            Arc::new(AlphaVantageAdapter::default())
        };

        SourceChain::new(vec![
            self.wrap(schwab, blocking),
            self.wrap(alphavantage, blocking),
        ])
    }
}
