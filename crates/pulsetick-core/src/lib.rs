//! # Pulsetick Core
//!
//! Core contracts and market-data plumbing for the pulsetick scalping
//! engine.
//!
//! ## Overview
//!
//! This crate provides the data-acquisition half of the system:
//!
//! - **Canonical domain models** for quotes and candle series
//! - **Provider identifiers** and the `MarketDataSource` capability
//! - **Rate-limited fetching** with token buckets, retry, and pacing
//! - **Single-flight TTL caching** for deduplicated upstream access
//! - **Source chain** fallback with a flagged synthetic last resort
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Schwab, Alpha Vantage, Synthetic) |
//! | [`cache`] | Single-flight TTL cache |
//! | [`chain`] | Source fallback chain |
//! | [`data_source`] | Data source trait and request types |
//! | [`domain`] | Domain models (Quote, Candle, CandleSeries) |
//! | [`error`] | Core error types |
//! | [`fetcher`] | Rate-limited fetch decorator |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`policy`] | Per-provider quota/backoff policies |
//! | [`retry`] | Retry backoff strategies |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Token-bucket rate limiting |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pulsetick_core::{CandlesRequest, Interval, SourceChainBuilder, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let chain = SourceChainBuilder::new().with_env_credentials().build();
//!
//!     let req = CandlesRequest::new(Symbol::parse("SPY")?, Interval::OneMinute, 60)?;
//!     let outcome = chain.fetch_candles(&req).await?;
//!
//!     println!(
//!         "{} candles from {} (degraded: {})",
//!         outcome.data.len(),
//!         outcome.selected_source,
//!         outcome.degraded
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Source calls return structured [`SourceError`]s classified by kind;
//! `RateLimited` and transient failures are retryable and drive chain
//! fallback, `NotFound`/`InvalidRequest` are not.

pub mod adapters;
pub mod cache;
pub mod chain;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod policy;
pub mod retry;
pub mod source;
pub mod throttling;

// Adapter implementations
pub use adapters::{AlphaVantageAdapter, SchwabAdapter, SyntheticSource};

// Caching
pub use cache::{CacheMode, CachedValue, FailurePolicy, SingleFlightCache};

// Chain types
pub use chain::{ChainAttempt, ChainOutcome, SourceChain, SourceChainBuilder, SourceSnapshot};

// Data source trait and types
pub use data_source::{
    CandlesRequest, CapabilitySet, Endpoint, HealthState, HealthStatus, MarketDataSource,
    QuoteRequest, SourceError, SourceErrorKind,
};

// Domain models
pub use domain::{Candle, CandleSeries, Interval, Quote, Symbol, UtcDateTime};

// Error types
pub use error::{CoreError, ValidationError};

// Fetching
pub use fetcher::{BlockingMode, RateLimitedFetcher, SourceMetrics};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient,
};

// Provider policies
pub use policy::{BackoffPolicy, ProviderPolicy};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Source identifiers
pub use source::ProviderId;

// Throttling
pub use throttling::ThrottleQueue;
