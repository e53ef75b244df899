// Shared imports for the behavioral test suite.
pub use pulsetick_core::{
    adapters::{AlphaVantageAdapter, SchwabAdapter, SyntheticSource},
    cache::{CacheMode, FailurePolicy, SingleFlightCache},
    data_source::{
        CandlesRequest, CapabilitySet, HealthStatus, MarketDataSource, QuoteRequest, SourceError,
        SourceErrorKind,
    },
    chain::SourceChain,
    Interval, ProviderId, Symbol,
};
pub use std::sync::Arc;
