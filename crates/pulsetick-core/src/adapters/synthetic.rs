//! Deterministically seeded synthetic market data.
//!
//! Last-resort source used when every real provider has failed. The chain
//! tags anything served from here as degraded; this module never does so
//! itself because the generator is also reused by adapter mock modes.

use std::future::Future;
use std::pin::Pin;

use crate::data_source::{
    CandlesRequest, CapabilitySet, HealthStatus, MarketDataSource, QuoteRequest, SourceError,
};
use crate::{Candle, CandleSeries, Interval, ProviderId, Quote, Symbol, UtcDateTime};

/// Seed derived from symbol and interval so repeated calls replay the same
/// walk (FNV-1a over the key string).
pub fn seed_for(symbol: &Symbol, interval: Interval) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in symbol.as_str().bytes().chain(interval.as_str().bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x100_0000_01b3);
    }
    hash
}

/// Generate `limit` coherent OHLCV candles ending at `anchor`, bucketed by
/// `interval`, from a seeded random walk.
pub fn generate_candles(
    symbol: &Symbol,
    interval: Interval,
    limit: usize,
    anchor: UtcDateTime,
) -> Result<Vec<Candle>, SourceError> {
    let seed = seed_for(symbol, interval);
    let mut rng = fastrand::Rng::with_seed(seed);

    let base_price = 25.0 + (seed % 475) as f64;
    let bucket_secs = interval.bucket().as_secs() as i64;
    let anchor_secs = anchor.unix_timestamp() / bucket_secs * bucket_secs;

    let mut close = base_price;
    let mut candles = Vec::with_capacity(limit);

    for index in 0..limit {
        let offset = (limit - index) as i64;
        let ts = UtcDateTime::from_unix_timestamp(anchor_secs - offset * bucket_secs)
            .map_err(|e| SourceError::internal(e.to_string()))?;

        let drift = (rng.f64() - 0.5) * 0.008;
        let open = close;
        close = (open * (1.0 + drift)).max(1.0);

        let wick = open.max(close) * (0.0005 + rng.f64() * 0.002);
        let high = open.max(close) + wick;
        let low = (open.min(close) - wick).max(0.5);
        let volume = 50_000 + rng.u64(0..450_000);

        let candle = Candle::new(ts, open, high, low, close, volume)
            .map_err(|e| SourceError::internal(e.to_string()))?;
        candles.push(candle);
    }

    Ok(candles)
}

/// Synthetic quote consistent with the candle walk for the same symbol.
pub fn generate_quote(symbol: &Symbol, as_of: UtcDateTime) -> Result<Quote, SourceError> {
    let candles = generate_candles(symbol, Interval::OneMinute, 2, as_of)?;
    let last = candles
        .last()
        .ok_or_else(|| SourceError::internal("synthetic walk produced no candles"))?;

    let spread = last.close * 0.0004;
    Quote::new(
        symbol.clone(),
        last.close,
        Some(last.close - spread),
        Some(last.close + spread),
        Some(last.volume),
        as_of,
    )
    .map_err(|e| SourceError::internal(e.to_string()))
}

/// Always-available generator source.
#[derive(Debug, Default)]
pub struct SyntheticSource;

impl MarketDataSource for SyntheticSource {
    fn id(&self) -> ProviderId {
        ProviderId::Synthetic
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn fetch_quote<'a>(
        &'a self,
        req: QuoteRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Quote, SourceError>> + Send + 'a>> {
        Box::pin(async move { generate_quote(&req.symbol, UtcDateTime::now()) })
    }

    fn fetch_candles<'a>(
        &'a self,
        req: CandlesRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CandleSeries, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let candles =
                generate_candles(&req.symbol, req.interval, req.limit, UtcDateTime::now())?;
            CandleSeries::new(req.symbol, req.interval, candles)
                .map_err(|e| SourceError::internal(e.to_string()))
        })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move { HealthStatus::healthy() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_is_deterministic_per_symbol_and_interval() {
        let symbol = Symbol::parse("TSLA").expect("symbol");
        let anchor = UtcDateTime::parse("2024-06-03T15:00:00Z").expect("timestamp");

        let first = generate_candles(&symbol, Interval::OneMinute, 30, anchor).expect("candles");
        let second = generate_candles(&symbol, Interval::OneMinute, 30, anchor).expect("candles");

        assert_eq!(first, second);
    }

    #[test]
    fn different_symbols_produce_different_walks() {
        let anchor = UtcDateTime::parse("2024-06-03T15:00:00Z").expect("timestamp");
        let tsla = generate_candles(
            &Symbol::parse("TSLA").expect("symbol"),
            Interval::OneMinute,
            10,
            anchor,
        )
        .expect("candles");
        let nvda = generate_candles(
            &Symbol::parse("NVDA").expect("symbol"),
            Interval::OneMinute,
            10,
            anchor,
        )
        .expect("candles");

        assert_ne!(tsla, nvda);
    }

    #[tokio::test]
    async fn series_passes_domain_validation() {
        let source = SyntheticSource;
        let symbol = Symbol::parse("QQQ").expect("symbol");
        let req = CandlesRequest::new(symbol, Interval::FiveMinutes, 50).expect("request");

        let series = source.fetch_candles(req).await.expect("candles");
        assert_eq!(series.len(), 50);
    }
}
