//! Schwab market data adapter (primary source).
//!
//! Wraps the Schwab `marketdata/v1` quote and price-history endpoints.
//! Session/OAuth bootstrapping is an external collaborator; the adapter only
//! consumes an already-issued bearer token. Without a real client it serves
//! deterministic sample data from the synthetic walk.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::synthetic;
use crate::data_source::{
    CandlesRequest, CapabilitySet, HealthState, HealthStatus, MarketDataSource, QuoteRequest,
    SourceError,
};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, NoopHttpClient};
use crate::{Candle, CandleSeries, Interval, ProviderId, Quote, UtcDateTime};

const BASE_URL: &str = "https://api.schwabapi.com/marketdata/v1";

/// Schwab adapter supporting both real API calls and mock mode.
#[derive(Clone)]
pub struct SchwabAdapter {
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
    use_real_api: bool,
}

impl Default for SchwabAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            auth: HttpAuth::None,
            use_real_api: false,
        }
    }
}

impl SchwabAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>, bearer_token: String) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            auth: HttpAuth::BearerToken(bearer_token),
            use_real_api,
        }
    }

    async fn fetch_real_quote(&self, req: &QuoteRequest) -> Result<Quote, SourceError> {
        let url = format!(
            "{BASE_URL}/{}/quotes?fields=quote",
            urlencoding::encode(req.symbol.as_str())
        );
        let request = HttpRequest::get(url)
            .with_auth(&self.auth)
            .with_timeout_ms(5_000);

        let body = self.transport(request).await?;
        let parsed: SchwabQuoteResponse = serde_json::from_str(&body)
            .map_err(|e| SourceError::unavailable(format!("malformed schwab quote payload: {e}")))?;

        let entry = parsed
            .symbols
            .get(req.symbol.as_str())
            .ok_or_else(|| SourceError::not_found(&req.symbol))?;

        let as_of = UtcDateTime::from_unix_timestamp(entry.quote.quote_time / 1_000)
            .unwrap_or_else(|_| UtcDateTime::now());

        Quote::new(
            req.symbol.clone(),
            entry.quote.last_price,
            entry.quote.bid_price,
            entry.quote.ask_price,
            entry.quote.total_volume,
            as_of,
        )
        .map_err(|e| SourceError::unavailable(format!("invalid schwab quote fields: {e}")))
    }

    async fn fetch_real_candles(&self, req: &CandlesRequest) -> Result<CandleSeries, SourceError> {
        let (frequency_type, frequency) = frequency_params(req.interval);
        let url = format!(
            "{BASE_URL}/pricehistory?symbol={}&frequencyType={frequency_type}&frequency={frequency}&needExtendedHoursData=false",
            urlencoding::encode(req.symbol.as_str())
        );
        let request = HttpRequest::get(url)
            .with_auth(&self.auth)
            .with_timeout_ms(8_000);

        let body = self.transport(request).await?;
        let parsed: SchwabPriceHistory = serde_json::from_str(&body).map_err(|e| {
            SourceError::unavailable(format!("malformed schwab pricehistory payload: {e}"))
        })?;

        if parsed.empty.unwrap_or(false) || parsed.candles.is_empty() {
            return Err(SourceError::not_found(&req.symbol));
        }

        let mut candles = Vec::with_capacity(parsed.candles.len().min(req.limit));
        let start = parsed.candles.len().saturating_sub(req.limit);
        for raw in &parsed.candles[start..] {
            let ts = UtcDateTime::from_unix_timestamp(raw.datetime / 1_000)
                .map_err(|e| SourceError::unavailable(e.to_string()))?;
            let candle = Candle::new(ts, raw.open, raw.high, raw.low, raw.close, raw.volume)
                .map_err(|e| {
                    SourceError::unavailable(format!("invalid schwab candle fields: {e}"))
                })?;
            candles.push(candle);
        }

        CandleSeries::new(req.symbol.clone(), req.interval, candles)
            .map_err(|e| SourceError::unavailable(format!("unordered schwab candles: {e}")))
    }

    async fn transport(&self, request: HttpRequest) -> Result<String, SourceError> {
        let response = self.http_client.execute(request).await.map_err(|e| {
            if e.timed_out() {
                SourceError::timeout(format!("schwab transport timeout: {}", e.message()))
            } else {
                SourceError::unavailable(format!("schwab transport error: {}", e.message()))
            }
        })?;

        match response.status {
            status if response.is_success() => Ok(response.body),
            401 | 403 => Err(SourceError::unavailable(
                "schwab rejected credentials; token refresh is handled upstream",
            )),
            429 => Err(SourceError::rate_limited("schwab returned 429")),
            status => Err(SourceError::unavailable(format!(
                "schwab returned status {status}"
            ))),
        }
    }
}

fn frequency_params(interval: Interval) -> (&'static str, u8) {
    match interval {
        Interval::OneMinute => ("minute", 1),
        Interval::FiveMinutes => ("minute", 5),
        Interval::FifteenMinutes => ("minute", 15),
        Interval::OneHour => ("minute", 30),
        Interval::OneDay => ("daily", 1),
    }
}

impl MarketDataSource for SchwabAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Schwab
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn fetch_quote<'a>(
        &'a self,
        req: QuoteRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Quote, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if self.use_real_api {
                return self.fetch_real_quote(&req).await;
            }
            synthetic::generate_quote(&req.symbol, UtcDateTime::now())
        })
    }

    fn fetch_candles<'a>(
        &'a self,
        req: CandlesRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CandleSeries, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if self.use_real_api {
                return self.fetch_real_candles(&req).await;
            }
            let candles =
                synthetic::generate_candles(&req.symbol, req.interval, req.limit, UtcDateTime::now())?;
            CandleSeries::new(req.symbol, req.interval, candles)
                .map_err(|e| SourceError::internal(e.to_string()))
        })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move { HealthStatus::new(HealthState::Healthy, true) })
    }
}

#[derive(Debug, Deserialize)]
struct SchwabQuoteResponse {
    #[serde(flatten)]
    symbols: std::collections::HashMap<String, SchwabQuoteEntry>,
}

#[derive(Debug, Deserialize)]
struct SchwabQuoteEntry {
    quote: SchwabQuoteFields,
}

#[derive(Debug, Deserialize)]
struct SchwabQuoteFields {
    #[serde(rename = "lastPrice")]
    last_price: f64,
    #[serde(rename = "bidPrice")]
    bid_price: Option<f64>,
    #[serde(rename = "askPrice")]
    ask_price: Option<f64>,
    #[serde(rename = "totalVolume")]
    total_volume: Option<u64>,
    #[serde(rename = "quoteTime", default)]
    quote_time: i64,
}

#[derive(Debug, Deserialize)]
struct SchwabPriceHistory {
    #[serde(default)]
    candles: Vec<SchwabCandle>,
    empty: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SchwabCandle {
    datetime: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Symbol;

    #[tokio::test]
    async fn mock_mode_serves_deterministic_candles() {
        let adapter = SchwabAdapter::default();
        let symbol = Symbol::parse("SPY").expect("symbol");
        let req = CandlesRequest::new(symbol, Interval::OneMinute, 30).expect("request");

        let first = adapter.fetch_candles(req.clone()).await.expect("candles");
        let second = adapter.fetch_candles(req).await.expect("candles");

        assert_eq!(first.len(), 30);
        // Walks share a seed; only the anchor timestamp can differ.
        assert_eq!(
            first.candles()[0].close,
            second.candles()[0].close
        );
    }

    #[test]
    fn parses_quote_payload() {
        let body = r#"{
            "SPY": {
                "quote": {
                    "lastPrice": 512.34,
                    "bidPrice": 512.30,
                    "askPrice": 512.38,
                    "totalVolume": 54321000,
                    "quoteTime": 1717426200000
                }
            }
        }"#;

        let parsed: SchwabQuoteResponse = serde_json::from_str(body).expect("must parse");
        let entry = parsed.symbols.get("SPY").expect("symbol present");
        assert_eq!(entry.quote.last_price, 512.34);
        assert_eq!(entry.quote.total_volume, Some(54_321_000));
    }

    #[test]
    fn hourly_interval_maps_to_thirty_minute_frequency() {
        // Schwab has no native 1h frequency; 30m is the coarsest intraday bucket.
        assert_eq!(frequency_params(Interval::OneHour), ("minute", 30));
    }
}
