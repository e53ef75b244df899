//! Alpha Vantage adapter (secondary source).
//!
//! Free-tier REST API used when the primary source is unavailable. Quote
//! data comes from `GLOBAL_QUOTE`, candles from `TIME_SERIES_INTRADAY` /
//! `TIME_SERIES_DAILY`. Mock mode serves the synthetic walk.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::synthetic;
use crate::data_source::{
    CandlesRequest, CapabilitySet, HealthState, HealthStatus, MarketDataSource, QuoteRequest,
    SourceError,
};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::{Candle, CandleSeries, Interval, ProviderId, Quote, UtcDateTime};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Alpha Vantage adapter supporting both real API calls and mock mode.
#[derive(Clone)]
pub struct AlphaVantageAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    use_real_api: bool,
}

impl Default for AlphaVantageAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            api_key: String::from("demo"),
            use_real_api: false,
        }
    }
}

impl AlphaVantageAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            api_key: api_key.into(),
            use_real_api,
        }
    }

    async fn fetch_real_quote(&self, req: &QuoteRequest) -> Result<Quote, SourceError> {
        let url = format!(
            "{BASE_URL}?function=GLOBAL_QUOTE&symbol={}&apikey={}",
            urlencoding::encode(req.symbol.as_str()),
            self.api_key
        );
        let body = self
            .transport(HttpRequest::get(url).with_timeout_ms(5_000))
            .await?;

        let parsed: GlobalQuoteResponse = serde_json::from_str(&body).map_err(|e| {
            SourceError::unavailable(format!("malformed alphavantage quote payload: {e}"))
        })?;

        let Some(quote) = parsed.global_quote else {
            // The free tier answers quota exhaustion with a "Note" body.
            if parsed.note.is_some() {
                return Err(SourceError::rate_limited(
                    "alphavantage free-tier quota exhausted",
                ));
            }
            return Err(SourceError::not_found(&req.symbol));
        };

        let price = parse_field("05. price", &quote.price)?;
        let volume = quote
            .volume
            .as_deref()
            .and_then(|value| value.parse::<u64>().ok());

        Quote::new(req.symbol.clone(), price, None, None, volume, UtcDateTime::now())
            .map_err(|e| SourceError::unavailable(format!("invalid alphavantage quote: {e}")))
    }

    async fn fetch_real_candles(&self, req: &CandlesRequest) -> Result<CandleSeries, SourceError> {
        let (function, interval_param) = match req.interval {
            Interval::OneDay => ("TIME_SERIES_DAILY", None),
            other => ("TIME_SERIES_INTRADAY", Some(av_interval(other))),
        };

        let mut url = format!(
            "{BASE_URL}?function={function}&symbol={}&outputsize=compact&apikey={}",
            urlencoding::encode(req.symbol.as_str()),
            self.api_key
        );
        if let Some(interval) = interval_param {
            url.push_str(&format!("&interval={interval}"));
        }

        let body = self
            .transport(HttpRequest::get(url).with_timeout_ms(8_000))
            .await?;

        let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            SourceError::unavailable(format!("malformed alphavantage candle payload: {e}"))
        })?;

        if parsed.get("Note").is_some() {
            return Err(SourceError::rate_limited(
                "alphavantage free-tier quota exhausted",
            ));
        }

        let series_key = match interval_param {
            Some(interval) => format!("Time Series ({interval})"),
            None => String::from("Time Series (Daily)"),
        };
        let Some(series) = parsed.get(&series_key).and_then(|v| v.as_object()) else {
            return Err(SourceError::not_found(&req.symbol));
        };

        // Alpha Vantage keys rows by timestamp string; BTreeMap restores
        // chronological order.
        let mut ordered: BTreeMap<String, AvCandle> = BTreeMap::new();
        for (ts, row) in series {
            let row: AvCandle = serde_json::from_value(row.clone()).map_err(|e| {
                SourceError::unavailable(format!("malformed alphavantage candle row: {e}"))
            })?;
            ordered.insert(ts.clone(), row);
        }

        let mut candles = Vec::with_capacity(ordered.len().min(req.limit));
        for (ts, row) in ordered.iter().rev().take(req.limit).rev() {
            let ts = parse_av_timestamp(ts)?;
            let candle = Candle::new(
                ts,
                parse_field("1. open", &row.open)?,
                parse_field("2. high", &row.high)?,
                parse_field("3. low", &row.low)?,
                parse_field("4. close", &row.close)?,
                row.volume
                    .as_deref()
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(0),
            )
            .map_err(|e| SourceError::unavailable(format!("invalid alphavantage candle: {e}")))?;
            candles.push(candle);
        }

        CandleSeries::new(req.symbol.clone(), req.interval, candles)
            .map_err(|e| SourceError::unavailable(format!("unordered alphavantage candles: {e}")))
    }

    async fn transport(&self, request: HttpRequest) -> Result<String, SourceError> {
        let response = self.http_client.execute(request).await.map_err(|e| {
            if e.timed_out() {
                SourceError::timeout(format!("alphavantage transport timeout: {}", e.message()))
            } else {
                SourceError::unavailable(format!("alphavantage transport error: {}", e.message()))
            }
        })?;

        match response.status {
            status if response.is_success() => Ok(response.body),
            429 => Err(SourceError::rate_limited("alphavantage returned 429")),
            status => Err(SourceError::unavailable(format!(
                "alphavantage returned status {status}"
            ))),
        }
    }
}

fn av_interval(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute => "1min",
        Interval::FiveMinutes => "5min",
        Interval::FifteenMinutes => "15min",
        Interval::OneHour => "60min",
        Interval::OneDay => "daily",
    }
}

fn parse_field(name: &str, value: &str) -> Result<f64, SourceError> {
    value
        .parse::<f64>()
        .map_err(|_| SourceError::unavailable(format!("alphavantage field '{name}' is not numeric")))
}

fn parse_av_timestamp(value: &str) -> Result<UtcDateTime, SourceError> {
    // Intraday rows look like "2024-06-03 15:55:00", daily rows "2024-06-03";
    // both are quoted in US/Eastern but treated as UTC here, which is
    // harmless for ordering and windowing purposes.
    let normalized = if value.len() == 10 {
        format!("{value}T00:00:00Z")
    } else {
        format!("{}T{}Z", &value[..10], &value[11..])
    };
    UtcDateTime::parse(&normalized)
        .map_err(|_| SourceError::unavailable(format!("unparseable alphavantage timestamp '{value}'")))
}

impl MarketDataSource for AlphaVantageAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Alphavantage
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
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: String,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvCandle {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Symbol;

    #[test]
    fn parses_global_quote_payload() {
        let body = r#"{
            "Global Quote": {
                "01. symbol": "SPY",
                "05. price": "512.3400",
                "06. volume": "54321000"
            }
        }"#;

        let parsed: GlobalQuoteResponse = serde_json::from_str(body).expect("must parse");
        let quote = parsed.global_quote.expect("quote present");
        assert_eq!(quote.price, "512.3400");
    }

    #[test]
    fn quota_note_maps_to_rate_limited() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage!"}"#;
        let parsed: GlobalQuoteResponse = serde_json::from_str(body).expect("must parse");
        assert!(parsed.global_quote.is_none());
        assert!(parsed.note.is_some());
    }

    #[test]
    fn normalizes_intraday_and_daily_timestamps() {
        let intraday = parse_av_timestamp("2024-06-03 15:55:00").expect("intraday");
        assert_eq!(intraday.format_rfc3339(), "2024-06-03T15:55:00Z");

        let daily = parse_av_timestamp("2024-06-03").expect("daily");
        assert_eq!(daily.format_rfc3339(), "2024-06-03T00:00:00Z");
    }

    #[tokio::test]
    async fn mock_mode_serves_synthetic_walk() {
        let adapter = AlphaVantageAdapter::default();
        let symbol = Symbol::parse("IWM").expect("symbol");
        let req = CandlesRequest::new(symbol, Interval::FiveMinutes, 20).expect("request");

        let series = adapter.fetch_candles(req).await.expect("candles");
        assert_eq!(series.len(), 20);
    }
}
