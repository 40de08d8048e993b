//! Yahoo Finance data provider.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API with retries and exponential
//! backoff. Yahoo has no 4h interval, so 4h requests fetch 1h bars and
//! resample them.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. CSV import is the fallback when it is unavailable.

use super::ingest::{ingest, resample};
use super::{DataError, DataProvider, FetchWindow, Interval};
use chrono::DateTime;
use regimelab_core::domain::Bar;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: "https://query2.finance.yahoo.com".to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Point at a different host (a mirror or a local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// Interval string sent to the API. 4h is not offered, so fetch hourly.
    fn api_interval(interval: Interval) -> &'static str {
        match interval {
            Interval::OneHour | Interval::FourHour => "1h",
            Interval::OneDay => "1d",
        }
    }

    fn chart_url(&self, symbol: &str, window: &FetchWindow) -> String {
        let start_ts = window.start().and_utc().timestamp();
        let end_ts = window.end.and_utc().timestamp();
        format!(
            "{}/v8/finance/chart/{symbol}?period1={start_ts}&period2={end_ts}&interval={}",
            self.base_url,
            Self::api_interval(window.interval)
        )
    }

    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<Bar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let timestamps = data
            .timestamp
            .ok_or_else(|| DataError::ResponseFormatChanged("no timestamps".into()))?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp = DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Non-trading slots come back with every field null
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
                continue;
            }

            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0),
            });
        }

        if bars.is_empty() {
            return Err(DataError::NoBars {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn fetch_with_retry(&self, symbol: &str, window: &FetchWindow) -> Result<Vec<Bar>, DataError> {
        let url = self.chart_url(symbol, window);
        let mut last_error = None;
        let mut retry_after = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = retry_delay(self.base_delay, attempt, retry_after.take());
                debug!(symbol, attempt, delay_ms = delay.as_millis() as u64, "retrying");
                std::thread::sleep(delay);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                let retry_after_secs = retry_after.unwrap_or(60);
                warn!(symbol, retry_after_secs, "rate limited");
                last_error = Some(DataError::RateLimited { retry_after_secs });
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            if !status.is_success() {
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
            })?;
            return Self::parse_response(symbol, chart);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

/// Backoff before retry `attempt` (1-based): exponential from `base`, but never
/// shorter than a server-supplied `Retry-After`.
fn retry_delay(base: Duration, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    let backoff = base * 2u32.pow(attempt.saturating_sub(1));
    match retry_after_secs {
        Some(secs) => backoff.max(Duration::from_secs(secs)),
        None => backoff,
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch(&self, symbol: &str, window: &FetchWindow) -> Result<Vec<Bar>, DataError> {
        let bars = self.fetch_with_retry(symbol, window)?;
        if window.interval == Interval::FourHour {
            let hourly = ingest(bars).bars;
            return Ok(resample(&hourly, Interval::FourHour.hours()));
        }
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Vec<Bar>, DataError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        YahooProvider::parse_response("AAPL", resp)
    }

    #[test]
    fn parses_chart_payload_and_skips_null_slots() {
        let bars = parse(
            r#"{"chart":{"result":[{"timestamp":[1704205800,1704209400,1704213000],
                "indicators":{"quote":[{
                    "open":[185.0,null,186.0],
                    "high":[186.5,null,187.0],
                    "low":[184.2,null,185.5],
                    "close":[186.1,null,186.8],
                    "volume":[1200000,null,900000]}]}}],"error":null}}"#,
        )
        .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 186.1);
        assert_eq!(bars[1].volume, 900_000);
        assert_eq!(bars[0].timestamp.to_string(), "2024-01-02 14:30:00");
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let err = parse(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }

    #[test]
    fn other_api_errors_flag_format_change() {
        let err = parse(r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"x"}}}"#)
            .unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn four_hour_requests_ask_for_hourly_bars() {
        let provider = YahooProvider::new().unwrap().with_base_url("http://localhost:9");
        let end = chrono::NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let url = provider.chart_url("MSFT", &FetchWindow::new(end, 90, Interval::FourHour));
        assert!(url.starts_with("http://localhost:9/v8/finance/chart/MSFT?"));
        assert!(url.ends_with("interval=1h"));
        assert!(url.contains(&format!("period2={}", end.and_utc().timestamp())));
    }

    #[test]
    fn retry_delay_doubles_from_base() {
        let base = Duration::from_millis(500);
        assert_eq!(retry_delay(base, 1, None), Duration::from_millis(500));
        assert_eq!(retry_delay(base, 2, None), Duration::from_millis(1000));
        assert_eq!(retry_delay(base, 3, None), Duration::from_millis(2000));
    }

    #[test]
    fn retry_delay_honors_longer_retry_after() {
        let base = Duration::from_millis(500);
        assert_eq!(retry_delay(base, 1, Some(3)), Duration::from_secs(3));
        assert_eq!(retry_delay(base, 4, Some(0)), Duration::from_millis(4000));
        assert_eq!(retry_delay(Duration::from_secs(10), 1, Some(2)), Duration::from_secs(10));
    }
}
