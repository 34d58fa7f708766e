use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use tracing::{debug, instrument};

use super::types::{ChartEnvelope, ChartResult};
use crate::provider::{MarketDataError, MarketDataProvider};
use crate::snapshot::{CurrentSnapshot, HistoricalSnapshot};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Sessions fetched for the current quote; only the latest bar's open is used.
const CURRENT_RANGE_DAYS: u32 = 5;

#[derive(Clone)]
pub struct YahooClient {
    http: Client,
    url: Url,
}

impl YahooClient {
    pub fn new(url: impl AsRef<str>, timeout: Duration) -> Result<Self, MarketDataError> {
        let url = parse_base(url.as_ref())?;
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            // the chart endpoint rejects requests without a browser-like agent
            .user_agent("Mozilla/5.0 (compatible; tickerwatch/0.1)")
            .build()?;

        Ok(Self { http, url })
    }

    #[instrument(skip(self), fields(ticker = %ticker), level = "debug")]
    async fn fetch_chart(&self, ticker: &str, days: u32) -> Result<ChartResult, MarketDataError> {
        let url = chart_url(&self.url, ticker, days)?;

        let resp = self.http.get(url).send().await?;

        // an unknown ticker answers 404 with a chart.error body
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MarketDataError::NoData(ticker.to_string()));
        }

        let envelope: ChartEnvelope = resp.error_for_status()?.json().await?;
        let result = first_result(ticker, envelope)?;

        debug!(
            price = ?result.meta.regular_market_price,
            bars = result.timestamp.len(),
            "chart fetched"
        );

        Ok(result)
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn current(&self, ticker: &str) -> Result<CurrentSnapshot, MarketDataError> {
        let chart = self.fetch_chart(ticker, CURRENT_RANGE_DAYS).await?;
        current_from_chart(ticker, &chart, Utc::now())
    }

    async fn historical(
        &self,
        ticker: &str,
        days: u32,
    ) -> Result<HistoricalSnapshot, MarketDataError> {
        let chart = match self.fetch_chart(ticker, days).await {
            Err(MarketDataError::NoData(t)) => return Err(MarketDataError::NoHistory(t)),
            other => other?,
        };
        historical_from_chart(ticker, &chart)
    }
}

fn parse_base(base: &str) -> Result<Url, MarketDataError> {
    let url = Url::parse(base).map_err(|e| MarketDataError::InvalidUrl(format!("{base}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(MarketDataError::InvalidUrl(base.to_string()));
    }
    Ok(url)
}

/// The ticker is a single escaped path segment, so `/`, `?` or `#` in it
/// never change the route or the query.
fn chart_url(base: &Url, ticker: &str, days: u32) -> Result<Url, MarketDataError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| MarketDataError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(["v8", "finance", "chart", ticker]);
    url.query_pairs_mut()
        .clear()
        .append_pair("range", &format!("{days}d"))
        .append_pair("interval", "1d");
    Ok(url)
}

fn first_result(ticker: &str, envelope: ChartEnvelope) -> Result<ChartResult, MarketDataError> {
    if let Some(err) = envelope.chart.error {
        debug!(code = %err.code, description = %err.description, "chart error");
        return Err(MarketDataError::NoData(ticker.to_string()));
    }

    envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| MarketDataError::NoData(ticker.to_string()))
}

/// Builds the current quote from chart metadata.
///
/// The regular market price falls back to the previous close; a chart with
/// neither is treated as an unknown symbol.
pub fn current_from_chart(
    ticker: &str,
    chart: &ChartResult,
    fallback_time: DateTime<Utc>,
) -> Result<CurrentSnapshot, MarketDataError> {
    let meta = &chart.meta;
    let previous = meta.previous_close.or(meta.chart_previous_close);

    let price = meta
        .regular_market_price
        .or(previous)
        .ok_or_else(|| MarketDataError::NoData(ticker.to_string()))?;

    let open = chart
        .indicators
        .quote
        .first()
        .and_then(|q| q.open.iter().rev().flatten().next().copied())
        .unwrap_or(price);

    let observed_at = meta
        .regular_market_time
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .unwrap_or(fallback_time);

    Ok(CurrentSnapshot {
        ticker: ticker.to_string(),
        price,
        previous_close: previous.unwrap_or(price),
        open,
        high: meta.regular_market_day_high.unwrap_or(price),
        low: meta.regular_market_day_low.unwrap_or(price),
        volume: meta.regular_market_volume.unwrap_or(0),
        observed_at,
    })
}

/// Builds the windowed history from daily bars, skipping sessions where
/// either the close or the volume is missing.
pub fn historical_from_chart(
    ticker: &str,
    chart: &ChartResult,
) -> Result<HistoricalSnapshot, MarketDataError> {
    let Some(series) = chart.indicators.quote.first() else {
        return Err(MarketDataError::NoHistory(ticker.to_string()));
    };

    let (prices, volumes): (Vec<f64>, Vec<u64>) = series
        .close
        .iter()
        .zip(series.volume.iter())
        .filter_map(|(c, v)| Some(((*c)?, (*v)?)))
        .unzip();

    if prices.is_empty() {
        return Err(MarketDataError::NoHistory(ticker.to_string()));
    }

    HistoricalSnapshot::from_series(ticker, prices, volumes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART: &str = r#"{
      "chart": {
        "result": [{
          "meta": {
            "symbol": "AAPL",
            "regularMarketPrice": 165.0,
            "chartPreviousClose": 168.5,
            "previousClose": 170.0,
            "regularMarketDayHigh": 171.0,
            "regularMarketDayLow": 164.0,
            "regularMarketVolume": 50000000,
            "regularMarketTime": 1700000000
          },
          "timestamp": [1, 2, 3, 4],
          "indicators": {
            "quote": [{
              "open": [180.0, 184.0, null, 169.0],
              "close": [182.0, 185.0, null, 170.0],
              "volume": [40000000, 45000000, null, 55000000]
            }]
          }
        }],
        "error": null
      }
    }"#;

    fn chart() -> ChartResult {
        let envelope: ChartEnvelope = serde_json::from_str(CHART).unwrap();
        first_result("AAPL", envelope).unwrap()
    }

    #[test]
    fn current_snapshot_uses_market_meta() {
        let snap = current_from_chart("AAPL", &chart(), Utc::now()).unwrap();

        assert_eq!(snap.price, 165.0);
        assert_eq!(snap.previous_close, 170.0);
        assert_eq!(snap.open, 169.0);
        assert_eq!(snap.high, 171.0);
        assert_eq!(snap.low, 164.0);
        assert_eq!(snap.volume, 50_000_000);
        assert_eq!(snap.observed_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn missing_market_price_falls_back_to_previous_close() {
        let mut c = chart();
        c.meta.regular_market_price = None;
        c.meta.previous_close = None;

        let snap = current_from_chart("AAPL", &c, Utc::now()).unwrap();
        assert_eq!(snap.price, 168.5);
    }

    #[test]
    fn chart_without_any_price_is_no_data() {
        let mut c = chart();
        c.meta.regular_market_price = None;
        c.meta.previous_close = None;
        c.meta.chart_previous_close = None;

        let err = current_from_chart("AAPL", &c, Utc::now()).unwrap_err();
        assert!(matches!(err, MarketDataError::NoData(t) if t == "AAPL"));
    }

    #[test]
    fn history_skips_null_bars() {
        let hist = historical_from_chart("AAPL", &chart()).unwrap();

        assert_eq!(hist.prices, vec![182.0, 185.0, 170.0]);
        assert_eq!(hist.volumes, vec![40_000_000, 45_000_000, 55_000_000]);
        assert_eq!(hist.monthly_high, 185.0);
        assert_eq!(hist.monthly_low, 170.0);
    }

    #[test]
    fn chart_url_escapes_the_ticker() {
        let base = parse_base(DEFAULT_BASE_URL).unwrap();

        let plain = chart_url(&base, "AAPL", 30).unwrap();
        assert_eq!(
            plain.as_str(),
            "https://query1.finance.yahoo.com/v8/finance/chart/AAPL?range=30d&interval=1d"
        );

        let odd = chart_url(&base, "BRK/B?x=1#f", 5).unwrap();
        assert_eq!(
            odd.path(),
            "/v8/finance/chart/BRK%2FB%3Fx=1%23f"
        );
        assert_eq!(odd.query(), Some("range=5d&interval=1d"));
        assert_eq!(odd.fragment(), None);
    }

    #[test]
    fn base_url_keeps_its_prefix() {
        let base = parse_base("http://127.0.0.1:9000/proxy/").unwrap();
        let url = chart_url(&base, "MSFT", 5).unwrap();
        assert_eq!(url.path(), "/proxy/v8/finance/chart/MSFT");

        assert!(matches!(parse_base("not a url"), Err(MarketDataError::InvalidUrl(_))));
        assert!(matches!(parse_base("mailto:me@example.com"), Err(MarketDataError::InvalidUrl(_))));
    }

    #[test]
    fn chart_error_maps_to_no_data() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let envelope: ChartEnvelope = serde_json::from_str(body).unwrap();

        let err = first_result("ZZZZ", envelope).unwrap_err();
        assert!(matches!(err, MarketDataError::NoData(_)));
    }
}
