// =============================================================================
// Yahoo Finance chart client — daily closes over a trailing range
// =============================================================================
//
// Uses the public v8 chart endpoint:
//
//   GET {base}/v8/finance/chart/{code}?interval=1d&range={lookback}
//
// Only `timestamp`, `meta.gmtoffset` and `indicators.quote[0].close` are read.
// Timestamps are shifted by the exchange GMT offset before taking the date so
// that a Tokyo session is labelled with its local trading day. Null closes
// (halted days, the unsettled current session) are skipped.
// =============================================================================

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SpreadError};
use crate::market_data::fetcher::PriceFetcher;
use crate::types::{Lookback, PricePoint, PriceSeries};

// -----------------------------------------------------------------------------
// Wire format
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl ChartError {
    fn describe(&self) -> String {
        match (&self.code, &self.description) {
            (Some(c), Some(d)) => format!("{c}: {d}"),
            (Some(c), None) => c.clone(),
            (None, Some(d)) => d.clone(),
            (None, None) => "provider reported an error".to_string(),
        }
    }
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

#[derive(Clone)]
pub struct YahooClient {
    base_url: String,
    client: reqwest::Client,
}

impl YahooClient {
    /// Create a client against `base_url` (no trailing slash needed).
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client for price source")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "YahooClient initialised");

        Ok(Self { base_url, client })
    }

    fn chart_url(&self, code: &str, lookback: Lookback) -> String {
        format!(
            "{}/v8/finance/chart/{}?interval=1d&range={}",
            self.base_url,
            code,
            lookback.as_range()
        )
    }

    /// GET the daily chart for `code` and reduce it to a close series.
    #[instrument(skip(self), name = "yahoo::get_chart")]
    pub async fn get_chart(&self, code: &str, lookback: Lookback) -> Result<PriceSeries> {
        let url = self.chart_url(code, lookback);

        let resp = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| SpreadError::fetch(code, format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SpreadError::fetch(code, format!("failed to read body: {e}")))?;

        if !status.is_success() {
            // The provider usually explains itself in `chart.error`.
            let detail = serde_json::from_str::<ChartEnvelope>(&body)
                .ok()
                .and_then(|env| env.chart.error)
                .map(|e| e.describe())
                .unwrap_or_else(|| status.to_string());
            warn!(code, %status, detail = %detail, "chart request rejected");
            return Err(SpreadError::fetch(code, format!("HTTP {status}: {detail}")));
        }

        let series = parse_chart(code, &body)?;
        debug!(
            code,
            lookback = %lookback,
            count = series.len(),
            first = ?series.first_date(),
            last = ?series.last_date(),
            "chart fetched"
        );
        Ok(series)
    }
}

#[async_trait]
impl PriceFetcher for YahooClient {
    async fn fetch(&self, code: &str, lookback: Lookback) -> Result<PriceSeries> {
        self.get_chart(code, lookback).await
    }
}

impl std::fmt::Debug for YahooClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Parsing
// -----------------------------------------------------------------------------

/// Parse a chart JSON body into a close series.
///
/// Empty or close-less payloads are a fetch failure, not an empty series.
pub fn parse_chart(code: &str, body: &str) -> Result<PriceSeries> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| SpreadError::fetch(code, format!("malformed chart payload: {e}")))?;

    if let Some(err) = envelope.chart.error {
        return Err(SpreadError::fetch(code, err.describe()));
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| SpreadError::fetch(code, "chart result is empty"))?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .ok_or_else(|| SpreadError::fetch(code, "close prices missing from payload"))?;

    if closes.len() != result.timestamp.len() {
        warn!(
            code,
            timestamps = result.timestamp.len(),
            closes = closes.len(),
            "timestamp/close length mismatch, truncating to shorter"
        );
    }

    let offset = result.meta.gmtoffset;
    let mut points = Vec::with_capacity(closes.len());
    for (&ts, close) in result.timestamp.iter().zip(closes) {
        let Some(close) = close else { continue };
        let date = local_date(ts, offset).ok_or_else(|| {
            SpreadError::fetch(code, format!("timestamp {ts} is out of range"))
        })?;
        points.push(PricePoint::new(date, close));
    }

    let series = PriceSeries::new(code, points);
    if series.is_empty() {
        return Err(SpreadError::fetch(code, "no closing prices in the requested window"));
    }
    Ok(series)
}

fn local_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts.checked_add(gmtoffset)?, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-04-01 00:00 UTC / 09:00 JST, then the next two sessions.
    const BODY: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "currency": "JPY", "symbol": "7203.T", "gmtoffset": 32400 },
                "timestamp": [1711929600, 1712016000, 1712102400],
                "indicators": { "quote": [{ "close": [3800.0, null, 3850.5] }] }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_closes_and_skips_nulls() {
        let series = parse_chart("7203.T", BODY).unwrap();
        assert_eq!(series.code(), "7203.T");
        assert_eq!(series.len(), 2);
        assert_eq!(
            series.first_date(),
            NaiveDate::from_ymd_opt(2024, 4, 1)
        );
        assert_eq!(series.points()[1].close, 3850.5);
    }

    #[test]
    fn gmt_offset_moves_late_utc_timestamps_to_next_local_day() {
        // 2024-04-01 23:00 UTC is 2024-04-02 08:00 JST.
        let ts = 1_711_929_600 + 23 * 3600;
        assert_eq!(local_date(ts, 32_400), NaiveDate::from_ymd_opt(2024, 4, 2));
        assert_eq!(local_date(ts, 0), NaiveDate::from_ymd_opt(2024, 4, 1));
    }

    #[test]
    fn provider_error_is_fetch_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart("0000.T", body).unwrap_err();
        match err {
            SpreadError::Fetch { code, reason } => {
                assert_eq!(code, "0000.T");
                assert!(reason.contains("delisted"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn all_null_closes_is_fetch_error() {
        let body = r#"{"chart":{"result":[{"meta":{"gmtoffset":32400},"timestamp":[1711929600],"indicators":{"quote":[{"close":[null]}]}}],"error":null}}"#;
        assert!(matches!(
            parse_chart("7203.T", body),
            Err(SpreadError::Fetch { .. })
        ));
    }

    #[test]
    fn missing_quote_block_is_fetch_error() {
        let body = r#"{"chart":{"result":[{"timestamp":[1711929600],"indicators":{"quote":[]}}],"error":null}}"#;
        assert!(matches!(
            parse_chart("7203.T", body),
            Err(SpreadError::Fetch { .. })
        ));
    }

    #[test]
    fn garbage_is_fetch_error() {
        assert!(matches!(
            parse_chart("7203.T", "<html>rate limited</html>"),
            Err(SpreadError::Fetch { .. })
        ));
    }

    #[test]
    fn chart_url_carries_range() {
        let client =
            YahooClient::new("https://example.test/", Duration::from_secs(1), "test").unwrap();
        assert_eq!(
            client.chart_url("6758.T", Lookback::OneYear),
            "https://example.test/v8/finance/chart/6758.T?interval=1d&range=1y"
        );
    }
}
