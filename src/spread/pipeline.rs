// =============================================================================
// Spread Pipeline — one user-triggered comparison, end to end
// =============================================================================
//
//   validate pair → resolve directory → fetch A ∥ fetch B → build → report
//
// The pair and the window are validated before anything touches the network.
// The two fetches are independent and run concurrently; the builder joins
// them by date so fetch completion order never matters.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument as _};
use uuid::Uuid;

use crate::directory::TickerDirectory;
use crate::error::{Result, SpreadError};
use crate::market_data::PriceFetcher;
use crate::spread::builder::{RatioSeries, RatioSeriesBuilder, DEFAULT_WINDOW};
use crate::types::{Instrument, Lookback, PriceSeries};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpreadRequest {
    pub a: String,
    pub b: String,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default)]
    pub lookback: Lookback,
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

impl SpreadRequest {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            window: DEFAULT_WINDOW,
            lookback: Lookback::default(),
        }
    }
}

/// Everything the presenter needs for one chart.
#[derive(Debug, Clone, Serialize)]
pub struct SpreadReport {
    pub request_id: Uuid,
    pub instrument_a: Instrument,
    pub instrument_b: Instrument,
    pub lookback: Lookback,
    pub title: String,
    pub ratio_label: String,
    pub average_label: String,
    pub series: RatioSeries,
}

impl SpreadReport {
    fn new(
        request_id: Uuid,
        instrument_a: Instrument,
        instrument_b: Instrument,
        lookback: Lookback,
        series: RatioSeries,
    ) -> Self {
        let title = format!("{} vs {} のさや比推移", instrument_a.name, instrument_b.name);
        let average_label = format!("{}日移動平均", series.window);
        Self {
            request_id,
            instrument_a,
            instrument_b,
            lookback,
            title,
            ratio_label: "さや比".to_string(),
            average_label,
            series,
        }
    }
}

/// Run one comparison.
pub async fn compare(
    directory: &TickerDirectory,
    fetcher: &dyn PriceFetcher,
    request: &SpreadRequest,
) -> Result<SpreadReport> {
    let request_id = Uuid::new_v4();
    let span = info_span!(
        "spread",
        request_id = %request_id,
        a = %request.a,
        b = %request.b,
        window = request.window,
        lookback = %request.lookback,
    );

    async move {
        let result = run(directory, fetcher, request, request_id).await;
        match &result {
            Ok(report) => info!(
                rows = report.series.len(),
                averaged = report.series.defined_averages(),
                "spread computed"
            ),
            Err(e) => warn!(kind = e.kind(), error = %e, "spread computation failed"),
        }
        result
    }
    .instrument(span)
    .await
}

async fn run(
    directory: &TickerDirectory,
    fetcher: &dyn PriceFetcher,
    request: &SpreadRequest,
    request_id: Uuid,
) -> Result<SpreadReport> {
    if request.a == request.b {
        return Err(SpreadError::InvalidPair(request.a.clone()));
    }
    let builder = RatioSeriesBuilder::new(request.window)?;

    let resolved = directory.resolve().await?;
    if let Some(unknown) = [&request.a, &request.b]
        .into_iter()
        .find(|code| !resolved.contains(code))
    {
        return Err(SpreadError::UnknownInstrument(unknown.clone()));
    }
    let instrument = |code: &str| {
        resolved
            .get(code)
            .cloned()
            .ok_or_else(|| SpreadError::UnknownInstrument(code.to_string()))
    };
    let instrument_a = instrument(&request.a)?;
    let instrument_b = instrument(&request.b)?;

    let (series_a, series_b) = tokio::try_join!(
        fetch_usable(fetcher, &instrument_a.code, request.lookback),
        fetch_usable(fetcher, &instrument_b.code, request.lookback),
    )?;

    let series = builder.build(&series_a, &series_b)?;
    Ok(SpreadReport::new(
        request_id,
        instrument_a,
        instrument_b,
        request.lookback,
        series,
    ))
}

/// Fetch and reject empty results as a fetch failure.
async fn fetch_usable(
    fetcher: &dyn PriceFetcher,
    code: &str,
    lookback: Lookback,
) -> Result<PriceSeries> {
    let series = fetcher.fetch(code, lookback).await?;
    if series.is_empty() {
        return Err(SpreadError::fetch(code, "no closing prices returned"));
    }
    Ok(series)
}
