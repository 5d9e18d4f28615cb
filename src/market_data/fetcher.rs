// =============================================================================
// Price Fetcher — consumed interface for daily closing prices
// =============================================================================

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Lookback, PriceSeries};

/// Source of daily closes for one instrument over a trailing window.
///
/// Implementations report network failures, provider errors and unusable
/// payloads as [`SpreadError::Fetch`](crate::error::SpreadError::Fetch).
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    async fn fetch(&self, code: &str, lookback: Lookback) -> Result<PriceSeries>;
}
