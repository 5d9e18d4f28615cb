// =============================================================================
// Ratio Series Builder — さや比 and its trailing average
// =============================================================================
//
// Steps, in order:
//   1. reject identical instruments (InvalidPair)
//   2. reject empty inputs (EmptySeries)
//   3. inner-join on date (NoOverlap when nothing is shared)
//   4. ratio = close_a / close_b for every row; a zero or otherwise
//      non-finite result fails the whole build (ArithmeticAnomaly)
//   5. trailing SMA of the ratio over `window` rows, `None` until the
//      window is full
//
// The build is a pure function of its inputs. It either returns a complete
// series or an error; partial output is never produced.
// =============================================================================

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{Result, SpreadError};
use crate::indicators::sma::rolling_mean;
use crate::spread::align::align;
use crate::types::PriceSeries;

/// Default rolling window, in aligned trading days.
pub const DEFAULT_WINDOW: usize = 75;

/// One output row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatioRow {
    pub date: NaiveDate,
    pub close_a: f64,
    pub close_b: f64,
    pub ratio: f64,
    pub rolling_average: Option<f64>,
}

/// Aligned ratio series, ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioSeries {
    pub window: usize,
    pub rows: Vec<RatioRow>,
}

impl RatioSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.iter().map(|r| r.date)
    }

    pub fn ratios(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|r| r.ratio)
    }

    /// Number of rows carrying a rolling average.
    pub fn defined_averages(&self) -> usize {
        self.rows.iter().filter(|r| r.rolling_average.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatioSeriesBuilder {
    window: usize,
}

impl Default for RatioSeriesBuilder {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

impl RatioSeriesBuilder {
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(SpreadError::InvalidParameter(
                "rolling window must be at least 1".into(),
            ));
        }
        Ok(Self { window })
    }

    pub fn build(&self, a: &PriceSeries, b: &PriceSeries) -> Result<RatioSeries> {
        if a.code() == b.code() {
            return Err(SpreadError::InvalidPair(a.code().to_string()));
        }
        if a.is_empty() {
            return Err(SpreadError::EmptySeries(a.code().to_string()));
        }
        if b.is_empty() {
            return Err(SpreadError::EmptySeries(b.code().to_string()));
        }

        let aligned = align(a, b);
        if aligned.is_empty() {
            return Err(SpreadError::NoOverlap {
                a: a.code().to_string(),
                b: b.code().to_string(),
            });
        }

        let mut ratios = Vec::with_capacity(aligned.len());
        for row in &aligned {
            let ratio = row.close_a / row.close_b;
            if row.close_b == 0.0 || !ratio.is_finite() {
                return Err(SpreadError::ArithmeticAnomaly {
                    date: row.date,
                    denominator: row.close_b,
                });
            }
            ratios.push(ratio);
        }

        let averages = rolling_mean(&ratios, self.window);

        let rows = aligned
            .iter()
            .zip(ratios)
            .zip(averages)
            .map(|((row, ratio), rolling_average)| RatioRow {
                date: row.date,
                close_a: row.close_a,
                close_b: row.close_b,
                ratio,
                rolling_average,
            })
            .collect();

        Ok(RatioSeries {
            window: self.window,
            rows,
        })
    }
}
