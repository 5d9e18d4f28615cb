// =============================================================================
// Shared types used across the spread viewer
// =============================================================================

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One selectable instrument from the constituent directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Exchange-qualified ticker code, e.g. `7203.T`.
    pub code: String,
    pub name: String,
}

impl Instrument {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    /// Display label used by the selection boxes: `"7203.T - トヨタ自動車"`.
    pub fn label(&self) -> String {
        format!("{} - {}", self.code, self.name)
    }
}

/// A single daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Daily closing prices for one instrument.
///
/// Invariants (enforced by [`PriceSeries::new`]):
/// - strictly ascending by date, no duplicate dates;
/// - every close is finite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    code: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series from unordered raw points.
    ///
    /// Non-finite closes are dropped. When a date repeats, the last
    /// observation in input order wins.
    pub fn new(code: impl Into<String>, raw: Vec<PricePoint>) -> Self {
        let mut points: Vec<PricePoint> = raw.into_iter().filter(|p| p.close.is_finite()).collect();
        // Stable sort keeps input order within a date, so the last duplicate
        // is the one retained below.
        points.sort_by_key(|p| p.date);

        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }

        Self {
            code: code.into(),
            points: deduped,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// Trailing calendar window requested from the price source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Lookback {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl Lookback {
    /// Token understood by the chart endpoint's `range` parameter.
    pub fn as_range(&self) -> &'static str {
        match self {
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::FiveYears => "5y",
        }
    }
}

impl std::fmt::Display for Lookback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_range())
    }
}

impl FromStr for Lookback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1mo" => Ok(Self::OneMonth),
            "3mo" => Ok(Self::ThreeMonths),
            "6mo" => Ok(Self::SixMonths),
            "1y" => Ok(Self::OneYear),
            "2y" => Ok(Self::TwoYears),
            "5y" => Ok(Self::FiveYears),
            other => Err(format!(
                "unknown lookback '{other}' (expected 1mo, 3mo, 6mo, 1y, 2y or 5y)"
            )),
        }
    }
}
