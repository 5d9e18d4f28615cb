// =============================================================================
// Error taxonomy for one spread computation
// =============================================================================
//
// Every variant is terminal for the invocation that produced it and is
// reported to the user; none is retried and none stops the server.
// =============================================================================

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpreadError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpreadError {
    /// Constituent page unreachable or contained no usable table.
    #[error("instrument directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// Price retrieval failed or returned no usable closes.
    #[error("failed to fetch prices for {code}: {reason}")]
    Fetch { code: String, reason: String },

    /// The same instrument was selected on both sides.
    #[error("select two different instruments (both sides are {0})")]
    InvalidPair(String),

    /// A selected code is not part of the resolved directory.
    #[error("unknown instrument code: {0}")]
    UnknownInstrument(String),

    /// An input series has zero rows.
    #[error("price series for {0} is empty")]
    EmptySeries(String),

    /// The two series share no trading dates.
    #[error("{a} and {b} have no trading dates in common")]
    NoOverlap { a: String, b: String },

    /// Zero denominator (or otherwise non-finite ratio) on an aligned row.
    #[error("ratio is not finite on {date} (denominator close = {denominator})")]
    ArithmeticAnomaly { date: NaiveDate, denominator: f64 },

    /// Malformed request parameter (window size, lookback token).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl SpreadError {
    pub fn fetch(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            code: code.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable kind, used as the `error` field of API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectoryUnavailable(_) => "directory_unavailable",
            Self::Fetch { .. } => "fetch_error",
            Self::InvalidPair(_) => "invalid_pair",
            Self::UnknownInstrument(_) => "unknown_instrument",
            Self::EmptySeries(_) => "empty_series",
            Self::NoOverlap { .. } => "no_overlap",
            Self::ArithmeticAnomaly { .. } => "arithmetic_anomaly",
            Self::InvalidParameter(_) => "invalid_parameter",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPair(_) | Self::UnknownInstrument(_) | Self::InvalidParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::EmptySeries(_) | Self::NoOverlap { .. } | Self::ArithmeticAnomaly { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Fetch { .. } | Self::DirectoryUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for SpreadError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (self.status(), axum::Json(body)).into_response()
    }
}
