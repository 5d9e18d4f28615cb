// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// `/` serves the single-page dashboard; everything it needs lives under
// `/api/v1/`. Errors are returned as `{ "error": kind, "message": text }`
// with the status chosen by `SpreadError`.
//
// CORS is configured permissively; the dashboard is read-only.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Json, Query, State},
    http::header,
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::AppState;
use crate::error::{Result, SpreadError};
use crate::presenter::render_svg;
use crate::spread::{SpreadReport, SpreadRequest};
use crate::types::Lookback;

const DASHBOARD_HTML: &str = include_str!("dashboard.html");

// =============================================================================
// Router construction
// =============================================================================

/// Build the full router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(dashboard))
        .route("/api/v1/health", get(health))
        .route("/api/v1/instruments", get(instruments))
        .route("/api/v1/directory/refresh", post(refresh_directory))
        .route("/api/v1/spread", get(spread))
        .route("/api/v1/spread/chart.svg", get(spread_chart))
        .layer(cors)
        .with_state(state)
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health())
}

// =============================================================================
// Directory
// =============================================================================

#[derive(Serialize)]
struct InstrumentView {
    code: String,
    name: String,
    label: String,
}

async fn instruments(State(state): State<Arc<AppState>>) -> Result<Json<Vec<InstrumentView>>> {
    let directory = state.directory.resolve().await?;
    let views = directory
        .iter()
        .map(|inst| InstrumentView {
            label: inst.label(),
            code: inst.code.clone(),
            name: inst.name.clone(),
        })
        .collect();
    Ok(Json(views))
}

#[derive(Serialize)]
struct RefreshResponse {
    count: usize,
}

async fn refresh_directory(State(state): State<Arc<AppState>>) -> Result<Json<RefreshResponse>> {
    let directory = state.directory.refresh().await?;
    info!(count = directory.len(), "Instrument directory refreshed via API");
    Ok(Json(RefreshResponse {
        count: directory.len(),
    }))
}

// =============================================================================
// Spread
// =============================================================================

#[derive(Debug, Deserialize)]
struct SpreadQuery {
    a: String,
    b: String,
    #[serde(default)]
    window: Option<usize>,
    #[serde(default)]
    lookback: Option<String>,
}

impl SpreadQuery {
    /// Fill omitted parameters from the runtime config.
    fn into_request(self, state: &AppState) -> Result<SpreadRequest> {
        let config = &state.runtime_config;
        let lookback = match self.lookback.as_deref() {
            Some(token) => token.parse::<Lookback>().map_err(SpreadError::InvalidParameter)?,
            None => config.default_lookback,
        };

        let mut request = SpreadRequest::new(self.a.trim(), self.b.trim());
        request.window = self.window.unwrap_or(config.default_window);
        request.lookback = lookback;
        Ok(request)
    }
}

type SpreadQueryResult = std::result::Result<Query<SpreadQuery>, QueryRejection>;

/// Malformed query strings are reported like any other invalid parameter.
async fn run_query(state: &AppState, query: SpreadQueryResult) -> Result<SpreadReport> {
    let Query(query) = query.map_err(|e| SpreadError::InvalidParameter(e.body_text()))?;
    let request = query.into_request(state)?;
    state.compare(&request).await
}

async fn spread(
    State(state): State<Arc<AppState>>,
    query: SpreadQueryResult,
) -> Result<Json<SpreadReport>> {
    run_query(&state, query).await.map(Json)
}

async fn spread_chart(
    State(state): State<Arc<AppState>>,
    query: SpreadQueryResult,
) -> Result<impl IntoResponse> {
    let report = run_query(&state, query).await?;
    let config = &state.runtime_config;
    let svg = render_svg(&report, config.chart_width, config.chart_height);
    Ok(([(header::CONTENT_TYPE, "image/svg+xml; charset=utf-8")], svg))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::tests::test_state;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn call(method: &str, uri: &str) -> (StatusCode, String, Vec<u8>) {
        let app = router(Arc::new(test_state()));
        let resp = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let ctype = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec();
        (status, ctype, body)
    }

    fn json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn dashboard_page_is_served() {
        let (status, ctype, body) = call("GET", "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(ctype.starts_with("text/html"));
        assert!(String::from_utf8(body).unwrap().contains("グラフを表示"));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, _, body) = call("GET", "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["status"], "ok");
    }

    #[tokio::test]
    async fn instruments_carry_labels() {
        let (status, _, body) = call("GET", "/api/v1/instruments").await;
        assert_eq!(status, StatusCode::OK);
        let list = json(&body);
        assert_eq!(list.as_array().unwrap().len(), 3);
        assert_eq!(list[0]["code"], "7203.T");
        assert_eq!(list[0]["label"], "7203.T - トヨタ自動車");
    }

    #[tokio::test]
    async fn refresh_reports_count() {
        let (status, _, body) = call("POST", "/api/v1/directory/refresh").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["count"], 3);
    }

    #[tokio::test]
    async fn spread_returns_report() {
        let (status, _, body) =
            call("GET", "/api/v1/spread?a=7203.T&b=7267.T&window=2&lookback=6mo").await;
        assert_eq!(status, StatusCode::OK);
        let report = json(&body);
        assert_eq!(report["lookback"], "6mo");
        assert_eq!(report["series"]["window"], 2);
        let rows = report["series"]["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["date"], "2024-06-03");
        assert_eq!(rows[0]["ratio"], 2.0);
        assert!(rows[0]["rolling_average"].is_null());
        assert_eq!(rows[1]["rolling_average"], 2.0);
    }

    #[tokio::test]
    async fn same_pair_is_bad_request() {
        let (status, _, body) = call("GET", "/api/v1/spread?a=7203.T&b=7203.T").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["error"], "invalid_pair");
    }

    #[tokio::test]
    async fn bad_lookback_is_bad_request() {
        let (status, _, body) =
            call("GET", "/api/v1/spread?a=7203.T&b=7267.T&lookback=forever").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["error"], "invalid_parameter");
    }

    #[tokio::test]
    async fn malformed_window_is_json_bad_request() {
        let (status, ctype, body) = call("GET", "/api/v1/spread?a=7203.T&b=7267.T&window=-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(ctype.starts_with("application/json"));
        let err = json(&body);
        assert_eq!(err["error"], "invalid_parameter");
        assert!(err["message"].as_str().unwrap().contains("query string"));
    }

    #[tokio::test]
    async fn missing_code_on_chart_is_json_bad_request() {
        let (status, ctype, body) = call("GET", "/api/v1/spread/chart.svg?a=7203.T").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(ctype.starts_with("application/json"));
        assert_eq!(json(&body)["error"], "invalid_parameter");
    }

    #[tokio::test]
    async fn fetch_failure_is_bad_gateway() {
        let (status, _, body) = call("GET", "/api/v1/spread?a=7203.T&b=6758.T").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json(&body)["error"], "fetch_error");
    }

    #[tokio::test]
    async fn chart_is_svg() {
        let (status, ctype, body) =
            call("GET", "/api/v1/spread/chart.svg?a=7203.T&b=7267.T&window=2").await;
        assert_eq!(status, StatusCode::OK);
        assert!(ctype.starts_with("image/svg+xml"));
        let svg = String::from_utf8(body).unwrap();
        assert!(svg.contains("トヨタ自動車 vs ホンダ のさや比推移"));
        assert_eq!(svg.matches("<polyline").count(), 2);
    }
}
