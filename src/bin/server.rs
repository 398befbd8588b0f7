//! Factor compute server
//!
//! Run: cargo run --release --bin server
//! Test: curl -X POST http://localhost:3040/rank -H "Content-Type: application/json" -d '{"index":["2024-01-01T00:00:00Z"],"columns":["A","B"],"values":[[0.1,null]]}'

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use factor_lab::backtest::TRADING_DAYS_PER_YEAR;
use factor_lab::{
    compute_metrics, cross_sectional_rank, run_backtest, signal_matrix, AppConfig, BacktestParams,
    BacktestResult, Factor, Frame, PerformanceMetrics,
};

/// Wire shape of a frame; `null` cells are missing.
#[derive(Deserialize)]
struct FrameDto {
    index: Vec<DateTime<Utc>>,
    columns: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl FrameDto {
    fn into_frame(self) -> Result<Frame, ApiError> {
        if self.values.len() != self.index.len() {
            return Err(ApiError::BadRequest(format!(
                "{} rows of values for {} timestamps",
                self.values.len(),
                self.index.len()
            )));
        }
        if let Some(row) = self.values.iter().position(|r| r.len() != self.columns.len()) {
            return Err(ApiError::BadRequest(format!(
                "row {} has {} cells, expected {}",
                row,
                self.values[row].len(),
                self.columns.len()
            )));
        }
        if self.index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ApiError::BadRequest("index must be strictly increasing".to_string()));
        }

        let values = self
            .values
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect();
        Ok(Frame::new(self.index, self.columns, values))
    }
}

#[derive(Deserialize)]
struct FactorRequest {
    prices: FrameDto,
    #[serde(default)]
    factor: Factor,
}

#[derive(Deserialize)]
struct BacktestRequest {
    prices: FrameDto,
    /// Precomputed signals; computed from `factor` when absent
    signals: Option<FrameDto>,
    #[serde(default)]
    factor: Factor,
    #[serde(default)]
    params: BacktestParams,
}

#[derive(Serialize)]
struct BacktestResponse {
    #[serde(flatten)]
    result: BacktestResult,
    metrics: PerformanceMetrics,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsRequest {
    returns: Vec<Option<f64>>,
    periods_per_year: Option<f64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Json(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection, "JSON parsing failed");
        ApiError::Json(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", m),
            ApiError::Json(m) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_JSON", m),
        };
        (status, Json(ErrorResponse { code, message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn health() -> &'static str {
    "ok"
}

async fn rank(payload: Result<Json<FrameDto>, JsonRejection>) -> ApiResult<Frame> {
    let Json(req) = payload?;
    Ok(Json(cross_sectional_rank(&req.into_frame()?)))
}

async fn factor(payload: Result<Json<FactorRequest>, JsonRejection>) -> ApiResult<Frame> {
    let Json(req) = payload?;
    let prices = req.prices.into_frame()?;
    Ok(Json(signal_matrix(&prices, req.factor)))
}

async fn backtest(payload: Result<Json<BacktestRequest>, JsonRejection>) -> ApiResult<BacktestResponse> {
    let Json(req) = payload?;
    let prices = req.prices.into_frame()?;
    let signals = match req.signals {
        Some(dto) => dto.into_frame()?,
        None => signal_matrix(&prices, req.factor),
    };

    let result = run_backtest(&signals, &prices, &req.params);
    let mut metrics = compute_metrics(&result.daily_returns.values, TRADING_DAYS_PER_YEAR);
    metrics.avg_turnover = result.summary.turnover_mean;
    Ok(Json(BacktestResponse { result, metrics }))
}

async fn metrics(payload: Result<Json<MetricsRequest>, JsonRejection>) -> ApiResult<PerformanceMetrics> {
    let Json(req) = payload?;
    let returns: Vec<f64> = req.returns.into_iter().map(|r| r.unwrap_or(f64::NAN)).collect();
    let periods = req.periods_per_year.unwrap_or(TRADING_DAYS_PER_YEAR);
    if periods.is_nan() || periods <= 0.0 {
        return Err(ApiError::BadRequest("periodsPerYear must be positive".to_string()));
    }
    Ok(Json(compute_metrics(&returns, periods)))
}

fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rank", post(rank))
        .route("/factor", post(factor))
        .route("/backtest", post(backtest))
        .route("/metrics", post(metrics))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("factor_lab=info,server=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!("Factor server running on http://{}", config.server_addr);

    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    axum::serve(listener, router()).await?;
    Ok(())
}
