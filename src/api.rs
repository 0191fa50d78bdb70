use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::analysis::comparison::{
    compare_trends, CityValue, ComparisonStats, TrendComparison, TrendSortKey,
};
use crate::analysis::profile::{
    latest_year, seasonal_profile, summarize_city, yearly_series, CitySummary, SeasonAnomalyCount,
    SeasonProfile, YearlyPoint,
};
use crate::analysis::trend::ExcludedCity;
use crate::analysis::{AnalysisError, AnalysisSnapshot};
use crate::fetch_error::FetchError;
use crate::fetcher::OpenWeatherFetcher;
use crate::models::{
    AnomalyType, CityTrend, DatasetSummary, EnrichedObservation, LiveAnomalyVerdict, NormalRange,
    Observation, Season, TemperatureZone, TrendClass,
};
use crate::services::monitoring_service::{CityFailure, FailureKind};
use crate::services::{
    AnalysisService, BatchReport, DatasetError, FetchMode, LiveCheck, MonitorError,
    MonitoringService,
};

/// Largest CSV body accepted by `PUT /dataset`.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub analysis: AnalysisService,
    /// Absent when no weather API key is configured
    pub monitoring: Option<MonitoringService<OpenWeatherFetcher>>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub dataset_loaded: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Everything the single-city view needs.
#[derive(Serialize, ToSchema)]
pub struct CityReport {
    pub summary: CitySummary,
    pub seasonal_profile: Vec<SeasonProfile>,
    pub yearly_series: Vec<YearlyPoint>,
    pub trend: Option<CityTrend>,
    /// Set when the city has too few distinct years for a trend
    pub excluded: Option<ExcludedCity>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ObservationQuery {
    /// Only rows from this calendar year
    pub year: Option<i32>,
    /// Only rows from the most recent year present (overrides `year`)
    pub latest_year: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TrendQuery {
    pub sort_by: Option<TrendSortKey>,
    /// Defaults to descending
    pub ascending: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LiveQuery {
    /// Month (1-12) whose season is the baseline; defaults to the current UTC month
    pub month: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BatchQuery {
    /// Comma-separated city names
    pub cities: String,
    pub mode: Option<FetchMode>,
    pub month: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("No dataset loaded")]
    NoDataset,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadGateway(String),
    #[error("Live weather checks are not configured")]
    LiveUnavailable,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NoDataset => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::LiveUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::NoHistoricalData { .. } => ApiError::NotFound(e.to_string()),
            AnalysisError::InsufficientHistory { .. } => ApiError::NotFound(e.to_string()),
            AnalysisError::InvalidMonth(_) | AnalysisError::InvalidWindow(_) => {
                ApiError::BadRequest(e.to_string())
            }
        }
    }
}

impl From<DatasetError> for ApiError {
    fn from(e: DatasetError) -> Self {
        match e {
            DatasetError::Import(e) => ApiError::BadRequest(e.to_string()),
            DatasetError::Analysis(e) => e.into(),
            DatasetError::Task(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::Fetch(FetchError::Unauthorized) => {
                ApiError::Unauthorized(FetchError::Unauthorized.to_string())
            }
            MonitorError::Fetch(e) => ApiError::BadGateway(e.to_string()),
            MonitorError::Analysis(e) => e.into(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route(
            "/dataset",
            get(get_dataset)
                .put(put_dataset)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/cities", get(get_cities))
        .route("/cities/{city}", get(get_city))
        .route("/cities/{city}/observations", get(get_observations))
        .route("/cities/{city}/live", get(get_city_live))
        .route("/trends", get(get_trends))
        .route("/live", get(get_batch_live))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}

async fn current_snapshot(state: &AppState) -> Result<Arc<AnalysisSnapshot>, ApiError> {
    state.analysis.snapshot().await.ok_or_else(|| {
        warn!("Request made before any dataset was loaded");
        ApiError::NoDataset
    })
}

fn city_rows<'a>(
    snapshot: &'a AnalysisSnapshot,
    city: &str,
) -> Result<&'a [EnrichedObservation], ApiError> {
    snapshot.city_rows(city).ok_or_else(|| {
        warn!("City {} not found in dataset", city);
        ApiError::NotFound(format!("Unknown city: {city}"))
    })
}

fn monitoring(state: &AppState) -> Result<&MonitoringService<OpenWeatherFetcher>, ApiError> {
    state.monitoring.as_ref().ok_or(ApiError::LiveUnavailable)
}

fn resolve_month(month: Option<u32>) -> Result<u32, ApiError> {
    let month = month.unwrap_or_else(|| Utc::now().month());
    Season::from_month(month)?;
    Ok(month)
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
#[instrument(skip(state))]
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
        dataset_loaded: state.analysis.snapshot().await.is_some(),
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/dataset",
    responses(
        (status = 200, description = "Currently loaded dataset", body = DatasetSummary),
        (status = 409, description = "No dataset loaded", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_dataset(State(state): State<AppState>) -> Result<Json<DatasetSummary>, ApiError> {
    let snapshot = current_snapshot(&state).await?;
    Ok(Json(snapshot.summary()))
}

#[utoipa::path(
    put,
    path = "/api/v1/dataset",
    request_body(content = String, content_type = "text/csv", description = "CSV with city, timestamp and temperature columns"),
    responses(
        (status = 200, description = "Dataset replaced", body = DatasetSummary),
        (status = 400, description = "Malformed CSV; previous dataset kept", body = ErrorResponse)
    )
)]
#[instrument(skip(state, body), fields(bytes = body.len()))]
async fn put_dataset(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<DatasetSummary>, ApiError> {
    debug!("Replacing dataset from upload");
    let snapshot = state.analysis.load_csv(body).await.map_err(|e| {
        error!("Dataset upload rejected: {}", e);
        ApiError::from(e)
    })?;

    let summary = snapshot.summary();
    info!(
        "Loaded {} observations for {} cities",
        summary.total_observations,
        summary.cities.len()
    );
    Ok(Json(summary))
}

#[utoipa::path(
    get,
    path = "/api/v1/cities",
    responses(
        (status = 200, description = "Summary of every city", body = Vec<CitySummary>),
        (status = 409, description = "No dataset loaded", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_cities(State(state): State<AppState>) -> Result<Json<Vec<CitySummary>>, ApiError> {
    let snapshot = current_snapshot(&state).await?;
    let summaries: Vec<CitySummary> = snapshot
        .cities()
        .filter_map(|city| snapshot.city_rows(city).and_then(summarize_city))
        .collect();

    info!("Retrieved summaries for {} cities", summaries.len());
    Ok(Json(summaries))
}

#[utoipa::path(
    get,
    path = "/api/v1/cities/{city}",
    params(("city" = String, Path, description = "City name as it appears in the dataset")),
    responses(
        (status = 200, description = "City report", body = CityReport),
        (status = 404, description = "Unknown city", body = ErrorResponse),
        (status = 409, description = "No dataset loaded", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_city(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<CityReport>, ApiError> {
    let snapshot = current_snapshot(&state).await?;
    let rows = city_rows(&snapshot, &city)?;
    let summary = summarize_city(rows)
        .ok_or_else(|| ApiError::NotFound(format!("No observations for {city}")))?;

    let trends = snapshot.trends();
    let report = CityReport {
        summary,
        seasonal_profile: seasonal_profile(rows),
        yearly_series: yearly_series(rows),
        trend: trends.for_city(&city).cloned(),
        excluded: trends.excluded.iter().find(|e| e.city == city).cloned(),
    };

    debug!(
        "City report for {}: {} anomalies",
        city, report.summary.total_anomalies
    );
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/api/v1/cities/{city}/observations",
    params(
        ("city" = String, Path, description = "City name"),
        ObservationQuery
    ),
    responses(
        (status = 200, description = "Enriched observations in timestamp order", body = Vec<EnrichedObservation>),
        (status = 404, description = "Unknown city", body = ErrorResponse),
        (status = 409, description = "No dataset loaded", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_observations(
    State(state): State<AppState>,
    Path(city): Path<String>,
    Query(params): Query<ObservationQuery>,
) -> Result<Json<Vec<EnrichedObservation>>, ApiError> {
    let snapshot = current_snapshot(&state).await?;
    let rows = city_rows(&snapshot, &city)?;

    let year = if params.latest_year.unwrap_or(false) {
        latest_year(rows)
    } else {
        params.year
    };

    let selected: Vec<EnrichedObservation> = rows
        .iter()
        .filter(|row| year.map_or(true, |y| row.observation.year == y))
        .cloned()
        .collect();

    info!("Retrieved {} observations for {}", selected.len(), city);
    Ok(Json(selected))
}

#[utoipa::path(
    get,
    path = "/api/v1/trends",
    params(TrendQuery),
    responses(
        (status = 200, description = "Sorted trend table with comparison statistics", body = TrendComparison),
        (status = 409, description = "No dataset loaded", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_trends(
    State(state): State<AppState>,
    Query(params): Query<TrendQuery>,
) -> Result<Json<TrendComparison>, ApiError> {
    let snapshot = current_snapshot(&state).await?;
    let comparison = compare_trends(
        snapshot.trends(),
        params.sort_by.unwrap_or_default(),
        params.ascending.unwrap_or(false),
    );

    info!(
        "Trend comparison over {} cities ({} excluded)",
        comparison.trends.len(),
        comparison.excluded.len()
    );
    Ok(Json(comparison))
}

#[utoipa::path(
    get,
    path = "/api/v1/cities/{city}/live",
    params(
        ("city" = String, Path, description = "City name"),
        LiveQuery
    ),
    responses(
        (status = 200, description = "Live anomaly verdict", body = LiveCheck),
        (status = 400, description = "Invalid month", body = ErrorResponse),
        (status = 401, description = "Weather API rejected the key", body = ErrorResponse),
        (status = 404, description = "No history for the city in this season", body = ErrorResponse),
        (status = 409, description = "No dataset loaded", body = ErrorResponse),
        (status = 502, description = "Weather API unreachable or failed", body = ErrorResponse),
        (status = 503, description = "No weather API key configured", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_city_live(
    State(state): State<AppState>,
    Path(city): Path<String>,
    Query(params): Query<LiveQuery>,
) -> Result<Json<LiveCheck>, ApiError> {
    let monitoring = monitoring(&state)?;
    let month = resolve_month(params.month)?;
    let snapshot = current_snapshot(&state).await?;

    let check = monitoring
        .check_city(&snapshot, &city, month)
        .await
        .map_err(|e| {
            error!("Live check for {} failed: {}", city, e);
            ApiError::from(e)
        })?;

    Ok(Json(check))
}

#[utoipa::path(
    get,
    path = "/api/v1/live",
    params(BatchQuery),
    responses(
        (status = 200, description = "Per-city verdicts and failures in request order", body = BatchReport),
        (status = 400, description = "No cities or invalid month", body = ErrorResponse),
        (status = 409, description = "No dataset loaded", body = ErrorResponse),
        (status = 503, description = "No weather API key configured", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_batch_live(
    State(state): State<AppState>,
    Query(params): Query<BatchQuery>,
) -> Result<Json<BatchReport>, ApiError> {
    let monitoring = monitoring(&state)?;
    let month = resolve_month(params.month)?;

    let cities: Vec<String> = params
        .cities
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if cities.is_empty() {
        return Err(ApiError::BadRequest("No cities requested".to_string()));
    }

    let snapshot = current_snapshot(&state).await?;
    let report = monitoring
        .check_cities(&snapshot, &cities, month, params.mode.unwrap_or_default())
        .await?;
    Ok(Json(report))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        get_dataset,
        put_dataset,
        get_cities,
        get_city,
        get_observations,
        get_trends,
        get_city_live,
        get_batch_live
    ),
    components(schemas(
        HealthResponse,
        ErrorResponse,
        DatasetSummary,
        CityReport,
        CitySummary,
        SeasonAnomalyCount,
        SeasonProfile,
        YearlyPoint,
        CityTrend,
        ExcludedCity,
        Observation,
        EnrichedObservation,
        TrendComparison,
        ComparisonStats,
        CityValue,
        TrendSortKey,
        LiveCheck,
        LiveAnomalyVerdict,
        NormalRange,
        BatchReport,
        CityFailure,
        FailureKind,
        FetchMode,
        Season,
        AnomalyType,
        TrendClass,
        TemperatureZone
    )),
    tags((name = "temperature-anomaly-service", description = "Historical temperature analysis and live anomaly checks"))
)]
pub struct ApiDoc;

pub fn generate_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
