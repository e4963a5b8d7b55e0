//! Aegis Request Handlers
//!
//! HTTP request handlers for the historian REST API: tag management, the
//! write and read paths, aggregation, scenarios and simulator control.
//! Every response uses the `{Success, Data|Error, Timestamp}` envelope.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::state::AppState;
use aegis_common::{format_interval, parse_interval, ErrorCategory, HistorianError};
use aegis_historian::{
    AggregateResult, AggregationType, BatchWriteResult, CompressionType, DataPoint, DataType,
    EngineStats, PointError, PointWrite, Quality, Tag, TagFilter, TagPatch, TimeSeriesQuery,
};
use aegis_simulation::{
    catalog, CircuitBreakerConfig, EdgeCaseScenario, ErrorSimulatorConfig, ScenarioKind,
    ScenarioLoader, ScenarioReport,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const MAX_EDGE_CASE_POINTS: usize = 10_000;

// =============================================================================
// Response Envelope
// =============================================================================

/// Error body inside the envelope.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub category: ErrorCategory,
    pub retryable: bool,
}

/// Standard response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(err: &HistorianError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: err.code().to_string(),
                message: err.to_string(),
                category: err.category(),
                retryable: err.is_retryable(),
            }),
            timestamp: Utc::now(),
        }
    }
}

fn respond<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(ApiResponse::ok(data))).into_response()
}

/// Render an error with the status it maps to.
pub fn error_response(err: HistorianError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::warn!(code = err.code(), "{}", err);
    }
    (status, Json(ApiResponse::failure(&err))).into_response()
}

fn result_response<T: Serialize>(result: aegis_common::Result<T>) -> Response {
    match result {
        Ok(data) => respond(StatusCode::OK, data),
        Err(e) => error_response(e),
    }
}

fn parse_time(field: &str, value: &str) -> aegis_common::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| HistorianError::InvalidTimeRange(format!("{} '{}': {}", field, value, e)))
}

// =============================================================================
// Health & Statistics
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub tag_count: usize,
    pub point_count: usize,
    pub uptime_secs: i64,
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Response {
    respond(
        StatusCode::OK,
        HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            tag_count: state.engine.registry().len(),
            point_count: state.engine.store().total_points(),
            uptime_secs: state.uptime_secs(),
        },
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub engine: EngineStats,
    pub requests_served: u64,
    pub uptime_secs: i64,
}

pub async fn get_stats(State(state): State<AppState>) -> Response {
    respond(
        StatusCode::OK,
        StatsResponse {
            engine: state.engine.stats(),
            requests_served: state.requests_served(),
            uptime_secs: state.uptime_secs(),
        },
    )
}

/// Fallback handler.
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::failure(&HistorianError::Configuration(
            "route not found".to_string(),
        ))),
    )
        .into_response()
}

// =============================================================================
// Tag Endpoints
// =============================================================================

/// Body for tag creation. Only the name is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTagRequest {
    pub name: String,
    #[serde(default)]
    pub data_type: DataType,
    pub description: Option<String>,
    pub engineering_units: Option<String>,
    pub collector: Option<String>,
    pub compression_type: Option<CompressionType>,
    pub compression_deviation: Option<f64>,
    pub retention_hours: Option<f64>,
    pub default_quality: Option<Quality>,
    pub quality_threshold: Option<Quality>,
    pub is_active: Option<bool>,
}

impl From<CreateTagRequest> for Tag {
    fn from(req: CreateTagRequest) -> Self {
        let mut tag = Tag::new(req.name, req.data_type);
        tag.description = req.description;
        tag.collector = req.collector;
        if let Some(units) = req.engineering_units {
            tag.engineering_units = units;
        }
        if let Some(compression_type) = req.compression_type {
            tag.compression_type = compression_type;
        }
        if let Some(deviation) = req.compression_deviation {
            tag.compression_deviation = deviation;
        }
        if let Some(hours) = req.retention_hours {
            tag.retention_hours = hours;
        }
        if let Some(quality) = req.default_quality {
            tag.default_quality = quality;
        }
        if let Some(quality) = req.quality_threshold {
            tag.quality_threshold = quality;
        }
        if let Some(active) = req.is_active {
            tag.is_active = active;
        }
        tag
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTagsParams {
    pub collector: Option<String>,
    pub data_type: Option<DataType>,
    #[serde(default)]
    pub active_only: bool,
    pub name_contains: Option<String>,
}

pub async fn create_tag(State(state): State<AppState>, Json(request): Json<CreateTagRequest>) -> Response {
    match state.engine.create_tag(Tag::from(request)) {
        Ok(tag) => respond(StatusCode::CREATED, tag),
        Err(e) => error_response(e),
    }
}

pub async fn list_tags(State(state): State<AppState>, Query(params): Query<ListTagsParams>) -> Response {
    let filter = TagFilter {
        collector: params.collector,
        data_type: params.data_type,
        active_only: params.active_only,
        name_contains: params.name_contains,
    };
    respond(StatusCode::OK, state.engine.list_tags(&filter))
}

pub async fn get_tag(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    result_response(state.engine.get_tag(&name))
}

pub async fn update_tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(patch): Json<TagPatch>,
) -> Response {
    result_response(state.engine.update_tag(&name, &patch))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteTagResponse {
    pub tag_name: String,
    pub points_deleted: usize,
}

pub async fn delete_tag(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let result = state.engine.delete_tag(&name).map(|points_deleted| DeleteTagResponse {
        tag_name: name,
        points_deleted,
    });
    result_response(result)
}

// =============================================================================
// Write Endpoints
// =============================================================================

/// Batch body: either `{"Points": [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WriteBatchRequest {
    Wrapped {
        #[serde(rename = "Points")]
        points: Vec<PointWrite>,
    },
    Bare(Vec<PointWrite>),
}

impl WriteBatchRequest {
    fn into_points(self) -> Vec<PointWrite> {
        match self {
            WriteBatchRequest::Wrapped { points } | WriteBatchRequest::Bare(points) => points,
        }
    }
}

/// Write outcome. Carries the envelope fields alongside the counts.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WriteResponse {
    pub success: bool,
    pub points_written: usize,
    pub points_stored: usize,
    pub points_compressed: usize,
    pub points_failed: usize,
    pub errors: Vec<PointError>,
    pub timestamp: DateTime<Utc>,
}

impl From<BatchWriteResult> for WriteResponse {
    fn from(result: BatchWriteResult) -> Self {
        Self {
            success: result.is_complete(),
            points_written: result.points_written,
            points_stored: result.points_stored,
            points_compressed: result.points_compressed,
            points_failed: result.points_failed,
            errors: result.errors,
            timestamp: Utc::now(),
        }
    }
}

/// 200 unless every point of a non-empty batch failed.
fn write_response(result: BatchWriteResult) -> Response {
    let status = if result.points_written == 0 && result.points_failed > 0 {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    (status, Json(WriteResponse::from(result))).into_response()
}

pub async fn write_data(State(state): State<AppState>, Json(request): Json<WriteBatchRequest>) -> Response {
    write_response(state.engine.write_batch(request.into_points()))
}

pub async fn write_single(State(state): State<AppState>, Json(point): Json<PointWrite>) -> Response {
    let result = state.engine.write_batch(vec![point]);
    let status = match result.errors.first().map(|e| e.reason) {
        Some(aegis_historian::WriteErrorKind::TagNotFound) => StatusCode::NOT_FOUND,
        Some(_) => StatusCode::BAD_REQUEST,
        None => StatusCode::OK,
    };
    (status, Json(WriteResponse::from(result))).into_response()
}

pub async fn write_buffered(State(state): State<AppState>, Json(request): Json<WriteBatchRequest>) -> Response {
    write_response(state.engine.write_buffered(request.into_points()))
}

// =============================================================================
// Read Endpoints
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    pub tag_names: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub max_results: Option<usize>,
    pub quality_filter: Option<i64>,
}

impl QueryParams {
    /// Defaults to the last hour ending now.
    fn to_query(&self) -> aegis_common::Result<TimeSeriesQuery> {
        let tag_names: Vec<String> = self
            .tag_names
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if tag_names.is_empty() {
            return Err(HistorianError::Configuration("tagNames is required".to_string()));
        }

        let end = match &self.end_time {
            Some(s) => parse_time("endTime", s)?,
            None => Utc::now(),
        };
        let start = match &self.start_time {
            Some(s) => parse_time("startTime", s)?,
            None => end - Duration::hours(1),
        };

        let mut query = TimeSeriesQuery::new(tag_names, start, end);
        if let Some(max) = self.max_results {
            query = query.with_max_results(max);
        }
        if let Some(quality) = self.quality_filter {
            let quality = Quality::new(quality).ok_or_else(|| {
                HistorianError::LimitExceeded(format!("qualityFilter {} outside 0-100", quality))
            })?;
            query = query.with_quality_filter(quality);
        }
        Ok(query)
    }
}

pub async fn query_data(State(state): State<AppState>, Query(params): Query<QueryParams>) -> Response {
    let result = params.to_query().and_then(|q| state.engine.query(&q));
    match result {
        Ok(mut result) => {
            for series in result.series.iter_mut() {
                series.points = state.transform_outgoing(std::mem::take(&mut series.points));
            }
            respond(StatusCode::OK, result)
        }
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentParams {
    pub tag_name: String,
    pub count: Option<usize>,
}

pub async fn recent_data(State(state): State<AppState>, Query(params): Query<RecentParams>) -> Response {
    let count = params.count.unwrap_or(state.config.historian.max_recent);
    let points = state.engine.recent(&params.tag_name, count);
    respond(StatusCode::OK, state.transform_outgoing(points))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AggregateRequest {
    pub tag_name: String,
    pub aggregation_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Bucket width such as `5m` or `1h`. One bucket over the range when absent.
    pub interval: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AggregateResponse {
    pub tag_name: String,
    pub aggregation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    pub results: Vec<AggregateResult>,
}

fn run_aggregate(state: &AppState, request: AggregateRequest) -> aegis_common::Result<AggregateResponse> {
    let aggregation: AggregationType = request.aggregation_type.parse()?;
    let interval = request.interval.as_deref().map(parse_interval).transpose()?;
    let results = state.engine.aggregate(
        &request.tag_name,
        aggregation,
        request.start_time,
        request.end_time,
        interval,
    )?;
    Ok(AggregateResponse {
        tag_name: request.tag_name,
        aggregation_type: aggregation.to_string(),
        interval: interval.map(format_interval),
        results,
    })
}

pub async fn aggregate_data(State(state): State<AppState>, Json(request): Json<AggregateRequest>) -> Response {
    result_response(run_aggregate(&state, request))
}

// =============================================================================
// Scenario Endpoints
// =============================================================================

pub async fn list_scenarios() -> Response {
    respond(StatusCode::OK, catalog())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicksParams {
    pub ticks: Option<u64>,
}

fn resolve_ticks(state: &AppState, ticks: Option<u64>) -> aegis_common::Result<u64> {
    let settings = &state.config.simulation;
    let ticks = ticks.unwrap_or(settings.default_scenario_ticks);
    if ticks > settings.max_scenario_ticks {
        return Err(HistorianError::LimitExceeded(format!(
            "ticks {} exceeds maximum {}",
            ticks, settings.max_scenario_ticks
        )));
    }
    Ok(ticks)
}

fn run_load(state: &AppState, name: &str, ticks: Option<u64>) -> aegis_common::Result<ScenarioReport> {
    let kind: ScenarioKind = name.parse()?;
    let ticks = resolve_ticks(state, ticks)?;
    let mut context = state.simulation.lock();
    ScenarioLoader::load(kind, &state.engine, &mut context, ticks, Utc::now())
}

pub async fn load_scenario(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<TicksParams>,
) -> Response {
    result_response(run_load(&state, &name, params.ticks))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdvanceResponse {
    pub ticks: u64,
    pub simulated_time: DateTime<Utc>,
    #[serde(flatten)]
    pub write: BatchWriteResult,
}

/// Generate live ticks from the loaded scenario through the write path.
pub async fn advance_scenario(State(state): State<AppState>, Query(params): Query<TicksParams>) -> Response {
    let ticks = match resolve_ticks(&state, Some(params.ticks.unwrap_or(1))) {
        Ok(ticks) => ticks,
        Err(e) => return error_response(e),
    };

    let (points, simulated_time) = {
        let mut context = state.simulation.lock();
        let mut points = Vec::new();
        for _ in 0..ticks {
            points.extend(context.tick());
        }
        (points, context.clock.now())
    };

    let writes = points.into_iter().map(PointWrite::from).collect();
    let result = state.engine.write_batch(writes);
    respond(
        StatusCode::OK,
        AdvanceResponse {
            ticks,
            simulated_time,
            write: result,
        },
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResetResponse {
    pub points_cleared: usize,
}

/// Clear stored samples and the simulation context. Tags are kept.
pub async fn reset_scenarios(State(state): State<AppState>) -> Response {
    let points_cleared = state.engine.store().total_points();
    state.engine.reset();
    state.simulation.lock().reset();
    state.faults.lock().edge_cases.deactivate_all();
    respond(StatusCode::OK, ResetResponse { points_cleared })
}

// =============================================================================
// Edge Case Endpoints
// =============================================================================

pub async fn list_edge_cases(State(state): State<AppState>) -> Response {
    respond(StatusCode::OK, state.faults.lock().edge_cases.status())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EdgeCaseToggleResponse {
    pub scenario: String,
    pub active: bool,
    pub changed: bool,
}

pub async fn activate_edge_case(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let result = name.parse::<EdgeCaseScenario>().map(|scenario| EdgeCaseToggleResponse {
        scenario: scenario.to_string(),
        active: true,
        changed: state.faults.lock().edge_cases.activate(scenario),
    });
    result_response(result)
}

pub async fn deactivate_edge_case(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let result = name.parse::<EdgeCaseScenario>().map(|scenario| EdgeCaseToggleResponse {
        scenario: scenario.to_string(),
        active: false,
        changed: state.faults.lock().edge_cases.deactivate(scenario),
    });
    result_response(result)
}

pub async fn deactivate_all_edge_cases(State(state): State<AppState>) -> Response {
    let mut faults = state.faults.lock();
    faults.edge_cases.deactivate_all();
    respond(StatusCode::OK, faults.edge_cases.status())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateParams {
    pub tag_name: Option<String>,
    pub count: Option<usize>,
}

fn run_generate(state: &AppState, name: &str, params: GenerateParams) -> aegis_common::Result<Vec<DataPoint>> {
    let scenario: EdgeCaseScenario = name.parse()?;
    let count = params.count.unwrap_or(10);
    if count > MAX_EDGE_CASE_POINTS {
        return Err(HistorianError::LimitExceeded(format!(
            "count {} exceeds maximum {}",
            count, MAX_EDGE_CASE_POINTS
        )));
    }
    let tag_name = params.tag_name.as_deref().unwrap_or("EDGE_CASE");
    state
        .faults
        .lock()
        .edge_cases
        .generate_edge_case_data(scenario, tag_name, count, Utc::now())
}

pub async fn generate_edge_cases(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<GenerateParams>,
) -> Response {
    result_response(run_generate(&state, &name, params))
}

// =============================================================================
// Error Simulation Endpoints
// =============================================================================

pub async fn error_status(State(state): State<AppState>) -> Response {
    respond(StatusCode::OK, state.faults.lock().errors.status(Utc::now()))
}

pub async fn configure_errors(
    State(state): State<AppState>,
    Json(config): Json<ErrorSimulatorConfig>,
) -> Response {
    let mut faults = state.faults.lock();
    faults.errors.configure(config);
    respond(StatusCode::OK, faults.errors.status(Utc::now()))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitAction {
    Open,
    Close,
    Configure,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CircuitBreakerRequest {
    pub action: CircuitAction,
    pub method: Option<String>,
    pub path: Option<String>,
    pub failure_threshold: Option<u32>,
    pub open_duration_ms: Option<u64>,
}

/// Force breakers open or closed, or change breaker settings.
pub async fn control_circuit_breaker(
    State(state): State<AppState>,
    Json(request): Json<CircuitBreakerRequest>,
) -> Response {
    let now = Utc::now();
    let mut faults = state.faults.lock();
    let endpoint = match (&request.method, &request.path) {
        (Some(method), Some(path)) => Some((method.as_str(), path.as_str())),
        _ => None,
    };

    match request.action {
        CircuitAction::Open => match endpoint {
            Some((method, path)) => faults.errors.trip_circuit(method, path, now),
            None => {
                return error_response(HistorianError::Configuration(
                    "Method and Path are required to open a circuit".to_string(),
                ))
            }
        },
        CircuitAction::Close => {
            faults.errors.reset_circuit(endpoint);
        }
        CircuitAction::Configure => {
            let current = faults.errors.config().circuit_breaker;
            let config = CircuitBreakerConfig {
                failure_threshold: request.failure_threshold.unwrap_or(current.failure_threshold),
                open_duration_ms: request.open_duration_ms.unwrap_or(current.open_duration_ms),
            };
            faults.errors.set_circuit_config(config.clamped());
        }
    }

    respond(StatusCode::OK, faults.errors.status(now))
}

pub async fn error_stats(State(state): State<AppState>) -> Response {
    respond(StatusCode::OK, state.faults.lock().errors.stats(Utc::now()))
}

pub async fn reset_errors(State(state): State<AppState>) -> Response {
    let mut faults = state.faults.lock();
    faults.errors.reset();
    respond(StatusCode::OK, faults.errors.status(Utc::now()))
}

// =============================================================================
// Tests
// =============================================================================
