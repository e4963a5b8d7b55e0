//! End-to-end integration tests for the Aegis historian server
//!
//! Drives the full router in-process: tags, writes, queries, aggregation,
//! scenarios, edge cases, error simulation and authentication.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use data_encoding::BASE64;
use serde_json::{json, Value};
use tower::Service;

use aegis_server::{create_router, AppState, ServerConfig};

/// Send a request and return status and JSON body.
async fn send(app: &mut axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.call(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get_json(app: &mut axum::Router, uri: &str) -> (StatusCode, Value) {
    send(app, "GET", uri, None).await
}

async fn post_json(app: &mut axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(body)).await
}

fn app() -> axum::Router {
    create_router(AppState::new(ServerConfig::default().with_seed(Some(42))))
}

async fn create_uncompressed_tag(app: &mut axum::Router, name: &str) {
    let (status, _) = post_json(
        app,
        "/tags",
        json!({"Name": name, "DataType": "Float", "CompressionType": "None"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

fn series_points(body: &Value) -> &Vec<Value> {
    body["Data"]["Series"][0]["Points"].as_array().unwrap()
}

// =============================================================================
// Tags
// =============================================================================

#[tokio::test]
async fn test_tag_lifecycle() {
    let mut app = app();

    let (status, body) = post_json(
        &mut app,
        "/tags",
        json!({
            "Name": "Line1.Temperature",
            "EngineeringUnits": "degC",
            "Collector": "opc-1",
            "CompressionDeviation": 0.5
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["Success"], true);
    assert_eq!(body["Data"]["Name"], "Line1.Temperature");
    assert!(body["Timestamp"].is_string());

    let (status, body) = post_json(&mut app, "/tags", json!({"Name": "Line1.Temperature"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["Error"]["Code"], "DUPLICATE_TAG");

    let (status, body) = post_json(&mut app, "/tags", json!({"Name": "Archive", "RetentionHours": 1e10})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["Success"], false);

    post_json(&mut app, "/tags", json!({"Name": "Line2.Pressure", "Collector": "opc-2"})).await;

    let (status, body) = get_json(&mut app, "/tags?collector=opc-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Data"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &mut app,
        "PUT",
        "/tags/Line1.Temperature",
        Some(json!({"Description": "Zone 1 temperature", "IsActive": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Data"]["Description"], "Zone 1 temperature");

    let (_, body) = get_json(&mut app, "/tags?activeOnly=true").await;
    assert_eq!(body["Data"].as_array().unwrap().len(), 1);

    let (status, body) = send(&mut app, "DELETE", "/tags/Line1.Temperature", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Data"]["PointsDeleted"], 0);

    let (status, body) = get_json(&mut app, "/tags/Line1.Temperature").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["Success"], false);
    assert_eq!(body["Error"]["Retryable"], false);
}

// =============================================================================
// Write / Query / Aggregate
// =============================================================================

#[tokio::test]
async fn test_write_query_and_aggregate() {
    let mut app = app();
    create_uncompressed_tag(&mut app, "TEMP").await;

    let (status, body) = post_json(
        &mut app,
        "/data/write",
        json!({"Points": [
            {"TagName": "TEMP", "Timestamp": "2024-01-01T00:00:00Z", "Value": 10.0},
            {"TagName": "TEMP", "Timestamp": "2024-01-01T00:00:10Z", "Value": 20.0, "Quality": 75},
            {"TagName": "TEMP", "Timestamp": "2024-01-01T00:00:20Z", "Value": 30.0}
        ]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Success"], true);
    assert_eq!(body["PointsWritten"], 3);
    assert_eq!(body["PointsFailed"], 0);

    let (status, body) = get_json(
        &mut app,
        "/data/query?tagNames=TEMP&startTime=2024-01-01T00:00:00Z&endTime=2024-01-01T01:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let points = series_points(&body);
    assert_eq!(points.len(), 3);
    assert_eq!(points[1]["Value"], 20.0);
    assert_eq!(points[1]["Quality"], 75);

    let (status, body) = post_json(
        &mut app,
        "/data/aggregate",
        json!({
            "TagName": "TEMP",
            "AggregationType": "Average",
            "StartTime": "2024-01-01T00:00:00Z",
            "EndTime": "2024-01-01T01:00:00Z"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Data"]["Results"][0]["Value"], 20.0);
    assert_eq!(body["Data"]["Results"][0]["Count"], 3);

    let (_, body) = post_json(
        &mut app,
        "/data/aggregate",
        json!({
            "TagName": "TEMP",
            "AggregationType": "Count",
            "StartTime": "2024-01-01T00:00:00Z",
            "EndTime": "2024-01-01T00:01:00Z",
            "Interval": "15s"
        }),
    )
    .await;
    let buckets = body["Data"]["Results"].as_array().unwrap();
    assert_eq!(buckets.len(), 4);
    assert_eq!(buckets[0]["Value"], 2.0);
    assert_eq!(buckets[3]["Count"], 0);
}

#[tokio::test]
async fn test_aggregate_errors() {
    let mut app = app();
    create_uncompressed_tag(&mut app, "TEMP").await;

    let (status, body) = post_json(
        &mut app,
        "/data/aggregate",
        json!({
            "TagName": "TEMP",
            "AggregationType": "Median",
            "StartTime": "2024-01-01T00:00:00Z",
            "EndTime": "2024-01-01T01:00:00Z"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["Error"]["Code"], "INVALID_AGGREGATION_TYPE");

    let (status, _) = post_json(
        &mut app,
        "/data/aggregate",
        json!({
            "TagName": "MISSING",
            "AggregationType": "Sum",
            "StartTime": "2024-01-01T00:00:00Z",
            "EndTime": "2024-01-01T01:00:00Z"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = post_json(
        &mut app,
        "/data/aggregate",
        json!({
            "TagName": "TEMP",
            "AggregationType": "Sum",
            "StartTime": "2024-01-01T00:00:00Z",
            "EndTime": "2024-01-01T01:00:00Z",
            "Interval": "9999999999999999999w"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["Error"]["Code"], "INVALID_INTERVAL");
}

#[tokio::test]
async fn test_write_reports_per_point_failures() {
    let mut app = app();
    create_uncompressed_tag(&mut app, "FLOW").await;

    let (status, body) = post_json(
        &mut app,
        "/data/write",
        json!([
            {"TagName": "FLOW", "Timestamp": "2024-01-01T00:00:00Z", "Value": 1.5},
            {"TagName": "NOPE", "Timestamp": "2024-01-01T00:00:00Z", "Value": 1.0},
            {"TagName": "FLOW", "Timestamp": "2024-01-01T00:00:01Z", "Value": "not a number"}
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Success"], false);
    assert_eq!(body["PointsWritten"], 1);
    assert_eq!(body["PointsFailed"], 2);
    assert_eq!(body["Errors"][0]["Index"], 1);
    assert_eq!(body["Errors"][0]["Reason"], "TagNotFound");
    assert_eq!(body["Errors"][1]["Reason"], "InvalidValue");

    let (status, body) = post_json(
        &mut app,
        "/data/write/single",
        json!({"TagName": "NOPE", "Value": 1.0}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["PointsFailed"], 1);
}

#[tokio::test]
async fn test_deadband_compression_through_api() {
    let mut app = app();
    post_json(
        &mut app,
        "/tags",
        json!({"Name": "FLAT", "CompressionType": "Deadband", "CompressionDeviation": 0.5}),
    )
    .await;
    create_uncompressed_tag(&mut app, "SQUARE").await;

    let flat: Vec<Value> = (0..100)
        .map(|i| json!({"TagName": "FLAT", "Timestamp": format!("2024-01-01T00:{:02}:{:02}Z", i / 60, i % 60), "Value": 10.0}))
        .collect();
    let (_, body) = post_json(&mut app, "/data/write", json!(flat)).await;
    assert_eq!(body["PointsWritten"], 100);
    assert_eq!(body["PointsStored"], 1);
    assert_eq!(body["PointsCompressed"], 99);

    let square: Vec<Value> = (0..100)
        .map(|i| json!({"TagName": "SQUARE", "Timestamp": format!("2024-01-01T00:{:02}:{:02}Z", i / 60, i % 60), "Value": if i % 2 == 0 { 0.0 } else { 100.0 }}))
        .collect();
    let (_, body) = post_json(&mut app, "/data/write", json!(square)).await;
    assert_eq!(body["PointsStored"], 100);
}

#[tokio::test]
async fn test_buffered_write_and_recent() {
    let mut app = app();
    create_uncompressed_tag(&mut app, "LEVEL").await;

    let (status, body) = post_json(
        &mut app,
        "/data/write/buffered",
        json!([
            {"TagName": "LEVEL", "Timestamp": "2024-01-01T00:00:20Z", "Value": 3.0},
            {"TagName": "LEVEL", "Timestamp": "2024-01-01T00:00:00Z", "Value": 1.0},
            {"TagName": "LEVEL", "Timestamp": "2024-01-01T00:00:10Z", "Value": 2.0}
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["PointsWritten"], 3);

    let (status, body) = get_json(&mut app, "/data/recent?tagName=LEVEL&count=2").await;
    assert_eq!(status, StatusCode::OK);
    let points = body["Data"].as_array().unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0]["Value"], 3.0);
    assert_eq!(points[1]["Value"], 2.0);

    let (status, body) = get_json(&mut app, "/data/recent?tagName=GHOST").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Success"], true);
    assert!(body["Data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_string_tag_keeps_timestamp_like_text() {
    let mut app = app();
    let (status, _) = post_json(
        &mut app,
        "/tags",
        json!({"Name": "BATCH_ID", "DataType": "String"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = post_json(
        &mut app,
        "/data/write/single",
        json!({"TagName": "BATCH_ID", "Timestamp": "2024-01-01T00:00:00Z", "Value": "2024-01-01T00:00:00Z"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get_json(&mut app, "/data/recent?tagName=BATCH_ID").await;
    assert_eq!(body["Data"][0]["Value"], "2024-01-01T00:00:00Z");
}

#[tokio::test]
async fn test_query_validation() {
    let mut app = app();

    let (status, _) = get_json(&mut app, "/data/query").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get_json(
        &mut app,
        "/data/query?tagNames=A&startTime=2024-01-02T00:00:00Z&endTime=2024-01-01T00:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["Error"]["Code"], "INVALID_TIME_RANGE");

    let (status, body) = get_json(&mut app, "/data/query?tagNames=UNKNOWN").await;
    assert_eq!(status, StatusCode::OK);
    assert!(series_points(&body).is_empty());
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_scenario_load_and_reset() {
    let mut app = app();

    let (status, body) = get_json(&mut app, "/scenarios").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Data"].as_array().unwrap().len(), 5);

    let (status, body) = post_json(&mut app, "/scenarios/cnc_production/load?ticks=10", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Data"]["Scenario"], "cnc_production");
    assert_eq!(body["Data"]["TagsCreated"], 16);
    assert_eq!(body["Data"]["PointsFailed"], 0);
    assert!(body["Data"]["PointsWritten"].as_u64().unwrap() > 0);

    let (status, body) = post_json(&mut app, "/scenarios/advance?ticks=5", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Data"]["Ticks"], 5);
    assert_eq!(body["Data"]["PointsFailed"], 0);

    let (status, _) = post_json(&mut app, "/scenarios/steel_mill/load", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_json(&mut app, "/scenarios/press_line/load?ticks=99999999", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(&mut app, "/scenarios/reset", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["Data"]["PointsCleared"].as_u64().unwrap() > 0);

    let (_, body) = get_json(&mut app, "/health").await;
    assert_eq!(body["Data"]["PointCount"], 0);
    assert_eq!(body["Data"]["TagCount"], 16);
}

// =============================================================================
// Edge Cases
// =============================================================================

#[tokio::test]
async fn test_edge_case_control() {
    let mut app = app();

    let (status, body) = get_json(&mut app, "/simulation/edge-cases").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Data"].as_array().unwrap().len(), 8);

    let (status, body) = post_json(&mut app, "/simulation/edge-cases/null_values/activate", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Data"]["Changed"], true);

    let (status, body) = post_json(
        &mut app,
        "/simulation/edge-cases/null_values/generate?tagName=TEMP&count=3",
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let points = body["Data"].as_array().unwrap();
    assert_eq!(points.len(), 3);
    assert!(points.iter().all(|p| p["Value"].is_null() && p["Quality"] == 0));

    let (status, _) = post_json(&mut app, "/simulation/edge-cases/slow_responses/generate", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(&mut app, "/simulation/edge-cases/gremlins/activate", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = post_json(&mut app, "/simulation/edge-cases/deactivate-all", json!({})).await;
    assert!(body["Data"].as_array().unwrap().iter().all(|s| s["Active"] == false));
}

// =============================================================================
// Error Simulation
// =============================================================================

#[tokio::test]
async fn test_error_simulation_trips_circuit() {
    let mut app = app();

    let (status, _) = post_json(
        &mut app,
        "/simulation/errors/config",
        json!({
            "Enabled": true,
            "GlobalErrorRate": 1.0,
            "CircuitBreaker": {"FailureThreshold": 2, "OpenDurationMs": 60000}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..2 {
        let (status, body) = get_json(&mut app, "/tags").await;
        assert_ne!(status, StatusCode::OK);
        assert_eq!(body["Success"], false);
    }

    let (status, body) = get_json(&mut app, "/tags").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["Error"]["Code"], "CIRCUIT_OPEN");
    assert_eq!(body["Error"]["Retryable"], true);
    assert_eq!(body["Error"]["Category"], "Simulated");

    // Control endpoints bypass injection.
    let (status, body) = get_json(&mut app, "/simulation/errors/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Data"]["CircuitBreakers"]["GET:/tags"]["State"], "OPEN");

    let (_, body) = get_json(&mut app, "/simulation/errors/stats").await;
    assert_eq!(body["Data"]["ErrorsInjected"], 3);
    assert_eq!(body["Data"]["OpenCircuits"], 1);

    let (status, _) = post_json(&mut app, "/simulation/errors/config", json!({"Enabled": false})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get_json(&mut app, "/tags").await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = post_json(&mut app, "/simulation/errors/reset", json!({})).await;
    assert!(body["Data"]["CircuitBreakers"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_circuit_breaker_control() {
    let mut app = app();
    post_json(&mut app, "/simulation/errors/config", json!({"Enabled": true})).await;

    let (status, _) = post_json(
        &mut app,
        "/simulation/errors/circuit-breaker",
        json!({"Action": "open", "Method": "GET", "Path": "/tags"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_json(&mut app, "/tags").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    post_json(
        &mut app,
        "/simulation/errors/circuit-breaker",
        json!({"Action": "close"}),
    )
    .await;
    let (status, _) = get_json(&mut app, "/tags").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(
        &mut app,
        "/simulation/errors/circuit-breaker",
        json!({"Action": "open"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        &mut app,
        "/simulation/errors/circuit-breaker",
        json!({"Action": "configure", "OpenDurationMs": 9_000_000_000_000_000_000u64}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Data"]["Config"]["CircuitBreaker"]["OpenDurationMs"], 86_400_000);

    post_json(
        &mut app,
        "/simulation/errors/circuit-breaker",
        json!({"Action": "open", "Method": "GET", "Path": "/tags"}),
    )
    .await;
    let (status, _) = get_json(&mut app, "/tags").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, body) = get_json(&mut app, "/simulation/errors/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Data"]["OpenCircuits"], 1);
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_basic_auth_guards_api() {
    let mut app = create_router(AppState::new(ServerConfig::default().with_auth("operator", "s3cret")));

    let (status, _) = get_json(&mut app, "/tags").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get_json(&mut app, "/health").await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .uri("/tags")
        .header("Authorization", format!("Basic {}", BASE64.encode(b"operator:s3cret")))
        .body(Body::empty())
        .unwrap();
    let response = app.call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let mut app = app();
    create_uncompressed_tag(&mut app, "TEMP").await;
    post_json(
        &mut app,
        "/data/write/single",
        json!({"TagName": "TEMP", "Timestamp": "2024-01-01T00:00:00Z", "Value": 1.0}),
    )
    .await;

    let (status, body) = get_json(&mut app, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Data"]["TagCount"], 1);
    assert_eq!(body["Data"]["Store"]["PointsStored"], 1);
    assert!(body["Data"]["RequestsServed"].as_u64().unwrap() >= 2);
}
