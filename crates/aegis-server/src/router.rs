//! Aegis Router
//!
//! HTTP router configuration with middleware stack. Defines all historian
//! routes and applies tracing, CORS, timeouts, body limits, authentication
//! and fault injection.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::handlers;
use crate::middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// Router
// =============================================================================

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let tag_routes = Router::new()
        .route("/", get(handlers::list_tags).post(handlers::create_tag))
        .route(
            "/:name",
            get(handlers::get_tag)
                .put(handlers::update_tag)
                .delete(handlers::delete_tag),
        );

    let data_routes = Router::new()
        .route("/write", post(handlers::write_data))
        .route("/write/single", post(handlers::write_single))
        .route("/write/buffered", post(handlers::write_buffered))
        .route("/query", get(handlers::query_data))
        .route("/recent", get(handlers::recent_data))
        .route("/aggregate", post(handlers::aggregate_data));

    let scenario_routes = Router::new()
        .route("/", get(handlers::list_scenarios))
        .route("/reset", post(handlers::reset_scenarios))
        .route("/advance", post(handlers::advance_scenario))
        .route("/:name/load", post(handlers::load_scenario));

    let simulation_routes = Router::new()
        .route("/errors/status", get(handlers::error_status))
        .route("/errors/config", post(handlers::configure_errors))
        .route("/errors/circuit-breaker", post(handlers::control_circuit_breaker))
        .route("/errors/stats", get(handlers::error_stats))
        .route("/errors/reset", post(handlers::reset_errors))
        .route("/edge-cases", get(handlers::list_edge_cases))
        .route("/edge-cases/deactivate-all", post(handlers::deactivate_all_edge_cases))
        .route("/edge-cases/:scenario/activate", post(handlers::activate_edge_case))
        .route("/edge-cases/:scenario/deactivate", post(handlers::deactivate_edge_case))
        .route("/edge-cases/:scenario/generate", post(handlers::generate_edge_cases));

    let router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        .nest("/tags", tag_routes)
        .nest("/data", data_routes)
        .nest("/scenarios", scenario_routes)
        .nest("/simulation", simulation_routes)
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::fault_injection))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::basic_auth))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
        .layer(TraceLayer::new_for_http());

    let router = if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    };

    router
        .layer(axum::middleware::from_fn(middleware::request_id))
        .with_state(state)
}

// =============================================================================
// Tests
// =============================================================================
