//! HTTP Server for the roaster API.
//!
//! Provides REST endpoints for payload analysis, mapping execution and
//! agent-driven mapping repair.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | POST   | `/api/analyze`    | Infer the structure of a payload     |
//! | POST   | `/api/execute`    | Run a mapping specification once     |
//! | POST   | `/api/map`        | Run a mapping with the repair agent  |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, LOG_BROADCASTER};
use super::types::{
    error_response, AnalyzeRequest, ExecuteRequest, ExecuteResponse, MapRequest, MapResponse,
};
use crate::agent::{proposer_from_env, AgentOptions, ProposalPort};
use crate::error::{PipelineError, ServerError};
use crate::mapping::MappingSpecification;
use crate::models::AnalysisResult;
use crate::pipeline::{analyze_payload, execute_checked, map_payload};

type ApiError = (StatusCode, Json<Value>);

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub proposer: Arc<dyn ProposalPort>,
}

/// Build the router with CORS and all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/execute", post(execute_mapping))
        .route("/api/map", post(map_mapping))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(AppState {
        proposer: proposer_from_env(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Roaster server running on http://localhost:{}", port);
    println!("   POST /api/analyze - Analyze a payload");
    println!("   POST /api/execute - Execute a mapping");
    println!("   POST /api/map     - Map with the repair agent");
    println!("   GET  /api/logs    - SSE log stream");
    println!("   GET  /health      - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "roaster",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "analyze": "POST /api/analyze",
            "execute": "POST /api/execute",
            "map": "POST /api/map",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Analyze endpoint
async fn analyze(Json(request): Json<AnalyzeRequest>) -> Json<AnalysisResult> {
    Json(analyze_payload(&request.data, &request.options))
}

/// Execute endpoint
async fn execute_mapping(
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let spec = parse_spec(&request.mapping)?;
    let result = execute_checked(&request.data, &spec).map_err(pipeline_error)?;
    Ok(Json(result.into()))
}

/// Agent mapping endpoint
async fn map_mapping(
    State(state): State<AppState>,
    Json(request): Json<MapRequest>,
) -> Result<Json<MapResponse>, ApiError> {
    let spec = parse_spec(&request.mapping)?;
    let options = request
        .mapping_agent
        .unwrap_or_else(|| AgentOptions::default().disabled());

    let outcome = map_payload(&request.data, spec, &options, state.proposer.clone())
        .await
        .map_err(pipeline_error)?;
    Ok(Json(outcome.into()))
}

fn parse_spec(mapping: &Value) -> Result<MappingSpecification, ApiError> {
    MappingSpecification::from_value(mapping).map_err(|e| reject(ServerError::Spec(e)))
}

fn pipeline_error(error: PipelineError) -> ApiError {
    match error {
        PipelineError::Spec(e) => reject(ServerError::Spec(e)),
        other => reject(ServerError::Internal(other.to_string())),
    }
}

fn reject(error: ServerError) -> ApiError {
    let status = match error {
        ServerError::Spec(_) => StatusCode::BAD_REQUEST,
        ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    log_error(error.to_string());
    (status, Json(error_response(&error.to_string())))
}
