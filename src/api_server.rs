//! HTTP API
//!
//! `POST /query` answers the chat frontend with a ready-to-render HTML fragment;
//! `POST /api/query` returns the whole pipeline output as JSON.

use crate::config::ServerSettings;
use crate::error::OceanError;
use crate::pipeline::{PipelineOutput, QueryPipeline};
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, warn};

/// API State - Shared between handlers
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: QueryPipeline,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
    /// Overrides the configured retrieval depth (`/api/query` only)
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub top_k: usize,
}

/// Pipeline failure mapped to `500 {"error": ...}`
pub struct ApiError(OceanError);

impl From<OceanError> for ApiError {
    fn from(e: OceanError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Query failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        top_k: state.pipeline.top_k(),
    })
}

/// Chat endpoint: summary paragraphs plus inline chart images.
async fn query(
    State(state): State<ApiState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let output = state.pipeline.run(&request.query).await?;
    Ok(Json(SummaryResponse {
        summary: format_summary_html(&output),
    }))
}

/// Full pipeline output as JSON.
async fn query_full(
    State(state): State<ApiState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let k = request.top_k.unwrap_or_else(|| state.pipeline.top_k());
    let output = state.pipeline.run_with_k(&request.query, k).await?;
    Ok(Json(output.to_json()?))
}

/// Escape text for inclusion in HTML element content.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn chart_img(base64_png: &str, alt: &str) -> String {
    format!(
        "<img src=\"data:image/png;base64,{}\" alt=\"{}\" style=\"max-width:100%; display:block; margin:20px auto;\">",
        base64_png, alt
    )
}

/// Summary paragraphs (split on blank lines) wrapped in `<p>`, then the line chart
/// and the step chart when present.
pub fn format_summary_html(output: &PipelineOutput) -> String {
    let mut html: String = output
        .summary
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p)))
        .collect();

    if let Some(line) = output.line_chart() {
        html.push_str(&chart_img(line, "Line Chart"));
    }
    if let Some(step) = output.step_chart() {
        html.push_str(&chart_img(step, "Step Chart"));
    }
    html
}

fn cors_layer(settings: &ServerSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the API router
pub fn create_router(state: ApiState, settings: &ServerSettings) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/query", post(query))
        .route("/api/query", post(query_full))
        .route("/api/health", get(health_check))
        .layer(cors_layer(settings))
        .with_state(state)
}
