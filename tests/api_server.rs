mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::*;
use ocean_query::api_server::{create_router, ApiState};
use ocean_query::config::Config;
use ocean_query::llm::ChatModel;
use std::sync::Arc;
use tower::ServiceExt;

async fn router(llm: Arc<dyn ChatModel>) -> Router {
    let pipeline = pipeline_with(llm, argo_entries(), argo_entries()).await;
    create_router(ApiState { pipeline }, &Config::default().server)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_query_returns_html_summary_with_charts() {
    let llm = Arc::new(ScriptedChatModel::new(JANUARY_SQL_REPLY, SUMMARY_REPLY));
    let app = router(llm).await;

    let response = app
        .oneshot(post_json(
            "/query",
            r#"{"query": "what is the average temperature in January 2023"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let summary = json["summary"].as_str().unwrap();
    assert!(summary.starts_with("<p>The average temperature in January 2023 was about 28.15 °C.</p>"));
    assert!(summary.contains("<p>It stayed stable with depth.</p>"));
    assert_eq!(summary.matches("<img src=\"data:image/png;base64,").count(), 2);
}

#[tokio::test]
async fn test_missing_query_field_is_treated_as_empty() {
    let llm = Arc::new(ScriptedChatModel::new("SELECT 1", "Ask me anything about the ocean."));
    let app = router(llm.clone()).await;

    let response = app.oneshot(post_json("/query", "{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["summary"], "<p>Ask me anything about the ocean.</p>");
    assert_eq!(llm.requests()[0].user, "User query: ");
}

#[tokio::test]
async fn test_full_query_endpoint() {
    let llm = Arc::new(ScriptedChatModel::new(JANUARY_SQL_REPLY, SUMMARY_REPLY));
    let app = router(llm).await;

    let response = app
        .oneshot(post_json(
            "/api/query",
            r#"{"query": "average temperature in January 2023", "top_k": 2}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["kind"], "data_specific");
    assert!(json["sql"].as_str().unwrap().contains("CAST(p.time AS TIMESTAMP)"));
    assert_eq!(json["result"].as_array().unwrap().len(), 1);
    assert_eq!(json["retrieved"].as_array().unwrap().len(), 2);
    assert!(json["execution_error"].is_null());
    assert_eq!(json["raw_llm"], JANUARY_SQL_REPLY);
}

#[tokio::test]
async fn test_llm_failure_maps_to_500() {
    let app = router(Arc::new(UnreachableChatModel)).await;

    let response = app
        .oneshot(post_json("/query", r#"{"query": "what is the ocean"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_health_and_index_page() {
    let app = router(Arc::new(UnreachableChatModel)).await;

    let response = app
        .clone()
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["top_k"], 20);

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("Ocean Query Assistant"));
}

#[tokio::test]
async fn test_cors_allows_frontend_origin() {
    let app = router(Arc::new(UnreachableChatModel)).await;

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/query")
        .header(header::ORIGIN, "http://localhost:8080")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(preflight).await.unwrap();
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:8080"
    );

    let foreign = Request::builder()
        .method(Method::OPTIONS)
        .uri("/query")
        .header(header::ORIGIN, "http://evil.test")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(foreign).await.unwrap();
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}
