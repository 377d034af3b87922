//! 健康检查 API 集成测试

use axum::http::StatusCode;
use std::sync::Arc;

mod common;
use common::{
    body_json, create_test_app, create_test_config, default_test_app, get_request, json_request,
    login_user, register_user, send, DownStore,
};

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = default_test_app();

    let response = send(&app.router, get_request("/health", None)).await;

    // 验证响应
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["uptime_secs"].is_number());
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let (app, _) = default_test_app();

    // 超过配额次数仍然可用
    for _ in 0..10 {
        let response = send(&app.router, get_request("/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
}

#[tokio::test]
async fn test_trace_id_is_propagated() {
    let (app, _) = default_test_app();

    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-trace-id", "trace-abc-123")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = send(&app.router, request).await;

    assert_eq!(response.headers().get("x-trace-id").unwrap(), "trace-abc-123");
}

#[tokio::test]
async fn test_ready_endpoint() {
    let (app, _) = default_test_app();

    let response = send(&app.router, get_request("/ready", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"][0]["name"], "database");
    assert_eq!(json["checks"][0]["status"], "healthy");
    assert_eq!(json["checks"][1]["name"], "counter_store");
    assert_eq!(json["checks"][1]["status"], "healthy");
}

#[tokio::test]
async fn test_ready_reports_store_down() {
    let app = create_test_app(create_test_config(), Arc::new(DownStore));

    let response = send(&app.router, get_request("/ready", None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = body_json(response).await;
    assert_eq!(json["ready"], false);
    assert_eq!(json["checks"][0]["status"], "healthy");
    assert_eq!(json["checks"][1]["name"], "counter_store");
    assert_eq!(json["checks"][1]["status"], "unhealthy");
}

#[tokio::test]
async fn test_unknown_route() {
    let (app, _) = default_test_app();

    let response = send(&app.router, get_request("/v1/nope", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_route_with_token_is_404_and_free() {
    let (app, store) = default_test_app();
    register_user(&app.router, "user@test.com", "TestPass123").await;
    let token = login_user(&app.router, "user@test.com", "TestPass123").await;

    let response = send(&app.router, get_request("/v1/nope", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get("x-ratelimit-limit").is_none());

    let response = send(
        &app.router,
        json_request("POST", "/v1/nope", serde_json::json!({}), Some("garbage")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // 未匹配的路径不消耗配额
    assert_eq!(store.len(), 0);
}
