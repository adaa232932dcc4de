//! Integration tests for per-operator rate limiting.

mod common;

use axum::http::StatusCode;
use common::{
    create_lazy_test_pool, create_test_app, get_request_anonymous, get_request_with_operator,
    parse_response_body, test_config,
};
use tower::ServiceExt;

#[tokio::test]
async fn test_requests_above_limit_get_429() {
    let mut config = test_config();
    config.security.rate_limit_per_minute = 2;
    let app = create_test_app(config, create_lazy_test_pool());

    // The first two requests pass the limiter (and then fail on the absent
    // database); the third is refused before any handler runs.
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(get_request_with_operator("/api/v1/reviews/recent", 7))
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let response = app
        .oneshot(get_request_with_operator("/api/v1/reviews/recent", 7))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));

    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "rate_limit_exceeded");
}

#[tokio::test]
async fn test_limits_are_tracked_per_operator() {
    let mut config = test_config();
    config.security.rate_limit_per_minute = 1;
    let app = create_test_app(config, create_lazy_test_pool());

    // Operator 1 exhausts their budget.
    let _ = app
        .clone()
        .oneshot(get_request_with_operator("/api/v1/reviews/recent", 1))
        .await
        .unwrap();
    let second = app
        .clone()
        .oneshot(get_request_with_operator("/api/v1/reviews/recent", 1))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    // Operator 2 is unaffected.
    let other = app
        .oneshot(get_request_with_operator("/api/v1/reviews/recent", 2))
        .await
        .unwrap();
    assert_ne!(other.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_probe_routes_are_not_rate_limited() {
    let mut config = test_config();
    config.security.rate_limit_per_minute = 1;
    let app = create_test_app(config, create_lazy_test_pool());

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(get_request_anonymous("/api/health/live"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_rate_limiting_disabled_when_limit_is_zero() {
    let mut config = test_config();
    config.security.rate_limit_per_minute = 0;
    let app = create_test_app(config, create_lazy_test_pool());

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(get_request_with_operator("/api/v1/reviews/recent", 7))
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
