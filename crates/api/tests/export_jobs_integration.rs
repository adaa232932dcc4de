//! Integration tests for the export-job endpoints.
//!
//! Covers the sourcing-callback surface in front of the database: operator
//! scoping headers, payload validation and the request body cap. No
//! PostgreSQL instance is needed.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    create_offline_test_app, get_request_with_operator, json_request_anonymous,
    json_request_with_operator, parse_response_body, put_file_request, TEST_OPERATOR_ID,
};
use serde_json::json;
use tower::ServiceExt;

// ============================================================================
// Job Announcement Tests
// ============================================================================

#[tokio::test]
async fn test_create_export_job_without_operator_header_is_unauthorized() {
    let app = create_offline_test_app();

    let request = json_request_anonymous(
        Method::POST,
        "/api/v1/export-jobs",
        json!({"logId": "log-1", "fileName": "leads.csv"}),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_export_job_with_invalid_log_id_is_rejected() {
    let app = create_offline_test_app();

    let request = json_request_with_operator(
        Method::POST,
        "/api/v1/export-jobs",
        json!({"logId": "../escape", "fileName": "leads.csv"}),
        TEST_OPERATOR_ID,
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_create_export_job_with_empty_file_name_is_rejected() {
    let app = create_offline_test_app();

    let request = json_request_with_operator(
        Method::POST,
        "/api/v1/export-jobs",
        json!({"logId": "log-1", "fileName": ""}),
        TEST_OPERATOR_ID,
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// File Upload Tests
// ============================================================================

#[tokio::test]
async fn test_store_export_file_with_empty_body_is_rejected() {
    let app = create_offline_test_app();

    let request = put_file_request("/api/v1/export-jobs/log-1/file", "", TEST_OPERATOR_ID);

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = parse_response_body(response).await;
    assert!(body["message"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_store_export_file_above_body_cap_is_rejected() {
    let app = create_offline_test_app();

    // One byte over the configured max_body_size.
    let oversized = "a".repeat(1_048_577);
    let request = put_file_request(
        "/api/v1/export-jobs/log-1/file",
        oversized,
        TEST_OPERATOR_ID,
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// ============================================================================
// Listing Tests
// ============================================================================

#[tokio::test]
async fn test_list_export_jobs_with_out_of_range_limit_is_rejected() {
    let app = create_offline_test_app();

    let response = app
        .oneshot(get_request_with_operator(
            "/api/v1/export-jobs?limit=0",
            TEST_OPERATOR_ID,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_export_jobs_without_operator_header_is_unauthorized() {
    let app = create_offline_test_app();

    let response = app
        .oneshot(common::get_request_anonymous("/api/v1/export-jobs"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
