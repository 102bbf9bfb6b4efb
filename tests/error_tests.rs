// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use territory::error::AppError;

mod common;

async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_client_errors_carry_details() {
    let (status, json) = body_json(AppError::Validation("Trek too short".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
    assert_eq!(json["details"], "Trek too short");

    let (status, json) = body_json(AppError::Conflict("Zone 4 changed".to_string())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");

    let (status, json) = body_json(AppError::NotFound("Zone 9".to_string())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["details"], "Zone 9");

    let (status, json) = body_json(AppError::Unauthorized).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json.get("details").is_none());
}

#[tokio::test]
async fn test_server_errors_hide_details() {
    let (status, json) = body_json(AppError::Database("connection reset".to_string())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "database_error");
    assert!(json.get("details").is_none());

    let (status, json) = body_json(AppError::Internal(anyhow::anyhow!("boom"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "internal_error");
    assert!(json.get("details").is_none());
}

#[test]
fn test_validation_errors_convert() {
    use validator::Validate;

    #[derive(Validate)]
    struct Radius {
        #[validate(range(min = 1.0))]
        radius_m: f64,
    }

    let err: AppError = Radius { radius_m: 0.0 }.validate().unwrap_err().into();
    assert!(matches!(err, AppError::Validation(msg) if msg.contains("radius_m")));
}

#[tokio::test]
async fn test_offline_store_surfaces_as_database_error() {
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use territory::config::Config;
    use territory::db::FirestoreDb;
    use territory::services::NotificationQueue;
    use territory::AppState;
    use tower::ServiceExt;

    let config = Config::test_default();
    let token = common::create_test_jwt(5, &config.jwt_signing_key);
    let (queue, _rx) = NotificationQueue::new();
    let state = Arc::new(AppState::new(config, FirestoreDb::new_mock(), queue));
    let app = territory::routes::create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
