// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Security tests for the sweep trigger endpoints.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

fn sweep_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_sweep_without_token_unauthorized() {
    let (app, _, _rx) = common::create_test_app();

    let response = app
        .oneshot(sweep_request("/tasks/expiry-sweep", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sweep_with_wrong_token_forbidden() {
    let (app, _, _rx) = common::create_test_app();

    let response = app
        .oneshot(sweep_request("/tasks/proximity-sweep", Some("guess")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_player_jwt_is_not_a_scheduler_token() {
    let (app, state, _rx) = common::create_test_app();
    let jwt = common::create_test_jwt(1, &state.config.jwt_signing_key);

    let response = app
        .oneshot(sweep_request("/tasks/expiry-sweep", Some(&jwt)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sweeps_with_scheduler_token() {
    let (app, state, _rx) = common::create_test_app();
    let token = state.config.scheduler_token.clone();

    for uri in ["/tasks/expiry-sweep", "/tasks/proximity-sweep"] {
        let response = app
            .clone()
            .oneshot(sweep_request(uri, Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let report: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(report["scanned"], 0);
        assert_eq!(report["affected"], 0);
    }
}
