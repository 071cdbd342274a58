// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use travel_match::error::{AppError, FeedError};

#[test]
fn test_transient_errors() {
    assert!(AppError::Backend("timeout".to_string()).is_transient());
    assert!(AppError::Database("unavailable".to_string()).is_transient());

    assert!(!AppError::Unauthorized.is_transient());
    assert!(!AppError::BadRequest("bad".to_string()).is_transient());
    assert!(!AppError::NotFound("gone".to_string()).is_transient());
}

#[test]
fn test_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
        (AppError::InvalidToken, StatusCode::UNAUTHORIZED),
        (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
        (AppError::BadRequest("x".to_string()), StatusCode::BAD_REQUEST),
        (AppError::Backend("x".to_string()), StatusCode::BAD_GATEWAY),
        (
            AppError::Database("x".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];
    for (err, status) in cases {
        assert_eq!(err.into_response().status(), status);
    }
}

#[test]
fn test_feed_error_wraps_backend() {
    let err: FeedError = AppError::Backend("down".to_string()).into();
    assert!(matches!(err, FeedError::Backend(AppError::Backend(_))));
    assert!(err.to_string().contains("down"));
    assert_eq!(FeedError::NoSession.to_string(), "No signed-in user");
}
