// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, Response};
use std::sync::Arc;
use travel_match::config::Config;
use travel_match::db::{FirestoreDb, MatchStore, MemoryDb};
use travel_match::middleware::auth::create_jwt;
use travel_match::models::{Checkpoint, Itinerary, UserProfile};
use travel_match::routes::create_router;
use travel_match::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app over a fresh in-memory store.
/// Returns the router, the shared state and the store for seeding.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<MemoryDb>) {
    let config = Config::test_default();
    let store = Arc::new(MemoryDb::new());

    let state = Arc::new(AppState {
        config,
        store: store.clone(),
    });

    (create_router(state.clone()), state, store)
}

/// Session token for `user_id`, signed with the test key.
#[allow(dead_code)]
pub fn bearer(state: &AppState, user_id: &str, privileged: bool) -> String {
    let token = create_jwt(user_id, privileged, &state.config.jwt_signing_key)
        .expect("Failed to create JWT");
    format!("Bearer {}", token)
}

/// A checkpoint with coordinates and no dates.
#[allow(dead_code)]
pub fn checkpoint(id: &str, name: &str, lat: f64, lng: f64) -> Checkpoint {
    Checkpoint {
        id: id.to_string(),
        name: name.to_string(),
        lat: Some(lat),
        lng: Some(lng),
        start_date: None,
        end_date: None,
        duration_days: None,
    }
}

/// A profile whose route starts at `(lat, lng)`, or has no route.
#[allow(dead_code)]
pub fn traveler(id: &str, at: Option<(f64, f64)>) -> UserProfile {
    let itinerary = match at {
        Some((lat, lng)) => Itinerary::new(vec![checkpoint(&format!("{}-1", id), id, lat, lng)]),
        None => Itinerary::default(),
    };
    UserProfile {
        id: id.to_string(),
        display_name: Some(id.to_string()),
        itinerary,
        ..Default::default()
    }
}

#[allow(dead_code)]
pub async fn seed(store: &MemoryDb, profiles: Vec<UserProfile>) {
    for profile in profiles {
        store.upsert_user(&profile).await.unwrap();
    }
}

/// Build an authenticated JSON request.
#[allow(dead_code)]
pub fn json_request(
    method: &str,
    uri: &str,
    auth: &str,
    body: serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build an authenticated GET request.
#[allow(dead_code)]
pub fn get_request(uri: &str, auth: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, auth)
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
