// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Travel-Match API Server
//!
//! Stores traveler profiles and itineraries, serves proximity-ranked
//! candidate batches, and records swipe decisions and matches.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use travel_match::{
    config::Config,
    db::{FirestoreDb, MatchStore, MemoryDb},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        daily_limit = config.feed.daily_limit,
        batch_size = config.feed.batch_size,
        "Starting Travel-Match API"
    );

    let store: Arc<dyn MatchStore> = if config.offline_store {
        tracing::warn!("OFFLINE_STORE set, using in-memory store (data is not persisted)");
        Arc::new(MemoryDb::new())
    } else {
        let db = FirestoreDb::new(&config.gcp_project_id).await?;
        tracing::info!(project = %config.gcp_project_id, "Connected to Firestore");
        Arc::new(db)
    };

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
    });

    // Build router
    let app = travel_match::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,travel_match=debug"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
