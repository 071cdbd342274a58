// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    Candidate, CandidateBatchRequest, CandidateBatchResponse, Checkpoint, DecisionCountResponse,
    DecisionRequest, DecisionResponse, Itinerary, MeResponse, SwipeDirection, UserProfile,
};
use crate::services::itinerary::{
    current_point, current_stop_name, effective_checkpoint_index, reference_point,
};
use crate::services::proximity::{rank, CandidateFilter, DistanceLabel};
use crate::time_utils::{format_utc_rfc3339, local_midnight};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Largest candidate batch a client may request.
const MAX_BATCH_SIZE: usize = 50;
/// Profiles scanned per feed request before filtering and ranking.
const FEED_SCAN_LIMIT: usize = 200;
const DEFAULT_FEED_LIMIT: usize = 20;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/me/itinerary", put(put_itinerary))
        .route("/api/me/itinerary/map", get(get_itinerary_map))
        .route("/api/candidates/batch", post(post_candidate_batch))
        .route("/api/feed", get(get_feed))
        .route("/api/decisions", post(post_decision))
        .route("/api/decisions/count", get(get_decision_count))
}

async fn load_profile(state: &AppState, user_id: &str) -> Result<UserProfile> {
    state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
}

// ─── User Profile ────────────────────────────────────────────

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let profile = load_profile(&state, &user.user_id).await?;
    let display_name = Candidate::from(profile.clone()).display_name;

    Ok(Json(MeResponse {
        id: profile.id,
        display_name,
        itinerary: profile.itinerary,
        privileged: user.privileged,
    }))
}

// ─── Itinerary ───────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ItinerarySaveResponse {
    pub checkpoints: usize,
    /// Dates go backwards somewhere; saved anyway
    pub chronology_warning: Option<String>,
}

/// Replace the whole itinerary (no partial edits).
async fn put_itinerary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(itinerary): Json<Itinerary>,
) -> Result<Json<ItinerarySaveResponse>> {
    itinerary
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let chronology_warning = itinerary.check_chronology().err().map(|v| v.to_string());
    if let Some(warning) = &chronology_warning {
        tracing::warn!(user_id = %user.user_id, warning = %warning, "Itinerary dates out of order");
    }

    let now = format_utc_rfc3339(Utc::now());
    let mut profile = state
        .store
        .get_user(&user.user_id)
        .await?
        .unwrap_or_else(|| UserProfile {
            id: user.user_id.clone(),
            created_at: now.clone(),
            ..Default::default()
        });
    let checkpoints = itinerary.len();
    profile.itinerary = itinerary;
    profile.updated_at = now;
    state.store.upsert_user(&profile).await?;

    tracing::info!(user_id = %user.user_id, checkpoints, "Itinerary saved");

    Ok(Json(ItinerarySaveResponse {
        checkpoints,
        chronology_warning,
    }))
}

#[derive(Serialize)]
pub struct ItineraryMapResponse {
    /// Checkpoints as points plus the route as a LineString
    pub geojson: geojson::FeatureCollection,
    /// Encoded polyline (precision 5) of the route
    pub polyline: String,
    /// Estimated position right now, as `[lng, lat]`
    pub current_position: Option<[f64; 2]>,
    pub current_stop: Option<String>,
}

/// Map rendering data for the user's own route.
async fn get_itinerary_map(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let profile = load_profile(&state, &user.user_id).await?;
    let itinerary = &profile.itinerary;
    let now = Utc::now();

    let polyline = itinerary
        .route_polyline()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Polyline encoding failed: {}", e)))?;

    let body = ItineraryMapResponse {
        geojson: itinerary.to_geojson(),
        polyline,
        current_position: current_point(itinerary, now).map(|p| [p.x(), p.y()]),
        current_stop: current_stop_name(itinerary, now),
    };

    Ok(([(header::CACHE_CONTROL, "private, max-age=60")], Json(body)))
}

// ─── Candidates ──────────────────────────────────────────────

/// Exclusion set for `user_id`: self, everyone already decided, plus `extra`.
async fn exclusion_for(
    state: &AppState,
    user_id: &str,
    extra: impl IntoIterator<Item = String>,
) -> Result<HashSet<String>> {
    let mut exclude = state.store.decided_ids(user_id).await?;
    exclude.extend(extra);
    exclude.insert(user_id.to_string());
    Ok(exclude)
}

/// Next batch for a swipe session; the client ranks it.
async fn post_candidate_batch(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CandidateBatchRequest>,
) -> Result<Json<CandidateBatchResponse>> {
    let limit = request
        .limit
        .unwrap_or(state.config.feed.batch_size)
        .clamp(1, MAX_BATCH_SIZE);
    let exclude = exclusion_for(&state, &user.user_id, request.exclude_ids).await?;

    let candidates: Vec<Candidate> = state
        .store
        .list_candidates(&exclude, limit)
        .await?
        .into_iter()
        .map(Candidate::from)
        .collect();

    tracing::debug!(
        user_id = %user.user_id,
        excluded = exclude.len(),
        returned = candidates.len(),
        "Candidate batch"
    );

    Ok(Json(CandidateBatchResponse { candidates }))
}

#[derive(Deserialize)]
struct FeedQuery {
    /// Free-text filter on name and bio
    q: Option<String>,
    /// Comma-separated tags (match any)
    tags: Option<String>,
    /// Checkpoint of the viewer's route to rank from (privileged only)
    #[serde(default)]
    checkpoint: usize,
    limit: Option<usize>,
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FeedCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    /// "Nearby", "On route", "12 km" or "Distance unknown"
    pub distance_label: String,
    /// Where the candidate is staying right now, if known
    pub current_stop: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FeedResponse {
    pub candidates: Vec<FeedCandidate>,
    /// Name of the checkpoint distances are measured from
    pub reference_checkpoint: Option<String>,
}

/// Server-side ranked page with filters.
async fn get_feed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<FeedQuery>,
) -> Result<Json<FeedResponse>> {
    let viewer = load_profile(&state, &user.user_id).await?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_FEED_LIMIT)
        .clamp(1, MAX_BATCH_SIZE);

    let index = effective_checkpoint_index(params.checkpoint, user.privileged);
    let reference = reference_point(&viewer.itinerary, index);

    let filter = CandidateFilter {
        query: params.q,
        tags: params
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
    };

    let exclude = exclusion_for(&state, &user.user_id, std::iter::empty()).await?;
    let profiles = state.store.list_candidates(&exclude, FEED_SCAN_LIMIT).await?;
    let candidates = profiles.into_iter().map(Candidate::from).collect();

    let mut ranked = rank(reference.and_then(Checkpoint::point), candidates, &filter);
    ranked.truncate(limit);

    let now = Utc::now();
    let searching_along_route = index > 0;
    let candidates = ranked
        .into_iter()
        .map(|candidate| FeedCandidate {
            distance_label: DistanceLabel::for_distance(
                candidate.distance_or_infinity(),
                searching_along_route,
            )
            .to_string(),
            current_stop: current_stop_name(&candidate.itinerary, now),
            candidate,
        })
        .collect();

    Ok(Json(FeedResponse {
        candidates,
        reference_checkpoint: reference.map(|c| c.name.clone()),
    }))
}

// ─── Decisions ───────────────────────────────────────────────

/// Record a like/pass by the signed-in user.
async fn post_decision(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>> {
    if request.swipee_id == user.user_id {
        return Err(AppError::BadRequest("Cannot swipe on yourself".to_string()));
    }
    if state.store.get_user(&request.swipee_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "User {} not found",
            request.swipee_id
        )));
    }

    let response = state
        .store
        .record_decision(
            &user.user_id,
            &request.swipee_id,
            SwipeDirection::from_liked(request.liked),
        )
        .await?;

    Ok(Json(response))
}

#[derive(Deserialize)]
struct CountQuery {
    /// Start of the window (RFC 3339); defaults to today's midnight
    since: Option<String>,
}

/// Decisions recorded by the signed-in user since `since`.
async fn get_decision_count(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<CountQuery>,
) -> Result<Json<DecisionCountResponse>> {
    let since = match params.since.as_deref() {
        Some(raw) => chrono::DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| {
                AppError::BadRequest(
                    "Invalid 'since' parameter: must be RFC3339 datetime".to_string(),
                )
            })?,
        None => local_midnight(Utc::now(), state.config.feed.quota_offset),
    };
    // Stored timestamps are compared as strings, so normalize to the same form
    let since = format_utc_rfc3339(since);

    let count = state
        .store
        .count_decisions_since(&user.user_id, &since)
        .await?;

    Ok(Json(DecisionCountResponse {
        count,
        since,
        daily_limit: state.config.feed.daily_limit,
    }))
}
