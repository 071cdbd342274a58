// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore, plus an in-memory store for offline use).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{DecisionResponse, SwipeDirection, UserProfile};
use async_trait::async_trait;
use std::collections::HashSet;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Swipe decisions (keyed by `{swiper_id}_{swipee_id}`)
    pub const SWIPES: &str = "swipes";
    /// Mutual likes (keyed by chat_id)
    pub const MATCHES: &str = "matches";
}

/// Multi-user storage backing the HTTP API.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Get a profile by user ID.
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, AppError>;

    /// Create or replace a profile.
    async fn upsert_user(&self, profile: &UserProfile) -> Result<(), AppError>;

    /// List up to `limit` profiles whose IDs are not in `exclude_ids`.
    async fn list_candidates(
        &self,
        exclude_ids: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<UserProfile>, AppError>;

    /// IDs of every user `swiper_id` has already decided on.
    async fn decided_ids(&self, swiper_id: &str) -> Result<HashSet<String>, AppError>;

    /// Count decisions by `swiper_id` recorded at or after `since` (RFC 3339, `Z`).
    async fn count_decisions_since(&self, swiper_id: &str, since: &str) -> Result<u32, AppError>;

    /// Record a decision and evaluate mutual interest.
    ///
    /// Idempotent per ordered pair: a repeated call returns the outcome of the
    /// first decision without rewriting it.
    async fn record_decision(
        &self,
        swiper_id: &str,
        swipee_id: &str,
        direction: SwipeDirection,
    ) -> Result<DecisionResponse, AppError>;
}
