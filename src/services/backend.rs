// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The data backend a swipe session talks to, seen from the signed-in user.

use crate::db::MatchStore;
use crate::error::AppError;
use crate::models::{
    Candidate, DecisionResponse, Itinerary, SessionUser, SwipeDirection, UserProfile,
};
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// Backend operations needed by the candidate feed and swipe protocol.
#[async_trait]
pub trait MatchBackend: Send + Sync {
    /// The signed-in user, or `None` without a session.
    async fn fetch_current_user(&self) -> Result<Option<SessionUser>, AppError>;

    /// Up to `limit` candidates whose IDs are not in `exclude_ids`.
    async fn fetch_candidates(
        &self,
        exclude_ids: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<Candidate>, AppError>;

    /// Decisions made by `user_id` at or after `since`.
    async fn fetch_daily_decision_count(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, AppError>;

    /// Record a like/pass and report whether it completed a match.
    async fn record_decision(
        &self,
        swiper_id: &str,
        swipee_id: &str,
        liked: bool,
    ) -> Result<DecisionResponse, AppError>;

    /// Replace the signed-in user's itinerary.
    async fn save_itinerary(&self, itinerary: &Itinerary) -> Result<(), AppError>;
}

/// [`MatchBackend`] over a [`MatchStore`], acting as one user.
#[derive(Clone)]
pub struct StoreBackend {
    store: Arc<dyn MatchStore>,
    user_id: String,
}

impl StoreBackend {
    pub fn new(store: Arc<dyn MatchStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl MatchBackend for StoreBackend {
    async fn fetch_current_user(&self) -> Result<Option<SessionUser>, AppError> {
        let profile = self.store.get_user(&self.user_id).await?;
        Ok(profile.as_ref().map(SessionUser::from))
    }

    async fn fetch_candidates(
        &self,
        exclude_ids: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<Candidate>, AppError> {
        // Decisions from earlier sessions are excluded server-side as well
        let mut exclude = self.store.decided_ids(&self.user_id).await?;
        exclude.extend(exclude_ids.iter().cloned());
        exclude.insert(self.user_id.clone());

        let profiles = self.store.list_candidates(&exclude, limit).await?;
        Ok(profiles.into_iter().map(Candidate::from).collect())
    }

    async fn fetch_daily_decision_count(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, AppError> {
        self.store
            .count_decisions_since(user_id, &format_utc_rfc3339(since))
            .await
    }

    async fn record_decision(
        &self,
        swiper_id: &str,
        swipee_id: &str,
        liked: bool,
    ) -> Result<DecisionResponse, AppError> {
        self.store
            .record_decision(swiper_id, swipee_id, SwipeDirection::from_liked(liked))
            .await
    }

    async fn save_itinerary(&self, itinerary: &Itinerary) -> Result<(), AppError> {
        let now = format_utc_rfc3339(Utc::now());
        let mut profile = self
            .store
            .get_user(&self.user_id)
            .await?
            .unwrap_or_else(|| UserProfile {
                id: self.user_id.clone(),
                created_at: now.clone(),
                ..Default::default()
            });
        profile.itinerary = itinerary.clone();
        profile.updated_at = now;
        self.store.upsert_user(&profile).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;

    async fn seeded() -> (Arc<MemoryDb>, StoreBackend) {
        let db = Arc::new(MemoryDb::new());
        for id in ["me", "a", "b", "c"] {
            db.upsert_user(&UserProfile {
                id: id.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        }
        let backend = StoreBackend::new(db.clone(), "me");
        (db, backend)
    }

    #[tokio::test]
    async fn test_fetch_excludes_self_and_prior_decisions() {
        let (_db, backend) = seeded().await;
        backend.record_decision("me", "a", false).await.unwrap();

        let exclude: HashSet<String> = ["b".to_string()].into_iter().collect();
        let batch = backend.fetch_candidates(&exclude, 10).await.unwrap();
        let ids: Vec<&str> = batch.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
    }

    #[tokio::test]
    async fn test_current_user_missing_is_none() {
        let db = Arc::new(MemoryDb::new());
        let backend = StoreBackend::new(db, "ghost");
        assert!(backend.fetch_current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_itinerary_creates_profile() {
        let db = Arc::new(MemoryDb::new());
        let backend = StoreBackend::new(db.clone(), "new");
        let itinerary = Itinerary::new(vec![crate::models::itinerary::tests::stop("x", 1.0, 2.0)]);

        backend.save_itinerary(&itinerary).await.unwrap();
        let user = backend.fetch_current_user().await.unwrap().unwrap();
        assert_eq!(user.itinerary, itinerary);
    }
}
