// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for offline development and tests.

use crate::db::MatchStore;
use crate::error::AppError;
use crate::models::{
    chat_id_for, DecisionResponse, MatchRecord, SwipeDirection, SwipeRecord, UserProfile,
};
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// In-memory store with the same semantics as [`crate::db::FirestoreDb`].
#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<String, UserProfile>>,
    /// Keyed by `{swiper_id}_{swipee_id}`
    swipes: Arc<DashMap<String, SwipeRecord>>,
    /// Keyed by chat_id
    matches: Arc<DashMap<String, MatchRecord>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a swipe with an explicit timestamp (for seeding quota history).
    pub fn insert_swipe(&self, record: SwipeRecord) {
        self.swipes.insert(
            SwipeRecord::doc_id(&record.swiper_id, &record.swipee_id),
            record,
        );
    }

    pub fn get_match(&self, chat_id: &str) -> Option<MatchRecord> {
        self.matches.get(chat_id).map(|m| m.clone())
    }

    pub fn swipe_count(&self) -> usize {
        self.swipes.len()
    }

    fn outcome_for(&self, record: &SwipeRecord) -> DecisionResponse {
        if !record.direction.liked() {
            return DecisionResponse::no_match();
        }
        let chat_id = chat_id_for(&record.swiper_id, &record.swipee_id);
        if self.matches.contains_key(&chat_id) {
            DecisionResponse::matched(chat_id)
        } else {
            DecisionResponse::no_match()
        }
    }
}

#[async_trait]
impl MatchStore for MemoryDb {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<(), AppError> {
        self.users.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn list_candidates(
        &self,
        exclude_ids: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<UserProfile>, AppError> {
        let mut profiles: Vec<UserProfile> = self
            .users
            .iter()
            .filter(|entry| !exclude_ids.contains(entry.key()))
            .map(|entry| entry.value().clone())
            .collect();
        // Same order as the Firestore scan
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        profiles.truncate(limit);
        Ok(profiles)
    }

    async fn decided_ids(&self, swiper_id: &str) -> Result<HashSet<String>, AppError> {
        Ok(self
            .swipes
            .iter()
            .filter(|entry| entry.swiper_id == swiper_id)
            .map(|entry| entry.swipee_id.clone())
            .collect())
    }

    async fn count_decisions_since(&self, swiper_id: &str, since: &str) -> Result<u32, AppError> {
        Ok(self
            .swipes
            .iter()
            .filter(|entry| entry.swiper_id == swiper_id && entry.created_at.as_str() >= since)
            .count() as u32)
    }

    async fn record_decision(
        &self,
        swiper_id: &str,
        swipee_id: &str,
        direction: SwipeDirection,
    ) -> Result<DecisionResponse, AppError> {
        let now = format_utc_rfc3339(chrono::Utc::now());
        let record = SwipeRecord {
            swiper_id: swiper_id.to_string(),
            swipee_id: swipee_id.to_string(),
            direction,
            created_at: now.clone(),
        };

        // The entry guard is released at the end of this match, before the
        // reverse lookup touches the same map.
        match self.swipes.entry(SwipeRecord::doc_id(swiper_id, swipee_id)) {
            Entry::Occupied(existing) => {
                let existing = existing.get().clone();
                return Ok(self.outcome_for(&existing));
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }

        let mutual = direction.liked()
            && self
                .swipes
                .get(&SwipeRecord::doc_id(swipee_id, swiper_id))
                .is_some_and(|r| r.direction.liked());

        if !mutual {
            return Ok(DecisionResponse::no_match());
        }

        let match_record = MatchRecord::new(swiper_id, swipee_id, now);
        let chat_id = match_record.chat_id.clone();
        self.matches.entry(chat_id.clone()).or_insert(match_record);
        Ok(DecisionResponse::matched(chat_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mutual_like_creates_match() {
        let db = MemoryDb::new();

        let first = db
            .record_decision("alice", "bob", SwipeDirection::Like)
            .await
            .unwrap();
        assert!(!first.matched);

        let second = db
            .record_decision("bob", "alice", SwipeDirection::Like)
            .await
            .unwrap();
        assert!(second.matched);
        let chat_id = second.chat_id.unwrap();
        assert_eq!(chat_id, chat_id_for("alice", "bob"));
        assert!(db.get_match(&chat_id).is_some());
    }

    #[tokio::test]
    async fn test_pass_never_matches() {
        let db = MemoryDb::new();
        db.record_decision("alice", "bob", SwipeDirection::Like)
            .await
            .unwrap();
        let outcome = db
            .record_decision("bob", "alice", SwipeDirection::Pass)
            .await
            .unwrap();
        assert_eq!(outcome, DecisionResponse::no_match());
    }

    #[tokio::test]
    async fn test_duplicate_decision_is_idempotent() {
        let db = MemoryDb::new();
        db.record_decision("bob", "alice", SwipeDirection::Like)
            .await
            .unwrap();
        let first = db
            .record_decision("alice", "bob", SwipeDirection::Like)
            .await
            .unwrap();
        // A repeat with a different direction does not overwrite the first
        let repeat = db
            .record_decision("alice", "bob", SwipeDirection::Pass)
            .await
            .unwrap();

        assert_eq!(first, repeat);
        assert_eq!(db.swipe_count(), 2);
    }

    #[tokio::test]
    async fn test_underscore_ids_are_distinct_pairs() {
        let db = MemoryDb::new();
        db.record_decision("a_b", "c", SwipeDirection::Pass)
            .await
            .unwrap();
        db.record_decision("a", "b_c", SwipeDirection::Like)
            .await
            .unwrap();

        assert_eq!(db.swipe_count(), 2);
        assert_eq!(db.decided_ids("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_candidates_excludes_and_limits() {
        let db = MemoryDb::new();
        for id in ["a", "b", "c", "d"] {
            db.upsert_user(&profile(id)).await.unwrap();
        }
        let exclude: HashSet<String> = ["b".to_string()].into_iter().collect();

        let listed = db.list_candidates(&exclude, 2).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_count_decisions_since() {
        let db = MemoryDb::new();
        for (i, ts) in ["2026-01-01T23:59:59Z", "2026-01-02T00:00:00Z", "2026-01-02T08:00:00Z"]
            .iter()
            .enumerate()
        {
            db.insert_swipe(SwipeRecord {
                swiper_id: "alice".to_string(),
                swipee_id: format!("u{}", i),
                direction: SwipeDirection::Pass,
                created_at: ts.to_string(),
            });
        }

        let count = db
            .count_decisions_since("alice", "2026-01-02T00:00:00Z")
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(db.decided_ids("alice").await.unwrap().len(), 3);
    }
}
