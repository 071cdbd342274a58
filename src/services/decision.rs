// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Swipe decision protocol: idempotence, quota enforcement, and match detection.
//!
//! A decision is split in two so the remote call can run off the session's
//! command loop:
//!
//! 1. [`DecisionProtocol::begin`] checks for duplicates and the quota and
//!    returns a [`DecisionCall`] that owns everything it needs.
//! 2. [`DecisionProtocol::finish`] lands the result, counts it against the
//!    quota and reports whether the gate changed.

use crate::error::AppError;
use crate::models::{DecisionResponse, SwipeDirection};
use crate::services::backend::MatchBackend;
use crate::services::quota::{GateChange, QuotaGate};
use std::collections::HashSet;
use std::sync::Arc;

/// Result of one swipe decision.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    /// Stored; `matched` is set when the other user had already liked back.
    Recorded(DecisionResponse),
    /// Already decided (or in flight) in this session; nothing was sent.
    Duplicate,
    /// The daily quota is used up; nothing was sent.
    QuotaBlocked,
    /// The backend call failed.
    Failed(String),
}

impl DecisionOutcome {
    /// Whether the candidate should go back into the stack.
    pub fn should_restore(&self) -> bool {
        matches!(self, DecisionOutcome::QuotaBlocked | DecisionOutcome::Failed(_))
    }
}

/// A decision cleared to go to the backend.
pub struct DecisionCall {
    backend: Arc<dyn MatchBackend>,
    swiper_id: String,
    pub swipee_id: String,
    pub direction: SwipeDirection,
}

impl DecisionCall {
    pub async fn send(self) -> Result<DecisionResponse, AppError> {
        self.backend
            .record_decision(&self.swiper_id, &self.swipee_id, self.direction.liked())
            .await
    }
}

/// Per-session bookkeeping for swipe decisions.
pub struct DecisionProtocol {
    backend: Arc<dyn MatchBackend>,
    swiper_id: String,
    recorded: HashSet<String>,
    in_flight: HashSet<String>,
}

impl DecisionProtocol {
    pub fn new(backend: Arc<dyn MatchBackend>, swiper_id: impl Into<String>) -> Self {
        Self {
            backend,
            swiper_id: swiper_id.into(),
            recorded: HashSet::new(),
            in_flight: HashSet::new(),
        }
    }

    pub fn is_recorded(&self, swipee_id: &str) -> bool {
        self.recorded.contains(swipee_id)
    }

    /// Check a commit against the session state before it is sent.
    pub fn begin(
        &mut self,
        gate: &QuotaGate,
        swipee_id: &str,
        direction: SwipeDirection,
    ) -> Result<DecisionCall, DecisionOutcome> {
        if self.recorded.contains(swipee_id) || self.in_flight.contains(swipee_id) {
            tracing::debug!(swipee_id, "Ignoring repeated decision");
            return Err(DecisionOutcome::Duplicate);
        }

        // Unconfirmed decisions count too, or two quick swipes could both
        // slip under the limit
        let pending = u32::try_from(self.in_flight.len()).unwrap_or(u32::MAX);
        if !gate.admits(pending) {
            tracing::debug!(swipee_id, count = gate.count(), "Decision blocked by quota");
            return Err(DecisionOutcome::QuotaBlocked);
        }

        self.in_flight.insert(swipee_id.to_string());
        Ok(DecisionCall {
            backend: self.backend.clone(),
            swiper_id: self.swiper_id.clone(),
            swipee_id: swipee_id.to_string(),
            direction,
        })
    }

    /// Land the backend result for `swipee_id`.
    pub fn finish(
        &mut self,
        gate: &mut QuotaGate,
        swipee_id: &str,
        result: Result<DecisionResponse, AppError>,
    ) -> (DecisionOutcome, GateChange) {
        self.in_flight.remove(swipee_id);

        match result {
            Ok(response) => {
                self.recorded.insert(swipee_id.to_string());
                let change = gate.record_success();
                if response.matched {
                    tracing::info!(
                        swiper_id = %self.swiper_id,
                        swipee_id,
                        chat_id = ?response.chat_id,
                        "Match!"
                    );
                }
                (DecisionOutcome::Recorded(response), change)
            }
            Err(e) => {
                tracing::warn!(
                    swiper_id = %self.swiper_id,
                    swipee_id,
                    error = %e,
                    "Failed to record decision"
                );
                (DecisionOutcome::Failed(e.to_string()), GateChange::Unchanged)
            }
        }
    }

    /// Begin, send, and finish in one step.
    pub async fn decide(
        &mut self,
        gate: &mut QuotaGate,
        swipee_id: &str,
        direction: SwipeDirection,
    ) -> (DecisionOutcome, GateChange) {
        let call = match self.begin(gate, swipee_id, direction) {
            Ok(call) => call,
            Err(outcome) => return (outcome, GateChange::Unchanged),
        };
        let result = call.send().await;
        self.finish(gate, swipee_id, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MatchStore, MemoryDb};
    use crate::models::UserProfile;
    use crate::services::backend::StoreBackend;

    async fn protocol_for(user: &str) -> (Arc<MemoryDb>, DecisionProtocol) {
        let db = Arc::new(MemoryDb::new());
        for id in ["me", "you", "other"] {
            db.upsert_user(&UserProfile {
                id: id.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        }
        let backend = Arc::new(StoreBackend::new(db.clone(), user));
        (db, DecisionProtocol::new(backend, user))
    }

    #[tokio::test]
    async fn test_like_without_reciprocation_is_not_a_match() {
        let (_db, mut protocol) = protocol_for("me").await;
        let mut gate = QuotaGate::new(10, 0, false);

        let (outcome, change) = protocol.decide(&mut gate, "you", SwipeDirection::Like).await;
        assert_eq!(outcome, DecisionOutcome::Recorded(DecisionResponse::no_match()));
        assert_eq!(change, GateChange::Unchanged);
        assert_eq!(gate.count(), 1);
    }

    #[tokio::test]
    async fn test_reciprocated_like_matches() {
        let (db, mut protocol) = protocol_for("me").await;
        db.record_decision("you", "me", SwipeDirection::Like)
            .await
            .unwrap();
        let mut gate = QuotaGate::new(10, 0, false);

        let (outcome, _) = protocol.decide(&mut gate, "you", SwipeDirection::Like).await;
        match outcome {
            DecisionOutcome::Recorded(response) => {
                assert!(response.matched);
                assert_eq!(response.chat_id, Some(crate::models::chat_id_for("me", "you")));
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_is_not_sent_or_counted() {
        let (db, mut protocol) = protocol_for("me").await;
        let mut gate = QuotaGate::new(10, 0, false);

        protocol.decide(&mut gate, "you", SwipeDirection::Pass).await;
        let (outcome, _) = protocol.decide(&mut gate, "you", SwipeDirection::Like).await;

        assert_eq!(outcome, DecisionOutcome::Duplicate);
        assert_eq!(gate.count(), 1);
        assert_eq!(db.swipe_count(), 1);
    }

    #[tokio::test]
    async fn test_tenth_success_closes_gate_and_eleventh_is_blocked() {
        let (db, mut protocol) = protocol_for("me").await;
        let mut gate = QuotaGate::new(10, 9, false);

        let (_, change) = protocol.decide(&mut gate, "you", SwipeDirection::Like).await;
        assert!(matches!(change, GateChange::Closed(_)));

        let (outcome, _) = protocol.decide(&mut gate, "other", SwipeDirection::Like).await;
        assert_eq!(outcome, DecisionOutcome::QuotaBlocked);
        assert!(outcome.should_restore());
        assert_eq!(db.swipe_count(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_counts_against_quota() {
        let (_db, mut protocol) = protocol_for("me").await;
        let mut gate = QuotaGate::new(10, 9, false);

        let call = protocol.begin(&gate, "you", SwipeDirection::Like).unwrap();
        assert_eq!(
            protocol.begin(&gate, "other", SwipeDirection::Like).err(),
            Some(DecisionOutcome::QuotaBlocked)
        );
        assert_eq!(
            protocol.begin(&gate, "you", SwipeDirection::Like).err(),
            Some(DecisionOutcome::Duplicate)
        );

        let result = call.send().await;
        protocol.finish(&mut gate, "you", result);
        assert!(protocol.is_recorded("you"));
    }

    #[tokio::test]
    async fn test_failure_is_not_counted() {
        let (_db, mut protocol) = protocol_for("me").await;
        let mut gate = QuotaGate::new(10, 0, false);

        let _call = protocol.begin(&gate, "you", SwipeDirection::Like).unwrap();
        let (outcome, change) = protocol.finish(
            &mut gate,
            "you",
            Err(AppError::Backend("connection reset".to_string())),
        );

        assert!(matches!(outcome, DecisionOutcome::Failed(ref msg) if msg.contains("connection reset")));
        assert_eq!(change, GateChange::Unchanged);
        assert_eq!(gate.count(), 0);
        assert!(!protocol.is_recorded("you"));
    }
}
