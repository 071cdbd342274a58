// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Candidate pagination: exclusion set, deduplication, and low-watermark refills.

use crate::error::AppError;
use crate::models::Candidate;
use std::collections::HashSet;

/// A batch request the pager has committed to.
///
/// Only one may be outstanding; overlapping refill triggers are coalesced.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub exclude_ids: HashSet<String>,
    pub limit: usize,
}

/// Tracks which candidates must never be fetched again in this session.
#[derive(Debug, Clone)]
pub struct CandidatePager {
    self_id: String,
    decided: HashSet<String>,
    /// IDs currently held in the card stack, undecided
    loaded: HashSet<String>,
    batch_size: usize,
    low_watermark: usize,
    in_flight: bool,
    /// Last batch came back short; stop auto-refilling until a retry
    exhausted: bool,
    last_error: Option<String>,
}

impl CandidatePager {
    pub fn new(self_id: impl Into<String>, batch_size: usize, low_watermark: usize) -> Self {
        Self {
            self_id: self_id.into(),
            decided: HashSet::new(),
            loaded: HashSet::new(),
            batch_size: batch_size.max(1),
            low_watermark,
            in_flight: false,
            exhausted: false,
            last_error: None,
        }
    }

    /// Self, already-decided, and already-loaded IDs.
    pub fn exclusion_set(&self) -> HashSet<String> {
        let mut set: HashSet<String> = self.decided.union(&self.loaded).cloned().collect();
        set.insert(self.self_id.clone());
        set
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        id == self.self_id || self.decided.contains(id) || self.loaded.contains(id)
    }

    pub fn is_decided(&self, id: &str) -> bool {
        self.decided.contains(id)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Error from the last failed fetch, while a manual retry is pending.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The last batch came back short, so automatic refills have stopped.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Whether a background refill should start with `remaining` undecided cards.
    pub fn needs_refill(&self, remaining: usize) -> bool {
        remaining < self.low_watermark
            && !self.in_flight
            && !self.exhausted
            && self.last_error.is_none()
    }

    /// Start a fetch, or `None` if one is already in flight.
    pub fn begin_fetch(&mut self) -> Option<FetchRequest> {
        if self.in_flight {
            tracing::debug!("Candidate fetch already in flight, coalescing");
            return None;
        }
        self.in_flight = true;
        Some(FetchRequest {
            exclude_ids: self.exclusion_set(),
            limit: self.batch_size,
        })
    }

    /// Land a fetch result, returning only candidates not seen before.
    ///
    /// On failure the stack is left untouched and the error is kept for a
    /// manual retry; nothing is returned.
    pub fn complete_fetch(&mut self, result: Result<Vec<Candidate>, AppError>) -> Vec<Candidate> {
        self.in_flight = false;

        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = %e, "Candidate batch fetch failed");
                self.last_error = Some(e.to_string());
                return Vec::new();
            }
        };

        self.last_error = None;
        self.exhausted = batch.len() < self.batch_size;

        let received = batch.len();
        let mut fresh = Vec::with_capacity(received);
        for candidate in batch {
            // `loaded` grows as we go, which also drops repeats within the batch
            if self.is_excluded(&candidate.id) {
                continue;
            }
            self.loaded.insert(candidate.id.clone());
            fresh.push(candidate);
        }

        if fresh.len() < received {
            tracing::debug!(
                received,
                kept = fresh.len(),
                "Dropped already-excluded candidates from batch"
            );
        }
        fresh
    }

    /// Clear the failure/exhaustion state after the user asks to retry.
    pub fn retry(&mut self) {
        self.last_error = None;
        self.exhausted = false;
    }

    /// Move a candidate from the stack into the decided set.
    pub fn mark_decided(&mut self, id: &str) {
        self.loaded.remove(id);
        self.decided.insert(id.to_string());
    }

    /// Undo [`Self::mark_decided`] when the candidate goes back into the stack.
    pub fn unmark_decided(&mut self, id: &str) {
        if self.decided.remove(id) {
            self.loaded.insert(id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;

    fn candidate(id: &str) -> Candidate {
        Candidate::from(UserProfile {
            id: id.to_string(),
            ..Default::default()
        })
    }

    fn batch(ids: &[&str]) -> Vec<Candidate> {
        ids.iter().map(|id| candidate(id)).collect()
    }

    #[test]
    fn test_exclusion_set_contains_self_decided_loaded() {
        let mut pager = CandidatePager::new("me", 3, 2);
        pager.begin_fetch().unwrap();
        pager.complete_fetch(Ok(batch(&["a", "b", "c"])));
        pager.mark_decided("a");

        let set = pager.exclusion_set();
        for id in ["me", "a", "b", "c"] {
            assert!(set.contains(id), "missing {}", id);
        }
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_fetched_batch_disjoint_from_exclusion_set() {
        let mut pager = CandidatePager::new("me", 4, 2);
        pager.begin_fetch().unwrap();
        pager.complete_fetch(Ok(batch(&["a", "b"])));
        pager.mark_decided("a");

        let request = pager.begin_fetch().unwrap();
        let fresh = pager.complete_fetch(Ok(batch(&["me", "a", "b", "c", "c", "d"])));

        let fresh_ids: Vec<&str> = fresh.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(fresh_ids, vec!["c", "d"]);
        assert!(fresh.iter().all(|c| !request.exclude_ids.contains(&c.id)));
    }

    #[test]
    fn test_overlapping_fetches_coalesce() {
        let mut pager = CandidatePager::new("me", 10, 5);
        assert!(pager.begin_fetch().is_some());
        assert!(pager.begin_fetch().is_none());
        assert!(!pager.needs_refill(0));

        pager.complete_fetch(Ok(Vec::new()));
        assert!(!pager.is_in_flight());
    }

    #[test]
    fn test_failure_keeps_error_until_retry() {
        let mut pager = CandidatePager::new("me", 2, 5);
        pager.begin_fetch().unwrap();
        let fresh = pager.complete_fetch(Err(AppError::Backend("timeout".to_string())));

        assert!(fresh.is_empty());
        assert!(pager.last_error().unwrap().contains("timeout"));
        assert!(!pager.needs_refill(0), "no automatic retry after failure");

        pager.retry();
        assert!(pager.needs_refill(0));
    }

    #[test]
    fn test_short_batch_marks_exhausted() {
        let mut pager = CandidatePager::new("me", 3, 5);
        pager.begin_fetch().unwrap();
        pager.complete_fetch(Ok(batch(&["a"])));
        assert!(pager.is_exhausted());
        assert!(!pager.needs_refill(1));

        pager.retry();
        assert!(!pager.is_exhausted());
        assert!(pager.needs_refill(1));
    }

    #[test]
    fn test_low_watermark_threshold() {
        let mut pager = CandidatePager::new("me", 2, 5);
        pager.begin_fetch().unwrap();
        pager.complete_fetch(Ok(batch(&["a", "b"])));
        assert!(!pager.needs_refill(5));
        assert!(pager.needs_refill(4));
    }

    #[test]
    fn test_unmark_returns_to_loaded() {
        let mut pager = CandidatePager::new("me", 2, 5);
        pager.begin_fetch().unwrap();
        pager.complete_fetch(Ok(batch(&["a"])));
        pager.mark_decided("a");
        assert!(pager.is_decided("a"));

        pager.unmark_decided("a");
        assert!(!pager.is_decided("a"));
        assert!(pager.is_excluded("a"));
    }
}
