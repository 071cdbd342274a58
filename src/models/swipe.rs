// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Swipe decisions, matches, and the events surfaced to the host shell.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Direction of a committed swipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Like,
    Pass,
}

impl SwipeDirection {
    pub fn liked(self) -> bool {
        matches!(self, SwipeDirection::Like)
    }

    pub fn from_liked(liked: bool) -> Self {
        if liked {
            SwipeDirection::Like
        } else {
            SwipeDirection::Pass
        }
    }

    /// Direction implied by a horizontal drag: right is like, left is pass.
    pub fn from_offset(offset_x: f64) -> Self {
        Self::from_liked(offset_x > 0.0)
    }

    /// Sign of the off-screen target offset for this direction.
    pub fn sign(self) -> f64 {
        match self {
            SwipeDirection::Like => 1.0,
            SwipeDirection::Pass => -1.0,
        }
    }
}

/// Stored swipe decision.
///
/// Stored at: `swipes/{swiper_id}_{swipee_id}`, so there is at most one
/// record per ordered pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwipeRecord {
    pub swiper_id: String,
    pub swipee_id: String,
    pub direction: SwipeDirection,
    /// When the decision was recorded (RFC 3339, `Z` suffix)
    pub created_at: String,
}

impl SwipeRecord {
    /// Document ID for the ordered pair.
    ///
    /// Hashed so that no user ID, whatever characters it holds, can make
    /// two pairs share a document.
    pub fn doc_id(swiper_id: &str, swipee_id: &str) -> String {
        let digest = Sha256::digest(format!("{}\u{0}{}", swiper_id, swipee_id).as_bytes());
        hex::encode(digest)
    }
}

/// Mutual like between two users.
///
/// Stored at: `matches/{chat_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub chat_id: String,
    /// Both user IDs, sorted
    pub user_ids: Vec<String>,
    pub created_at: String,
}

impl MatchRecord {
    pub fn new(a: &str, b: &str, created_at: String) -> Self {
        let mut user_ids = vec![a.to_string(), b.to_string()];
        user_ids.sort();
        Self {
            chat_id: chat_id_for(a, b),
            user_ids,
            created_at,
        }
    }
}

/// Conversation ID for an unordered user pair.
///
/// Both sides of a mutual like derive the same ID, so two concurrent
/// likes converge on one conversation.
pub fn chat_id_for(a: &str, b: &str) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    let digest = Sha256::digest(format!("{}\u{0}{}", low, high).as_bytes());
    hex::encode(&digest[..12])
}

/// Response from recording a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DecisionResponse {
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

impl DecisionResponse {
    pub fn no_match() -> Self {
        Self {
            matched: false,
            chat_id: None,
        }
    }

    pub fn matched(chat_id: String) -> Self {
        Self {
            matched: true,
            chat_id: Some(chat_id),
        }
    }
}

/// A mutual like, for the host shell to open the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchEvent {
    pub candidate_id: String,
    pub chat_id: String,
}

/// The daily limit was reached; the host shell should show the upsell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaExceededEvent {
    pub daily_limit: u32,
    pub count: u32,
}

/// Events emitted by a swipe session to the host shell.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Match(MatchEvent),
    QuotaExceeded(QuotaExceededEvent),
    /// A decision could not be recorded; the candidate went back into the stack.
    DecisionFailed { candidate_id: String, error: String },
    /// A candidate batch could not be fetched; retry is available.
    FetchFailed { error: String },
    /// Saving the user's own itinerary failed and was rolled back.
    ItinerarySaveFailed { error: String },
    /// Today's decision count could not be loaded. Commits stay disabled
    /// for non-privileged users until a retry succeeds.
    QuotaUnavailable { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_id_is_order_independent() {
        assert_eq!(chat_id_for("alice", "bob"), chat_id_for("bob", "alice"));
        assert_ne!(chat_id_for("alice", "bob"), chat_id_for("alice", "carol"));
        assert_eq!(chat_id_for("alice", "bob").len(), 24);
    }

    #[test]
    fn test_chat_id_separator_prevents_collisions() {
        assert_ne!(chat_id_for("ab", "c"), chat_id_for("a", "bc"));
    }

    #[test]
    fn test_swipe_doc_id_is_unambiguous() {
        assert_ne!(
            SwipeRecord::doc_id("a_b", "c"),
            SwipeRecord::doc_id("a", "b_c")
        );
        // Ordered: each direction is its own decision
        assert_ne!(SwipeRecord::doc_id("a", "b"), SwipeRecord::doc_id("b", "a"));
        assert_eq!(SwipeRecord::doc_id("a", "b"), SwipeRecord::doc_id("a", "b"));
        assert_eq!(SwipeRecord::doc_id("a", "b").len(), 64);
    }

    #[test]
    fn test_direction_from_offset() {
        assert_eq!(SwipeDirection::from_offset(-160.0), SwipeDirection::Pass);
        assert_eq!(SwipeDirection::from_offset(200.0), SwipeDirection::Like);
        assert_eq!(SwipeDirection::Pass.sign(), -1.0);
    }

    #[test]
    fn test_direction_serializes_lowercase() {
        let json = serde_json::to_string(&SwipeDirection::Like).unwrap();
        assert_eq!(json, "\"like\"");
    }

    #[test]
    fn test_match_record_sorts_users() {
        let record = MatchRecord::new("zed", "amy", "2026-01-01T00:00:00Z".to_string());
        assert_eq!(record.user_ids, vec!["amy", "zed"]);
        assert_eq!(record.chat_id, chat_id_for("amy", "zed"));
    }
}
