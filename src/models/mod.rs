// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod feed;
pub mod itinerary;
pub mod swipe;
pub mod user;

pub use feed::{
    CandidateBatchRequest, CandidateBatchResponse, DecisionCountResponse, DecisionRequest,
    MeResponse,
};
pub use itinerary::{Checkpoint, ChronologyViolation, Itinerary};
pub use swipe::{
    chat_id_for, DecisionResponse, FeedEvent, MatchEvent, MatchRecord, QuotaExceededEvent,
    SwipeDirection, SwipeRecord,
};
pub use user::{Candidate, SessionUser, UserProfile};
