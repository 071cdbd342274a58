// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - the candidate feed and swipe engine.

pub mod backend;
pub mod card_stack;
pub mod decision;
pub mod entitlement;
pub mod itinerary;
pub mod optimistic;
pub mod pager;
pub mod proximity;
pub mod quota;
pub mod remote;
pub mod session;

pub use backend::{MatchBackend, StoreBackend};
pub use card_stack::{
    CardStack, CommitTicket, DeckGesture, DeckInput, GestureBackend, GestureEvent, PanGesture,
    PointerInput, StackPhase, StackSignal,
};
pub use decision::{DecisionOutcome, DecisionProtocol};
pub use entitlement::{EntitlementContext, EntitlementProvider, StaticEntitlements};
pub use pager::CandidatePager;
pub use proximity::{rank, CandidateFilter, DistanceLabel};
pub use quota::{GateChange, QuotaGate};
pub use remote::HttpBackend;
pub use session::{start, SessionCommand, StackUpdate, SwipeSession};
