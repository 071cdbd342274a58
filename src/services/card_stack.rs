// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gesture-driven card stack that turns drags and button taps into committed swipes.
//!
//! The stack lives in the animation context: every method is synchronous and
//! cheap, and nothing here waits on the network. A commit produces a
//! [`CommitTicket`] that the caller hands to the async side; the stack only
//! advances once the outward animation has finished *and* that handoff has
//! happened.
//!
//! ```text
//!   Idle ──pointer down──▶ Dragging ──release > threshold──▶ Committing
//!    ▲                        │                                  │
//!    └───release ≤ threshold──┘                                  │
//!    ▲                                                           │
//!    └────────── animation finished + decision dispatched ◀──────┘
//!   Idle ──like/pass button────────────────────────────────▶ Committing
//! ```

use crate::config::FeedSettings;
use crate::models::{Candidate, SwipeDirection};

/// Interaction phase of the top card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPhase {
    Idle,
    Dragging,
    Committing,
}

/// Pointer displacement of the top card, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DragOffset {
    pub x: f64,
    pub y: f64,
}

/// A committed swipe, to be handed to the decision protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitTicket {
    pub candidate: Candidate,
    pub direction: SwipeDirection,
}

/// What the stack did in response to an input.
#[derive(Debug, Clone, PartialEq)]
pub enum StackSignal {
    /// The top card is now committing; dispatch this ticket.
    Commit(CommitTicket),
    /// A drag ended under the threshold and the card returns to rest.
    SprangBack,
    /// A commit was refused because the daily quota is used up.
    Blocked,
    /// The committed card left the stack; `top_index` moved by one.
    Advanced { candidate_id: String },
}

/// Canonical input understood by the stack, produced by a [`GestureBackend`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    Down,
    Move { dx: f64, dy: f64 },
    Up,
    Button(SwipeDirection),
    AnimationFinished,
}

/// Adapts one input source (raw pointer, deck widget, ...) to [`GestureEvent`]s.
pub trait GestureBackend {
    type Input;

    fn translate(&mut self, input: Self::Input) -> Vec<GestureEvent>;
}

/// Raw pointer input from a custom pan handler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    Pressed { x: f64, y: f64 },
    Moved { x: f64, y: f64 },
    Released { x: f64, y: f64 },
    Cancelled,
}

/// Tracks the press origin and reports deltas.
#[derive(Debug, Default)]
pub struct PanGesture {
    origin: Option<(f64, f64)>,
}

impl GestureBackend for PanGesture {
    type Input = PointerInput;

    fn translate(&mut self, input: PointerInput) -> Vec<GestureEvent> {
        match input {
            PointerInput::Pressed { x, y } => {
                self.origin = Some((x, y));
                vec![GestureEvent::Down]
            }
            PointerInput::Moved { x, y } => match self.origin {
                Some((ox, oy)) => vec![GestureEvent::Move {
                    dx: x - ox,
                    dy: y - oy,
                }],
                None => Vec::new(),
            },
            PointerInput::Released { x, y } => match self.origin.take() {
                Some((ox, oy)) => vec![
                    GestureEvent::Move {
                        dx: x - ox,
                        dy: y - oy,
                    },
                    GestureEvent::Up,
                ],
                None => Vec::new(),
            },
            PointerInput::Cancelled => match self.origin.take() {
                Some(_) => vec![GestureEvent::Move { dx: 0.0, dy: 0.0 }, GestureEvent::Up],
                None => Vec::new(),
            },
        }
    }
}

/// Callbacks from a deck widget that runs its own swipe animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeckInput {
    Swiped(SwipeDirection),
    SwipeAnimationEnded,
}

/// Deck widgets only report the final direction, like a button press.
#[derive(Debug, Default)]
pub struct DeckGesture;

impl GestureBackend for DeckGesture {
    type Input = DeckInput;

    fn translate(&mut self, input: DeckInput) -> Vec<GestureEvent> {
        match input {
            DeckInput::Swiped(direction) => vec![GestureEvent::Button(direction)],
            DeckInput::SwipeAnimationEnded => vec![GestureEvent::AnimationFinished],
        }
    }
}

#[derive(Debug, Clone)]
struct PendingCommit {
    candidate_id: String,
    release_x: f64,
    target_x: f64,
    animation_done: bool,
    dispatched: bool,
}

/// The candidates of a session and the interaction state of the top card.
///
/// Only undecided cards are kept: `candidates[0]` is the top card and
/// decided cards are dropped as the stack advances. `top_index` counts
/// how many cards have left the stack.
#[derive(Debug, Clone)]
pub struct CardStack {
    candidates: Vec<Candidate>,
    top_index: usize,
    offset: DragOffset,
    phase: StackPhase,
    viewport_width: f64,
    threshold_ratio: f64,
    fling_ratio: f64,
    commits_enabled: bool,
    pending: Option<PendingCommit>,
}

impl CardStack {
    pub fn new(viewport_width: f64, settings: &FeedSettings) -> Self {
        Self {
            candidates: Vec::new(),
            top_index: 0,
            offset: DragOffset::default(),
            phase: StackPhase::Idle,
            viewport_width,
            threshold_ratio: settings.commit_threshold_ratio,
            fling_ratio: settings.fling_ratio,
            commits_enabled: true,
            pending: None,
        }
    }

    // ─── Read access ─────────────────────────────────────────────

    pub fn phase(&self) -> StackPhase {
        self.phase
    }

    pub fn offset(&self) -> DragOffset {
        self.offset
    }

    pub fn top_index(&self) -> usize {
        self.top_index
    }

    pub fn top(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// The top `n` cards, top first.
    pub fn visible(&self, n: usize) -> &[Candidate] {
        &self.candidates[..n.min(self.candidates.len())]
    }

    /// Number of cards held, including the one animating out.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Cards not yet committed. The card animating out is already decided.
    pub fn remaining_undecided(&self) -> usize {
        let remaining = self.candidates.len();
        if self.phase == StackPhase::Committing {
            remaining.saturating_sub(1)
        } else {
            remaining
        }
    }

    pub fn commits_enabled(&self) -> bool {
        self.commits_enabled
    }

    /// Horizontal distance a drag must exceed to commit.
    pub fn commit_threshold(&self) -> f64 {
        self.viewport_width * self.threshold_ratio
    }

    /// Off-screen offset the committing card animates to.
    pub fn commit_target(&self) -> Option<f64> {
        self.pending.as_ref().map(|p| p.target_x)
    }

    // ─── Configuration ───────────────────────────────────────────

    pub fn set_viewport_width(&mut self, width: f64) {
        self.viewport_width = width;
    }

    /// Enable or disable commits (quota gate). Buttons stay visible but inert.
    pub fn set_commits_enabled(&mut self, enabled: bool) {
        self.commits_enabled = enabled;
    }

    // ─── Contents ────────────────────────────────────────────────

    /// Add a batch below the existing cards without touching the top card.
    pub fn append(&mut self, batch: Vec<Candidate>) {
        self.candidates.extend(batch);
    }

    /// Put a candidate back so it is the next card to be shown.
    ///
    /// While the top card is being dragged or animated out, the candidate
    /// goes directly beneath it so the card under the pointer never changes.
    /// A card restored during its own exit animation comes back beneath
    /// itself and is shown again once the animation ends.
    pub fn restore(&mut self, candidate: Candidate) {
        // The committing card is leaving, so it does not count as queued
        let leaving = usize::from(self.phase == StackPhase::Committing);
        let queued = self.candidates.get(leaving..).unwrap_or(&[]);
        if queued.iter().any(|c| c.id == candidate.id) {
            return;
        }
        let at = match self.phase {
            StackPhase::Idle => 0,
            StackPhase::Dragging | StackPhase::Committing => 1,
        };
        tracing::debug!(candidate_id = %candidate.id, "Card restored");
        self.candidates.insert(at.min(self.candidates.len()), candidate);
    }

    // ─── Input ───────────────────────────────────────────────────

    /// Feed one input from a gesture backend through the state machine.
    pub fn apply<G: GestureBackend>(
        &mut self,
        backend: &mut G,
        input: G::Input,
    ) -> Vec<StackSignal> {
        backend
            .translate(input)
            .into_iter()
            .filter_map(|event| self.handle(event))
            .collect()
    }

    pub fn handle(&mut self, event: GestureEvent) -> Option<StackSignal> {
        match event {
            GestureEvent::Down => {
                self.pointer_down();
                None
            }
            GestureEvent::Move { dx, dy } => {
                self.pointer_move(dx, dy);
                None
            }
            GestureEvent::Up => self.pointer_up(),
            GestureEvent::Button(direction) => self.press(direction),
            GestureEvent::AnimationFinished => self.animation_finished(),
        }
    }

    /// Idle → Dragging, if there is a top card.
    pub fn pointer_down(&mut self) -> bool {
        if self.phase != StackPhase::Idle || self.top().is_none() {
            return false;
        }
        self.phase = StackPhase::Dragging;
        self.offset = DragOffset::default();
        true
    }

    pub fn pointer_move(&mut self, dx: f64, dy: f64) {
        if self.phase == StackPhase::Dragging {
            self.offset = DragOffset { x: dx, y: dy };
        }
    }

    /// End a drag: commit past the threshold, otherwise spring back.
    pub fn pointer_up(&mut self) -> Option<StackSignal> {
        if self.phase != StackPhase::Dragging {
            return None;
        }

        if self.offset.x.abs() <= self.commit_threshold() {
            self.reset_to_idle();
            return Some(StackSignal::SprangBack);
        }

        if !self.commits_enabled {
            self.reset_to_idle();
            return Some(StackSignal::Blocked);
        }

        let direction = SwipeDirection::from_offset(self.offset.x);
        self.begin_commit(direction).map(StackSignal::Commit)
    }

    /// Like/pass button: Idle → Committing without a drag.
    ///
    /// Ignored while another card is committing.
    pub fn press(&mut self, direction: SwipeDirection) -> Option<StackSignal> {
        if self.phase != StackPhase::Idle || self.top().is_none() {
            return None;
        }
        if !self.commits_enabled {
            return Some(StackSignal::Blocked);
        }
        self.begin_commit(direction).map(StackSignal::Commit)
    }

    /// Move the committing card along its exit path (`progress` in [0, 1]).
    pub fn animation_frame(&mut self, progress: f64) {
        if let Some(pending) = &self.pending {
            let t = progress.clamp(0.0, 1.0);
            self.offset.x = pending.release_x + (pending.target_x - pending.release_x) * t;
        }
    }

    /// The outward animation is done; advance if the decision was dispatched.
    pub fn animation_finished(&mut self) -> Option<StackSignal> {
        let pending = self.pending.as_mut()?;
        pending.animation_done = true;
        self.offset.x = pending.target_x;
        self.try_advance()
    }

    /// The ticket for `candidate_id` was handed to the async context.
    pub fn mark_dispatched(&mut self, candidate_id: &str) -> Option<StackSignal> {
        let pending = self.pending.as_mut()?;
        if pending.candidate_id != candidate_id {
            return None;
        }
        pending.dispatched = true;
        self.try_advance()
    }

    fn begin_commit(&mut self, direction: SwipeDirection) -> Option<CommitTicket> {
        let candidate = self.top()?.clone();
        let target_x = direction.sign() * self.fling_ratio * self.viewport_width;

        self.phase = StackPhase::Committing;
        self.pending = Some(PendingCommit {
            candidate_id: candidate.id.clone(),
            release_x: self.offset.x,
            target_x,
            animation_done: false,
            dispatched: false,
        });

        tracing::debug!(
            candidate_id = %candidate.id,
            direction = ?direction,
            target_x,
            "Card committing"
        );

        Some(CommitTicket {
            candidate,
            direction,
        })
    }

    fn try_advance(&mut self) -> Option<StackSignal> {
        let pending = self.pending.as_ref()?;
        if !(pending.animation_done && pending.dispatched) {
            return None;
        }
        let candidate_id = pending.candidate_id.clone();
        self.pending = None;
        if !self.candidates.is_empty() {
            self.candidates.remove(0);
        }
        self.top_index += 1;
        self.reset_to_idle();
        Some(StackSignal::Advanced { candidate_id })
    }

    fn reset_to_idle(&mut self) {
        self.phase = StackPhase::Idle;
        self.offset = DragOffset::default();
    }
}
