// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! A swipe session: the card stack on the animation side, and a worker task
//! that owns every backend call.
//!
//! The two sides only talk through channels. [`SwipeSession`] sends
//! [`SessionCommand`]s and never awaits; [`SessionWorker`] answers with
//! [`StackUpdate`]s that the session applies on its next [`SwipeSession::pump`].
//! Events for the host shell (matches, upsell) go out on a separate channel.

use crate::config::FeedSettings;
use crate::error::{AppError, FeedError};
use crate::models::{
    Candidate, Checkpoint, DecisionResponse, FeedEvent, Itinerary, MatchEvent, SessionUser,
    SwipeDirection,
};
use crate::services::backend::MatchBackend;
use crate::services::card_stack::{CardStack, GestureBackend, GestureEvent, StackSignal};
use crate::services::decision::{DecisionOutcome, DecisionProtocol};
use crate::services::entitlement::EntitlementContext;
use crate::services::itinerary::{effective_checkpoint_index, reference_point};
use crate::services::optimistic::{Applied, Patch};
use crate::services::pager::{CandidatePager, FetchRequest};
use crate::services::proximity::{rank, CandidateFilter};
use crate::services::quota::{GateChange, QuotaGate};
use crate::time_utils::local_midnight;
use chrono::{FixedOffset, Utc};
use geo::Point;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

// ─── Messages ────────────────────────────────────────────────

/// Handoff from the animation side to the worker.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// A card was committed; record the decision.
    Decide {
        candidate: Candidate,
        direction: SwipeDirection,
    },
    /// The stack is running low.
    Refill { remaining: usize },
    /// The user asked to retry after a failed fetch, an exhausted pool or
    /// an unavailable quota count.
    Retry,
    /// Rank later batches from this checkpoint of the user's own route.
    SelectCheckpoint(usize),
    /// Replace the user's itinerary.
    ReplaceItinerary(Itinerary),
}

/// Changes the worker asks the card stack to make.
#[derive(Debug, Clone, PartialEq)]
pub enum StackUpdate {
    Append(Vec<Candidate>),
    /// A decision did not stick; show the candidate again.
    Restore(Candidate),
    CommitsEnabled(bool),
    FetchFailed(String),
    /// A short batch ended automatic refills until the next retry.
    Exhausted,
    QuotaFailed(String),
}

/// Completion of a task spawned by the worker.
enum TaskResult {
    Batch(Result<Vec<Candidate>, AppError>),
    Count(Result<u32, AppError>),
    Decision {
        swipee_id: String,
        result: Result<DecisionResponse, AppError>,
    },
    ItinerarySaved {
        generation: u64,
        result: Result<(), AppError>,
    },
}

// ─── Optimistic patches ──────────────────────────────────────

/// Treat a candidate as decided while its decision is in flight.
#[derive(Debug, Clone)]
pub struct DecisionPatch {
    pub candidate_id: String,
}

impl Patch<CandidatePager> for DecisionPatch {
    fn apply(&self, pager: &mut CandidatePager) {
        pager.mark_decided(&self.candidate_id);
    }

    fn revert(&self, pager: &mut CandidatePager) {
        pager.unmark_decided(&self.candidate_id);
    }
}

/// Whole-document itinerary replace.
#[derive(Debug, Clone)]
pub struct ItineraryPatch {
    pub previous: Itinerary,
    pub next: Itinerary,
}

impl Patch<SessionUser> for ItineraryPatch {
    fn apply(&self, user: &mut SessionUser) {
        user.itinerary = self.next.clone();
    }

    fn revert(&self, user: &mut SessionUser) {
        // A newer replace has already superseded this one
        if user.itinerary == self.next {
            user.itinerary = self.previous.clone();
        }
    }
}

// ─── Animation side ──────────────────────────────────────────

/// Card stack handle for the animation/gesture context.
pub struct SwipeSession {
    user_id: String,
    stack: CardStack,
    commands: mpsc::UnboundedSender<SessionCommand>,
    updates: mpsc::UnboundedReceiver<StackUpdate>,
    low_watermark: usize,
    fetch_error: Option<String>,
    exhausted: bool,
    quota_error: Option<String>,
}

impl SwipeSession {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn stack(&self) -> &CardStack {
        &self.stack
    }

    /// Set after a failed fetch; the host shows a retry control.
    pub fn fetch_error(&self) -> Option<&str> {
        self.fetch_error.as_deref()
    }

    /// No more candidates came back on the last fetch. Once the stack runs
    /// empty the host shows an end-of-feed view with a retry control.
    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    /// Set while today's decision count is unknown; commits stay disabled
    /// (unless privileged) and the host shows a retry control.
    pub fn quota_error(&self) -> Option<&str> {
        self.quota_error.as_deref()
    }

    pub fn set_viewport_width(&mut self, width: f64) {
        self.stack.set_viewport_width(width);
    }

    /// Feed raw input from a gesture backend.
    pub fn apply<G: GestureBackend>(
        &mut self,
        backend: &mut G,
        input: G::Input,
    ) -> Vec<StackSignal> {
        let signals = self.stack.apply(backend, input);
        self.follow_up(signals)
    }

    pub fn handle(&mut self, event: GestureEvent) -> Vec<StackSignal> {
        let signals = self.stack.handle(event).into_iter().collect();
        self.follow_up(signals)
    }

    /// Like/pass button.
    pub fn press(&mut self, direction: SwipeDirection) -> Vec<StackSignal> {
        self.handle(GestureEvent::Button(direction))
    }

    pub fn animation_frame(&mut self, progress: f64) {
        self.stack.animation_frame(progress);
    }

    pub fn animation_finished(&mut self) -> Vec<StackSignal> {
        self.handle(GestureEvent::AnimationFinished)
    }

    /// Apply every update the worker has sent so far. Never blocks.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.updates.try_recv() {
            self.apply_update(update);
            applied += 1;
        }
        applied
    }

    /// Wait for the next update from the worker, then apply it and anything
    /// queued behind it. Returns `false` once the worker has stopped.
    ///
    /// For hosts that drive the session from an async event loop; the
    /// animation path itself uses [`Self::pump`].
    pub async fn next_update(&mut self) -> bool {
        match self.updates.recv().await {
            Some(update) => {
                self.apply_update(update);
                self.pump();
                true
            }
            None => false,
        }
    }

    /// Retry a failed fetch or quota load, or look for new candidates
    /// after the pool ran out.
    pub fn retry(&mut self) {
        self.fetch_error = None;
        self.exhausted = false;
        self.quota_error = None;
        self.send(SessionCommand::Retry);
    }

    /// Rank later batches from another checkpoint. Ignored for
    /// non-privileged users.
    pub fn select_checkpoint(&mut self, index: usize) {
        self.send(SessionCommand::SelectCheckpoint(index));
    }

    pub fn replace_itinerary(&mut self, itinerary: Itinerary) {
        self.send(SessionCommand::ReplaceItinerary(itinerary));
    }

    fn apply_update(&mut self, update: StackUpdate) {
        match update {
            StackUpdate::Append(batch) => {
                self.stack.append(batch);
                // Re-evaluate the trigger that was coalesced while the fetch ran
                self.request_refill();
            }
            StackUpdate::Restore(candidate) => self.stack.restore(candidate),
            StackUpdate::CommitsEnabled(enabled) => self.stack.set_commits_enabled(enabled),
            StackUpdate::FetchFailed(error) => self.fetch_error = Some(error),
            StackUpdate::Exhausted => self.exhausted = true,
            StackUpdate::QuotaFailed(error) => self.quota_error = Some(error),
        }
    }

    fn follow_up(&mut self, signals: Vec<StackSignal>) -> Vec<StackSignal> {
        let mut out = Vec::with_capacity(signals.len());
        let mut queue = signals;

        while !queue.is_empty() {
            let mut next = Vec::new();
            for signal in queue {
                match &signal {
                    StackSignal::Commit(ticket) => {
                        let candidate_id = ticket.candidate.id.clone();
                        self.send(SessionCommand::Decide {
                            candidate: ticket.candidate.clone(),
                            direction: ticket.direction,
                        });
                        next.extend(self.stack.mark_dispatched(&candidate_id));
                    }
                    StackSignal::Advanced { .. } => self.request_refill(),
                    StackSignal::SprangBack | StackSignal::Blocked => {}
                }
                out.push(signal);
            }
            queue = next;
        }
        out
    }

    fn request_refill(&mut self) {
        let remaining = self.stack.remaining_undecided();
        if remaining < self.low_watermark && self.fetch_error.is_none() && !self.exhausted {
            self.send(SessionCommand::Refill { remaining });
        }
    }

    fn send(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            tracing::warn!(user_id = %self.user_id, "Session worker has stopped");
        }
    }
}

// ─── Worker side ─────────────────────────────────────────────

/// Owns the backend and all session state the card stack does not.
pub struct SessionWorker {
    backend: Arc<dyn MatchBackend>,
    user: SessionUser,
    pager: CandidatePager,
    gate: QuotaGate,
    /// Whether the gate holds a count loaded from the server
    quota_known: bool,
    quota_offset: FixedOffset,
    count_in_flight: bool,
    protocol: DecisionProtocol,
    checkpoint_index: usize,
    pending_decisions: HashMap<String, (Candidate, Applied<DecisionPatch>)>,
    pending_saves: HashMap<u64, Applied<ItineraryPatch>>,
    next_save: u64,
    updates: mpsc::UnboundedSender<StackUpdate>,
    events: mpsc::UnboundedSender<FeedEvent>,
    results: mpsc::UnboundedSender<TaskResult>,
}

impl SessionWorker {
    /// Process commands until the session handle is dropped.
    ///
    /// Decisions still in flight at that point finish in the background
    /// without touching any state.
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut results: mpsc::UnboundedReceiver<TaskResult>,
        mut privileged: watch::Receiver<bool>,
    ) {
        let mut watching = true;
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(result) = results.recv() => self.handle_result(result),
                changed = privileged.changed(), if watching => match changed {
                    Ok(()) => {
                        let value = *privileged.borrow_and_update();
                        self.set_privileged(value);
                    }
                    Err(_) => watching = false,
                },
            }
        }
        tracing::debug!(user_id = %self.user.id, "Swipe session closed");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Decide {
                candidate,
                direction,
            } => self.decide(candidate, direction),
            SessionCommand::Refill { remaining } => {
                if self.pager.needs_refill(remaining) {
                    self.spawn_fetch();
                }
            }
            SessionCommand::Retry => {
                if !self.quota_known {
                    self.spawn_count();
                }
                self.pager.retry();
                self.spawn_fetch();
            }
            SessionCommand::SelectCheckpoint(index) => {
                self.checkpoint_index = index;
                if effective_checkpoint_index(index, self.gate.is_privileged()) != index {
                    tracing::debug!(index, "Checkpoint search requires privilege, using start");
                }
            }
            SessionCommand::ReplaceItinerary(itinerary) => self.replace_itinerary(itinerary),
        }
    }

    fn handle_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Batch(result) => match self.land_batch(result) {
                Ok(batch) => {
                    // Ahead of the append, so the session does not ask again
                    if self.pager.is_exhausted() {
                        self.update(StackUpdate::Exhausted);
                    }
                    self.update(StackUpdate::Append(batch));
                }
                Err(error) => {
                    self.update(StackUpdate::FetchFailed(error.clone()));
                    self.emit(FeedEvent::FetchFailed { error });
                }
            },
            TaskResult::Count(result) => self.land_count(result),
            TaskResult::Decision { swipee_id, result } => {
                self.finish_decision(&swipee_id, result)
            }
            TaskResult::ItinerarySaved { generation, result } => {
                let Some(applied) = self.pending_saves.remove(&generation) else {
                    return;
                };
                match result {
                    Ok(()) => {
                        applied.commit();
                    }
                    Err(e) => {
                        tracing::warn!(
                            user_id = %self.user.id,
                            error = %e,
                            "Itinerary save failed, rolling back"
                        );
                        applied.revert(&mut self.user);
                        self.emit(FeedEvent::ItinerarySaveFailed {
                            error: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    fn decide(&mut self, candidate: Candidate, direction: SwipeDirection) {
        let swipee_id = candidate.id.clone();
        let call = match self.protocol.begin(&self.gate, &swipee_id, direction) {
            Ok(call) => call,
            Err(outcome) => {
                if outcome.should_restore() {
                    self.update(StackUpdate::Restore(candidate));
                }
                return;
            }
        };

        let applied = Applied::apply(
            DecisionPatch {
                candidate_id: swipee_id.clone(),
            },
            &mut self.pager,
        );
        self.pending_decisions.insert(swipee_id.clone(), (candidate, applied));

        let results = self.results.clone();
        tokio::spawn(async move {
            let result = call.send().await;
            let _ = results.send(TaskResult::Decision { swipee_id, result });
        });
    }

    fn finish_decision(&mut self, swipee_id: &str, result: Result<DecisionResponse, AppError>) {
        let (outcome, change) = self.protocol.finish(&mut self.gate, swipee_id, result);
        let Some((candidate, applied)) = self.pending_decisions.remove(swipee_id) else {
            return;
        };

        match outcome {
            DecisionOutcome::Recorded(response) => {
                applied.commit();
                if let (true, Some(chat_id)) = (response.matched, response.chat_id) {
                    self.emit(FeedEvent::Match(MatchEvent {
                        candidate_id: candidate.id,
                        chat_id,
                    }));
                }
            }
            DecisionOutcome::Failed(error) => {
                applied.revert(&mut self.pager);
                self.emit(FeedEvent::DecisionFailed {
                    candidate_id: candidate.id.clone(),
                    error,
                });
                self.update(StackUpdate::Restore(candidate));
            }
            DecisionOutcome::Duplicate | DecisionOutcome::QuotaBlocked => {
                applied.commit();
            }
        }

        self.apply_gate_change(change);
    }

    fn set_privileged(&mut self, privileged: bool) {
        match self.gate.set_privileged(privileged) {
            // Not over the limit, only unknown; the upsell would be wrong
            GateChange::Closed(_) if !self.quota_known => {
                self.update(StackUpdate::CommitsEnabled(false))
            }
            change => self.apply_gate_change(change),
        }
    }

    fn spawn_count(&mut self) {
        if self.count_in_flight {
            return;
        }
        self.count_in_flight = true;
        let since = local_midnight(Utc::now(), self.quota_offset);
        let user_id = self.user.id.clone();
        let backend = self.backend.clone();
        let results = self.results.clone();
        tokio::spawn(async move {
            let result = backend.fetch_daily_decision_count(&user_id, since).await;
            let _ = results.send(TaskResult::Count(result));
        });
    }

    fn land_count(&mut self, result: Result<u32, AppError>) {
        self.count_in_flight = false;
        match result {
            Ok(count) => {
                self.quota_known = true;
                tracing::info!(user_id = %self.user.id, count, "Daily decision count loaded");
                match self.gate.load_count(count) {
                    GateChange::Unchanged if !self.gate.enabled() => {
                        self.emit(FeedEvent::QuotaExceeded(self.gate.exceeded_event()))
                    }
                    change => self.apply_gate_change(change),
                }
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %self.user.id,
                    error = %e,
                    "Daily decision count still unavailable"
                );
                let error = e.to_string();
                self.update(StackUpdate::QuotaFailed(error.clone()));
                self.emit(FeedEvent::QuotaUnavailable { error });
            }
        }
    }

    fn apply_gate_change(&mut self, change: GateChange) {
        match change {
            GateChange::Unchanged => {}
            GateChange::Opened => self.update(StackUpdate::CommitsEnabled(true)),
            GateChange::Closed(event) => {
                self.update(StackUpdate::CommitsEnabled(false));
                self.emit(FeedEvent::QuotaExceeded(event));
            }
        }
    }

    fn replace_itinerary(&mut self, itinerary: Itinerary) {
        let patch = ItineraryPatch {
            previous: self.user.itinerary.clone(),
            next: itinerary.clone(),
        };
        let applied = Applied::apply(patch, &mut self.user);
        let generation = self.next_save;
        self.next_save += 1;
        self.pending_saves.insert(generation, applied);

        let backend = self.backend.clone();
        let results = self.results.clone();
        tokio::spawn(async move {
            let result = backend.save_itinerary(&itinerary).await;
            let _ = results.send(TaskResult::ItinerarySaved { generation, result });
        });
    }

    fn spawn_fetch(&mut self) {
        let Some(request) = self.pager.begin_fetch() else {
            return;
        };
        let backend = self.backend.clone();
        let results = self.results.clone();
        tokio::spawn(async move {
            let result = fetch(backend.as_ref(), &request).await;
            let _ = results.send(TaskResult::Batch(result));
        });
    }

    /// Dedup and rank a landed batch, or report why it failed.
    fn land_batch(
        &mut self,
        result: Result<Vec<Candidate>, AppError>,
    ) -> Result<Vec<Candidate>, String> {
        let fresh = self.pager.complete_fetch(result);
        if let Some(error) = self.pager.last_error() {
            return Err(error.to_string());
        }
        // New batches are ranked among themselves so cards already on
        // screen never move
        Ok(rank(self.reference(), fresh, &CandidateFilter::default()))
    }

    fn reference(&self) -> Option<Point<f64>> {
        let index = effective_checkpoint_index(self.checkpoint_index, self.gate.is_privileged());
        reference_point(&self.user.itinerary, index).and_then(Checkpoint::point)
    }

    fn update(&self, update: StackUpdate) {
        // The session may already be gone; nothing left to update then
        let _ = self.updates.send(update);
    }

    fn emit(&self, event: FeedEvent) {
        let _ = self.events.send(event);
    }
}

async fn fetch(
    backend: &dyn MatchBackend,
    request: &FetchRequest,
) -> Result<Vec<Candidate>, AppError> {
    backend
        .fetch_candidates(&request.exclude_ids, request.limit)
        .await
}

// ─── Start-up ────────────────────────────────────────────────

/// Load the user, quota, entitlement and first batch, then spawn the worker.
///
/// Fails only when there is no signed-in user. A failed first batch yields
/// an empty stack with [`SwipeSession::fetch_error`] set. If today's count
/// cannot be loaded the session starts with commits disabled (unless
/// privileged) and [`SwipeSession::quota_error`] set.
pub async fn start(
    backend: Arc<dyn MatchBackend>,
    entitlements: EntitlementContext,
    settings: &FeedSettings,
    viewport_width: f64,
) -> Result<(SwipeSession, mpsc::UnboundedReceiver<FeedEvent>), FeedError> {
    let user = backend
        .fetch_current_user()
        .await?
        .ok_or(FeedError::NoSession)?;

    if let Err(e) = entitlements.refresh().await {
        tracing::warn!(
            user_id = %user.id,
            error = %e,
            "Entitlement check failed, assuming not privileged"
        );
    }
    let privileged_rx = entitlements.subscribe();
    let privileged = *privileged_rx.borrow();

    let since = local_midnight(Utc::now(), settings.quota_offset);
    let (gate, quota_error) = match backend.fetch_daily_decision_count(&user.id, since).await {
        Ok(count) => (QuotaGate::new(settings.daily_limit, count, privileged), None),
        Err(e) => {
            tracing::warn!(
                user_id = %user.id,
                error = %e,
                "Daily decision count unavailable, commits paused until retry"
            );
            // Treat the day as used up until the real count arrives
            let gate = QuotaGate::new(settings.daily_limit, settings.daily_limit, privileged);
            (gate, Some(e.to_string()))
        }
    };

    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (results_tx, results_rx) = mpsc::unbounded_channel();

    let mut worker = SessionWorker {
        backend: backend.clone(),
        pager: CandidatePager::new(user.id.clone(), settings.batch_size, settings.low_watermark),
        protocol: DecisionProtocol::new(backend.clone(), user.id.clone()),
        user,
        gate,
        quota_known: quota_error.is_none(),
        quota_offset: settings.quota_offset,
        count_in_flight: false,
        checkpoint_index: 0,
        pending_decisions: HashMap::new(),
        pending_saves: HashMap::new(),
        next_save: 0,
        updates: updates_tx,
        events: events_tx,
        results: results_tx,
    };

    let mut stack = CardStack::new(viewport_width, settings);
    stack.set_commits_enabled(worker.gate.enabled());

    let mut fetch_error = None;
    if let Some(request) = worker.pager.begin_fetch() {
        let result = fetch(backend.as_ref(), &request).await;
        match worker.land_batch(result) {
            Ok(batch) => stack.append(batch),
            Err(error) => {
                worker.emit(FeedEvent::FetchFailed {
                    error: error.clone(),
                });
                fetch_error = Some(error);
            }
        }
    }

    if let Some(error) = &quota_error {
        worker.emit(FeedEvent::QuotaUnavailable {
            error: error.clone(),
        });
    } else if !worker.gate.enabled() {
        worker.emit(FeedEvent::QuotaExceeded(worker.gate.exceeded_event()));
    }

    tracing::info!(
        user_id = %worker.user.id,
        count = worker.gate.count(),
        quota_known = worker.quota_known,
        exhausted = worker.pager.is_exhausted(),
        privileged,
        loaded = stack.remaining_undecided(),
        "Swipe session started"
    );

    let session = SwipeSession {
        user_id: worker.user.id.clone(),
        stack,
        commands: commands_tx,
        updates: updates_rx,
        low_watermark: settings.low_watermark,
        fetch_error,
        exhausted: worker.pager.is_exhausted(),
        quota_error,
    };

    tokio::spawn(worker.run(commands_rx, results_rx, privileged_rx));

    Ok((session, events_rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::itinerary::tests::stop;

    #[test]
    fn test_decision_patch_round_trip() {
        let mut pager = CandidatePager::new("me", 5, 2);
        let applied = Applied::apply(
            DecisionPatch {
                candidate_id: "a".to_string(),
            },
            &mut pager,
        );
        assert!(pager.is_decided("a"));
        applied.revert(&mut pager);
        assert!(!pager.is_decided("a"));
    }

    #[test]
    fn test_itinerary_revert_skips_superseded_patch() {
        let first = Itinerary::new(vec![stop("a", 1.0, 1.0)]);
        let second = Itinerary::new(vec![stop("b", 2.0, 2.0)]);
        let mut user = SessionUser {
            id: "me".to_string(),
            itinerary: Itinerary::default(),
        };

        let older = Applied::apply(
            ItineraryPatch {
                previous: Itinerary::default(),
                next: first.clone(),
            },
            &mut user,
        );
        let _newer = Applied::apply(
            ItineraryPatch {
                previous: first,
                next: second.clone(),
            },
            &mut user,
        );

        older.revert(&mut user);
        assert_eq!(user.itinerary, second);
    }
}
