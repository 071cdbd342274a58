// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily swipe quota for non-privileged users.

use crate::models::QuotaExceededEvent;

/// How a gate update changed the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum GateChange {
    Unchanged,
    Opened,
    Closed(QuotaExceededEvent),
}

/// Per-session view of the daily swipe counter.
///
/// The authoritative count lives server-side; it is loaded once at session
/// start and incremented locally on every successful commit.
#[derive(Debug, Clone)]
pub struct QuotaGate {
    daily_limit: u32,
    count: u32,
    privileged: bool,
    enabled: bool,
}

impl QuotaGate {
    pub fn new(daily_limit: u32, count: u32, privileged: bool) -> Self {
        let mut gate = Self {
            daily_limit,
            count,
            privileged,
            enabled: true,
        };
        gate.enabled = gate.compute_enabled();
        gate
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Whether one more commit fits with `pending` commits still unconfirmed.
    pub fn admits(&self, pending: u32) -> bool {
        self.privileged || self.count.saturating_add(pending) < self.daily_limit
    }

    /// Commits left today, or `None` when unlimited.
    pub fn remaining(&self) -> Option<u32> {
        (!self.privileged).then(|| self.daily_limit.saturating_sub(self.count))
    }

    /// Count one successful commit.
    pub fn record_success(&mut self) -> GateChange {
        self.count = self.count.saturating_add(1);
        self.recompute()
    }

    /// Entitlement changed (may happen at any time).
    pub fn set_privileged(&mut self, privileged: bool) -> GateChange {
        self.privileged = privileged;
        self.recompute()
    }

    /// Replace the local count with one loaded from the server.
    pub fn load_count(&mut self, count: u32) -> GateChange {
        self.count = count;
        self.recompute()
    }

    fn compute_enabled(&self) -> bool {
        self.privileged || self.count < self.daily_limit
    }

    fn recompute(&mut self) -> GateChange {
        let was_enabled = self.enabled;
        self.enabled = self.compute_enabled();
        match (was_enabled, self.enabled) {
            (true, false) => {
                tracing::info!(
                    count = self.count,
                    daily_limit = self.daily_limit,
                    "Daily swipe quota reached"
                );
                GateChange::Closed(self.exceeded_event())
            }
            (false, true) => GateChange::Opened,
            _ => GateChange::Unchanged,
        }
    }

    pub fn exceeded_event(&self) -> QuotaExceededEvent {
        QuotaExceededEvent {
            daily_limit: self.daily_limit,
            count: self.count,
        }
    }
}
