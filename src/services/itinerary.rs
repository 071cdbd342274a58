// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reference point selection and current-position estimation along an itinerary.

use crate::models::{Checkpoint, Itinerary};
use chrono::{DateTime, Utc};
use geo::Point;

/// Checkpoint of the viewer's own route to rank candidates from.
///
/// Out-of-range indices clamp to the last checkpoint.
pub fn reference_point(itinerary: &Itinerary, checkpoint_index: usize) -> Option<&Checkpoint> {
    let last = itinerary.len().checked_sub(1)?;
    itinerary.get(checkpoint_index.min(last))
}

/// "Search from this checkpoint" is a privileged feature; everyone else ranks
/// from the start of their route.
pub fn effective_checkpoint_index(requested: usize, privileged: bool) -> usize {
    if privileged {
        requested
    } else {
        0
    }
}

/// Where along an itinerary a traveler is at a given instant.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentPosition<'a> {
    /// Staying at (or before the start of / after the end of the route, pinned to) a checkpoint.
    AtCheckpoint {
        index: usize,
        checkpoint: &'a Checkpoint,
    },
    /// Travelling between two checkpoints.
    InTransit {
        from: usize,
        to: usize,
        /// Elapsed fraction of the gap, in [0, 1]
        fraction: f64,
        point: Point<f64>,
    },
}

impl CurrentPosition<'_> {
    pub fn point(&self) -> Option<Point<f64>> {
        match self {
            CurrentPosition::AtCheckpoint { checkpoint, .. } => checkpoint.point(),
            CurrentPosition::InTransit { point, .. } => Some(*point),
        }
    }
}

/// Estimate where `now` falls along the itinerary.
///
/// Returns `None` when the dates don't pin the position down (e.g. no dates
/// at all); callers then use [`nearest_checkpoint_with_coordinates`].
pub fn estimate_current_position(
    itinerary: &Itinerary,
    now: DateTime<Utc>,
) -> Option<CurrentPosition<'_>> {
    let checkpoints = itinerary.checkpoints();
    let first = checkpoints.first()?;
    let last_index = checkpoints.len() - 1;
    let last = &checkpoints[last_index];

    if first.start_date.is_some_and(|start| now < start) {
        return Some(CurrentPosition::AtCheckpoint {
            index: 0,
            checkpoint: first,
        });
    }

    if last.effective_end().is_some_and(|end| now > end) {
        return Some(CurrentPosition::AtCheckpoint {
            index: last_index,
            checkpoint: last,
        });
    }

    for (index, checkpoint) in checkpoints.iter().enumerate() {
        if let (Some(start), Some(end)) = (checkpoint.start_date, checkpoint.effective_end()) {
            if start <= now && now <= end {
                return Some(CurrentPosition::AtCheckpoint { index, checkpoint });
            }
        }
    }

    for (from, pair) in checkpoints.windows(2).enumerate() {
        let (current, next) = (&pair[0], &pair[1]);
        let (Some(end), Some(next_start)) = (current.effective_end(), next.start_date) else {
            continue;
        };
        if !(end < now && now < next_start) {
            continue;
        }
        let (Some(a), Some(b)) = (current.point(), next.point()) else {
            continue;
        };

        let gap = (next_start - end).num_milliseconds() as f64;
        let elapsed = (now - end).num_milliseconds() as f64;
        let fraction = (elapsed / gap).clamp(0.0, 1.0);

        return Some(CurrentPosition::InTransit {
            from,
            to: from + 1,
            fraction,
            point: a + (b - a) * fraction,
        });
    }

    None
}

/// Closest checkpoint to `index` (by position in the route) that has coordinates.
pub fn nearest_checkpoint_with_coordinates(
    itinerary: &Itinerary,
    index: usize,
) -> Option<&Checkpoint> {
    let checkpoints = itinerary.checkpoints();
    let index = index.min(checkpoints.len().checked_sub(1)?);

    (0..checkpoints.len())
        .flat_map(|distance| {
            let before = index.checked_sub(distance);
            let after = (distance > 0).then_some(index + distance);
            before.into_iter().chain(after)
        })
        .filter_map(|i| checkpoints.get(i))
        .find(|c| c.point().is_some())
}

/// Best-effort current location: the dated estimate, else the nearest located stop.
pub fn current_point(itinerary: &Itinerary, now: DateTime<Utc>) -> Option<Point<f64>> {
    estimate_current_position(itinerary, now)
        .and_then(|position| position.point())
        .or_else(|| nearest_checkpoint_with_coordinates(itinerary, 0).and_then(Checkpoint::point))
}

/// Name of the stop a traveler is at right now, if they are at one.
pub fn current_stop_name(itinerary: &Itinerary, now: DateTime<Utc>) -> Option<String> {
    match estimate_current_position(itinerary, now)? {
        CurrentPosition::AtCheckpoint { checkpoint, .. } => Some(checkpoint.name.clone()),
        CurrentPosition::InTransit { .. } => None,
    }
}
