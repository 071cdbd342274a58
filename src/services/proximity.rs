// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Great-circle ranking of candidates relative to a reference point.

use crate::models::Candidate;
use geo::Point;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distances below this are shown as "Nearby" rather than a number.
const NEARBY_KM: f64 = 1.0;

/// Haversine great-circle distance between two points, in kilometers.
///
/// Points use `geo` axis order (x = longitude, y = latitude), in degrees.
pub fn haversine_km(a: Point<f64>, b: Point<f64>) -> f64 {
    let (lat1, lat2) = (a.y().to_radians(), b.y().to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = (b.x() - a.x()).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Human-readable distance label for a candidate card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "km")]
pub enum DistanceLabel {
    /// Within a kilometer of a route's start
    Nearby,
    /// Within a kilometer of a later stop the viewer is searching from
    OnRoute,
    Kilometers(u64),
    Unknown,
}

impl DistanceLabel {
    /// `searching_along_route` is set when ranking from a checkpoint other than the first.
    pub fn for_distance(km: f64, searching_along_route: bool) -> Self {
        if !km.is_finite() {
            DistanceLabel::Unknown
        } else if km < NEARBY_KM {
            if searching_along_route {
                DistanceLabel::OnRoute
            } else {
                DistanceLabel::Nearby
            }
        } else {
            DistanceLabel::Kilometers(km.round() as u64)
        }
    }
}

impl fmt::Display for DistanceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceLabel::Nearby => write!(f, "Nearby"),
            DistanceLabel::OnRoute => write!(f, "On route"),
            DistanceLabel::Kilometers(km) => write!(f, "{} km", km),
            DistanceLabel::Unknown => write!(f, "Distance unknown"),
        }
    }
}

/// Free-text and tag filters applied before ranking.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    /// Case-insensitive substring matched against name and bio
    pub query: Option<String>,
    /// Keep candidates with any of these tags (ignored when empty)
    pub tags: HashSet<String>,
}

impl CandidateFilter {
    fn matches_text(&self, candidate: &Candidate) -> bool {
        let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
            return true;
        };
        let needle = query.to_lowercase();
        candidate.display_name.to_lowercase().contains(&needle)
            || candidate.bio.to_lowercase().contains(&needle)
    }

    fn matches_tags(&self, candidate: &Candidate) -> bool {
        self.tags.is_empty() || candidate.tags.iter().any(|t| self.tags.contains(t))
    }
}

/// Filter, measure, and sort candidates by distance from `reference`.
///
/// Pipeline order: text match, tag match, distance, then a stable ascending
/// sort. Each candidate is measured from its route's first located
/// checkpoint; candidates with no coordinates (or no reference point) sort
/// last in their original order.
pub fn rank(
    reference: Option<Point<f64>>,
    candidates: Vec<Candidate>,
    filter: &CandidateFilter,
) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| filter.matches_text(c))
        .filter(|c| filter.matches_tags(c))
        .map(|mut c| {
            c.derived_distance_km = reference
                .zip(c.itinerary.first_point())
                .map(|(from, to)| haversine_km(from, to));
            c
        })
        .collect();

    // `sort_by` is stable, so equal distances keep their input order
    ranked.sort_by(|a, b| a.distance_or_infinity().total_cmp(&b.distance_or_infinity()));
    ranked
}
