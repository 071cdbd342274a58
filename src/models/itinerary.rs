// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Travel itinerary model: ordered checkpoints with optional date ranges.

use chrono::{DateTime, Duration, Utc};
use geo::{Coord, LineString, Point};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// One stop in a travel itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Checkpoint {
    /// Client-assigned identifier, stable across reorders
    #[validate(length(min = 1))]
    pub id: String,
    /// Place name (e.g., "Lisbon")
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    /// Latitude in degrees (missing if geocoding failed)
    #[validate(range(min = -90.0, max = 90.0))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    /// Longitude in degrees (missing if geocoding failed)
    #[validate(range(min = -180.0, max = 180.0))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub end_date: Option<DateTime<Utc>>,
    /// Planned stay length, used when no explicit end date is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,
}

impl Checkpoint {
    /// Geographic point for this checkpoint, if both coordinates are known.
    ///
    /// Uses `geo` axis order: x = longitude, y = latitude.
    pub fn point(&self) -> Option<Point<f64>> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Point::new(lng, lat)),
            _ => None,
        }
    }

    /// End of the stay: the explicit end date, or start + duration.
    pub fn effective_end(&self) -> Option<DateTime<Utc>> {
        self.end_date.or_else(|| {
            let start = self.start_date?;
            let days = self.duration_days?;
            Some(start + Duration::days(i64::from(days)))
        })
    }
}

/// Ordered sequence of checkpoints belonging to one profile.
///
/// Saved with whole-document replace semantics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(transparent)]
pub struct Itinerary {
    #[validate(nested)]
    checkpoints: Vec<Checkpoint>,
}

/// A pair of consecutive checkpoints whose dates go backwards.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("checkpoint '{later}' starts before '{earlier}' ends")]
pub struct ChronologyViolation {
    pub earlier: String,
    pub later: String,
    /// Index of the later checkpoint
    pub index: usize,
}

impl Itinerary {
    pub fn new(checkpoints: Vec<Checkpoint>) -> Self {
        Self { checkpoints }
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Checkpoint> {
        self.checkpoints.get(index)
    }

    /// Insert a checkpoint, clamping the position to the end of the route.
    pub fn insert(&mut self, index: usize, checkpoint: Checkpoint) {
        let index = index.min(self.checkpoints.len());
        self.checkpoints.insert(index, checkpoint);
    }

    /// Remove a checkpoint by id. Returns the removed checkpoint, if any.
    pub fn remove(&mut self, id: &str) -> Option<Checkpoint> {
        let index = self.checkpoints.iter().position(|c| c.id == id)?;
        Some(self.checkpoints.remove(index))
    }

    /// Move the checkpoint at `from` so that it ends up at `to`.
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        if from >= self.checkpoints.len() {
            return false;
        }
        let checkpoint = self.checkpoints.remove(from);
        let to = to.min(self.checkpoints.len());
        self.checkpoints.insert(to, checkpoint);
        true
    }

    /// Representative location: the first checkpoint that has coordinates.
    pub fn first_point(&self) -> Option<Point<f64>> {
        self.checkpoints.iter().find_map(Checkpoint::point)
    }

    /// Check that dated consecutive checkpoints never go backwards in time.
    ///
    /// This is reported to callers but not enforced on save.
    pub fn check_chronology(&self) -> Result<(), ChronologyViolation> {
        for (i, pair) in self.checkpoints.windows(2).enumerate() {
            let (earlier, later) = (&pair[0], &pair[1]);
            let earlier_bound = earlier.effective_end().or(earlier.start_date);
            if let (Some(end), Some(start)) = (earlier_bound, later.start_date) {
                if start < end {
                    return Err(ChronologyViolation {
                        earlier: earlier.name.clone(),
                        later: later.name.clone(),
                        index: i + 1,
                    });
                }
            }
        }
        Ok(())
    }

    /// Route through all checkpoints that have coordinates.
    pub fn route(&self) -> LineString<f64> {
        self.checkpoints
            .iter()
            .filter_map(Checkpoint::point)
            .map(|p| Coord { x: p.x(), y: p.y() })
            .collect()
    }

    /// Encode the route as a Google polyline (precision 5) for map display.
    pub fn route_polyline(&self) -> Result<String, String> {
        polyline::encode_coordinates(self.route(), 5).map_err(|e| e.to_string())
    }

    /// Export the itinerary as GeoJSON: one point per checkpoint plus the route line.
    pub fn to_geojson(&self) -> FeatureCollection {
        let mut features: Vec<Feature> = self
            .checkpoints
            .iter()
            .enumerate()
            .filter_map(|(order, checkpoint)| {
                let point = checkpoint.point()?;
                let mut properties = JsonObject::new();
                properties.insert("id".to_string(), checkpoint.id.clone().into());
                properties.insert("name".to_string(), checkpoint.name.clone().into());
                properties.insert("order".to_string(), order.into());
                Some(Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(Value::Point(vec![point.x(), point.y()]))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                })
            })
            .collect();

        let route = self.route();
        if route.0.len() >= 2 {
            let mut properties = JsonObject::new();
            properties.insert("kind".to_string(), "route".into());
            features.push(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::LineString(
                    route.coords().map(|c| vec![c.x, c.y]).collect(),
                ))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            });
        }

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

impl From<Vec<Checkpoint>> for Itinerary {
    fn from(checkpoints: Vec<Checkpoint>) -> Self {
        Self::new(checkpoints)
    }
}
