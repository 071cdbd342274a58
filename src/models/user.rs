// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile model for storage and the candidate projection shown in the feed.

use crate::models::Itinerary;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Display name used when a profile has none.
pub const DEFAULT_DISPLAY_NAME: &str = "Traveler";

/// User profile stored in Firestore.
///
/// Profiles are filled in progressively during onboarding, so most fields
/// are optional here. Defaults are applied once, in [`Candidate::from`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    /// User ID (also used as document ID)
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Profile image URLs
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub itinerary: Itinerary,
    /// Interest tags (e.g. "hiking", "nightlife")
    #[serde(default)]
    pub tags: Vec<String>,
    /// When the profile was created (ISO 8601)
    #[serde(default)]
    pub created_at: String,
    /// Last profile edit (ISO 8601)
    #[serde(default)]
    pub updated_at: String,
}

/// The signed-in user as seen by a swipe session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub itinerary: Itinerary,
}

impl From<&UserProfile> for SessionUser {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            itinerary: profile.itinerary.clone(),
        }
    }
}

/// Read-only projection of a profile eligible for the swipe feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Candidate {
    pub id: String,
    pub display_name: String,
    /// Unknown ages are shown without a number rather than as zero
    pub age: Option<u8>,
    pub bio: String,
    pub images: Vec<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "Array<unknown>"))]
    pub itinerary: Itinerary,
    pub tags: Vec<String>,
    /// Distance from the viewer's reference point, set by ranking.
    /// Serialized as `null` when unknown (JSON has no infinity).
    #[serde(default)]
    pub derived_distance_km: Option<f64>,
}

impl Candidate {
    /// Ranking distance, treating an unknown distance as infinitely far.
    pub fn distance_or_infinity(&self) -> f64 {
        self.derived_distance_km.unwrap_or(f64::INFINITY)
    }
}

impl From<UserProfile> for Candidate {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            display_name: profile
                .display_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            age: profile.age,
            bio: profile.bio.unwrap_or_default(),
            images: profile.images.unwrap_or_default(),
            itinerary: profile.itinerary,
            tags: profile.tags,
            derived_distance_km: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_defaults_for_sparse_profile() {
        let profile: UserProfile = serde_json::from_str(r#"{"id": "u1"}"#).unwrap();
        let candidate = Candidate::from(profile);

        assert_eq!(candidate.display_name, DEFAULT_DISPLAY_NAME);
        assert_eq!(candidate.age, None);
        assert_eq!(candidate.bio, "");
        assert!(candidate.images.is_empty());
        assert!(candidate.itinerary.is_empty());
        assert_eq!(candidate.distance_or_infinity(), f64::INFINITY);
    }

    #[test]
    fn test_blank_display_name_gets_default() {
        let profile = UserProfile {
            id: "u2".to_string(),
            display_name: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(Candidate::from(profile).display_name, DEFAULT_DISPLAY_NAME);
    }

    #[test]
    fn test_candidate_keeps_present_fields() {
        let profile = UserProfile {
            id: "u3".to_string(),
            display_name: Some("Ana".to_string()),
            age: Some(29),
            bio: Some("Backpacking south".to_string()),
            images: Some(vec!["https://img.example/1.jpg".to_string()]),
            tags: vec!["hiking".to_string()],
            ..Default::default()
        };
        let candidate = Candidate::from(profile);
        assert_eq!(candidate.display_name, "Ana");
        assert_eq!(candidate.age, Some(29));
        assert_eq!(candidate.images.len(), 1);
        assert_eq!(candidate.tags, vec!["hiking"]);
    }
}
