// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use chrono::{FixedOffset, Offset, Utc};
use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Use the in-memory store instead of Firestore (local development)
    pub offline_store: bool,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Swipe engine tunables
    pub feed: FeedSettings,
}

/// Tunables for the candidate feed and swipe engine.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    /// Candidates requested per batch
    pub batch_size: usize,
    /// Refill when fewer undecided candidates than this remain
    pub low_watermark: usize,
    /// Daily commit cap for non-privileged users
    pub daily_limit: u32,
    /// Fraction of viewport width a drag must exceed to commit
    pub commit_threshold_ratio: f64,
    /// Off-screen target, as a multiple of viewport width
    pub fling_ratio: f64,
    /// Offset whose local midnight resets the daily quota
    pub quota_offset: FixedOffset,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            low_watermark: 5,
            daily_limit: 10,
            commit_threshold_ratio: 0.3,
            fling_ratio: 1.5,
            quota_offset: Utc.fix(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = FeedSettings::default();
        let quota_offset_minutes: i32 = parse_var("QUOTA_UTC_OFFSET_MINUTES", 0)?;
        let quota_offset = FixedOffset::east_opt(quota_offset_minutes * 60)
            .ok_or(ConfigError::Invalid("QUOTA_UTC_OFFSET_MINUTES"))?;

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            offline_store: env::var("OFFLINE_STORE").is_ok_and(|v| v == "1" || v == "true"),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            feed: FeedSettings {
                batch_size: parse_var("FEED_BATCH_SIZE", defaults.batch_size)?,
                low_watermark: parse_var("FEED_LOW_WATERMARK", defaults.low_watermark)?,
                daily_limit: parse_var("DAILY_SWIPE_LIMIT", defaults.daily_limit)?,
                quota_offset,
                ..defaults
            },
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            offline_store: true,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            feed: FeedSettings::default(),
        }
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("DAILY_SWIPE_LIMIT", "25");
        env::set_var("QUOTA_UTC_OFFSET_MINUTES", "-300");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.port, 8080);
        assert_eq!(config.feed.daily_limit, 25);
        assert_eq!(config.feed.batch_size, 10);
        assert_eq!(config.feed.quota_offset.local_minus_utc(), -300 * 60);

        env::remove_var("DAILY_SWIPE_LIMIT");
        env::remove_var("QUOTA_UTC_OFFSET_MINUTES");
    }

    #[test]
    fn test_feed_defaults() {
        let settings = FeedSettings::default();
        assert_eq!(settings.batch_size, 10);
        assert_eq!(settings.low_watermark, 5);
        assert_eq!(settings.commit_threshold_ratio, 0.3);
        assert_eq!(settings.fling_ratio, 1.5);
    }
}
