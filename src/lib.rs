// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Travel-Match: meet travelers whose routes cross yours
//!
//! This crate provides the candidate feed and swipe engine (proximity
//! ranking, pagination, the card stack, the daily quota and the decision
//! protocol) and the backend API that stores profiles, itineraries and
//! swipe decisions.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::MatchStore;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn MatchStore>,
}
