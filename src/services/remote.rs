// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP client for a remote travel-match API, usable as a session backend.

use crate::error::AppError;
use crate::models::{
    Candidate, CandidateBatchRequest, CandidateBatchResponse, DecisionCountResponse,
    DecisionRequest, DecisionResponse, Itinerary, MeResponse, SessionUser,
};
use crate::services::backend::MatchBackend;
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashSet;

/// [`MatchBackend`] talking to the `/api` routes with a bearer session token.
///
/// Every call acts as the user the token belongs to.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check response status, mapping failures to [`AppError`].
    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        Err(AppError::Backend(format!("HTTP {}: {}", status, body)))
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                return Err(AppError::Unauthorized);
            }
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Backend(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("JSON parse error: {}", e)))
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    AppError::Backend(e.to_string())
}

#[async_trait]
impl MatchBackend for HttpBackend {
    async fn fetch_current_user(&self) -> Result<Option<SessionUser>, AppError> {
        let response = self
            .http
            .get(self.url("/api/me"))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport_error)?;

        match self.check_response_json::<MeResponse>(response).await {
            Ok(me) => Ok(Some(SessionUser {
                id: me.id,
                itinerary: me.itinerary,
            })),
            Err(AppError::Unauthorized) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_candidates(
        &self,
        exclude_ids: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<Candidate>, AppError> {
        let mut exclude_ids: Vec<String> = exclude_ids.iter().cloned().collect();
        exclude_ids.sort();
        let body = CandidateBatchRequest {
            exclude_ids,
            limit: Some(limit),
        };

        let response = self
            .http
            .post(self.url("/api/candidates/batch"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let batch: CandidateBatchResponse = self.check_response_json(response).await?;
        Ok(batch.candidates)
    }

    async fn fetch_daily_decision_count(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, AppError> {
        tracing::debug!(user_id, "Fetching daily decision count");
        let response = self
            .http
            .get(self.url("/api/decisions/count"))
            .bearer_auth(&self.token)
            .query(&[("since", format_utc_rfc3339(since))])
            .send()
            .await
            .map_err(transport_error)?;

        let count: DecisionCountResponse = self.check_response_json(response).await?;
        Ok(count.count)
    }

    async fn record_decision(
        &self,
        _swiper_id: &str,
        swipee_id: &str,
        liked: bool,
    ) -> Result<DecisionResponse, AppError> {
        let body = DecisionRequest {
            swipee_id: swipee_id.to_string(),
            liked,
        };

        let response = self
            .http
            .post(self.url("/api/decisions"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        self.check_response_json(response).await
    }

    async fn save_itinerary(&self, itinerary: &Itinerary) -> Result<(), AppError> {
        let response = self
            .http
            .put(self.url("/api/me/itinerary"))
            .bearer_auth(&self.token)
            .json(itinerary)
            .send()
            .await
            .map_err(transport_error)?;

        self.check_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = HttpBackend::new("http://localhost:8080/", "token");
        assert_eq!(backend.url("/api/me"), "http://localhost:8080/api/me");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_backend_error() {
        // Port 9 (discard) is never served by the test environment
        let backend = HttpBackend::new("http://127.0.0.1:9", "token");
        let err = backend
            .fetch_candidates(&HashSet::new(), 5)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
