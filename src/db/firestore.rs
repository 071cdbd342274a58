// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profiles and itineraries)
//! - Swipes (one decision per ordered user pair)
//! - Matches (mutual likes, keyed by conversation ID)

use crate::db::{collections, MatchStore};
use crate::error::AppError;
use crate::models::{
    chat_id_for, DecisionResponse, MatchRecord, SwipeDirection, SwipeRecord, UserProfile,
};
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;
use firestore::errors::{BackoffError, FirestoreError};
use firestore::{FirestoreQueryCursor, FirestoreQueryDirection, FirestoreResult};
use futures_util::TryStreamExt;
use std::collections::HashSet;

/// Firestore query page cap when scanning for candidates.
const MAX_PAGE_SIZE: usize = 300;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Get a stored swipe decision for an ordered pair.
    pub async fn get_swipe(
        &self,
        swiper_id: &str,
        swipee_id: &str,
    ) -> Result<Option<SwipeRecord>, AppError> {
        read_swipe(self.get_client()?, swiper_id, swipee_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a match by conversation ID.
    pub async fn get_match(&self, chat_id: &str) -> Result<Option<MatchRecord>, AppError> {
        read_match(self.get_client()?, chat_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

// Reads take the client explicitly so the decision transaction can pass its
// transaction-bound clone.

async fn read_swipe(
    db: &firestore::FirestoreDb,
    swiper_id: &str,
    swipee_id: &str,
) -> FirestoreResult<Option<SwipeRecord>> {
    db.fluent()
        .select()
        .by_id_in(collections::SWIPES)
        .obj()
        .one(&SwipeRecord::doc_id(swiper_id, swipee_id))
        .await
}

async fn read_match(
    db: &firestore::FirestoreDb,
    chat_id: &str,
) -> FirestoreResult<Option<MatchRecord>> {
    db.fluent()
        .select()
        .by_id_in(collections::MATCHES)
        .obj()
        .one(chat_id)
        .await
}

/// Rebuild the outcome of a decision that was already stored.
async fn existing_outcome(
    db: &firestore::FirestoreDb,
    existing: &SwipeRecord,
) -> FirestoreResult<DecisionResponse> {
    if !existing.direction.liked() {
        return Ok(DecisionResponse::no_match());
    }
    let chat_id = chat_id_for(&existing.swiper_id, &existing.swipee_id);
    Ok(match read_match(db, &chat_id).await? {
        Some(record) => DecisionResponse::matched(record.chat_id),
        None => DecisionResponse::no_match(),
    })
}

#[async_trait]
impl MatchStore for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&profile.id)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Candidate Operations ────────────────────────────────────

    /// Scans profiles in ID order and drops excluded ones client-side.
    ///
    /// Firestore `not-in` filters are capped at a handful of values, far fewer
    /// than a user's decided set, so exclusion can't be pushed into the query.
    /// Pages continue after the last ID seen until `limit` profiles are kept
    /// or the collection ends; a short result always means nobody is left.
    async fn list_candidates(
        &self,
        exclude_ids: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<UserProfile>, AppError> {
        let client = self.get_client()?;
        let page_size = (limit + exclude_ids.len()).clamp(1, MAX_PAGE_SIZE);
        let mut candidates = Vec::with_capacity(limit.min(page_size));
        let mut last_id: Option<String> = None;
        let mut scanned = 0usize;

        while candidates.len() < limit {
            let query = client
                .fluent()
                .select()
                .from(collections::USERS)
                .order_by([("id", FirestoreQueryDirection::Ascending)])
                .limit(page_size as u32);
            let query = match &last_id {
                Some(id) => query.start_at(FirestoreQueryCursor::AfterValue(vec![id
                    .as_str()
                    .into()])),
                None => query,
            };
            let profiles: Vec<UserProfile> = query
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            let end_of_collection = profiles.len() < page_size;
            scanned += profiles.len();
            last_id = profiles.last().map(|p| p.id.clone());
            candidates.extend(
                profiles
                    .into_iter()
                    .filter(|p| !exclude_ids.contains(&p.id)),
            );

            if end_of_collection {
                break;
            }
        }

        tracing::debug!(
            scanned,
            kept = candidates.len().min(limit),
            excluded = exclude_ids.len(),
            "Candidate scan finished"
        );
        candidates.truncate(limit);
        Ok(candidates)
    }

    // ─── Swipe Operations ────────────────────────────────────────

    async fn decided_ids(&self, swiper_id: &str) -> Result<HashSet<String>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::SWIPES)
            .filter(|q| q.for_all([q.field("swiper_id").eq(swiper_id)]))
            .obj::<SwipeRecord>()
            .stream_query_with_errors()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .map_ok(|s| s.swipee_id)
            .try_collect()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn count_decisions_since(&self, swiper_id: &str, since: &str) -> Result<u32, AppError> {
        // Counted as the documents stream in; only the total is kept
        self.get_client()?
            .fluent()
            .select()
            .from(collections::SWIPES)
            .filter(|q| {
                q.for_all([
                    q.field("swiper_id").eq(swiper_id),
                    q.field("created_at").greater_than_or_equal(since),
                ])
            })
            .obj::<SwipeRecord>()
            .stream_query_with_errors()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .try_fold(0u32, |count, _| async move {
                Ok::<_, firestore::errors::FirestoreError>(count + 1)
            })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a decision and, on a mutual like, the match.
    ///
    /// Both lookups and both writes run in one transaction, so the reads
    /// are registered for conflict detection. When two users like each
    /// other at the same moment, or the same pair is submitted twice, one
    /// commit is aborted and the closure runs again against the winner's
    /// writes.
    async fn record_decision(
        &self,
        swiper_id: &str,
        swipee_id: &str,
        direction: SwipeDirection,
    ) -> Result<DecisionResponse, AppError> {
        let client = self.get_client()?;
        let swiper = swiper_id.to_string();
        let swipee = swipee_id.to_string();

        let response = client
            .run_transaction(|db, transaction| {
                let swiper_id = swiper.clone();
                let swipee_id = swipee.clone();
                Box::pin(async move {
                    // 1. Idempotency: a decision for this pair already exists
                    if let Some(existing) = read_swipe(&db, &swiper_id, &swipee_id).await? {
                        tracing::debug!(
                            swiper_id = %swiper_id,
                            swipee_id = %swipee_id,
                            "Decision already recorded (idempotent skip)"
                        );
                        return Ok(existing_outcome(&db, &existing).await?);
                    }

                    // 2. Mutual interest: did the swipee already like the swiper?
                    let reverse = read_swipe(&db, &swipee_id, &swiper_id).await?;
                    let now = format_utc_rfc3339(chrono::Utc::now());
                    let mutual =
                        direction.liked() && reverse.is_some_and(|r| r.direction.liked());

                    let record = SwipeRecord {
                        swiper_id: swiper_id.clone(),
                        swipee_id: swipee_id.clone(),
                        direction,
                        created_at: now.clone(),
                    };

                    // 3. Add swipe write to transaction
                    db.fluent()
                        .update()
                        .in_col(collections::SWIPES)
                        .document_id(SwipeRecord::doc_id(&swiper_id, &swipee_id))
                        .object(&record)
                        .add_to_transaction(transaction)?;

                    // 4. Add match write to transaction
                    let match_record =
                        mutual.then(|| MatchRecord::new(&swiper_id, &swipee_id, now));
                    if let Some(match_record) = &match_record {
                        db.fluent()
                            .update()
                            .in_col(collections::MATCHES)
                            .document_id(&match_record.chat_id)
                            .object(match_record)
                            .add_to_transaction(transaction)?;
                    }

                    Ok::<_, BackoffError<FirestoreError>>(match match_record {
                        Some(record) => DecisionResponse::matched(record.chat_id),
                        None => DecisionResponse::no_match(),
                    })
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Decision transaction failed: {}", e)))?;

        tracing::info!(
            swiper_id,
            swipee_id,
            direction = ?direction,
            matched = response.matched,
            "Decision recorded"
        );

        Ok(response)
    }
}
