// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription entitlements: whether the user is privileged (unlimited swipes,
//! search from any checkpoint).

use crate::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{watch, OnceCell};

/// External source of truth for the user's subscription.
#[async_trait]
pub trait EntitlementProvider: Send + Sync {
    /// One-time SDK setup for `user_id`.
    async fn configure(&self, user_id: &str) -> Result<(), AppError>;

    /// Current privilege status.
    async fn is_privileged(&self, user_id: &str) -> Result<bool, AppError>;
}

/// Fixed entitlement, for offline use and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticEntitlements(pub bool);

#[async_trait]
impl EntitlementProvider for StaticEntitlements {
    async fn configure(&self, _user_id: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn is_privileged(&self, _user_id: &str) -> Result<bool, AppError> {
        Ok(self.0)
    }
}

/// Shared entitlement state for one signed-in user.
///
/// Initialization runs at most once no matter how many sessions ask for it.
/// Privilege changes are published on a watch channel so an open session can
/// reopen its quota gate without restarting.
#[derive(Clone)]
pub struct EntitlementContext {
    provider: Arc<dyn EntitlementProvider>,
    user_id: String,
    initialized: Arc<OnceCell<()>>,
    privileged_tx: Arc<watch::Sender<bool>>,
}

impl EntitlementContext {
    pub fn new(provider: Arc<dyn EntitlementProvider>, user_id: impl Into<String>) -> Self {
        let (privileged_tx, _) = watch::channel(false);
        Self {
            provider,
            user_id: user_id.into(),
            initialized: Arc::new(OnceCell::new()),
            privileged_tx: Arc::new(privileged_tx),
        }
    }

    /// Configure the provider if nobody has yet. A failed attempt is retried
    /// by the next caller.
    pub async fn ensure_initialized(&self) -> Result<(), AppError> {
        self.initialized
            .get_or_try_init(|| async {
                tracing::debug!(user_id = %self.user_id, "Configuring entitlement provider");
                self.provider.configure(&self.user_id).await
            })
            .await
            .map(|_| ())
    }

    /// Ask the provider and publish the answer.
    pub async fn refresh(&self) -> Result<bool, AppError> {
        self.ensure_initialized().await?;
        let privileged = self.provider.is_privileged(&self.user_id).await?;
        self.set_privileged(privileged);
        Ok(privileged)
    }

    /// Last known privilege status.
    pub fn is_privileged(&self) -> bool {
        *self.privileged_tx.borrow()
    }

    /// Publish a privilege change (e.g. a purchase completed).
    pub fn set_privileged(&self, privileged: bool) {
        let changed = self.privileged_tx.send_if_modified(|current| {
            let changed = *current != privileged;
            *current = privileged;
            changed
        });
        if changed {
            tracing::info!(user_id = %self.user_id, privileged, "Entitlement changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.privileged_tx.subscribe()
    }
}
