/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Lease-backed mutual exclusion across competing worker instances.

use crate::error::{ConfigurationError, Error};
use crate::observability::events;
use crate::runtime::cancellation::cancellable;
use crate::storage::{LeaseService, StorageErrorKind};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "lock_manager";

pub const MIN_LEASE_DURATION: Duration = Duration::from_secs(15);
pub const MAX_LEASE_DURATION: Duration = Duration::from_secs(60);

#[derive(Default)]
struct LockState {
    resource_ready: bool,
    lease_id: Option<String>,
}

/// Holds, renews and releases one lease over a named resource.
///
/// Contention is an expected outcome and is reported as `Ok(false)`. Only the
/// lease service enforces exclusion; this type remembers which lease id it
/// owns so repeated calls renew instead of re-acquiring.
pub struct LockManager {
    leases: Arc<dyn LeaseService>,
    resource: String,
    duration: Duration,
    state: Mutex<LockState>,
}

impl LockManager {
    pub fn new(
        leases: Arc<dyn LeaseService>,
        resource: &str,
        duration: Duration,
    ) -> Result<Self, ConfigurationError> {
        if resource.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "lock_container",
                reason: "must not be empty".to_string(),
            });
        }
        if !(MIN_LEASE_DURATION..=MAX_LEASE_DURATION).contains(&duration) {
            return Err(ConfigurationError::InvalidValue {
                field: "lease_duration_secs",
                reason: format!(
                    "{}s is outside the supported range of {}s to {}s",
                    duration.as_secs(),
                    MIN_LEASE_DURATION.as_secs(),
                    MAX_LEASE_DURATION.as_secs()
                ),
            });
        }
        Ok(Self {
            leases,
            resource: resource.to_string(),
            duration,
            state: Mutex::new(LockState::default()),
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn lease_duration(&self) -> Duration {
        self.duration
    }

    /// Whether this instance believes it holds the lease. The lease may have
    /// lapsed since the last successful renewal.
    pub async fn is_held(&self) -> bool {
        self.state.lock().await.lease_id.is_some()
    }

    /// Renews the held lease, or acquires a fresh one when none is held or
    /// the previous one was lost. Returns `false` when someone else holds it.
    pub async fn try_acquire_or_renew(&self, cancel: &CancellationToken) -> Result<bool, Error> {
        let mut state = self.state.lock().await;

        if !state.resource_ready {
            cancellable(
                cancel,
                self.leases.create_resource_if_not_exists(&self.resource),
            )
            .await?;
            state.resource_ready = true;
        }

        if let Some(lease_id) = state.lease_id.clone() {
            match cancellable(cancel, self.leases.renew(&self.resource, &lease_id)).await {
                Ok(()) => {
                    debug!(
                        event = events::LOCK_RENEWED,
                        component = COMPONENT,
                        resource = self.resource.as_str(),
                        "renewed lease"
                    );
                    return Ok(true);
                }
                Err(err) if lease_lost(&err) => {
                    info!(
                        event = events::LOCK_LOST,
                        component = COMPONENT,
                        resource = self.resource.as_str(),
                        err = %err,
                        "lease lost, trying to acquire a new one"
                    );
                    state.lease_id = None;
                }
                Err(err) => return Err(err),
            }
        }

        let proposed_lease_id = Uuid::new_v4().to_string();
        match cancellable(
            cancel,
            self.leases
                .acquire(&self.resource, self.duration, &proposed_lease_id),
        )
        .await
        {
            Ok(lease_id) => {
                info!(
                    event = events::LOCK_ACQUIRED,
                    component = COMPONENT,
                    resource = self.resource.as_str(),
                    duration_secs = self.duration.as_secs(),
                    "acquired lease"
                );
                state.lease_id = Some(lease_id);
                Ok(true)
            }
            Err(err) if err.storage_kind() == Some(StorageErrorKind::Conflict) => {
                debug!(
                    event = events::LOCK_CONTENDED,
                    component = COMPONENT,
                    resource = self.resource.as_str(),
                    "lease is held by another instance"
                );
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Releases the held lease. Returns `false` when nothing was held or the
    /// lease had already been lost. The local lease id is forgotten either way.
    pub async fn try_release(&self, cancel: &CancellationToken) -> Result<bool, Error> {
        let Some(lease_id) = self.state.lock().await.lease_id.take() else {
            return Ok(false);
        };

        match cancellable(cancel, self.leases.release(&self.resource, &lease_id)).await {
            Ok(()) => {
                info!(
                    event = events::LOCK_RELEASED,
                    component = COMPONENT,
                    resource = self.resource.as_str(),
                    "released lease"
                );
                Ok(true)
            }
            Err(err) if lease_lost(&err) => {
                debug!(
                    event = events::LOCK_RELEASE_FAILED,
                    component = COMPONENT,
                    resource = self.resource.as_str(),
                    err = %err,
                    "lease was already lost"
                );
                Ok(false)
            }
            Err(err) => {
                warn!(
                    event = events::LOCK_RELEASE_FAILED,
                    component = COMPONENT,
                    resource = self.resource.as_str(),
                    err = %err,
                    "failed to release lease, it will lapse on its own"
                );
                Err(err)
            }
        }
    }
}

fn lease_lost(err: &Error) -> bool {
    matches!(
        err.storage_kind(),
        Some(
            StorageErrorKind::Conflict
                | StorageErrorKind::NotFound
                | StorageErrorKind::PreconditionFailed
        )
    )
}

impl Debug for LockManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("resource", &self.resource)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::LockManager;
    use crate::error::{ConfigurationError, Error};
    use crate::storage::{LeaseService, StorageError, StorageErrorKind};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    struct Lease {
        id: String,
        expires_at: Instant,
    }

    /// Leases that lapse on the tokio clock.
    #[derive(Default)]
    struct ClockLeases {
        leases: Mutex<HashMap<String, Lease>>,
        fail_next_release: Mutex<Option<StorageError>>,
    }

    fn conflict(message: &str) -> StorageError {
        StorageError::fail_with_kind(StorageErrorKind::Conflict, message)
    }

    #[async_trait]
    impl LeaseService for ClockLeases {
        async fn create_resource_if_not_exists(&self, _resource: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn acquire(
            &self,
            resource: &str,
            duration: Duration,
            proposed_lease_id: &str,
        ) -> Result<String, StorageError> {
            let mut leases = self.leases.lock().unwrap();
            let now = Instant::now();
            if leases.get(resource).is_some_and(|lease| lease.expires_at > now) {
                return Err(conflict("lease already present"));
            }
            leases.insert(
                resource.to_string(),
                Lease {
                    id: proposed_lease_id.to_string(),
                    expires_at: now + duration,
                },
            );
            Ok(proposed_lease_id.to_string())
        }

        async fn renew(&self, resource: &str, lease_id: &str) -> Result<(), StorageError> {
            let mut leases = self.leases.lock().unwrap();
            match leases.get_mut(resource) {
                Some(lease) if lease.id == lease_id => {
                    lease.expires_at = Instant::now() + Duration::from_secs(15);
                    Ok(())
                }
                _ => Err(conflict("lease id mismatch")),
            }
        }

        async fn release(&self, resource: &str, lease_id: &str) -> Result<(), StorageError> {
            if let Some(error) = self.fail_next_release.lock().unwrap().take() {
                return Err(error);
            }
            let mut leases = self.leases.lock().unwrap();
            match leases.get(resource) {
                Some(lease) if lease.id == lease_id => {
                    leases.remove(resource);
                    Ok(())
                }
                _ => Err(conflict("lease id mismatch")),
            }
        }
    }

    fn manager(leases: &Arc<ClockLeases>) -> LockManager {
        LockManager::new(leases.clone(), "delays-lock", Duration::from_secs(15)).unwrap()
    }

    #[test]
    fn lease_duration_must_be_in_range() {
        let leases: Arc<ClockLeases> = Arc::default();
        for seconds in [0, 14, 61] {
            let result = LockManager::new(leases.clone(), "lock", Duration::from_secs(seconds));
            assert!(matches!(
                result,
                Err(ConfigurationError::InvalidValue {
                    field: "lease_duration_secs",
                    ..
                })
            ));
        }
        assert!(LockManager::new(leases.clone(), "lock", Duration::from_secs(60)).is_ok());
        assert!(LockManager::new(leases, " ", Duration::from_secs(30)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_instance_holds_the_lease() {
        let leases: Arc<ClockLeases> = Arc::default();
        let first = manager(&leases);
        let second = manager(&leases);
        let cancel = CancellationToken::new();

        assert_eq!(first.try_acquire_or_renew(&cancel).await, Ok(true));
        assert_eq!(second.try_acquire_or_renew(&cancel).await, Ok(false));
        assert_eq!(first.try_acquire_or_renew(&cancel).await, Ok(true));
        assert_eq!(second.try_acquire_or_renew(&cancel).await, Ok(false));
        assert!(first.is_held().await);
        assert!(!second.is_held().await);
    }

    #[tokio::test(start_paused = true)]
    async fn renewing_keeps_the_lease_past_its_first_expiry() {
        let leases: Arc<ClockLeases> = Arc::default();
        let holder = manager(&leases);
        let contender = manager(&leases);
        let cancel = CancellationToken::new();

        assert_eq!(holder.try_acquire_or_renew(&cancel).await, Ok(true));
        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(10)).await;
            assert_eq!(holder.try_acquire_or_renew(&cancel).await, Ok(true));
            assert_eq!(contender.try_acquire_or_renew(&cancel).await, Ok(false));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lapsed_lease_moves_to_another_instance() {
        let leases: Arc<ClockLeases> = Arc::default();
        let first = manager(&leases);
        let second = manager(&leases);
        let cancel = CancellationToken::new();

        assert_eq!(first.try_acquire_or_renew(&cancel).await, Ok(true));
        tokio::time::advance(Duration::from_secs(16)).await;
        assert_eq!(second.try_acquire_or_renew(&cancel).await, Ok(true));

        // The renew fails, the id is dropped and the fresh acquire conflicts.
        assert_eq!(first.try_acquire_or_renew(&cancel).await, Ok(false));
        assert!(!first.is_held().await);
        assert_eq!(first.try_release(&cancel).await, Ok(false));
    }

    #[tokio::test(start_paused = true)]
    async fn release_hands_the_lease_over() {
        let leases: Arc<ClockLeases> = Arc::default();
        let first = manager(&leases);
        let second = manager(&leases);
        let cancel = CancellationToken::new();

        assert_eq!(first.try_release(&cancel).await, Ok(false));
        assert_eq!(first.try_acquire_or_renew(&cancel).await, Ok(true));
        assert_eq!(first.try_release(&cancel).await, Ok(true));
        assert_eq!(first.try_release(&cancel).await, Ok(false));
        assert_eq!(second.try_acquire_or_renew(&cancel).await, Ok(true));
    }

    #[tokio::test(start_paused = true)]
    async fn release_failure_propagates_and_forgets_the_id() {
        let leases: Arc<ClockLeases> = Arc::default();
        let holder = manager(&leases);
        let cancel = CancellationToken::new();

        assert_eq!(holder.try_acquire_or_renew(&cancel).await, Ok(true));
        *leases.fail_next_release.lock().unwrap() = Some(StorageError::fail_with_kind(
            StorageErrorKind::Transient,
            "timeout",
        ));

        let error = holder.try_release(&cancel).await.unwrap_err();
        assert_eq!(error.storage_kind(), Some(StorageErrorKind::Transient));
        assert!(!holder.is_held().await);
    }

    #[tokio::test]
    async fn cancelled_acquire_reports_cancellation() {
        let leases: Arc<ClockLeases> = Arc::default();
        let holder = manager(&leases);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(holder.try_acquire_or_renew(&cancel).await, Err(Error::Cancelled));
        assert!(!holder.is_held().await);
    }
}
