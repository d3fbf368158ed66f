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

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use storage_queues::{LeaseService, StorageError, StorageErrorKind};
use tokio::time::Instant;

struct ActiveLease {
    lease_id: String,
    duration: Duration,
    expires_at: Instant,
}

/// Leases over named resources, expiring on the tokio clock so tests can
/// drive lapses with `tokio::time::advance`.
///
/// Like blob leases, an expired lease can still be renewed by its holder
/// until someone else acquires the resource.
#[derive(Default)]
pub struct InMemoryLeaseService {
    resources: Mutex<HashMap<String, Option<ActiveLease>>>,
}

fn fail(kind: StorageErrorKind, message: String) -> StorageError {
    StorageError::fail_with_kind(kind, message)
}

impl InMemoryLeaseService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the unexpired lease on `resource`, if any.
    pub fn active_lease(&self, resource: &str) -> Option<String> {
        let now = Instant::now();
        self.resources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(resource)
            .and_then(Option::as_ref)
            .filter(|lease| lease.expires_at > now)
            .map(|lease| lease.lease_id.clone())
    }
}

#[async_trait]
impl LeaseService for InMemoryLeaseService {
    async fn create_resource_if_not_exists(&self, resource: &str) -> Result<(), StorageError> {
        self.resources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(resource.to_string())
            .or_insert(None);
        Ok(())
    }

    async fn acquire(
        &self,
        resource: &str,
        duration: Duration,
        proposed_lease_id: &str,
    ) -> Result<String, StorageError> {
        let mut resources = self.resources.lock().unwrap_or_else(|e| e.into_inner());
        let Some(slot) = resources.get_mut(resource) else {
            return Err(fail(
                StorageErrorKind::NotFound,
                format!("resource '{resource}' does not exist"),
            ));
        };

        let now = Instant::now();
        if let Some(lease) = slot {
            if lease.expires_at > now && lease.lease_id != proposed_lease_id {
                return Err(fail(
                    StorageErrorKind::Conflict,
                    format!("resource '{resource}' is already leased"),
                ));
            }
        }
        *slot = Some(ActiveLease {
            lease_id: proposed_lease_id.to_string(),
            duration,
            expires_at: now + duration,
        });
        Ok(proposed_lease_id.to_string())
    }

    async fn renew(&self, resource: &str, lease_id: &str) -> Result<(), StorageError> {
        let mut resources = self.resources.lock().unwrap_or_else(|e| e.into_inner());
        match resources.get_mut(resource) {
            Some(Some(lease)) if lease.lease_id == lease_id => {
                lease.expires_at = Instant::now() + lease.duration;
                Ok(())
            }
            Some(_) => Err(fail(
                StorageErrorKind::Conflict,
                format!("lease on '{resource}' is not held by '{lease_id}'"),
            )),
            None => Err(fail(
                StorageErrorKind::NotFound,
                format!("resource '{resource}' does not exist"),
            )),
        }
    }

    async fn release(&self, resource: &str, lease_id: &str) -> Result<(), StorageError> {
        let mut resources = self.resources.lock().unwrap_or_else(|e| e.into_inner());
        match resources.get_mut(resource) {
            Some(slot) if slot.as_ref().is_some_and(|lease| lease.lease_id == lease_id) => {
                *slot = None;
                Ok(())
            }
            Some(_) => Err(fail(
                StorageErrorKind::Conflict,
                format!("lease on '{resource}' is not held by '{lease_id}'"),
            )),
            None => Err(fail(
                StorageErrorKind::NotFound,
                format!("resource '{resource}' does not exist"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryLeaseService;
    use std::time::Duration;
    use storage_queues::{LeaseService, StorageErrorKind};

    #[tokio::test(start_paused = true)]
    async fn lease_lapses_after_its_duration() {
        let leases = InMemoryLeaseService::new();
        leases.create_resource_if_not_exists("lock").await.unwrap();

        let first = leases
            .acquire("lock", Duration::from_secs(15), "first")
            .await
            .unwrap();
        let error = leases
            .acquire("lock", Duration::from_secs(15), "second")
            .await
            .unwrap_err();
        assert_eq!(error.kind(), StorageErrorKind::Conflict);

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(leases.active_lease("lock"), None);
        leases
            .acquire("lock", Duration::from_secs(15), "second")
            .await
            .unwrap();

        let error = leases.renew("lock", &first).await.unwrap_err();
        assert_eq!(error.kind(), StorageErrorKind::Conflict);
        assert_eq!(leases.active_lease("lock").as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn acquire_needs_the_resource() {
        let leases = InMemoryLeaseService::new();
        let error = leases
            .acquire("missing", Duration::from_secs(15), "id")
            .await
            .unwrap_err();
        assert_eq!(error.kind(), StorageErrorKind::NotFound);
    }
}
