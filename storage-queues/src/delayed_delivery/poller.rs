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


use crate::addressing::{AddressRouter, MessageIntent};
use crate::delayed_delivery::{
    partition_key_for, DelayedDeliverySettings, DelayedMessage, LockManager,
};
use crate::error::{ConfigurationError, Error};
use crate::observability::{events, fields};
use crate::runtime::cancellation::cancellable;
use crate::storage::{ETag, LeaseService, StorageErrorKind, Table, TableEntity, TableQuery};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMPONENT: &str = "delayed_poller";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PollOutcome {
    /// Another instance holds the delivery lease; nothing was read.
    NotOwner,
    /// The lease could not be renewed partway through the pass. Rows not yet
    /// dispatched were left for the next owner.
    LeaseLost { dispatched: usize, failed: usize },
    Polled {
        dispatched: usize,
        /// Rows in a scanned bucket that are not due yet.
        pending: usize,
        /// Rows that could not be decoded and were left in place.
        malformed: usize,
        /// Due rows that could not be routed or sent and were left in place.
        failed: usize,
    },
}

/// Moves due delayed messages to their destination queues.
///
/// Only the lease holder dispatches, so each stored message is sent by a
/// single worker. A message is deleted after its send succeeds; a crash in
/// between redelivers it on the next poll.
pub struct DelayedMessagePoller {
    router: Arc<AddressRouter>,
    table: Arc<dyn Table>,
    lock: LockManager,
    poll_interval: Duration,
    max_poll_backoff: Duration,
    batch_size: usize,
}

impl DelayedMessagePoller {
    pub fn new(
        router: Arc<AddressRouter>,
        leases: Arc<dyn LeaseService>,
        settings: &DelayedDeliverySettings,
    ) -> Result<Self, ConfigurationError> {
        if settings.poll_interval.is_zero() {
            return Err(ConfigurationError::InvalidValue {
                field: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if settings.max_poll_backoff < settings.poll_interval {
            return Err(ConfigurationError::InvalidValue {
                field: "max_poll_backoff_ms",
                reason: "must not be shorter than the poll interval".to_string(),
            });
        }
        if settings.batch_size == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "batch_size",
                reason: "must be greater than zero".to_string(),
            });
        }

        let lock = LockManager::new(leases, &settings.lock_container, settings.lease_duration)?;
        let table = router
            .local_account()
            .table_service()
            .table(&settings.table_name);
        Ok(Self {
            router,
            table,
            lock,
            poll_interval: settings.poll_interval,
            max_poll_backoff: settings.max_poll_backoff,
            batch_size: settings.batch_size,
        })
    }

    pub fn lock(&self) -> &LockManager {
        &self.lock
    }

    /// One pass over every bucket up to the one `now` falls in.
    ///
    /// A pass dispatches at most `batch_size` messages and renews the lease
    /// once half of it has elapsed, stopping if the renewal fails. Rows that
    /// cannot be routed or hit a permanent storage failure are logged and left
    /// in place. A transient failure ends the pass; messages sent before it
    /// stay sent and the failing one stays stored.
    pub async fn poll_once(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, Error> {
        if !self.lock.try_acquire_or_renew(cancel).await? {
            debug!(
                event = events::DELAYED_POLL_NOT_OWNER,
                component = COMPONENT,
                resource = self.lock.resource(),
                "not the lease holder, skipping poll"
            );
            return Ok(PollOutcome::NotOwner);
        }
        let renew_after = self.lock.lease_duration() / 2;
        let mut lease_confirmed_at = Instant::now();

        let query = TableQuery::PartitionsUpTo(partition_key_for(now));
        let entities = cancellable(cancel, self.table.query(&query)).await?;

        let (mut dispatched, mut pending, mut malformed, mut failed) = (0, 0, 0, 0);
        for entity in entities {
            let delayed = match DelayedMessage::from_entity(&entity) {
                Ok(delayed) => delayed,
                Err(err) => {
                    warn!(
                        event = events::DELAYED_MESSAGE_MALFORMED,
                        component = COMPONENT,
                        table = self.table.name(),
                        err = %err,
                        "skipping malformed delayed message"
                    );
                    malformed += 1;
                    continue;
                }
            };
            if delayed.due_at > now {
                pending += 1;
                continue;
            }
            if dispatched == self.batch_size {
                debug!(
                    event = events::DELAYED_POLL_BATCH_FULL,
                    component = COMPONENT,
                    table = self.table.name(),
                    batch_size = self.batch_size,
                    "batch is full, leaving the rest for the next poll"
                );
                break;
            }

            if lease_confirmed_at.elapsed() >= renew_after {
                if !self.lock.try_acquire_or_renew(cancel).await? {
                    warn!(
                        event = events::DELAYED_POLL_LEASE_LOST,
                        component = COMPONENT,
                        resource = self.lock.resource(),
                        dispatched,
                        failed,
                        "lease lost during poll, stopping"
                    );
                    return Ok(PollOutcome::LeaseLost { dispatched, failed });
                }
                lease_confirmed_at = Instant::now();
            }

            let address = fields::format_address(&delayed.destination);
            let message_id = delayed.message.message_id.clone();
            match self.dispatch(delayed, &entity, cancel).await {
                Ok(()) => dispatched += 1,
                Err(err) if ends_pass(&err) => return Err(err),
                Err(err) => {
                    warn!(
                        event = events::DELAYED_DISPATCH_FAILED,
                        component = COMPONENT,
                        address = %address,
                        message_id = message_id.as_str(),
                        err = %err,
                        "leaving undeliverable delayed message in place"
                    );
                    failed += 1;
                }
            }
        }

        debug!(
            event = events::DELAYED_POLL_SUMMARY,
            component = COMPONENT,
            table = self.table.name(),
            dispatched,
            pending,
            malformed,
            failed,
            "delayed poll finished"
        );
        Ok(PollOutcome::Polled {
            dispatched,
            pending,
            malformed,
            failed,
        })
    }

    async fn dispatch(
        &self,
        delayed: DelayedMessage,
        entity: &TableEntity,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let queue = self
            .router
            .resolve(&delayed.destination, MessageIntent::Send)?;
        let message_id = delayed.message.message_id.clone();
        cancellable(
            cancel,
            queue.send(delayed.destination.queue_name(), delayed.message),
        )
        .await?;

        let etag = entity.etag.clone().map_or(ETag::Any, ETag::Exact);
        match cancellable(
            cancel,
            self.table
                .delete(&entity.partition_key, &entity.row_key, etag),
        )
        .await
        {
            Ok(()) => {}
            Err(err) if err.storage_kind() == Some(StorageErrorKind::NotFound) => {}
            Err(err) => return Err(err),
        }

        debug!(
            event = events::DELAYED_MESSAGE_DISPATCHED,
            component = COMPONENT,
            address = %fields::format_address(&delayed.destination),
            message_id = message_id.as_str(),
            "dispatched delayed message"
        );
        Ok(())
    }

    /// Polls until `cancel` fires, backing off while there is nothing to do.
    /// The lease is released on the way out.
    pub async fn run(&self, cancel: &CancellationToken) {
        let mut idle_delay = self.poll_interval;

        loop {
            let idle = match self.poll_once(Utc::now(), cancel).await {
                Ok(PollOutcome::Polled { dispatched, .. }) => dispatched == 0,
                Ok(PollOutcome::NotOwner | PollOutcome::LeaseLost { .. }) => true,
                Err(Error::Cancelled) => break,
                Err(err) => {
                    warn!(
                        event = events::DELAYED_POLL_FAILED,
                        component = COMPONENT,
                        table = self.table.name(),
                        err = %err,
                        "delayed poll failed"
                    );
                    true
                }
            };

            let sleep_for = if idle {
                let current = idle_delay;
                idle_delay = (idle_delay * 2).min(self.max_poll_backoff);
                current
            } else {
                idle_delay = self.poll_interval;
                self.poll_interval
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }

        // The caller's token is already cancelled; release on a fresh one.
        let released = self.lock.try_release(&CancellationToken::new()).await;
        let err = released
            .as_ref()
            .err()
            .map_or_else(|| fields::NONE.to_string(), ToString::to_string);
        info!(
            event = events::DELAYED_POLLER_STOPPED,
            component = COMPONENT,
            resource = self.lock.resource(),
            released = released.unwrap_or(false),
            err = err.as_str(),
            "delayed poller stopped"
        );
    }
}

/// Transient storage failures and cancellation stop a pass; anything else is
/// specific to one row.
fn ends_pass(err: &Error) -> bool {
    matches!(err, Error::Cancelled) || err.storage_kind() == Some(StorageErrorKind::Transient)
}
