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

//! Delayed delivery: messages parked in a table until they are due, then
//! dispatched by whichever worker holds the delivery lease.
//!
//! Rows are bucketed by the hour they fall due, so a poller only scans
//! partitions at or before the current bucket.

mod lock_manager;
mod poller;

pub use lock_manager::{LockManager, MAX_LEASE_DURATION, MIN_LEASE_DURATION};
pub use poller::{DelayedMessagePoller, PollOutcome};

use crate::addressing::{AddressRouter, MessageIntent, QueueAddress};
use crate::error::Error;
use crate::headers;
use crate::observability::{events, fields};
use crate::runtime::cancellation::cancellable;
use crate::storage::{OutgoingMessage, Table, TableEntity};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

const COMPONENT: &str = "delayed_delivery";

pub const DESTINATION_PROPERTY: &str = "Destination";
pub const MESSAGE_ID_PROPERTY: &str = "MessageId";
pub const HEADERS_PROPERTY: &str = "Headers";
pub const BODY_PROPERTY: &str = "Body";
pub const DUE_AT_PROPERTY: &str = "DueAt";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DelayedDeliverySettings {
    pub table_name: String,
    /// Name of the leasable resource guarding dispatch.
    pub lock_container: String,
    pub lease_duration: Duration,
    pub poll_interval: Duration,
    /// Upper bound for the idle back-off between polls.
    pub max_poll_backoff: Duration,
    /// Most messages one poll dispatches; the rest wait for the next poll.
    pub batch_size: usize,
}

impl Default for DelayedDeliverySettings {
    fn default() -> Self {
        Self {
            table_name: "delays".to_string(),
            lock_container: "delays-lock".to_string(),
            lease_duration: MAX_LEASE_DURATION,
            poll_interval: Duration::from_secs(1),
            max_poll_backoff: Duration::from_secs(30),
            batch_size: 100,
        }
    }
}

/// Hour bucket a message due at `due_at` is stored under.
pub fn partition_key_for(due_at: DateTime<Utc>) -> String {
    due_at.format("%Y%m%d%H").to_string()
}

fn row_key_for(due_at: DateTime<Utc>, message_id: &str) -> String {
    format!("{}_{}", due_at.format("%Y%m%d%H%M%S%6f"), message_id)
}

/// A message waiting in the delayed-messages table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DelayedMessage {
    pub destination: QueueAddress,
    pub due_at: DateTime<Utc>,
    pub message: OutgoingMessage,
}

impl DelayedMessage {
    pub fn to_entity(&self) -> Result<TableEntity, Error> {
        let headers = headers::encode(&self.message.headers)?;
        Ok(TableEntity::new(
            partition_key_for(self.due_at),
            row_key_for(self.due_at, &self.message.message_id),
        )
        .with_string(DESTINATION_PROPERTY, self.destination.to_string())
        .with_string(MESSAGE_ID_PROPERTY, self.message.message_id.as_str())
        .with_binary(HEADERS_PROPERTY, headers)
        .with_binary(BODY_PROPERTY, self.message.body.clone())
        .with_string(
            DUE_AT_PROPERTY,
            self.due_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        ))
    }

    pub fn from_entity(entity: &TableEntity) -> Result<Self, Error> {
        let invalid = |reason: String| Error::InvalidEntity {
            partition_key: entity.partition_key.clone(),
            row_key: entity.row_key.clone(),
            reason,
        };
        let string = |name: &str| {
            entity
                .string(name)
                .ok_or_else(|| invalid(format!("missing string attribute '{name}'")))
        };

        let destination = QueueAddress::parse(string(DESTINATION_PROPERTY)?)
            .map_err(|err| invalid(err.to_string()))?;
        let due_at = DateTime::parse_from_rfc3339(string(DUE_AT_PROPERTY)?)
            .map_err(|err| invalid(format!("unparsable '{DUE_AT_PROPERTY}': {err}")))?
            .with_timezone(&Utc);
        let message_id = string(MESSAGE_ID_PROPERTY)?.to_string();
        let headers = match entity.binary(HEADERS_PROPERTY) {
            Some(raw) => headers::decode(raw).map_err(|err| invalid(err.to_string()))?,
            None => return Err(invalid(format!("missing binary attribute '{HEADERS_PROPERTY}'"))),
        };
        let body = entity.binary(BODY_PROPERTY).cloned().unwrap_or_default();

        Ok(Self {
            destination,
            due_at,
            message: OutgoingMessage {
                message_id,
                headers,
                body,
            },
        })
    }
}

/// Parks outgoing messages until they are due.
pub struct DelayedDelivery {
    router: Arc<AddressRouter>,
    table: Arc<dyn Table>,
}

impl DelayedDelivery {
    /// The delayed-messages table always lives in the local account.
    pub fn new(router: Arc<AddressRouter>, table_name: &str) -> Self {
        let table = router.local_account().table_service().table(table_name);
        Self { router, table }
    }

    pub async fn initialize(&self, cancel: &CancellationToken) -> Result<(), Error> {
        cancellable(cancel, self.table.create_if_not_exists()).await
    }

    /// Stores `message` for dispatch to `destination` once `due_at` has
    /// passed. Unroutable destinations are rejected now rather than at
    /// dispatch time. Returns the stored message id.
    ///
    /// Delayed messages are dispatched as sends, so the destination needs a
    /// registered alias. A reply to a legacy connection-string address has to
    /// be sent immediately.
    pub async fn schedule(
        &self,
        destination: &QueueAddress,
        mut message: OutgoingMessage,
        due_at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        self.router.resolve(destination, MessageIntent::Send)?;
        self.router
            .rewrite_reply_to_for_outgoing(&mut message.headers, destination)?;
        if message.message_id.is_empty() {
            message.message_id = Uuid::new_v4().to_string();
        }

        let delayed = DelayedMessage {
            destination: destination.clone(),
            due_at: due_at.trunc_subsecs(6),
            message,
        };
        let entity = delayed.to_entity()?;
        cancellable(cancel, self.table.insert(entity)).await?;

        debug!(
            event = events::DELAYED_MESSAGE_SCHEDULED,
            component = COMPONENT,
            address = %fields::format_address(destination),
            table = self.table.name(),
            due_at = %delayed.due_at,
            message_id = delayed.message.message_id.as_str(),
            "scheduled delayed message"
        );
        Ok(delayed.message.message_id)
    }
}
