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

//! Table-backed subscription store.

use crate::addressing::{AddressRouter, QueueAddress};
use crate::error::Error;
use crate::observability::{events, fields};
use crate::runtime::cancellation::cancellable;
use crate::storage::{ETag, StorageErrorKind, Table, TableEntity, TableQuery};
use crate::subscriptions::{SubscriptionStore, ADDRESS_PROPERTY};
use crate::topic::{topic_for, MessageType};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const COMPONENT: &str = "subscription_store";

/// Partition key = topic, row key = subscriber endpoint name, `Address`
/// attribute = subscriber address.
///
/// Writes go to the table of the account that publishes the event type (see
/// [`AddressRouter::subscription_table_for`]); reads always hit the local
/// subscription table.
pub struct TableSubscriptionStore {
    router: Arc<AddressRouter>,
    local_table: Arc<dyn Table>,
}

impl TableSubscriptionStore {
    pub fn new(router: Arc<AddressRouter>) -> Self {
        let local_table = router.local_subscription_table();
        Self {
            router,
            local_table,
        }
    }

    pub async fn initialize(&self, cancel: &CancellationToken) -> Result<(), Error> {
        cancellable(cancel, self.local_table.create_if_not_exists()).await
    }

    // A subscriber writing into another account's table must leave an address
    // the publisher can route back to.
    fn subscriber_address(&self, table_alias: &str, address: &QueueAddress) -> QueueAddress {
        if table_alias != self.router.local_alias() && !address.has_alias() {
            address.with_alias(self.router.local_alias())
        } else {
            address.clone()
        }
    }
}

#[async_trait]
impl SubscriptionStore for TableSubscriptionStore {
    async fn subscribe(
        &self,
        endpoint_name: &str,
        endpoint_address: &QueueAddress,
        event_type: &MessageType,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let (table_alias, table) = self.router.subscription_table_for(event_type);
        let address = self.subscriber_address(&table_alias, endpoint_address);
        let entity = TableEntity::new(topic_for(event_type), endpoint_name)
            .with_string(ADDRESS_PROPERTY, address.to_string());

        match cancellable(cancel, table.insert_or_replace(entity)).await {
            Ok(()) => {
                debug!(
                    event = events::SUBSCRIBE_OK,
                    component = COMPONENT,
                    event_type = fields::format_event_type(event_type),
                    endpoint = endpoint_name,
                    address = %fields::format_address(&address),
                    table = table.name(),
                    "subscription stored"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    event = events::SUBSCRIBE_FAILED,
                    component = COMPONENT,
                    event_type = fields::format_event_type(event_type),
                    endpoint = endpoint_name,
                    err = %err,
                    "subscription write failed"
                );
                Err(err)
            }
        }
    }

    async fn unsubscribe(
        &self,
        endpoint_name: &str,
        event_type: &MessageType,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let (_, table) = self.router.subscription_table_for(event_type);
        let topic = topic_for(event_type);

        match cancellable(cancel, table.delete(&topic, endpoint_name, ETag::Any)).await {
            Ok(()) => {
                debug!(
                    event = events::UNSUBSCRIBE_OK,
                    component = COMPONENT,
                    event_type = topic.as_str(),
                    endpoint = endpoint_name,
                    "subscription removed"
                );
                Ok(())
            }
            Err(err) if err.storage_kind() == Some(StorageErrorKind::NotFound) => {
                debug!(
                    event = events::UNSUBSCRIBE_MISSING,
                    component = COMPONENT,
                    event_type = topic.as_str(),
                    endpoint = endpoint_name,
                    "no subscription to remove"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    event = events::UNSUBSCRIBE_FAILED,
                    component = COMPONENT,
                    event_type = topic.as_str(),
                    endpoint = endpoint_name,
                    err = %err,
                    "subscription delete failed"
                );
                Err(err)
            }
        }
    }

    async fn get_subscribers(
        &self,
        event_type: &MessageType,
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, Error> {
        let mut seen_topics = HashSet::new();
        let queries: Vec<TableQuery> = event_type
            .hierarchy_topics()
            .iter()
            .filter(|topic| seen_topics.insert(topic.as_str()))
            .map(|topic| TableQuery::Partition(topic.clone()))
            .collect();
        let topic_count = queries.len();

        let lookups = queries.iter().map(|query| self.local_table.query(query));
        let partitions = match cancellable(cancel, try_join_all(lookups)).await {
            Ok(partitions) => partitions,
            Err(err) => {
                warn!(
                    event = events::SUBSCRIBER_LOOKUP_FAILED,
                    component = COMPONENT,
                    event_type = fields::format_event_type(event_type),
                    topic_count,
                    err = %err,
                    "subscriber lookup failed"
                );
                return Err(err);
            }
        };

        let mut seen_addresses = HashSet::new();
        let mut subscribers = HashSet::new();
        for entity in partitions.into_iter().flatten() {
            let Some(address) = entity.string(ADDRESS_PROPERTY) else {
                warn!(
                    event = events::SUBSCRIPTION_ROW_MALFORMED,
                    component = COMPONENT,
                    topic = entity.partition_key.as_str(),
                    endpoint = entity.row_key.as_str(),
                    "subscription row has no address"
                );
                continue;
            };
            if seen_addresses.insert(address.to_lowercase()) {
                subscribers.insert(address.to_string());
            }
        }

        debug!(
            event = events::SUBSCRIBER_LOOKUP_OK,
            component = COMPONENT,
            event_type = fields::format_event_type(event_type),
            topic_count,
            subscriber_count = subscribers.len(),
            "resolved subscribers"
        );
        Ok(subscribers)
    }
}
