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

//! Subscription registry.
//!
//! [`TableSubscriptionStore`] keeps one table row per (topic, subscriber
//! endpoint). [`CachedSubscriptionStore`] wraps any store and remembers the
//! subscriber set per event type for a bounded time. Which of the two the
//! pipeline talks to is decided once, in [`build_subscription_store`].

mod cache;
mod store;

pub use cache::CachedSubscriptionStore;
pub use store::TableSubscriptionStore;

use crate::addressing::{AddressRouter, QueueAddress};
use crate::error::Error;
use crate::topic::MessageType;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Table attribute holding the subscriber address.
pub const ADDRESS_PROPERTY: &str = "Address";

const DEFAULT_CACHE_FOR: Duration = Duration::from_secs(5);

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert-or-replace; calling it again with the same inputs changes nothing.
    async fn subscribe(
        &self,
        endpoint_name: &str,
        endpoint_address: &QueueAddress,
        event_type: &MessageType,
        cancel: &CancellationToken,
    ) -> Result<(), Error>;

    /// Removing a subscription that does not exist is not an error.
    async fn unsubscribe(
        &self,
        endpoint_name: &str,
        event_type: &MessageType,
        cancel: &CancellationToken,
    ) -> Result<(), Error>;

    /// Addresses subscribed to `event_type` or any of its ancestors,
    /// deduplicated ignoring case. Empty when nobody is subscribed.
    async fn get_subscribers(
        &self,
        event_type: &MessageType,
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, Error>;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscriptionSettings {
    pub cache_enabled: bool,
    /// Zero forces a fetch on every read.
    pub cache_for: Duration,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_for: DEFAULT_CACHE_FOR,
        }
    }
}

/// Creates the local subscription table and returns the store the pipeline
/// should use, cached or not.
pub async fn build_subscription_store(
    router: Arc<AddressRouter>,
    settings: &SubscriptionSettings,
    cancel: &CancellationToken,
) -> Result<Arc<dyn SubscriptionStore>, Error> {
    let table_store = TableSubscriptionStore::new(router);
    table_store.initialize(cancel).await?;

    if settings.cache_enabled {
        Ok(Arc::new(CachedSubscriptionStore::new(
            Arc::new(table_store),
            settings.cache_for,
        )))
    } else {
        Ok(Arc::new(table_store))
    }
}
