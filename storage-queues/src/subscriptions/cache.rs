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

//! Time-boxed subscriber cache with single-flight fetches.

use crate::addressing::QueueAddress;
use crate::error::Error;
use crate::observability::{events, fields};
use crate::runtime::cancellation::cancellable;
use crate::subscriptions::SubscriptionStore;
use crate::topic::MessageType;
use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const COMPONENT: &str = "subscription_cache";

type SubscriberFetch = Shared<BoxFuture<'static, Result<Arc<HashSet<String>>, Error>>>;

struct CachedSubscribers {
    stored_at: Instant,
    generation: u64,
    fetch: SubscriberFetch,
}

/// Caches [`SubscriptionStore::get_subscribers`] per concrete event type.
///
/// The first reader of an absent or expired entry installs a shared fetch
/// under the map lock; everyone arriving later awaits that same fetch. Expiry
/// is checked on read only. Subscribe and unsubscribe evict the exact event
/// type they touched.
///
/// A fetch that started before an eviction still completes for the readers
/// already awaiting it; they may observe the pre-mutation subscriber set.
pub struct CachedSubscriptionStore {
    inner: Arc<dyn SubscriptionStore>,
    cache_for: Duration,
    entries: Mutex<HashMap<MessageType, CachedSubscribers>>,
    next_generation: AtomicU64,
}

impl CachedSubscriptionStore {
    pub fn new(inner: Arc<dyn SubscriptionStore>, cache_for: Duration) -> Self {
        Self {
            inner,
            cache_for,
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    // The fetch gets its own token: one waiter giving up must not fail the
    // others sharing it.
    fn start_fetch(&self, event_type: &MessageType) -> SubscriberFetch {
        let inner = self.inner.clone();
        let event_type = event_type.clone();
        async move {
            let fetch_cancel = CancellationToken::new();
            inner
                .get_subscribers(&event_type, &fetch_cancel)
                .await
                .map(Arc::new)
        }
        .boxed()
        .shared()
    }

    async fn current_fetch(&self, event_type: &MessageType) -> (u64, SubscriberFetch) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        if let Some(entry) = entries.get(event_type) {
            let age = now.saturating_duration_since(entry.stored_at);
            if age < self.cache_for {
                debug!(
                    event = events::SUBSCRIPTION_CACHE_HIT,
                    component = COMPONENT,
                    event_type = fields::format_event_type(event_type),
                    generation = entry.generation,
                    age_ms = age.as_millis() as u64,
                    "serving cached subscribers"
                );
                return (entry.generation, entry.fetch.clone());
            }
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let fetch = self.start_fetch(event_type);
        debug!(
            event = events::SUBSCRIPTION_CACHE_REFRESH,
            component = COMPONENT,
            event_type = fields::format_event_type(event_type),
            generation,
            "fetching subscribers"
        );
        entries.insert(
            event_type.clone(),
            CachedSubscribers {
                stored_at: now,
                generation,
                fetch: fetch.clone(),
            },
        );
        (generation, fetch)
    }

    async fn evict(&self, event_type: &MessageType) {
        if self.entries.lock().await.remove(event_type).is_some() {
            debug!(
                event = events::SUBSCRIPTION_CACHE_EVICT,
                component = COMPONENT,
                event_type = fields::format_event_type(event_type),
                "evicted cached subscribers"
            );
        }
    }

    // Failed fetches are not remembered, unless a newer fetch already
    // replaced the slot.
    async fn forget_failed(&self, event_type: &MessageType, generation: u64) {
        let mut entries = self.entries.lock().await;
        if entries
            .get(event_type)
            .is_some_and(|entry| entry.generation == generation)
        {
            entries.remove(event_type);
        }
    }

    #[cfg(test)]
    async fn cached_generation(&self, event_type: &MessageType) -> Option<u64> {
        self.entries
            .lock()
            .await
            .get(event_type)
            .map(|entry| entry.generation)
    }
}

#[async_trait]
impl SubscriptionStore for CachedSubscriptionStore {
    async fn subscribe(
        &self,
        endpoint_name: &str,
        endpoint_address: &QueueAddress,
        event_type: &MessageType,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let result = self
            .inner
            .subscribe(endpoint_name, endpoint_address, event_type, cancel)
            .await;
        self.evict(event_type).await;
        result
    }

    async fn unsubscribe(
        &self,
        endpoint_name: &str,
        event_type: &MessageType,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let result = self
            .inner
            .unsubscribe(endpoint_name, event_type, cancel)
            .await;
        self.evict(event_type).await;
        result
    }

    async fn get_subscribers(
        &self,
        event_type: &MessageType,
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, Error> {
        let (generation, fetch) = self.current_fetch(event_type).await;

        match cancellable(cancel, fetch).await {
            Ok(subscribers) => Ok(subscribers.as_ref().clone()),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(err) => {
                warn!(
                    event = events::SUBSCRIPTION_CACHE_FETCH_FAILED,
                    component = COMPONENT,
                    event_type = fields::format_event_type(event_type),
                    generation,
                    err = %err,
                    "subscriber fetch failed, dropping cache entry"
                );
                self.forget_failed(event_type, generation).await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CachedSubscriptionStore;
    use crate::addressing::QueueAddress;
    use crate::error::Error;
    use crate::storage::{StorageError, StorageErrorKind};
    use crate::subscriptions::SubscriptionStore;
    use crate::topic::MessageType;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// Exact-type subscriber map with a fetch counter and optional latency.
    #[derive(Default)]
    struct CountingStore {
        subscribers: Mutex<HashMap<String, HashSet<String>>>,
        fetches: AtomicUsize,
        latency: Option<Duration>,
        fail_next: Mutex<Option<StorageError>>,
    }

    impl CountingStore {
        fn with_latency(latency: Duration) -> Self {
            Self {
                latency: Some(latency),
                ..Default::default()
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SubscriptionStore for CountingStore {
        async fn subscribe(
            &self,
            _endpoint_name: &str,
            endpoint_address: &QueueAddress,
            event_type: &MessageType,
            _cancel: &CancellationToken,
        ) -> Result<(), Error> {
            self.subscribers
                .lock()
                .unwrap()
                .entry(event_type.full_name().to_string())
                .or_default()
                .insert(endpoint_address.to_string());
            Ok(())
        }

        async fn unsubscribe(
            &self,
            endpoint_name: &str,
            event_type: &MessageType,
            _cancel: &CancellationToken,
        ) -> Result<(), Error> {
            if let Some(addresses) = self.subscribers.lock().unwrap().get_mut(event_type.full_name()) {
                addresses.remove(endpoint_name);
            }
            Ok(())
        }

        async fn get_subscribers(
            &self,
            event_type: &MessageType,
            _cancel: &CancellationToken,
        ) -> Result<HashSet<String>, Error> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if let Some(error) = self.fail_next.lock().unwrap().take() {
                return Err(error.into());
            }
            Ok(self
                .subscribers
                .lock()
                .unwrap()
                .get(event_type.full_name())
                .cloned()
                .unwrap_or_default())
        }
    }

    fn order_placed() -> MessageType {
        MessageType::class("Ns.OrderPlaced").build().unwrap()
    }

    fn sales() -> QueueAddress {
        QueueAddress::parse("sales").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn reads_within_ttl_hit_the_cache() {
        let inner = Arc::new(CountingStore::default());
        let cache = CachedSubscriptionStore::new(inner.clone(), Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let event = order_placed();

        inner
            .subscribe("sales", &sales(), &event, &cancel)
            .await
            .unwrap();

        for _ in 0..3 {
            let subscribers = cache.get_subscribers(&event, &cancel).await.unwrap();
            assert!(subscribers.contains("sales"));
        }
        assert_eq!(inner.fetches(), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        cache.get_subscribers(&event, &cancel).await.unwrap();
        assert_eq!(inner.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_fetches_every_time() {
        let inner = Arc::new(CountingStore::default());
        let cache = CachedSubscriptionStore::new(inner.clone(), Duration::ZERO);
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            cache.get_subscribers(&order_placed(), &cancel).await.unwrap();
        }
        assert_eq!(inner.fetches(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_readers_share_one_fetch() {
        let inner = Arc::new(CountingStore::with_latency(Duration::from_millis(200)));
        let cache = Arc::new(CachedSubscriptionStore::new(
            inner.clone(),
            Duration::from_secs(5),
        ));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .get_subscribers(&order_placed(), &CancellationToken::new())
                        .await
                })
            })
            .collect();
        for reader in readers {
            assert!(reader.await.unwrap().unwrap().is_empty());
        }
        assert_eq!(inner.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_evict_the_exact_type() {
        let inner = Arc::new(CountingStore::default());
        let cache = CachedSubscriptionStore::new(inner.clone(), Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let event = order_placed();
        let other = MessageType::class("Ns.Other").build().unwrap();

        assert!(cache.get_subscribers(&event, &cancel).await.unwrap().is_empty());
        cache.get_subscribers(&other, &cancel).await.unwrap();

        cache.subscribe("sales", &sales(), &event, &cancel).await.unwrap();
        assert!(cache.cached_generation(&other).await.is_some());
        assert!(cache
            .get_subscribers(&event, &cancel)
            .await
            .unwrap()
            .contains("sales"));

        cache.unsubscribe("sales", &event, &cancel).await.unwrap();
        assert!(cache.get_subscribers(&event, &cancel).await.unwrap().is_empty());
        assert_eq!(inner.fetches(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_is_not_cached() {
        let inner = Arc::new(CountingStore::default());
        *inner.fail_next.lock().unwrap() =
            Some(StorageError::fail_with_kind(StorageErrorKind::Transient, "throttled"));
        let cache = CachedSubscriptionStore::new(inner.clone(), Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let event = order_placed();

        let error = cache.get_subscribers(&event, &cancel).await.unwrap_err();
        assert_eq!(error.storage_kind(), Some(StorageErrorKind::Transient));
        assert_eq!(cache.cached_generation(&event).await, None);

        assert!(cache.get_subscribers(&event, &cancel).await.is_ok());
        assert_eq!(inner.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_one_waiter_leaves_the_shared_fetch_running() {
        let inner = Arc::new(CountingStore::with_latency(Duration::from_millis(200)));
        let cache = Arc::new(CachedSubscriptionStore::new(
            inner.clone(),
            Duration::from_secs(5),
        ));

        let impatient = CancellationToken::new();
        let impatient_reader = {
            let cache = cache.clone();
            let impatient = impatient.clone();
            tokio::spawn(async move { cache.get_subscribers(&order_placed(), &impatient).await })
        };
        let patient_reader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_subscribers(&order_placed(), &CancellationToken::new())
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        impatient.cancel();

        assert_eq!(impatient_reader.await.unwrap(), Err(Error::Cancelled));
        assert!(patient_reader.await.unwrap().is_ok());
        assert_eq!(inner.fetches(), 1);
        assert!(cache.cached_generation(&order_placed()).await.is_some());
    }
}
