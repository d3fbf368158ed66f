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

//! # storage-queues
//!
//! Subscription registry, lease-based locking and multi-account addressing
//! for a message transport built on storage queues and tables.
//!
//! The crate talks to storage only through the capability traits in
//! [`storage`]; `in-memory-storage` provides an implementation for tests and
//! local runs.
//!
//! ## Publish/subscribe
//!
//! Subscriptions are recorded per topic. Looking up the subscribers of an
//! event type unions the subscribers of every type in its hierarchy.
//!
//! ```
//! use std::sync::Arc;
//! use in_memory_storage::InMemoryStorage;
//! use storage_queues::{
//!     build_subscription_store, AddressRouter, MessageType, QueueAddress, SubscriptionSettings,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let local = InMemoryStorage::new("devstoreaccount1");
//! let router = Arc::new(AddressRouter::new("main", local.account(), "subscriptions").unwrap());
//! let cancel = CancellationToken::new();
//! let store = build_subscription_store(router, &SubscriptionSettings::default(), &cancel)
//!     .await
//!     .unwrap();
//!
//! let order_event = MessageType::interface("Sales.IOrderEvent").build().unwrap();
//! let order_placed = MessageType::class("Sales.OrderPlaced")
//!     .implements(&order_event)
//!     .build()
//!     .unwrap();
//! let address = QueueAddress::parse("orderservice").unwrap();
//!
//! store
//!     .subscribe("OrderService", &address, &order_event, &cancel)
//!     .await
//!     .unwrap();
//! let subscribers = store.get_subscribers(&order_placed, &cancel).await.unwrap();
//! assert!(subscribers.contains("orderservice"));
//! # });
//! ```
//!
//! ## Delayed delivery
//!
//! [`DelayedDelivery`] parks messages in a table; one [`DelayedMessagePoller`]
//! per deployment, elected through a [`LockManager`] lease, sends them once
//! they are due.

pub mod addressing;
pub mod config;
pub mod delayed_delivery;
pub mod error;
pub mod headers;
pub mod observability;
mod runtime;
pub mod storage;
pub mod subscriptions;
pub mod topic;

pub use addressing::{
    AccountClientFactory, AddressRouter, ConnectionString, MessageIntent, QueueAddress,
    REPLY_TO_ADDRESS_HEADER,
};
pub use config::TransportConfig;
pub use delayed_delivery::{
    DelayedDelivery, DelayedDeliverySettings, DelayedMessage, DelayedMessagePoller, LockManager,
    PollOutcome,
};
pub use error::{ConfigurationError, Error, Result};
pub use storage::{
    ETag, LeaseService, OutgoingMessage, QueueService, StorageAccount, StorageError,
    StorageErrorKind, Table, TableEntity, TableQuery, TableService,
};
pub use subscriptions::{
    build_subscription_store, CachedSubscriptionStore, SubscriptionSettings, SubscriptionStore,
    TableSubscriptionStore,
};
pub use topic::{MessageType, MessageTypeRegistry, TypeKind};
