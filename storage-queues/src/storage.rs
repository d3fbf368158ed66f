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

//! Storage capabilities consumed by the core: a durable queue, a keyed table
//! and a leasable named resource.
//!
//! The wire protocol behind these traits is not modelled here. Implementations
//! must make single-entity operations atomic and must report failures with a
//! [`StorageErrorKind`] so callers can tell transient failures from permanent
//! ones.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StorageErrorKind {
    /// Network failure, throttling or timeout. Safe to retry.
    Transient,
    /// Entity already exists, or a lease is held by someone else.
    Conflict,
    NotFound,
    /// Optimistic concurrency check (etag) failed.
    PreconditionFailed,
    Other,
}

impl Display for StorageErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StorageErrorKind::Transient => "transient",
            StorageErrorKind::Conflict => "conflict",
            StorageErrorKind::NotFound => "not_found",
            StorageErrorKind::PreconditionFailed => "precondition_failed",
            StorageErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct StorageError {
    kind: StorageErrorKind,
    message: String,
}

impl StorageError {
    pub fn fail_with_kind(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_transient(&self) -> bool {
        self.kind == StorageErrorKind::Transient
    }
}

/// A message handed to a queue. Envelope serialization belongs to the queue
/// implementation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OutgoingMessage {
    pub message_id: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

#[async_trait]
pub trait QueueService: Send + Sync {
    /// Name of the storage account this client talks to.
    fn account_name(&self) -> &str;

    async fn send(&self, queue_name: &str, message: OutgoingMessage) -> Result<(), StorageError>;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EntityProperty {
    String(String),
    Binary(Bytes),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableEntity {
    pub partition_key: String,
    pub row_key: String,
    /// Set by the table on read; ignored on write.
    pub etag: Option<String>,
    pub properties: BTreeMap<String, EntityProperty>,
}

impl TableEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            etag: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_string(mut self, name: &str, value: impl Into<String>) -> Self {
        self.properties
            .insert(name.to_string(), EntityProperty::String(value.into()));
        self
    }

    pub fn with_binary(mut self, name: &str, value: Bytes) -> Self {
        self.properties
            .insert(name.to_string(), EntityProperty::Binary(value));
        self
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.properties.get(name) {
            Some(EntityProperty::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn binary(&self, name: &str) -> Option<&Bytes> {
        match self.properties.get(name) {
            Some(EntityProperty::Binary(value)) => Some(value),
            _ => None,
        }
    }
}

/// Concurrency token for conditional writes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ETag {
    /// Match any version (last write wins).
    Any,
    Exact(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TableQuery {
    /// Every row of one partition.
    Partition(String),
    /// Every row whose partition key sorts at or before the bound, in
    /// (partition, row) order.
    PartitionsUpTo(String),
}

#[async_trait]
pub trait Table: Send + Sync {
    fn name(&self) -> &str;

    async fn create_if_not_exists(&self) -> Result<(), StorageError>;

    /// Inserts a new row; fails with [`StorageErrorKind::Conflict`] if it exists.
    async fn insert(&self, entity: TableEntity) -> Result<(), StorageError>;

    async fn insert_or_replace(&self, entity: TableEntity) -> Result<(), StorageError>;

    /// Fails with [`StorageErrorKind::NotFound`] when the row is missing and
    /// [`StorageErrorKind::PreconditionFailed`] on etag mismatch.
    async fn delete(
        &self,
        partition_key: &str,
        row_key: &str,
        etag: ETag,
    ) -> Result<(), StorageError>;

    async fn query(&self, query: &TableQuery) -> Result<Vec<TableEntity>, StorageError>;
}

pub trait TableService: Send + Sync {
    fn table(&self, table_name: &str) -> Arc<dyn Table>;
}

/// Exclusive, time-bounded leases over named resources.
#[async_trait]
pub trait LeaseService: Send + Sync {
    async fn create_resource_if_not_exists(&self, resource: &str) -> Result<(), StorageError>;

    /// Returns the lease id on success and [`StorageErrorKind::Conflict`] when
    /// another party holds an active lease.
    async fn acquire(
        &self,
        resource: &str,
        duration: Duration,
        proposed_lease_id: &str,
    ) -> Result<String, StorageError>;

    /// Fails with [`StorageErrorKind::Conflict`] when the lease was lost.
    async fn renew(&self, resource: &str, lease_id: &str) -> Result<(), StorageError>;

    async fn release(&self, resource: &str, lease_id: &str) -> Result<(), StorageError>;
}

/// Queue and table clients of one storage account.
#[derive(Clone)]
pub struct StorageAccount {
    queue_service: Arc<dyn QueueService>,
    table_service: Arc<dyn TableService>,
}

impl StorageAccount {
    pub fn new(queue_service: Arc<dyn QueueService>, table_service: Arc<dyn TableService>) -> Self {
        Self {
            queue_service,
            table_service,
        }
    }

    pub fn queue_service(&self) -> &Arc<dyn QueueService> {
        &self.queue_service
    }

    pub fn table_service(&self) -> &Arc<dyn TableService> {
        &self.table_service
    }

    pub fn account_name(&self) -> &str {
        self.queue_service.account_name()
    }

    /// Identity comparison on the underlying clients.
    pub fn same_clients(&self, other: &StorageAccount) -> bool {
        Arc::ptr_eq(&self.queue_service, &other.queue_service)
            && Arc::ptr_eq(&self.table_service, &other.table_service)
    }
}

impl Debug for StorageAccount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAccount")
            .field("account_name", &self.account_name())
            .finish_non_exhaustive()
    }
}
