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
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storage_queues::{
    ETag, StorageError, StorageErrorKind, Table, TableEntity, TableQuery, TableService,
};

type RowKey = (String, String);

#[derive(Default)]
struct TableState {
    created: bool,
    rows: BTreeMap<RowKey, TableEntity>,
}

/// A table held in a sorted map.
///
/// Behaves like the remote service where tests can observe it: operations on
/// a table that was never created fail with `NotFound`, reads return rows in
/// (partition, row) order and every write assigns a fresh etag.
#[derive(Default)]
pub struct InMemoryTable {
    name: String,
    state: Mutex<TableState>,
    next_etag: AtomicU64,
    queries: AtomicUsize,
    query_delay: Mutex<Option<Duration>>,
    fail_next: Mutex<Option<StorageError>>,
}

impl InMemoryTable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Number of `query` calls served so far, failed ones included.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Every query sleeps for `delay` on the tokio clock before reading.
    pub fn set_query_delay(&self, delay: Duration) {
        *self.query_delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }

    /// The next operation of any kind fails with `error`.
    pub fn fail_next(&self, error: StorageError) {
        *self.fail_next.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }

    pub fn rows(&self) -> Vec<TableEntity> {
        self.lock_state().rows.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock_state().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_injected_failure(&self) -> Result<(), StorageError> {
        match self.fail_next.lock().unwrap_or_else(|e| e.into_inner()).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn ensure_created(&self, state: &TableState) -> Result<(), StorageError> {
        if state.created {
            Ok(())
        } else {
            Err(StorageError::fail_with_kind(
                StorageErrorKind::NotFound,
                format!("table '{}' does not exist", self.name),
            ))
        }
    }

    fn stamp(&self, mut entity: TableEntity) -> TableEntity {
        let version = self.next_etag.fetch_add(1, Ordering::SeqCst) + 1;
        entity.etag = Some(format!("W/\"{version}\""));
        entity
    }
}

#[async_trait]
impl Table for InMemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_if_not_exists(&self) -> Result<(), StorageError> {
        self.take_injected_failure()?;
        self.lock_state().created = true;
        Ok(())
    }

    async fn insert(&self, entity: TableEntity) -> Result<(), StorageError> {
        self.take_injected_failure()?;
        let mut state = self.lock_state();
        self.ensure_created(&state)?;
        let key = (entity.partition_key.clone(), entity.row_key.clone());
        if state.rows.contains_key(&key) {
            return Err(StorageError::fail_with_kind(
                StorageErrorKind::Conflict,
                format!("entity {}/{} already exists", key.0, key.1),
            ));
        }
        let entity = self.stamp(entity);
        state.rows.insert(key, entity);
        Ok(())
    }

    async fn insert_or_replace(&self, entity: TableEntity) -> Result<(), StorageError> {
        self.take_injected_failure()?;
        let mut state = self.lock_state();
        self.ensure_created(&state)?;
        let key = (entity.partition_key.clone(), entity.row_key.clone());
        let entity = self.stamp(entity);
        state.rows.insert(key, entity);
        Ok(())
    }

    async fn delete(
        &self,
        partition_key: &str,
        row_key: &str,
        etag: ETag,
    ) -> Result<(), StorageError> {
        self.take_injected_failure()?;
        let mut state = self.lock_state();
        self.ensure_created(&state)?;
        let key = (partition_key.to_string(), row_key.to_string());
        let Some(existing) = state.rows.get(&key) else {
            return Err(StorageError::fail_with_kind(
                StorageErrorKind::NotFound,
                format!("entity {partition_key}/{row_key} does not exist"),
            ));
        };
        if let ETag::Exact(expected) = &etag {
            if existing.etag.as_ref() != Some(expected) {
                return Err(StorageError::fail_with_kind(
                    StorageErrorKind::PreconditionFailed,
                    format!("entity {partition_key}/{row_key} changed since it was read"),
                ));
            }
        }
        state.rows.remove(&key);
        Ok(())
    }

    async fn query(&self, query: &TableQuery) -> Result<Vec<TableEntity>, StorageError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let delay = *self.query_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.take_injected_failure()?;

        let state = self.lock_state();
        self.ensure_created(&state)?;
        let rows = state.rows.values();
        Ok(match query {
            TableQuery::Partition(partition_key) => rows
                .filter(|entity| &entity.partition_key == partition_key)
                .cloned()
                .collect(),
            TableQuery::PartitionsUpTo(bound) => rows
                .filter(|entity| entity.partition_key <= *bound)
                .cloned()
                .collect(),
        })
    }
}

/// Tables of one account, created lazily by name and shared by every handle.
#[derive(Default)]
pub struct InMemoryTableService {
    tables: Mutex<HashMap<String, Arc<InMemoryTable>>>,
}

impl InMemoryTableService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete handle for inspection and fault injection.
    pub fn in_memory_table(&self, table_name: &str) -> Arc<InMemoryTable> {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(table_name.to_string())
            .or_insert_with(|| Arc::new(InMemoryTable::new(table_name)))
            .clone()
    }
}

impl TableService for InMemoryTableService {
    fn table(&self, table_name: &str) -> Arc<dyn Table> {
        self.in_memory_table(table_name)
    }
}
