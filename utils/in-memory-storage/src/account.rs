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

use crate::{InMemoryLeaseService, InMemoryQueueService, InMemoryTableService};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use storage_queues::{AccountClientFactory, ConnectionString, StorageAccount, StorageError};

/// Queue, table and lease services of one simulated storage account.
#[derive(Clone)]
pub struct InMemoryStorage {
    queues: Arc<InMemoryQueueService>,
    tables: Arc<InMemoryTableService>,
    leases: Arc<InMemoryLeaseService>,
}

impl InMemoryStorage {
    pub fn new(account_name: &str) -> Self {
        Self {
            queues: Arc::new(InMemoryQueueService::new(account_name)),
            tables: Arc::new(InMemoryTableService::new()),
            leases: Arc::new(InMemoryLeaseService::new()),
        }
    }

    /// Account handle sharing this storage's clients.
    pub fn account(&self) -> StorageAccount {
        StorageAccount::new(self.queues.clone(), self.tables.clone())
    }

    pub fn queues(&self) -> &Arc<InMemoryQueueService> {
        &self.queues
    }

    pub fn tables(&self) -> &Arc<InMemoryTableService> {
        &self.tables
    }

    pub fn leases(&self) -> &Arc<InMemoryLeaseService> {
        &self.leases
    }
}

/// Hands out in-memory accounts keyed by the account name in the connection
/// string. Two connection strings naming the same account reach the same
/// storage.
#[derive(Default)]
pub struct InMemoryAccountFactory {
    accounts: Mutex<HashMap<String, InMemoryStorage>>,
    created: AtomicUsize,
}

impl InMemoryAccountFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage of `account_name`, created on first use.
    pub fn storage(&self, account_name: &str) -> InMemoryStorage {
        self.accounts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(account_name.to_string())
            .or_insert_with(|| InMemoryStorage::new(account_name))
            .clone()
    }

    /// How many times `create_account` was called.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl AccountClientFactory for InMemoryAccountFactory {
    fn create_account(
        &self,
        connection_string: &ConnectionString,
    ) -> Result<StorageAccount, StorageError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let account_name = connection_string.account_name().unwrap_or("unknown");
        Ok(self.storage(account_name).account())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryAccountFactory;
    use storage_queues::{AccountClientFactory, ConnectionString};

    #[test]
    fn same_account_name_shares_storage() {
        let factory = InMemoryAccountFactory::new();
        let first = ConnectionString::parse("AccountName=west;AccountKey=a2V5").unwrap();
        let second = ConnectionString::parse("accountname=west;accountkey=b3RoZXI=").unwrap();

        let a = factory.create_account(&first).unwrap();
        let b = factory.create_account(&second).unwrap();

        assert_eq!(a.account_name(), "west");
        assert!(a.same_clients(&b));
        assert_eq!(factory.created(), 2);
    }
}
