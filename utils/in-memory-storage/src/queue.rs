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
use std::sync::Mutex;
use storage_queues::{OutgoingMessage, QueueService, StorageError};
use tracing::debug;

/// Records every message instead of delivering it.
pub struct InMemoryQueueService {
    account_name: String,
    sent: Mutex<Vec<(String, OutgoingMessage)>>,
    fail_next: Mutex<Option<StorageError>>,
}

impl InMemoryQueueService {
    pub fn new(account_name: &str) -> Self {
        Self {
            account_name: account_name.to_string(),
            sent: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
        }
    }

    /// Every `(queue, message)` pair sent so far, oldest first.
    pub fn sent(&self) -> Vec<(String, OutgoingMessage)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn messages(&self, queue_name: &str) -> Vec<OutgoingMessage> {
        self.sent()
            .into_iter()
            .filter(|(queue, _)| queue == queue_name)
            .map(|(_, message)| message)
            .collect()
    }

    /// The next `send` fails with `error` and records nothing.
    pub fn fail_next_send(&self, error: StorageError) {
        *self.fail_next.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    fn account_name(&self) -> &str {
        &self.account_name
    }

    async fn send(&self, queue_name: &str, message: OutgoingMessage) -> Result<(), StorageError> {
        if let Some(error) = self
            .fail_next
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            return Err(error);
        }
        debug!(
            account = self.account_name.as_str(),
            queue = queue_name,
            message_id = message.message_id.as_str(),
            "in-memory send"
        );
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((queue_name.to_string(), message));
        Ok(())
    }
}
