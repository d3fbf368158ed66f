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

use crate::OrderEventTypes;
use in_memory_storage::{InMemoryAccountFactory, InMemoryStorage};
use std::sync::Arc;
use storage_queues::{AddressRouter, TransportConfig};

pub const MAIN_ALIAS: &str = "main";
pub const WEST_ALIAS: &str = "west";

/// Local account `main` (development storage, hosts `sales`) and account
/// `west` (hosts `billing`, owns subscriptions to `Sales.OrderPlaced` in its
/// `westsubscriptions` table).
pub fn two_account_config() -> TransportConfig {
    TransportConfig::from_json5_str(
        r#"{
            default_account_alias: "main",
            subscriptions: { cache_for_secs: 5 },
            delayed_delivery: { lease_duration_secs: 15, poll_interval_ms: 100, max_poll_backoff_ms: 800 },
            accounts: [
                { alias: "main", connection_string: "UseDevelopmentStorage=true", endpoints: ["sales"] },
                {
                    alias: "west",
                    connection_string: "AccountName=westacct;AccountKey=c2VjcmV0",
                    endpoints: ["billing"],
                    publishers: [{ event_type: "Sales.OrderPlaced", subscription_table: "westsubscriptions" }],
                },
            ],
        }"#,
    )
    .unwrap()
}

/// Router and backing storage for [`two_account_config`].
pub struct TwoAccounts {
    pub config: TransportConfig,
    pub factory: Arc<InMemoryAccountFactory>,
    pub main: InMemoryStorage,
    pub west: InMemoryStorage,
    pub router: Arc<AddressRouter>,
}

impl TwoAccounts {
    pub fn new(event_types: &OrderEventTypes) -> Self {
        let config = two_account_config();
        let factory = Arc::new(InMemoryAccountFactory::new());
        let router = config
            .build_router(&event_types.registry(), factory.clone())
            .unwrap();
        Self {
            main: factory.storage("devstoreaccount1"),
            west: factory.storage("westacct"),
            config,
            factory,
            router: Arc::new(router),
        }
    }
}
