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

//! In-memory storage account for `storage-queues`.
//!
//! Queues record what was sent, tables keep rows in a sorted map and leases
//! expire on the tokio clock. Tables and queues accept injected failures so
//! error paths can be tested without a network.

mod account;
mod lease;
mod queue;
mod static_subscriptions;
mod table;

pub use account::{InMemoryAccountFactory, InMemoryStorage};
pub use lease::InMemoryLeaseService;
pub use queue::InMemoryQueueService;
pub use static_subscriptions::{seed_subscriptions, seed_subscriptions_from_file};
pub use table::{InMemoryTable, InMemoryTableService};
