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

//! Seeds a subscription table from a static JSON file.
//!
//! The file maps each topic to the endpoints subscribed to it:
//!
//! ```json
//! {
//!   "Sales.OrderPlaced": { "OrderService": "orderservice" },
//!   "Sales.IOrderEvent": { "Audit": "audit@west" }
//! }
//! ```

use serde_json::Value;
use std::fs::{self, canonicalize};
use std::path::Path;
use storage_queues::subscriptions::ADDRESS_PROPERTY;
use storage_queues::{StorageError, StorageErrorKind, Table, TableEntity};
use tracing::{debug, warn};

fn invalid(message: String) -> StorageError {
    StorageError::fail_with_kind(StorageErrorKind::Other, message)
}

/// Loads `path` into `table`. Returns the number of subscriptions written.
pub async fn seed_subscriptions_from_file(
    table: &dyn Table,
    path: impl AsRef<Path>,
) -> Result<usize, StorageError> {
    let path = canonicalize(path.as_ref())
        .map_err(|e| invalid(format!("static subscription file not found: {e}")))?;
    debug!("seeding subscriptions from {path:?}");
    let data = fs::read_to_string(&path)
        .map_err(|e| invalid(format!("unable to read {}: {e}", path.display())))?;
    seed_subscriptions(table, &data).await
}

/// Loads JSON `contents` into `table`. Entries whose address is not a string
/// are skipped with a warning.
pub async fn seed_subscriptions(table: &dyn Table, contents: &str) -> Result<usize, StorageError> {
    let parsed: Value = serde_json::from_str(contents)
        .map_err(|e| invalid(format!("unable to parse JSON: {e}")))?;
    let Some(topics) = parsed.as_object() else {
        return Err(invalid("expected an object keyed by topic".to_string()));
    };

    table.create_if_not_exists().await?;
    let mut written = 0;
    for (topic, subscribers) in topics {
        let Some(subscribers) = subscribers.as_object() else {
            warn!("subscribers of '{topic}' are not an object, skipping");
            continue;
        };
        for (endpoint, address) in subscribers {
            let Some(address) = address.as_str() else {
                warn!("address of '{endpoint}' for '{topic}' is not a string, skipping");
                continue;
            };
            table
                .insert_or_replace(
                    TableEntity::new(topic.as_str(), endpoint.as_str())
                        .with_string(ADDRESS_PROPERTY, address),
                )
                .await?;
            written += 1;
        }
    }
    debug!("seeded {written} subscriptions into '{}'", table.name());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::{seed_subscriptions, seed_subscriptions_from_file};
    use crate::InMemoryTable;
    use storage_queues::StorageErrorKind;

    #[tokio::test]
    async fn seeds_the_bundled_file() {
        let table = InMemoryTable::new("subscriptions");
        let written = seed_subscriptions_from_file(&table, "static-configs/subscriptions.json")
            .await
            .unwrap();

        assert_eq!(written, 3);
        let rows = table.rows();
        assert!(rows.iter().any(|row| row.partition_key == "Sales.OrderPlaced"
            && row.row_key == "OrderService"
            && row.string("Address") == Some("orderservice")));
    }

    #[tokio::test]
    async fn skips_non_string_addresses() {
        let table = InMemoryTable::new("subscriptions");
        let written = seed_subscriptions(&table, r#"{ "T": { "A": "a", "B": 7 }, "U": [] }"#)
            .await
            .unwrap();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn rejects_non_object_documents() {
        let table = InMemoryTable::new("subscriptions");
        let error = seed_subscriptions(&table, "[]").await.unwrap_err();
        assert_eq!(error.kind(), StorageErrorKind::Other);
    }
}
