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

//! JSON5 transport configuration.
//!
//! ```json5
//! {
//!   default_account_alias: "main",
//!   subscription_table_name: "subscriptions",
//!   subscriptions: { cache_for_secs: 5, cache_enabled: true },
//!   delayed_delivery: { enabled: true, table_name: "delays", lease_duration_secs: 60 },
//!   accounts: [
//!     { alias: "main", connection_string: "UseDevelopmentStorage=true", endpoints: ["sales"] },
//!     {
//!       alias: "west",
//!       connection_string: "AccountName=west;AccountKey=c2VjcmV0",
//!       endpoints: ["billing"],
//!       publishers: [{ event_type: "Billing.InvoiceIssued" }],
//!     },
//!   ],
//! }
//! ```

use crate::addressing::{AccountClientFactory, AddressRouter, ConnectionString};
use crate::delayed_delivery::{DelayedDeliverySettings, MAX_LEASE_DURATION, MIN_LEASE_DURATION};
use crate::error::{ConfigurationError, Error};
use crate::subscriptions::SubscriptionSettings;
use crate::topic::MessageTypeRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    pub default_account_alias: String,
    #[serde(default = "default_subscription_table_name")]
    pub subscription_table_name: String,
    #[serde(default)]
    pub subscriptions: SubscriptionsConfig,
    #[serde(default)]
    pub delayed_delivery: DelayedDeliveryConfig,
    pub accounts: Vec<AccountConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionsConfig {
    #[serde(default = "default_cache_for_secs")]
    pub cache_for_secs: u64,
    #[serde(default = "enabled")]
    pub cache_enabled: bool,
}

impl Default for SubscriptionsConfig {
    fn default() -> Self {
        Self {
            cache_for_secs: default_cache_for_secs(),
            cache_enabled: true,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct DelayedDeliveryConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_delays_table_name")]
    pub table_name: String,
    #[serde(default = "default_lock_container")]
    pub lock_container: String,
    #[serde(default = "default_lease_duration_secs")]
    pub lease_duration_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_poll_backoff_ms")]
    pub max_poll_backoff_ms: u64,
    /// Most messages one poll dispatches before yielding.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for DelayedDeliveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            table_name: default_delays_table_name(),
            lock_container: default_lock_container(),
            lease_duration_secs: default_lease_duration_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_backoff_ms: default_max_poll_backoff_ms(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    pub alias: String,
    pub connection_string: String,
    /// Endpoints whose queues live in this account.
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub publishers: Vec<PublisherConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct PublisherConfig {
    pub event_type: String,
    /// Defaults to the transport-wide subscription table name.
    #[serde(default)]
    pub subscription_table: Option<String>,
}

fn enabled() -> bool {
    true
}

fn default_subscription_table_name() -> String {
    "subscriptions".to_string()
}

fn default_cache_for_secs() -> u64 {
    5
}

fn default_delays_table_name() -> String {
    DelayedDeliverySettings::default().table_name
}

fn default_lock_container() -> String {
    DelayedDeliverySettings::default().lock_container
}

fn default_lease_duration_secs() -> u64 {
    MAX_LEASE_DURATION.as_secs()
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_poll_backoff_ms() -> u64 {
    30_000
}

fn default_batch_size() -> usize {
    DelayedDeliverySettings::default().batch_size
}

impl TransportConfig {
    pub fn from_json5_str(contents: &str) -> Result<Self, ConfigurationError> {
        let config: Self = json5::from_str(contents)
            .map_err(|err| ConfigurationError::Unreadable(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| {
            ConfigurationError::Unreadable(format!("{}: {err}", path.display()))
        })?;
        Self::from_json5_str(&contents)
    }

    /// Checks everything that can be checked without talking to storage.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.subscription_table_name.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "subscription_table_name",
                reason: "must not be empty".to_string(),
            });
        }

        let mut aliases = HashSet::new();
        let mut endpoints = HashSet::new();
        for account in &self.accounts {
            if account.alias.trim().is_empty() {
                return Err(ConfigurationError::EmptyAlias);
            }
            if !aliases.insert(account.alias.as_str()) {
                return Err(ConfigurationError::DuplicateAlias {
                    alias: account.alias.clone(),
                });
            }
            for endpoint in &account.endpoints {
                if !endpoints.insert(endpoint.as_str()) {
                    return Err(ConfigurationError::DuplicateEndpoint {
                        endpoint: endpoint.clone(),
                    });
                }
            }
        }
        if !aliases.contains(self.default_account_alias.as_str()) {
            return Err(ConfigurationError::UnknownAccountAlias {
                alias: self.default_account_alias.clone(),
            });
        }

        if self.delayed_delivery.enabled {
            self.validate_delayed_delivery()?;
        }
        Ok(())
    }

    fn validate_delayed_delivery(&self) -> Result<(), ConfigurationError> {
        let delayed = &self.delayed_delivery;
        if delayed.table_name.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "delayed_delivery.table_name",
                reason: "must not be empty".to_string(),
            });
        }
        let lease = Duration::from_secs(delayed.lease_duration_secs);
        if !(MIN_LEASE_DURATION..=MAX_LEASE_DURATION).contains(&lease) {
            return Err(ConfigurationError::InvalidValue {
                field: "lease_duration_secs",
                reason: format!(
                    "must be between {} and {} seconds",
                    MIN_LEASE_DURATION.as_secs(),
                    MAX_LEASE_DURATION.as_secs()
                ),
            });
        }
        if delayed.poll_interval_ms == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if delayed.max_poll_backoff_ms < delayed.poll_interval_ms {
            return Err(ConfigurationError::InvalidValue {
                field: "max_poll_backoff_ms",
                reason: "must not be shorter than the poll interval".to_string(),
            });
        }
        if delayed.batch_size == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "batch_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn subscription_settings(&self) -> SubscriptionSettings {
        SubscriptionSettings {
            cache_enabled: self.subscriptions.cache_enabled,
            cache_for: Duration::from_secs(self.subscriptions.cache_for_secs),
        }
    }

    /// `None` when delayed delivery is switched off.
    pub fn delayed_delivery_settings(&self) -> Option<DelayedDeliverySettings> {
        let delayed = &self.delayed_delivery;
        delayed.enabled.then(|| DelayedDeliverySettings {
            table_name: delayed.table_name.clone(),
            lock_container: delayed.lock_container.clone(),
            lease_duration: Duration::from_secs(delayed.lease_duration_secs),
            poll_interval: Duration::from_millis(delayed.poll_interval_ms),
            max_poll_backoff: Duration::from_millis(delayed.max_poll_backoff_ms),
            batch_size: delayed.batch_size,
        })
    }

    /// Builds the account clients through `factory` and registers every
    /// account, endpoint and publisher. Publisher event types must already be
    /// in `registry`.
    pub fn build_router(
        &self,
        registry: &MessageTypeRegistry,
        factory: Arc<dyn AccountClientFactory>,
    ) -> Result<AddressRouter, Error> {
        self.validate()?;

        let mut local = None;
        let mut remote = Vec::new();
        for account in &self.accounts {
            let connection_string = ConnectionString::parse(&account.connection_string).map_err(
                |source| ConfigurationError::MalformedConnectionString {
                    alias: account.alias.clone(),
                    source,
                },
            )?;
            let client = factory.create_account(&connection_string)?;
            if account.alias == self.default_account_alias {
                local = Some(client);
            } else {
                remote.push((account.alias.as_str(), client));
            }
        }
        let local = local.ok_or_else(|| ConfigurationError::UnknownAccountAlias {
            alias: self.default_account_alias.clone(),
        })?;

        let mut router = AddressRouter::new(
            &self.default_account_alias,
            local,
            &self.subscription_table_name,
        )?;
        for (alias, client) in remote {
            router.register_account(alias, client)?;
        }
        for account in &self.accounts {
            for endpoint in &account.endpoints {
                router.register_endpoint(&account.alias, endpoint)?;
            }
            for publisher in &account.publishers {
                let event_type = registry.resolve(&publisher.event_type)?;
                router.register_publisher(
                    &event_type,
                    &account.alias,
                    publisher.subscription_table.as_deref(),
                )?;
            }
        }

        Ok(router.with_connection_string_fallback(factory))
    }
}
