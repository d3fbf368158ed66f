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

//! Alias-to-account routing table.

use crate::addressing::{ConnectionString, QueueAddress};
use crate::error::{ConfigurationError, Error};
use crate::observability::{events, fields};
use crate::storage::{QueueService, StorageAccount, StorageError, Table};
use crate::topic::MessageType;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "address_router";

/// Header carrying the address replies should be sent to.
pub const REPLY_TO_ADDRESS_HEADER: &str = "ReplyToAddress";

/// Why a message is being routed. Only [`MessageIntent::Reply`] may fall back
/// to a legacy connection string embedded in the address.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MessageIntent {
    Send,
    Publish,
    Subscribe,
    Unsubscribe,
    Reply,
}

/// Builds ad-hoc account clients from legacy connection strings.
pub trait AccountClientFactory: Send + Sync {
    fn create_account(
        &self,
        connection_string: &ConnectionString,
    ) -> Result<StorageAccount, StorageError>;
}

#[derive(Clone, Debug)]
struct PublisherRegistration {
    alias: String,
    subscription_table: String,
}

/// Resolves logical addresses to storage accounts.
///
/// Registrations happen while the endpoint is being configured; afterwards the
/// router is shared read-only behind an `Arc`.
pub struct AddressRouter {
    local_alias: String,
    subscription_table_name: String,
    accounts: HashMap<String, StorageAccount>,
    // Queue name -> alias of the account hosting that endpoint.
    endpoints: HashMap<String, String>,
    publishers: HashMap<MessageType, PublisherRegistration>,
    connection_string_factory: Option<Arc<dyn AccountClientFactory>>,
}

impl AddressRouter {
    pub fn new(
        local_alias: &str,
        local_account: StorageAccount,
        subscription_table_name: &str,
    ) -> Result<Self, ConfigurationError> {
        if local_alias.trim().is_empty() {
            return Err(ConfigurationError::EmptyAlias);
        }
        if subscription_table_name.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "subscription_table_name",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(Self {
            local_alias: local_alias.to_string(),
            subscription_table_name: subscription_table_name.to_string(),
            accounts: HashMap::from([(local_alias.to_string(), local_account)]),
            endpoints: HashMap::new(),
            publishers: HashMap::new(),
            connection_string_factory: None,
        })
    }

    /// Enables resolution of reply addresses whose alias is a legacy
    /// connection string.
    pub fn with_connection_string_fallback(
        mut self,
        factory: Arc<dyn AccountClientFactory>,
    ) -> Self {
        self.connection_string_factory = Some(factory);
        self
    }

    pub fn local_alias(&self) -> &str {
        &self.local_alias
    }

    pub fn local_account(&self) -> &StorageAccount {
        // The local alias is inserted in `new` and accounts are never removed.
        &self.accounts[&self.local_alias]
    }

    pub fn account(&self, alias: &str) -> Option<&StorageAccount> {
        self.accounts.get(alias)
    }

    pub fn subscription_table_name(&self) -> &str {
        &self.subscription_table_name
    }

    /// Adds an account under `alias`. The first registration of an alias wins
    /// and is returned on every later call.
    pub fn register_account(
        &mut self,
        alias: &str,
        account: StorageAccount,
    ) -> Result<StorageAccount, ConfigurationError> {
        if alias.trim().is_empty() {
            return Err(ConfigurationError::EmptyAlias);
        }
        if let Some(existing) = self.accounts.get(alias) {
            debug!(
                event = events::ACCOUNT_ALREADY_REGISTERED,
                component = COMPONENT,
                alias,
                account = existing.account_name(),
                "alias already registered, keeping first registration"
            );
            return Ok(existing.clone());
        }

        info!(
            event = events::ACCOUNT_REGISTERED,
            component = COMPONENT,
            alias,
            account = account.account_name(),
            "registered storage account"
        );
        self.accounts.insert(alias.to_string(), account.clone());
        Ok(account)
    }

    /// Records that `endpoint_name` lives in the account registered as `alias`.
    pub fn register_endpoint(
        &mut self,
        alias: &str,
        endpoint_name: &str,
    ) -> Result<(), ConfigurationError> {
        self.ensure_registered(alias)?;
        if self.endpoints.contains_key(endpoint_name) {
            return Err(ConfigurationError::DuplicateEndpoint {
                endpoint: endpoint_name.to_string(),
            });
        }
        self.endpoints
            .insert(endpoint_name.to_string(), alias.to_string());
        Ok(())
    }

    /// Routes subscriptions for exactly `event_type` into the subscription
    /// table of the publisher's account.
    pub fn register_publisher(
        &mut self,
        event_type: &MessageType,
        alias: &str,
        subscription_table: Option<&str>,
    ) -> Result<(), ConfigurationError> {
        self.ensure_registered(alias)?;
        if self.publishers.contains_key(event_type) {
            return Err(ConfigurationError::InvalidValue {
                field: "publishers",
                reason: format!("publisher of '{event_type}' is registered more than once"),
            });
        }
        let subscription_table = subscription_table
            .filter(|table| !table.trim().is_empty())
            .unwrap_or(self.subscription_table_name.as_str())
            .to_string();
        self.publishers.insert(
            event_type.clone(),
            PublisherRegistration {
                alias: alias.to_string(),
                subscription_table,
            },
        );
        Ok(())
    }

    fn ensure_registered(&self, alias: &str) -> Result<(), ConfigurationError> {
        if self.accounts.contains_key(alias) {
            Ok(())
        } else {
            Err(ConfigurationError::UnknownAccountAlias {
                alias: alias.to_string(),
            })
        }
    }

    /// Address of a logical endpoint, carrying the alias of the account it
    /// was registered under.
    pub fn address_of_endpoint(&self, endpoint_name: &str) -> Result<QueueAddress, Error> {
        let alias = self
            .endpoints
            .get(endpoint_name)
            .filter(|alias| **alias != self.local_alias);
        QueueAddress::new(endpoint_name, alias.map(String::as_str))
    }

    pub fn resolve_account(
        &self,
        address: &QueueAddress,
        intent: MessageIntent,
    ) -> Result<StorageAccount, Error> {
        if let Some(endpoint_alias) = self.endpoints.get(address.queue_name()) {
            if address.alias().map_or(true, |alias| alias == endpoint_alias) {
                if let Some(account) = self.accounts.get(endpoint_alias) {
                    self.log_resolved(address, intent, endpoint_alias);
                    return Ok(account.clone());
                }
            }
        }

        let alias = address.alias().unwrap_or(&self.local_alias);
        if let Some(account) = self.accounts.get(alias) {
            self.log_resolved(address, intent, alias);
            return Ok(account.clone());
        }

        if intent == MessageIntent::Reply {
            if let Some(account) = self.resolve_legacy_connection_string(alias)? {
                return Ok(account);
            }
        }

        warn!(
            event = events::ADDRESS_RESOLVE_FAILED,
            component = COMPONENT,
            address = %fields::format_address(address),
            alias = fields::format_optional_alias(address.alias()),
            intent = ?intent,
            "no account registered for alias"
        );
        Err(ConfigurationError::UnknownAccountAlias {
            alias: alias.to_string(),
        }
        .into())
    }

    /// Queue client for `address`.
    pub fn resolve(
        &self,
        address: &QueueAddress,
        intent: MessageIntent,
    ) -> Result<Arc<dyn QueueService>, Error> {
        self.resolve_account(address, intent)
            .map(|account| account.queue_service().clone())
    }

    // Ad-hoc clients are built per call and never cached.
    fn resolve_legacy_connection_string(
        &self,
        alias: &str,
    ) -> Result<Option<StorageAccount>, Error> {
        let Some(factory) = &self.connection_string_factory else {
            return Ok(None);
        };
        let Ok(connection_string) = ConnectionString::parse(alias) else {
            return Ok(None);
        };

        let account = factory.create_account(&connection_string)?;
        warn!(
            event = events::LEGACY_CONNECTION_STRING_FALLBACK,
            component = COMPONENT,
            account = account.account_name(),
            "resolved reply address through an embedded connection string; register an alias for this account"
        );
        Ok(Some(account))
    }

    fn log_resolved(&self, address: &QueueAddress, intent: MessageIntent, alias: &str) {
        debug!(
            event = events::ADDRESS_RESOLVED,
            component = COMPONENT,
            address = %fields::format_address(address),
            intent = ?intent,
            alias,
            "resolved address"
        );
    }

    /// Makes the local alias explicit on the reply-to header when the message
    /// leaves for an aliased destination, so replies find their way back once
    /// a deployment spans several accounts. Returns whether the header changed.
    pub fn rewrite_reply_to_for_outgoing(
        &self,
        headers: &mut HashMap<String, String>,
        destination: &QueueAddress,
    ) -> Result<bool, Error> {
        if !destination.has_alias() {
            return Ok(false);
        }
        let Some(reply_to) = headers.get(REPLY_TO_ADDRESS_HEADER) else {
            return Ok(false);
        };
        let reply_to = QueueAddress::parse(reply_to)?;
        if reply_to.has_alias() {
            return Ok(false);
        }

        let rewritten = reply_to.with_alias(&self.local_alias).to_string();
        debug!(
            event = events::REPLY_TO_REWRITTEN,
            component = COMPONENT,
            address = %fields::format_address(destination),
            reply_to = rewritten.as_str(),
            "attached local alias to reply-to address"
        );
        headers.insert(REPLY_TO_ADDRESS_HEADER.to_string(), rewritten);
        Ok(true)
    }

    /// Alias and table that hold subscriptions for exactly `event_type`.
    pub fn subscription_table_for(&self, event_type: &MessageType) -> (String, Arc<dyn Table>) {
        if let Some(registration) = self.publishers.get(event_type) {
            if let Some(account) = self.accounts.get(&registration.alias) {
                return (
                    registration.alias.clone(),
                    account
                        .table_service()
                        .table(&registration.subscription_table),
                );
            }
        }
        (self.local_alias.clone(), self.local_subscription_table())
    }

    pub fn local_subscription_table(&self) -> Arc<dyn Table> {
        self.local_account()
            .table_service()
            .table(&self.subscription_table_name)
    }
}

impl Debug for AddressRouter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut aliases: Vec<&String> = self.accounts.keys().collect();
        aliases.sort();
        f.debug_struct("AddressRouter")
            .field("local_alias", &self.local_alias)
            .field("aliases", &aliases)
            .field("endpoints", &self.endpoints.len())
            .field("publishers", &self.publishers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{AccountClientFactory, AddressRouter, MessageIntent, REPLY_TO_ADDRESS_HEADER};
    use crate::addressing::{ConnectionString, QueueAddress};
    use crate::error::{ConfigurationError, Error};
    use crate::storage::{
        ETag, OutgoingMessage, QueueService, StorageAccount, StorageError, StorageErrorKind,
        Table, TableEntity, TableQuery, TableService,
    };
    use crate::topic::MessageType;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NamedQueues(String);

    #[async_trait]
    impl QueueService for NamedQueues {
        fn account_name(&self) -> &str {
            &self.0
        }

        async fn send(&self, _queue_name: &str, _message: OutgoingMessage) -> Result<(), StorageError> {
            Ok(())
        }
    }

    struct NamedTable(String);

    #[async_trait]
    impl Table for NamedTable {
        fn name(&self) -> &str {
            &self.0
        }

        async fn create_if_not_exists(&self) -> Result<(), StorageError> {
            Ok(())
        }

        async fn insert(&self, _entity: TableEntity) -> Result<(), StorageError> {
            Ok(())
        }

        async fn insert_or_replace(&self, _entity: TableEntity) -> Result<(), StorageError> {
            Ok(())
        }

        async fn delete(&self, _pk: &str, _rk: &str, _etag: ETag) -> Result<(), StorageError> {
            Ok(())
        }

        async fn query(&self, _query: &TableQuery) -> Result<Vec<TableEntity>, StorageError> {
            Ok(Vec::new())
        }
    }

    struct NamedTables(String);

    impl TableService for NamedTables {
        fn table(&self, table_name: &str) -> Arc<dyn Table> {
            Arc::new(NamedTable(format!("{}/{table_name}", self.0)))
        }
    }

    fn account(name: &str) -> StorageAccount {
        StorageAccount::new(
            Arc::new(NamedQueues(name.to_string())),
            Arc::new(NamedTables(name.to_string())),
        )
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
    }

    impl AccountClientFactory for CountingFactory {
        fn create_account(
            &self,
            connection_string: &ConnectionString,
        ) -> Result<StorageAccount, StorageError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            connection_string
                .account_name()
                .map(account)
                .ok_or_else(|| StorageError::fail_with_kind(StorageErrorKind::Other, "no name"))
        }
    }

    fn router() -> AddressRouter {
        let mut router = AddressRouter::new("main", account("main-account"), "subscriptions")
            .unwrap();
        router.register_account("west", account("west-account")).unwrap();
        router
    }

    fn addr(text: &str) -> QueueAddress {
        QueueAddress::parse(text).unwrap()
    }

    #[test]
    fn unaliased_address_resolves_to_local_account() {
        let router = router();
        let queue = router.resolve(&addr("orders"), MessageIntent::Send).unwrap();
        assert_eq!(queue.account_name(), "main-account");
    }

    #[test]
    fn aliased_address_resolves_through_alias_map() {
        let router = router();
        let queue = router.resolve(&addr("orders@west"), MessageIntent::Send).unwrap();
        assert_eq!(queue.account_name(), "west-account");
    }

    #[test]
    fn registered_endpoint_wins_over_local_default() {
        let mut router = router();
        router.register_endpoint("west", "billing").unwrap();

        let plain = router.resolve(&addr("billing"), MessageIntent::Send).unwrap();
        assert_eq!(plain.account_name(), "west-account");

        let aliased = router.resolve(&addr("billing@west"), MessageIntent::Send).unwrap();
        assert_eq!(aliased.account_name(), "west-account");

        let explicit_other = router.resolve(&addr("billing@main"), MessageIntent::Send).unwrap();
        assert_eq!(explicit_other.account_name(), "main-account");

        assert_eq!(router.address_of_endpoint("billing").unwrap(), addr("billing@west"));
        assert_eq!(router.address_of_endpoint("sales").unwrap(), addr("sales"));
    }

    #[test]
    fn register_account_keeps_first_registration() {
        let mut router = router();
        let original = router.account("west").unwrap().clone();

        let returned = router.register_account("west", account("impostor")).unwrap();
        assert!(returned.same_clients(&original));
        assert_eq!(router.account("west").unwrap().account_name(), "west-account");

        assert_eq!(
            router.register_account("", account("x")).unwrap_err(),
            ConfigurationError::EmptyAlias
        );
    }

    #[test]
    fn unknown_alias_names_the_alias() {
        let router = router();
        let error = router
            .resolve(&addr("orders@east"), MessageIntent::Send)
            .err()
            .unwrap();
        assert_eq!(
            error,
            Error::Configuration(ConfigurationError::UnknownAccountAlias {
                alias: "east".to_string()
            })
        );
        assert!(error.to_string().contains("'east'"));
    }

    #[test]
    fn reply_with_connection_string_alias_uses_fallback_without_caching() {
        let factory = Arc::new(CountingFactory::default());
        let router = router().with_connection_string_fallback(factory.clone());
        let legacy = addr("replies@AccountName=legacy;AccountKey=a2V5");

        for _ in 0..2 {
            let queue = router.resolve(&legacy, MessageIntent::Reply).unwrap();
            assert_eq!(queue.account_name(), "legacy");
        }
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert!(router.account("AccountName=legacy;AccountKey=a2V5").is_none());
    }

    #[test]
    fn connection_string_fallback_is_reply_only() {
        let router = router().with_connection_string_fallback(Arc::new(CountingFactory::default()));
        let legacy = addr("replies@AccountName=legacy;AccountKey=a2V5");

        let error = router.resolve(&legacy, MessageIntent::Send).err().unwrap();
        assert!(matches!(
            error,
            Error::Configuration(ConfigurationError::UnknownAccountAlias { .. })
        ));

        let not_a_connection_string = router
            .resolve(&addr("replies@east"), MessageIntent::Reply)
            .err()
            .unwrap();
        assert!(matches!(
            not_a_connection_string,
            Error::Configuration(ConfigurationError::UnknownAccountAlias { .. })
        ));
    }

    #[test]
    fn reply_to_gets_local_alias_only_for_aliased_destinations() {
        let router = router();
        let mut headers = HashMap::from([(
            REPLY_TO_ADDRESS_HEADER.to_string(),
            "sales".to_string(),
        )]);

        assert!(!router
            .rewrite_reply_to_for_outgoing(&mut headers, &addr("orders"))
            .unwrap());
        assert_eq!(headers[REPLY_TO_ADDRESS_HEADER], "sales");

        assert!(router
            .rewrite_reply_to_for_outgoing(&mut headers, &addr("orders@west"))
            .unwrap());
        assert_eq!(headers[REPLY_TO_ADDRESS_HEADER], "sales@main");

        // Already aliased reply-to is left alone.
        assert!(!router
            .rewrite_reply_to_for_outgoing(&mut headers, &addr("orders@west"))
            .unwrap());

        let mut no_reply_to = HashMap::new();
        assert!(!router
            .rewrite_reply_to_for_outgoing(&mut no_reply_to, &addr("orders@west"))
            .unwrap());
        assert!(no_reply_to.is_empty());
    }

    #[test]
    fn subscription_table_override_is_exact_type_only() {
        let mut router = router();
        let base = MessageType::class("Ns.OrderEvent").build().unwrap();
        let derived = MessageType::class("Ns.OrderPlaced").extends(&base).build().unwrap();
        router.register_publisher(&base, "west", Some("sales-subscriptions")).unwrap();

        let (alias, table) = router.subscription_table_for(&base);
        assert_eq!(alias, "west");
        assert_eq!(table.name(), "west-account/sales-subscriptions");

        let (alias, table) = router.subscription_table_for(&derived);
        assert_eq!(alias, "main");
        assert_eq!(table.name(), "main-account/subscriptions");
    }

    #[test]
    fn registrations_require_known_aliases() {
        let mut router = router();
        let event = MessageType::class("Ns.OrderPlaced").build().unwrap();
        assert_eq!(
            router.register_endpoint("east", "billing"),
            Err(ConfigurationError::UnknownAccountAlias {
                alias: "east".to_string()
            })
        );
        assert!(router.register_publisher(&event, "east", None).is_err());

        router.register_endpoint("west", "billing").unwrap();
        assert_eq!(
            router.register_endpoint("main", "billing"),
            Err(ConfigurationError::DuplicateEndpoint {
                endpoint: "billing".to_string()
            })
        );
        router.register_publisher(&event, "west", None).unwrap();
        assert!(router.register_publisher(&event, "west", None).is_err());
    }
}
