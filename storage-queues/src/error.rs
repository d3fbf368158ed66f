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

//! Crate-wide error taxonomy.

use crate::addressing::ConnectionStringError;
use crate::headers::HeadersCodecError;
use crate::storage::StorageError;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure surfaced by this crate.
///
/// Expected negative outcomes (lock contention, zero subscribers) are never
/// errors. `Error` is `Clone` so one shared fetch result can be handed to all
/// of its waiters.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("storage operation failed: {0}")]
    Storage(#[from] StorageError),
    #[error("operation was cancelled")]
    Cancelled,
    #[error("malformed headers payload: {0}")]
    Headers(#[from] HeadersCodecError),
    #[error("invalid queue address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("delayed message {partition_key}/{row_key} is malformed: {reason}")]
    InvalidEntity {
        partition_key: String,
        row_key: String,
        reason: String,
    },
}

impl Error {
    /// Returns the storage error kind when this is a storage failure.
    pub fn storage_kind(&self) -> Option<crate::storage::StorageErrorKind> {
        match self {
            Error::Storage(storage_error) => Some(storage_error.kind()),
            _ => None,
        }
    }
}

/// Setup-time failures. These surface while the endpoint is being configured.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error(
        "no account was mapped under the alias '{alias}'; register it with \
         `AddressRouter::register_account` or add it to the `accounts` configuration section"
    )]
    UnknownAccountAlias { alias: String },
    #[error("the account alias '{alias}' is registered more than once")]
    DuplicateAlias { alias: String },
    #[error("account alias must not be empty")]
    EmptyAlias,
    #[error("endpoint '{endpoint}' is registered more than once")]
    DuplicateEndpoint { endpoint: String },
    #[error("message type name must not be empty")]
    EmptyTypeName,
    #[error("message type '{name}' is registered more than once")]
    DuplicateMessageType { name: String },
    #[error("message type '{name}' is not registered")]
    UnknownMessageType { name: String },
    #[error("invalid hierarchy for message type '{name}': {reason}")]
    InvalidHierarchy { name: String, reason: String },
    #[error("connection string for alias '{alias}' is malformed: {source}")]
    MalformedConnectionString {
        alias: String,
        source: ConnectionStringError,
    },
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("unable to load configuration: {0}")]
    Unreadable(String),
}
