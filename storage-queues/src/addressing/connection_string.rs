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

//! Legacy connection strings embedded in addresses that predate aliasing.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

const ACCOUNT_NAME: &str = "accountname";
const ACCOUNT_KEY: &str = "accountkey";
const SHARED_ACCESS_SIGNATURE: &str = "sharedaccesssignature";
const USE_DEVELOPMENT_STORAGE: &str = "usedevelopmentstorage";
const QUEUE_ENDPOINT: &str = "queueendpoint";
const TABLE_ENDPOINT: &str = "tableendpoint";
const DEVELOPMENT_ACCOUNT_NAME: &str = "devstoreaccount1";

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ConnectionStringError {
    #[error("connection string is empty")]
    Empty,
    #[error("segment {index} is not a `key=value` pair")]
    MalformedSegment { index: usize },
    #[error("setting '{key}' appears more than once")]
    DuplicateSetting { key: String },
    #[error(
        "no credentials: expected AccountName and AccountKey, \
         SharedAccessSignature with an endpoint, or UseDevelopmentStorage=true"
    )]
    MissingCredentials,
}

/// Parsed `key=value;key=value` storage connection string.
///
/// Keys are matched case-insensitively. `Debug` never prints secrets.
#[derive(Clone, Eq, PartialEq)]
pub struct ConnectionString {
    raw: String,
    settings: BTreeMap<String, String>,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        if raw.trim().is_empty() {
            return Err(ConnectionStringError::Empty);
        }

        let mut settings = BTreeMap::new();
        for (index, segment) in raw.split(';').enumerate() {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            // Values (keys, signatures) may themselves contain '='.
            let Some((key, value)) = segment.split_once('=') else {
                return Err(ConnectionStringError::MalformedSegment { index });
            };
            let key = key.trim().to_ascii_lowercase();
            if key.is_empty() {
                return Err(ConnectionStringError::MalformedSegment { index });
            }
            if settings.insert(key.clone(), value.trim().to_string()).is_some() {
                return Err(ConnectionStringError::DuplicateSetting { key });
            }
        }

        let connection_string = Self {
            raw: raw.to_string(),
            settings,
        };
        if !connection_string.has_credentials() {
            return Err(ConnectionStringError::MissingCredentials);
        }
        Ok(connection_string)
    }

    pub fn looks_like_connection_string(candidate: &str) -> bool {
        Self::parse(candidate).is_ok()
    }

    fn has_credentials(&self) -> bool {
        if self.is_development_storage() {
            return true;
        }
        let has_key = self.get(ACCOUNT_NAME).is_some() && self.get(ACCOUNT_KEY).is_some();
        let has_sas = self.get(SHARED_ACCESS_SIGNATURE).is_some()
            && (self.get(QUEUE_ENDPOINT).is_some() || self.get(TABLE_ENDPOINT).is_some());
        has_key || has_sas
    }

    pub fn is_development_storage(&self) -> bool {
        self.get(USE_DEVELOPMENT_STORAGE)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Account name, falling back to the development storage account or the
    /// first label of the queue endpoint host.
    pub fn account_name(&self) -> Option<&str> {
        if let Some(name) = self.get(ACCOUNT_NAME) {
            return Some(name);
        }
        if self.is_development_storage() {
            return Some(DEVELOPMENT_ACCOUNT_NAME);
        }
        self.get(QUEUE_ENDPOINT)
            .or_else(|| self.get(TABLE_ENDPOINT))
            .and_then(|endpoint| {
                let host = endpoint.split("://").nth(1).unwrap_or(endpoint);
                host.split(['.', '/', ':']).next()
            })
            .filter(|name| !name.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Debug for ConnectionString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectionString, ConnectionStringError};

    #[test]
    fn account_key_form_is_accepted() {
        let parsed = ConnectionString::parse(
            "DefaultEndpointsProtocol=https;AccountName=legacy;AccountKey=a2V5==;EndpointSuffix=example.net",
        )
        .unwrap();
        assert_eq!(parsed.account_name(), Some("legacy"));
        assert_eq!(parsed.get("accountkey"), Some("a2V5=="));
    }

    #[test]
    fn development_storage_and_sas_forms_are_accepted() {
        let dev = ConnectionString::parse("UseDevelopmentStorage=true").unwrap();
        assert!(dev.is_development_storage());
        assert_eq!(dev.account_name(), Some("devstoreaccount1"));

        let sas = ConnectionString::parse(
            "QueueEndpoint=https://sasaccount.queue.example.net/;SharedAccessSignature=sv=2020&sig=abc",
        )
        .unwrap();
        assert_eq!(sas.account_name(), Some("sasaccount"));
    }

    #[test]
    fn plain_aliases_are_not_connection_strings() {
        assert!(!ConnectionString::looks_like_connection_string("west"));
        assert!(!ConnectionString::looks_like_connection_string("AccountName=only"));
        assert_eq!(
            ConnectionString::parse("AccountName=a;garbage"),
            Err(ConnectionStringError::MalformedSegment { index: 1 })
        );
        assert_eq!(
            ConnectionString::parse("AccountName=a;accountname=b;AccountKey=k"),
            Err(ConnectionStringError::DuplicateSetting {
                key: "accountname".to_string()
            })
        );
        assert_eq!(ConnectionString::parse(" "), Err(ConnectionStringError::Empty));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let parsed = ConnectionString::parse("AccountName=acct;AccountKey=c2VjcmV0").unwrap();
        let rendered = format!("{parsed:?}");
        assert!(rendered.contains("acct"));
        assert!(!rendered.contains("c2VjcmV0"));
    }
}
