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

use crate::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const ALIAS_SEPARATOR: char = '@';

/// Logical destination: a queue name plus an optional account alias.
///
/// No alias means the local account. The textual form is `queue` or
/// `queue@alias`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct QueueAddress {
    queue_name: String,
    alias: Option<String>,
}

impl QueueAddress {
    pub fn new(queue_name: &str, alias: Option<&str>) -> Result<Self, Error> {
        if queue_name.trim().is_empty() {
            return Err(invalid(queue_name, "queue name must not be empty"));
        }
        if queue_name.contains(ALIAS_SEPARATOR) {
            return Err(invalid(queue_name, "queue name must not contain '@'"));
        }
        if matches!(alias, Some(alias) if alias.trim().is_empty()) {
            return Err(invalid(queue_name, "alias must not be empty when present"));
        }
        Ok(Self {
            queue_name: queue_name.to_string(),
            alias: alias.map(str::to_string),
        })
    }

    /// Parses `queue` or `queue@alias`. Everything after the first `@` is the
    /// alias, so legacy connection strings survive intact.
    pub fn parse(address: &str) -> Result<Self, Error> {
        match address.split_once(ALIAS_SEPARATOR) {
            Some((queue_name, alias)) => {
                if alias.trim().is_empty() {
                    return Err(invalid(address, "alias after '@' must not be empty"));
                }
                if queue_name.trim().is_empty() {
                    return Err(invalid(address, "queue name must not be empty"));
                }
                Ok(Self {
                    queue_name: queue_name.to_string(),
                    alias: Some(alias.to_string()),
                })
            }
            None => Self::new(address, None),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn has_alias(&self) -> bool {
        self.alias.is_some()
    }

    pub fn with_alias(&self, alias: &str) -> Self {
        Self {
            queue_name: self.queue_name.clone(),
            alias: Some(alias.to_string()),
        }
    }
}

fn invalid(address: &str, reason: &str) -> Error {
    Error::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    }
}

impl Display for QueueAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{}{ALIAS_SEPARATOR}{alias}", self.queue_name),
            None => f.write_str(&self.queue_name),
        }
    }
}

impl FromStr for QueueAddress {
    type Err = Error;

    fn from_str(address: &str) -> Result<Self, Self::Err> {
        Self::parse(address)
    }
}
