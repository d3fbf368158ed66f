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

//! Value-format helpers and marker values for structured log fields.

use crate::addressing::QueueAddress;
use crate::topic::MessageType;

pub const NONE: &str = "none";
pub const LOCAL_ALIAS_MARKER: &str = "<local>";

pub fn format_event_type(event_type: &MessageType) -> &str {
    event_type.full_name()
}

/// Formats an address without leaking credentials from legacy
/// connection-string aliases.
pub fn format_address(address: &QueueAddress) -> String {
    match address.alias() {
        None => address.queue_name().to_string(),
        Some(alias) if crate::addressing::ConnectionString::looks_like_connection_string(alias) => {
            format!("{}@<connection-string>", address.queue_name())
        }
        Some(_) => address.to_string(),
    }
}

pub fn format_optional_alias(alias: Option<&str>) -> &str {
    alias.unwrap_or(LOCAL_ALIAS_MARKER)
}

#[cfg(test)]
mod tests {
    use super::{format_address, format_optional_alias, LOCAL_ALIAS_MARKER};
    use crate::addressing::QueueAddress;

    #[test]
    fn format_address_keeps_plain_aliases() {
        let address = QueueAddress::parse("orders@west").unwrap();
        assert_eq!(format_address(&address), "orders@west");
    }

    #[test]
    fn format_address_hides_connection_strings() {
        let address =
            QueueAddress::parse("orders@AccountName=acct;AccountKey=c2VjcmV0").unwrap();
        assert_eq!(format_address(&address), "orders@<connection-string>");
    }

    #[test]
    fn format_optional_alias_marks_local() {
        assert_eq!(format_optional_alias(None), LOCAL_ALIAS_MARKER);
        assert_eq!(format_optional_alias(Some("west")), "west");
    }
}
