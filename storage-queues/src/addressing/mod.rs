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

//! Multi-account address resolution.
//!
//! Maps logical destinations (`queue@alias`) to the storage account that backs
//! them, keeps backward compatibility with addresses that embed a legacy
//! connection string instead of an alias, and decides which account's table
//! holds the subscriptions for an event type.

mod connection_string;
mod queue_address;
mod router;

pub use connection_string::{ConnectionString, ConnectionStringError};
pub use queue_address::QueueAddress;
pub use router::{
    AccountClientFactory, AddressRouter, MessageIntent, REPLY_TO_ADDRESS_HEADER,
};
