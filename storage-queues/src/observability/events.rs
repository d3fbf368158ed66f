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

//! Canonical structured event names used across `storage-queues`.

// Subscription store events.
pub const SUBSCRIBE_OK: &str = "subscribe_ok";
pub const SUBSCRIBE_FAILED: &str = "subscribe_failed";
pub const UNSUBSCRIBE_OK: &str = "unsubscribe_ok";
pub const UNSUBSCRIBE_MISSING: &str = "unsubscribe_missing";
pub const UNSUBSCRIBE_FAILED: &str = "unsubscribe_failed";
pub const SUBSCRIBER_LOOKUP_OK: &str = "subscriber_lookup_ok";
pub const SUBSCRIBER_LOOKUP_FAILED: &str = "subscriber_lookup_failed";
pub const SUBSCRIPTION_ROW_MALFORMED: &str = "subscription_row_malformed";

// Subscription cache events.
pub const SUBSCRIPTION_CACHE_HIT: &str = "subscription_cache_hit";
pub const SUBSCRIPTION_CACHE_REFRESH: &str = "subscription_cache_refresh";
pub const SUBSCRIPTION_CACHE_EVICT: &str = "subscription_cache_evict";
pub const SUBSCRIPTION_CACHE_FETCH_FAILED: &str = "subscription_cache_fetch_failed";

// Lease lock events.
pub const LOCK_ACQUIRED: &str = "lock_acquired";
pub const LOCK_RENEWED: &str = "lock_renewed";
pub const LOCK_CONTENDED: &str = "lock_contended";
pub const LOCK_LOST: &str = "lock_lost";
pub const LOCK_RELEASED: &str = "lock_released";
pub const LOCK_RELEASE_FAILED: &str = "lock_release_failed";

// Address routing events.
pub const ACCOUNT_REGISTERED: &str = "account_registered";
pub const ACCOUNT_ALREADY_REGISTERED: &str = "account_already_registered";
pub const ADDRESS_RESOLVED: &str = "address_resolved";
pub const ADDRESS_RESOLVE_FAILED: &str = "address_resolve_failed";
pub const LEGACY_CONNECTION_STRING_FALLBACK: &str = "legacy_connection_string_fallback";
pub const REPLY_TO_REWRITTEN: &str = "reply_to_rewritten";

// Delayed delivery events.
pub const DELAYED_MESSAGE_SCHEDULED: &str = "delayed_message_scheduled";
pub const DELAYED_POLL_NOT_OWNER: &str = "delayed_poll_not_owner";
pub const DELAYED_POLL_SUMMARY: &str = "delayed_poll_summary";
pub const DELAYED_POLL_FAILED: &str = "delayed_poll_failed";
pub const DELAYED_MESSAGE_DISPATCHED: &str = "delayed_message_dispatched";
pub const DELAYED_MESSAGE_MALFORMED: &str = "delayed_message_malformed";
pub const DELAYED_DISPATCH_FAILED: &str = "delayed_dispatch_failed";
pub const DELAYED_POLL_BATCH_FULL: &str = "delayed_poll_batch_full";
pub const DELAYED_POLL_LEASE_LOST: &str = "delayed_poll_lease_lost";
pub const DELAYED_POLLER_STOPPED: &str = "delayed_poller_stopped";
