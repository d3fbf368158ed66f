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

//! Runtime integration layer.
//!
//! Keeps cooperative cancellation in one place so the rest of the crate can
//! treat every remote call the same way: race it against the caller's
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and surface
//! [`Error::Cancelled`](crate::Error::Cancelled) when the token wins.

pub(crate) mod cancellation;
