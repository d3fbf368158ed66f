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

//! Cancellation helpers for remote storage calls.

use crate::error::Error;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Drives `operation` until it completes or `cancel` fires.
///
/// A cancelled operation is dropped, which aborts the in-flight remote call.
pub(crate) async fn cancellable<T, E, F>(cancel: &CancellationToken, operation: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, E>>,
    E: Into<Error>,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = operation => result.map_err(Into::into),
    }
}
