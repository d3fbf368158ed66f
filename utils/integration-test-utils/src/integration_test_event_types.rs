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

use storage_queues::{MessageType, MessageTypeRegistry};

/// A small order domain:
///
/// ```text
/// IEvent <- IOrderEvent <- OrderPlaced <- OrderPlacedExpress
/// UnrelatedEvent
/// ```
#[derive(Clone, Debug)]
pub struct OrderEventTypes {
    pub event: MessageType,
    pub order_event: MessageType,
    pub order_placed: MessageType,
    pub order_placed_express: MessageType,
    pub unrelated: MessageType,
}

impl OrderEventTypes {
    pub fn new() -> Self {
        let event = MessageType::interface("Sales.IEvent").build().unwrap();
        let order_event = MessageType::interface("Sales.IOrderEvent")
            .implements(&event)
            .build()
            .unwrap();
        let order_placed = MessageType::class("Sales.OrderPlaced")
            .implements(&order_event)
            .build()
            .unwrap();
        let order_placed_express = MessageType::class("Sales.OrderPlacedExpress")
            .extends(&order_placed)
            .build()
            .unwrap();
        let unrelated = MessageType::class("Sales.UnrelatedEvent").build().unwrap();
        Self {
            event,
            order_event,
            order_placed,
            order_placed_express,
            unrelated,
        }
    }

    pub fn registry(&self) -> MessageTypeRegistry {
        let mut registry = MessageTypeRegistry::new();
        for message_type in [&self.order_placed_express, &self.unrelated] {
            registry.register(message_type).unwrap();
        }
        registry
    }
}

impl Default for OrderEventTypes {
    fn default() -> Self {
        Self::new()
    }
}
