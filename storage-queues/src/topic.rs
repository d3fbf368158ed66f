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

//! Topic names for event types.
//!
//! Message types are described explicitly at startup instead of being
//! discovered at runtime. Each [`MessageType`] carries its base class and the
//! interfaces it implements, and precomputes its hierarchy topic list once,
//! when it is built.
//!
//! ```
//! use storage_queues::topic::{hierarchy_topics, topic_for, MessageType, ROOT_TYPE_NAME};
//!
//! let event = MessageType::interface("Sales.IEvent").build().unwrap();
//! let order_placed = MessageType::class("Sales.OrderPlaced")
//!     .implements(&event)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(topic_for(&order_placed), "Sales.OrderPlaced");
//! assert_eq!(
//!     hierarchy_topics(&order_placed),
//!     ["Sales.OrderPlaced", ROOT_TYPE_NAME, "Sales.IEvent"]
//! );
//! ```

use crate::error::ConfigurationError;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Name of the universal root type every class ultimately derives from.
pub const ROOT_TYPE_NAME: &str = "object";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TypeKind {
    Class,
    Interface,
}

struct MessageTypeInner {
    full_name: String,
    kind: TypeKind,
    base: Option<MessageType>,
    interfaces: Vec<MessageType>,
    hierarchy: Vec<String>,
}

/// Immutable descriptor of a message type. Cloning is cheap.
///
/// Equality and hashing use the fully-qualified name only.
#[derive(Clone)]
pub struct MessageType(Arc<MessageTypeInner>);

impl MessageType {
    /// The universal root type.
    pub fn object() -> Self {
        Self(Arc::new(MessageTypeInner {
            full_name: ROOT_TYPE_NAME.to_string(),
            kind: TypeKind::Class,
            base: None,
            interfaces: Vec::new(),
            hierarchy: vec![ROOT_TYPE_NAME.to_string()],
        }))
    }

    pub fn class(full_name: &str) -> MessageTypeBuilder {
        MessageTypeBuilder::new(full_name, TypeKind::Class)
    }

    pub fn interface(full_name: &str) -> MessageTypeBuilder {
        MessageTypeBuilder::new(full_name, TypeKind::Interface)
    }

    pub fn full_name(&self) -> &str {
        &self.0.full_name
    }

    pub fn kind(&self) -> TypeKind {
        self.0.kind
    }

    /// Direct base class. `None` for interfaces, the root, and classes deriving
    /// straight from the root.
    pub fn base(&self) -> Option<&MessageType> {
        self.0.base.as_ref()
    }

    /// Directly implemented (or, for interfaces, extended) interfaces in
    /// declaration order.
    pub fn interfaces(&self) -> &[MessageType] {
        &self.0.interfaces
    }

    pub fn is_root(&self) -> bool {
        self.0.full_name == ROOT_TYPE_NAME
    }

    pub fn hierarchy_topics(&self) -> &[String] {
        &self.0.hierarchy
    }

    /// True when `self` is `ancestor` or derives from / implements it.
    pub fn is_assignable_to(&self, ancestor: &MessageType) -> bool {
        self.0
            .hierarchy
            .iter()
            .any(|topic| topic == ancestor.full_name())
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.full_name == other.0.full_name
    }
}

impl Eq for MessageType {}

impl Hash for MessageType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.full_name.hash(state);
    }
}

impl Debug for MessageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MessageType").field(&self.0.full_name).finish()
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.full_name)
    }
}

pub struct MessageTypeBuilder {
    full_name: String,
    kind: TypeKind,
    base: Option<MessageType>,
    interfaces: Vec<MessageType>,
}

impl MessageTypeBuilder {
    fn new(full_name: &str, kind: TypeKind) -> Self {
        Self {
            full_name: full_name.trim().to_string(),
            kind,
            base: None,
            interfaces: Vec::new(),
        }
    }

    pub fn extends(mut self, base: &MessageType) -> Self {
        self.base = Some(base.clone());
        self
    }

    pub fn implements(mut self, interface: &MessageType) -> Self {
        self.interfaces.push(interface.clone());
        self
    }

    pub fn build(self) -> Result<MessageType, ConfigurationError> {
        if self.full_name.is_empty() {
            return Err(ConfigurationError::EmptyTypeName);
        }
        if self.full_name == ROOT_TYPE_NAME {
            return Err(ConfigurationError::DuplicateMessageType {
                name: self.full_name,
            });
        }
        if let Some(base) = &self.base {
            if self.kind == TypeKind::Interface {
                return Err(self.invalid("an interface cannot extend a class"));
            }
            if base.kind() == TypeKind::Interface {
                return Err(self.invalid(&format!(
                    "'{}' is an interface and cannot be used as a base class",
                    base.full_name()
                )));
            }
        }
        if let Some(class) = self
            .interfaces
            .iter()
            .find(|interface| interface.kind() == TypeKind::Class)
        {
            return Err(self.invalid(&format!(
                "'{}' is a class and cannot be implemented",
                class.full_name()
            )));
        }

        // Base of `None` or the root itself both mean "derives from object".
        let base = self.base.filter(|base| !base.is_root());
        let hierarchy = compute_hierarchy(&self.full_name, base.as_ref(), &self.interfaces);

        Ok(MessageType(Arc::new(MessageTypeInner {
            full_name: self.full_name,
            kind: self.kind,
            base,
            interfaces: self.interfaces,
            hierarchy,
        })))
    }

    fn invalid(&self, reason: &str) -> ConfigurationError {
        ConfigurationError::InvalidHierarchy {
            name: self.full_name.clone(),
            reason: reason.to_string(),
        }
    }
}

fn compute_hierarchy(
    full_name: &str,
    base: Option<&MessageType>,
    interfaces: &[MessageType],
) -> Vec<String> {
    let mut topics = vec![full_name.to_string()];

    let mut base_chain = Vec::new();
    let mut current = base;
    while let Some(class) = current {
        base_chain.push(class);
        current = class.base();
    }
    topics.extend(base_chain.iter().map(|class| class.full_name().to_string()));
    topics.push(ROOT_TYPE_NAME.to_string());

    collect_interfaces(interfaces, &mut topics);
    for class in base_chain {
        collect_interfaces(class.interfaces(), &mut topics);
    }
    topics
}

// Depth first: an interface is followed by the interfaces it extends.
fn collect_interfaces(declared: &[MessageType], topics: &mut Vec<String>) {
    for interface in declared {
        topics.push(interface.full_name().to_string());
        collect_interfaces(interface.interfaces(), topics);
    }
}

/// Topic of a single type: its fully-qualified name.
pub fn topic_for(message_type: &MessageType) -> String {
    message_type.full_name().to_string()
}

/// Topics of `message_type`, its base classes up to the root, then every
/// implemented interface. May contain duplicates for diamond-shaped interface
/// graphs.
pub fn hierarchy_topics(message_type: &MessageType) -> &[String] {
    message_type.hierarchy_topics()
}

/// Startup registry of the host's message types, addressable by name.
#[derive(Clone, Debug)]
pub struct MessageTypeRegistry {
    types: HashMap<String, MessageType>,
}

impl Default for MessageTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageTypeRegistry {
    pub fn new() -> Self {
        let root = MessageType::object();
        Self {
            types: HashMap::from([(root.full_name().to_string(), root)]),
        }
    }

    /// Registers a type together with every ancestor it references.
    ///
    /// Registering the same descriptor twice is a no-op; registering a
    /// different descriptor under an existing name is an error.
    pub fn register(&mut self, message_type: &MessageType) -> Result<(), ConfigurationError> {
        if let Some(existing) = self.types.get(message_type.full_name()) {
            if Arc::ptr_eq(&existing.0, &message_type.0) || message_type.is_root() {
                return Ok(());
            }
            return Err(ConfigurationError::DuplicateMessageType {
                name: message_type.full_name().to_string(),
            });
        }

        if let Some(base) = message_type.base() {
            self.register(base)?;
        }
        for interface in message_type.interfaces() {
            self.register(interface)?;
        }
        self.types
            .insert(message_type.full_name().to_string(), message_type.clone());
        Ok(())
    }

    pub fn get(&self, full_name: &str) -> Option<&MessageType> {
        self.types.get(full_name)
    }

    pub fn resolve(&self, full_name: &str) -> Result<MessageType, ConfigurationError> {
        self.get(full_name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownMessageType {
                name: full_name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
