// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session-independent node identifiers and qualified names.
//!
//! A server encodes node identifiers with a numeric namespace index that is
//! only meaningful for the current session. The types here carry the
//! namespace URI instead, which is stable across reconnects. Translation
//! between the two forms happens in the client crate's namespace cache.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

// =============================================================================
// NodeId
// =============================================================================

/// A node identifier qualified by its namespace URI.
///
/// The external text form is `"<uri>;<id>"`, where `id` uses the usual
/// `i=`, `s=`, `g=` or `b=` prefixes. The URI may be empty for the base
/// namespace.
///
/// # Examples
///
/// ```
/// use umati_model::NodeId;
///
/// let id = NodeId::new("http://opcfoundation.org/UA/", "i=58");
/// assert_eq!(id.to_string(), "http://opcfoundation.org/UA/;i=58");
///
/// let parsed: NodeId = ";i=85".parse().unwrap();
/// assert!(parsed.uri.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace URI.
    pub uri: String,
    /// Identifier within the namespace, including its type prefix.
    pub id: String,
}

impl NodeId {
    /// Creates a node id.
    #[inline]
    pub fn new(uri: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            id: id.into(),
        }
    }

    /// Returns the null node id (empty URI and identifier).
    #[inline]
    pub fn null() -> Self {
        Self::default()
    }

    /// Returns `true` if no identifier is set.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.id.is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.uri, self.id)
    }
}

impl FromStr for NodeId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (uri, id) = s
            .split_once(';')
            .ok_or_else(|| ModelError::invalid_node_id(s, "missing ';' separator"))?;
        if id.is_empty() {
            return Err(ModelError::invalid_node_id(s, "empty identifier"));
        }
        Ok(Self::new(uri, id))
    }
}

// =============================================================================
// QualifiedName
// =============================================================================

/// A browse name qualified by its namespace URI.
///
/// Displayed as `"{uri};{name}"`, which is also the key format used by
/// [`TypeMap`](crate::TypeMap).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Namespace URI.
    pub uri: String,
    /// The name.
    pub name: String,
}

impl QualifiedName {
    /// Creates a qualified name.
    #[inline]
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
        }
    }

    /// Returns `true` if the name is empty.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.uri, self.name)
    }
}

impl FromStr for QualifiedName {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (uri, name) = s
            .split_once(';')
            .ok_or_else(|| ModelError::invalid_qualified_name(s, "missing ';' separator"))?;
        if name.is_empty() {
            return Err(ModelError::invalid_qualified_name(s, "empty name"));
        }
        Ok(Self::new(uri, name))
    }
}

// =============================================================================
// Tests
// =============================================================================
