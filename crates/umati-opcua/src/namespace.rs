// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Namespace URI and index translation.
//!
//! The server identifies namespaces by index into its namespace array, and
//! that array may be reordered between sessions. Every node id that leaves
//! this crate is therefore expressed with the URI, and converted back to an
//! index right before a request goes out.

use std::collections::{BTreeMap, HashMap};

use umati_model::{NodeId, QualifiedName};

use crate::client::{ReadValueId, UaTransport};
use crate::error::{OpcUaError, OpcUaResult, SchemaError};
use crate::types::{ids, NodeIdentifier, UaNodeId, UaQualifiedName};

/// Bidirectional namespace table of the current session.
#[derive(Debug, Clone, Default)]
pub struct NamespaceCache {
    uri_to_index: HashMap<String, u16>,
    index_to_uri: BTreeMap<u16, String>,
}

impl NamespaceCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-reads the server's namespace array and replaces both maps.
    pub async fn refresh<T: UaTransport + ?Sized>(&mut self, transport: &T) -> OpcUaResult<()> {
        let node = UaNodeId::numeric(0, ids::SERVER_NAMESPACE_ARRAY);
        let response = transport.read(&[ReadValueId::value(node.clone())]).await?;

        if response.status.is_bad() {
            return Err(OpcUaError::bad_status("Read", &node, response.status));
        }
        if response.values.len() != 1 {
            return Err(SchemaError::unexpected_result_count("Read", 1, response.values.len()).into());
        }

        let value = &response.values[0];
        if value.status.is_bad() {
            return Err(OpcUaError::bad_status("Read", &node, value.status));
        }

        let uris = value.value.as_string_array().ok_or_else(|| {
            SchemaError::unexpected_value_type(&node, "String[]", value.value.type_name())
        })?;

        self.replace(uris);
        Ok(())
    }

    /// Replaces the table with the given namespace array.
    ///
    /// A URI listed twice keeps its first index.
    pub fn replace(&mut self, uris: Vec<String>) {
        let mut uri_to_index = HashMap::with_capacity(uris.len());
        let mut index_to_uri = BTreeMap::new();

        for (index, uri) in uris.into_iter().enumerate() {
            let Ok(index) = u16::try_from(index) else {
                tracing::warn!(index, "Namespace array exceeds u16 range, truncating");
                break;
            };

            if uri_to_index.contains_key(&uri) {
                tracing::warn!(uri = %uri, index, "Duplicate namespace URI, ignoring");
                continue;
            }

            if let Some(previous) = self.uri_to_index.get(&uri) {
                if *previous != index {
                    tracing::debug!(uri = %uri, from = previous, to = index, "Namespace moved");
                }
            }

            uri_to_index.insert(uri.clone(), index);
            index_to_uri.insert(index, uri);
        }

        tracing::debug!(count = index_to_uri.len(), "Namespace table refreshed");
        self.uri_to_index = uri_to_index;
        self.index_to_uri = index_to_uri;
    }

    /// Returns the current index of a namespace URI.
    ///
    /// The empty URI and the standard namespace URI always map to 0.
    pub fn uri_to_index(&self, uri: &str) -> OpcUaResult<u16> {
        if uri.is_empty() || uri == ids::STANDARD_NAMESPACE_URI {
            return Ok(0);
        }
        self.uri_to_index
            .get(uri)
            .copied()
            .ok_or_else(|| SchemaError::unknown_namespace_uri(uri).into())
    }

    /// Returns the URI stored at a namespace index.
    pub fn index_to_uri(&self, index: u16) -> OpcUaResult<&str> {
        self.index_to_uri
            .get(&index)
            .map(String::as_str)
            .ok_or_else(|| SchemaError::UnknownNamespaceIndex { index }.into())
    }

    /// Converts a model node id into its wire form.
    pub fn encode(&self, node: &NodeId) -> OpcUaResult<UaNodeId> {
        if node.is_null() {
            return Ok(UaNodeId::null());
        }
        let namespace_index = self.uri_to_index(&node.uri)?;
        let identifier: NodeIdentifier = node.id.parse()?;
        Ok(UaNodeId::new(namespace_index, identifier))
    }

    /// Converts a wire node id into its model form.
    ///
    /// The null id decodes to [`NodeId::null`].
    pub fn decode(&self, node: &UaNodeId) -> OpcUaResult<NodeId> {
        if node.is_null() {
            return Ok(NodeId::null());
        }
        let uri = self.index_to_uri(node.namespace_index)?;
        Ok(NodeId::new(uri, node.identifier.to_string()))
    }

    /// Converts a model browse name into its wire form.
    pub fn encode_name(&self, name: &QualifiedName) -> OpcUaResult<UaQualifiedName> {
        Ok(UaQualifiedName::new(self.uri_to_index(&name.uri)?, name.name.clone()))
    }

    /// Converts a wire browse name into its model form.
    pub fn decode_name(&self, name: &UaQualifiedName) -> OpcUaResult<QualifiedName> {
        let uri = self.index_to_uri(name.namespace_index)?;
        Ok(QualifiedName::new(uri, name.name.clone()))
    }

    /// Rewrites a caller-supplied id to the URI the server reports.
    ///
    /// Ids written with an empty URI for the standard namespace compare equal
    /// to the decoded ids after this.
    pub fn canonical(&self, node: &NodeId) -> OpcUaResult<NodeId> {
        self.decode(&self.encode(node)?)
    }

    /// Returns the namespace array in index order.
    pub fn namespaces(&self) -> Vec<String> {
        self.index_to_uri.values().cloned().collect()
    }

    /// Returns the number of known namespaces.
    pub fn len(&self) -> usize {
        self.index_to_uri.len()
    }

    /// Returns `true` if the table has not been read yet.
    pub fn is_empty(&self) -> bool {
        self.index_to_uri.is_empty()
    }

    /// Forgets the table.
    pub fn clear(&mut self) {
        self.uri_to_index.clear();
        self.index_to_uri.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
