// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! One-hop address space traversal.
//!
//! [`AddressSpaceBrowser`] is the primitive every other component builds on.
//! It translates model node ids into the session's wire form, issues a
//! browse (following continuation points), and hands back
//! [`BrowseResult`]s with URIs instead of namespace indices.
//!
//! # Examples
//!
//! ```
//! use umati_opcua::browse::{BrowseContext, NodeClassMask};
//! use umati_opcua::types::{ids, BrowseDirection};
//!
//! let context = BrowseContext::has_component()
//!     .with_node_class_mask(NodeClassMask::OBJECT | NodeClassMask::VARIABLE);
//! assert_eq!(context.direction, BrowseDirection::Forward);
//! assert_eq!(context.reference_type, ids::standard(ids::HAS_COMPONENT));
//! ```

use std::ops::BitOr;

use serde::{Deserialize, Serialize};
use umati_model::{BrowseResult, ModellingRule, NodeClass, NodeId};

use crate::client::{
    BrowseDescription, BrowseResponse, ReadValueId, ReferenceDescription, UaTransport, Variant,
};
use crate::error::{NotFoundError, OpcUaError, OpcUaResult, SchemaError};
use crate::hierarchy::TypeHierarchyResolver;
use crate::namespace::NamespaceCache;
use crate::types::{ids, AttributeId, BrowseDirection};

// =============================================================================
// NodeClassMask
// =============================================================================

/// Node class filter of a browse request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeClassMask(pub u32);

impl NodeClassMask {
    /// Objects.
    pub const OBJECT: Self = Self(1);
    /// Variables.
    pub const VARIABLE: Self = Self(2);
    /// Methods.
    pub const METHOD: Self = Self(4);
    /// Object types.
    pub const OBJECT_TYPE: Self = Self(8);
    /// Variable types.
    pub const VARIABLE_TYPE: Self = Self(16);
    /// Reference types.
    pub const REFERENCE_TYPE: Self = Self(32);
    /// Data types.
    pub const DATA_TYPE: Self = Self(64);
    /// Views.
    pub const VIEW: Self = Self(128);
    /// Every node class.
    pub const ALL: Self = Self(0xFF);

    /// Returns `true` if the given class passes the filter.
    pub fn matches(&self, node_class: NodeClass) -> bool {
        self.0 & node_class.value() != 0
    }
}

impl Default for NodeClassMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for NodeClassMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<NodeClass> for NodeClassMask {
    fn from(node_class: NodeClass) -> Self {
        Self(node_class.value())
    }
}

// =============================================================================
// ResultMask
// =============================================================================

/// Selects which reference fields the server fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultMask(pub u32);

impl ResultMask {
    /// Nothing besides the target node id.
    pub const NONE: Self = Self(0);
    /// Reference type.
    pub const REFERENCE_TYPE: Self = Self(0x01);
    /// Direction flag.
    pub const IS_FORWARD: Self = Self(0x02);
    /// Node class.
    pub const NODE_CLASS: Self = Self(0x04);
    /// Browse name.
    pub const BROWSE_NAME: Self = Self(0x08);
    /// Display name.
    pub const DISPLAY_NAME: Self = Self(0x10);
    /// Type definition.
    pub const TYPE_DEFINITION: Self = Self(0x20);
    /// Every field.
    pub const ALL: Self = Self(0x3F);
}

impl Default for ResultMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for ResultMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// =============================================================================
// BrowseContext
// =============================================================================

/// Options of one browse call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseContext {
    /// Direction of the followed references.
    #[serde(default)]
    pub direction: BrowseDirection,

    /// Reference type to follow.
    pub reference_type: NodeId,

    /// Also follow subtypes of the reference type.
    #[serde(default = "default_true")]
    pub include_subtypes: bool,

    /// Node class filter.
    #[serde(default)]
    pub node_class_mask: NodeClassMask,

    /// Requested result fields.
    #[serde(default)]
    pub result_mask: ResultMask,
}

fn default_true() -> bool {
    true
}

impl Default for BrowseContext {
    fn default() -> Self {
        Self {
            direction: BrowseDirection::Forward,
            reference_type: ids::standard(ids::HIERARCHICAL_REFERENCES),
            include_subtypes: true,
            node_class_mask: NodeClassMask::ALL,
            result_mask: ResultMask::ALL,
        }
    }
}

impl BrowseContext {
    /// Creates the default context (forward hierarchical references).
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward browse along the given reference type.
    pub fn with_reference(reference_type: NodeId) -> Self {
        Self {
            reference_type,
            ..Self::default()
        }
    }

    /// Forward browse along HasComponent.
    pub fn has_component() -> Self {
        Self::with_reference(ids::standard(ids::HAS_COMPONENT))
    }

    /// Hierarchical browse restricted to objects, variables and their types.
    pub fn object_and_variable() -> Self {
        Self::default().with_node_class_mask(
            NodeClassMask::OBJECT
                | NodeClassMask::VARIABLE
                | NodeClassMask::OBJECT_TYPE
                | NodeClassMask::VARIABLE_TYPE,
        )
    }

    /// Sets the browse direction.
    pub fn with_direction(mut self, direction: BrowseDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the reference type.
    pub fn with_reference_type(mut self, reference_type: NodeId) -> Self {
        self.reference_type = reference_type;
        self
    }

    /// Sets whether subtypes of the reference type are followed.
    pub fn with_include_subtypes(mut self, include: bool) -> Self {
        self.include_subtypes = include;
        self
    }

    /// Sets the node class filter.
    pub fn with_node_class_mask(mut self, mask: NodeClassMask) -> Self {
        self.node_class_mask = mask;
        self
    }

    /// Sets the result mask.
    pub fn with_result_mask(mut self, mask: ResultMask) -> Self {
        self.result_mask = mask;
        self
    }
}

// =============================================================================
// IdentificationValue
// =============================================================================

/// One child of a machine's identification object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentificationValue {
    /// Browse name without namespace, used as the value key.
    pub key: String,

    /// Node holding the value.
    pub node_id: NodeId,
}

// =============================================================================
// AddressSpaceBrowser
// =============================================================================

/// Browses and reads nodes of the current session.
///
/// The browser borrows the transport and namespace table for the duration of
/// one operation; it holds no state of its own.
pub struct AddressSpaceBrowser<'a, T: UaTransport + ?Sized> {
    transport: &'a T,
    namespaces: &'a NamespaceCache,
    max_pages: usize,
}

impl<'a, T: UaTransport + ?Sized> AddressSpaceBrowser<'a, T> {
    /// Creates a browser that follows at most `max_pages` result pages.
    pub fn new(transport: &'a T, namespaces: &'a NamespaceCache, max_pages: usize) -> Self {
        Self {
            transport,
            namespaces,
            max_pages,
        }
    }

    /// Returns the namespace table used for id translation.
    pub fn namespaces(&self) -> &'a NamespaceCache {
        self.namespaces
    }

    /// Browses one hop from `start`.
    ///
    /// Zero matches is an empty list. Any bad status fails the whole call.
    pub async fn browse(
        &self,
        start: &NodeId,
        context: &BrowseContext,
    ) -> OpcUaResult<Vec<BrowseResult>> {
        let request = BrowseDescription {
            node_id: self.namespaces.encode(start)?,
            direction: context.direction,
            reference_type: self.namespaces.encode(&context.reference_type)?,
            include_subtypes: context.include_subtypes,
            node_class_mask: context.node_class_mask.0,
            result_mask: context.result_mask.0,
        };

        let response = self.transport.browse(&request).await?;
        let references = self.collect_pages(start, response).await?;

        references
            .iter()
            .map(|reference| self.to_browse_result(reference))
            .collect()
    }

    /// Follows continuation points until the server reports none.
    async fn collect_pages(
        &self,
        start: &NodeId,
        mut response: BrowseResponse,
    ) -> OpcUaResult<Vec<ReferenceDescription>> {
        let mut references = Vec::new();
        let mut pages = 1usize;

        loop {
            if response.status.is_bad() {
                tracing::error!(node = %start, status = %response.status, "Browse failed");
                return Err(OpcUaError::bad_status("Browse", start, response.status));
            }

            references.append(&mut response.references);

            let Some(continuation_point) = response.continuation_point.take() else {
                break;
            };

            if pages >= self.max_pages {
                return Err(SchemaError::TooManyPages {
                    node: start.to_string(),
                    max_pages: self.max_pages,
                }
                .into());
            }

            tracing::trace!(node = %start, page = pages, "Following continuation point");
            response = self.transport.browse_next(&continuation_point).await?;
            pages += 1;
        }

        Ok(references)
    }

    fn to_browse_result(&self, reference: &ReferenceDescription) -> OpcUaResult<BrowseResult> {
        let node_id = self.namespaces.decode(&reference.node_id)?;
        let node_class = NodeClass::from_value(reference.node_class)
            .ok_or_else(|| SchemaError::invalid_node_class(&node_id, reference.node_class))?;

        Ok(BrowseResult {
            node_class,
            type_definition: self.namespaces.decode(&reference.type_definition)?,
            reference_type: self.namespaces.decode(&reference.reference_type)?,
            browse_name: self.namespaces.decode_name(&reference.browse_name)?,
            node_id,
        })
    }

    /// Browses one hop and keeps only results typed as `type_definition` or
    /// one of its subtypes.
    ///
    /// The node class filter of `context` is replaced: an object type selects
    /// objects, a variable type selects variables. Any other class of
    /// `type_definition` is a [`SchemaError`]. The result mask always
    /// requests the type definition the filter is applied to.
    pub async fn browse_with_type_filter(
        &self,
        start: &NodeId,
        context: &BrowseContext,
        type_definition: &NodeId,
        resolver: &mut TypeHierarchyResolver,
    ) -> OpcUaResult<Vec<BrowseResult>> {
        let mask = match self.read_node_class(type_definition).await? {
            NodeClass::ObjectType => NodeClassMask::OBJECT,
            NodeClass::VariableType => NodeClassMask::VARIABLE,
            other => {
                tracing::error!(
                    node = %type_definition,
                    node_class = %other,
                    "Expected an object or variable type"
                );
                return Err(SchemaError::invalid_node_class(type_definition, other).into());
            }
        };

        let context = context
            .clone()
            .with_node_class_mask(mask)
            .with_result_mask(context.result_mask | ResultMask::TYPE_DEFINITION);
        let mut matching = Vec::new();
        for result in self.browse(start, &context).await? {
            if resolver
                .is_same_or_subtype(self, type_definition, &result.type_definition)
                .await?
            {
                matching.push(result);
            }
        }
        Ok(matching)
    }

    /// Reads one attribute and checks the status of both the call and the value.
    async fn read_attribute(&self, node: &NodeId, attribute: AttributeId) -> OpcUaResult<Variant> {
        let node_id = self.namespaces.encode(node)?;
        let response = self
            .transport
            .read(&[ReadValueId { node_id, attribute }])
            .await?;

        if response.status.is_bad() {
            tracing::error!(node = %node, status = %response.status, "Read failed");
            return Err(OpcUaError::bad_status("Read", node, response.status));
        }

        let mut values = response.values;
        if values.len() != 1 {
            return Err(SchemaError::unexpected_result_count("Read", 1, values.len()).into());
        }

        let value = values.remove(0);
        if value.status.is_bad() {
            tracing::warn!(node = %node, status = %value.status, "Bad value status");
            return Err(OpcUaError::bad_status("Read", node, value.status));
        }
        Ok(value.value)
    }

    /// Reads the node class attribute.
    pub async fn read_node_class(&self, node: &NodeId) -> OpcUaResult<NodeClass> {
        match self.read_attribute(node, AttributeId::NodeClass).await? {
            Variant::Int32(raw) => u32::try_from(raw)
                .ok()
                .and_then(NodeClass::from_value)
                .ok_or_else(|| SchemaError::invalid_node_class(node, raw).into()),
            other => {
                Err(SchemaError::unexpected_value_type(node, "Int32", other.type_name()).into())
            }
        }
    }

    /// Reads the browse name and returns it as `"{uri};{name}"`.
    pub async fn read_browse_name(&self, node: &NodeId) -> OpcUaResult<String> {
        match self.read_attribute(node, AttributeId::BrowseName).await? {
            Variant::QualifiedName(name) => Ok(self.namespaces.decode_name(&name)?.to_string()),
            other => Err(
                SchemaError::unexpected_value_type(node, "QualifiedName", other.type_name()).into(),
            ),
        }
    }

    /// Returns the modelling rule attached to a node.
    ///
    /// Nodes without a recognized rule are [`ModellingRule::Optional`].
    pub async fn browse_modelling_rule(&self, node: &NodeId) -> OpcUaResult<ModellingRule> {
        let context = BrowseContext::with_reference(ids::standard(ids::HAS_MODELLING_RULE))
            .with_node_class_mask(NodeClassMask::OBJECT)
            .with_result_mask(ResultMask::BROWSE_NAME);

        let rule = self
            .browse(node, &context)
            .await?
            .iter()
            .filter_map(|result| ModellingRule::parse(&result.browse_name.name))
            .last()
            .unwrap_or_default();
        Ok(rule)
    }

    /// Returns the type definition of an object or variable.
    pub async fn type_definition(&self, node: &NodeId) -> OpcUaResult<NodeId> {
        let context = BrowseContext::with_reference(ids::standard(ids::HAS_TYPE_DEFINITION))
            .with_include_subtypes(false)
            .with_node_class_mask(NodeClassMask::OBJECT_TYPE | NodeClassMask::VARIABLE_TYPE)
            .with_result_mask(ResultMask::NONE);

        let mut results = self.browse(node, &context).await?;
        match results.len() {
            0 => Err(NotFoundError::reference(node, "HasTypeDefinition").into()),
            1 => Ok(results.remove(0).node_id),
            n => Err(SchemaError::unexpected_result_count("Browse HasTypeDefinition", 1, n).into()),
        }
    }

    /// Returns the namespace URI of the type a machine instance implements.
    pub async fn implemented_namespace(&self, machine: &NodeId) -> OpcUaResult<String> {
        Ok(self.type_definition(machine).await?.uri)
    }

    /// Lists the machine candidates directly below `start`.
    pub async fn machines_under(&self, start: &NodeId) -> OpcUaResult<Vec<BrowseResult>> {
        let machines = self.browse(start, &BrowseContext::object_and_variable()).await?;
        tracing::debug!(start = %start, count = machines.len(), "Machines listed");
        Ok(machines)
    }

    /// Lists the children of an identification object as value keys and the
    /// nodes to read them from.
    pub async fn identification_values(
        &self,
        identification: &NodeId,
    ) -> OpcUaResult<Vec<IdentificationValue>> {
        Ok(self
            .browse(identification, &BrowseContext::object_and_variable())
            .await?
            .into_iter()
            .map(|result| IdentificationValue {
                key: result.browse_name.name,
                node_id: result.node_id,
            })
            .collect())
    }

    /// Reads the value attribute of each node as JSON.
    ///
    /// Values with a bad status become `null`; a bad service status fails the
    /// call.
    pub async fn read_node_values(&self, nodes: &[NodeId]) -> OpcUaResult<Vec<serde_json::Value>> {
        let requests = nodes
            .iter()
            .map(|node| self.namespaces.encode(node).map(ReadValueId::value))
            .collect::<OpcUaResult<Vec<_>>>()?;

        let response = self.transport.read(&requests).await?;
        if response.status.is_bad() {
            tracing::error!(count = nodes.len(), status = %response.status, "Read failed");
            let first = nodes.first().map(ToString::to_string).unwrap_or_default();
            return Err(OpcUaError::bad_status("Read", first, response.status));
        }
        if response.values.len() != nodes.len() {
            return Err(
                SchemaError::unexpected_result_count("Read", nodes.len(), response.values.len())
                    .into(),
            );
        }

        Ok(response
            .values
            .iter()
            .map(|value| {
                if value.status.is_bad() {
                    serde_json::Value::Null
                } else {
                    value.value.to_json()
                }
            })
            .collect())
    }
}

// =============================================================================
// Tests
// =============================================================================
