// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Type discovery and inheritance flattening.
//!
//! Building a [`TypeMap`] happens in two phases:
//!
//! ```text
//!   discover()                       build()                substitute()
//! ┌─────────────┐  arena of     ┌──────────────┐ staging ┌──────────────┐
//! │ crawl from  │ StructureBi-  │ fold each    │  map    │ inline child │
//! │ base types  │────nodes─────▶│ bloodline    │────────▶│ type trees   │──▶ TypeMap
//! └─────────────┘               └──────────────┘         └──────────────┘
//! ```
//!
//! Discovery keeps the crawl forest in an arena: every node knows its parent
//! by index, so walking a type's ancestry never needs shared ownership. The
//! finalized [`StructureNode`] trees produced afterwards own their children
//! and carry no link back into the arena.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use umati_model::{
    BrowseResult, ModellingRule, NodeClass, NodeId, QualifiedName, StructureNode, TypeMap,
};

use crate::browse::{AddressSpaceBrowser, BrowseContext};
use crate::client::UaTransport;
use crate::error::{OpcUaResult, SchemaError};
use crate::types::ids;

/// Registered types between two progress log lines.
const PROGRESS_INTERVAL: usize = 50;

// =============================================================================
// StructureBiNode
// =============================================================================

/// Index of a node in the crawl arena.
pub type BiNodeId = usize;

/// A crawl node with links in both directions.
#[derive(Debug, Clone)]
pub struct StructureBiNode {
    /// The discovered node. `children` stays empty; see [`Self::children`].
    pub node: StructureNode,
    /// Discovering parent.
    pub parent: Option<BiNodeId>,
    /// Discovered children in browse order.
    pub children: Vec<BiNodeId>,
    /// `true` if this node is the canonical definition of a registered type.
    pub is_type: bool,
}

impl StructureBiNode {
    /// Namespace the node itself lives in.
    pub fn namespace_uri(&self) -> &str {
        &self.node.node_id.uri
    }
}

/// Names a companion namespace uses for its machine and identification types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInformation {
    /// Last path segment of the URI (e.g. `MachineTool`).
    pub namespace: String,
    /// Full namespace URI.
    pub namespace_uri: String,
    /// Browse name of the namespace's machine type.
    pub namespace_type: String,
    /// Browse name of the namespace's identification type.
    pub identification_type: String,
}

struct Pending {
    parent: BiNodeId,
    result: BrowseResult,
    depth: usize,
}

// =============================================================================
// TypeMapBuilder
// =============================================================================

/// Crawls type definitions and flattens them into a [`TypeMap`].
#[derive(Debug, Clone)]
pub struct TypeMapBuilder {
    arena: Vec<StructureBiNode>,
    types: BTreeMap<String, BiNodeId>,
    name_to_id: BTreeMap<String, NodeId>,
    max_depth: usize,
}

impl TypeMapBuilder {
    /// Creates a builder whose crawl descends at most `max_depth` levels.
    pub fn new(max_depth: usize) -> Self {
        Self {
            arena: Vec::new(),
            types: BTreeMap::new(),
            name_to_id: BTreeMap::new(),
            max_depth,
        }
    }

    /// Returns the number of crawled nodes.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns `true` if nothing was crawled yet.
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Returns a crawled node.
    pub fn node(&self, id: BiNodeId) -> Option<&StructureBiNode> {
        self.arena.get(id)
    }

    /// Returns the arena index of a registered type.
    pub fn type_index(&self, type_name: &str) -> Option<BiNodeId> {
        self.types.get(type_name).copied()
    }

    /// Qualified type name to defining node, for every registered type.
    pub fn registry(&self) -> &BTreeMap<String, NodeId> {
        &self.name_to_id
    }

    /// Namespaces owning at least one registered type.
    pub fn type_namespaces(&self) -> BTreeSet<String> {
        self.types
            .values()
            .map(|&id| self.arena[id].namespace_uri().to_string())
            .collect()
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    /// Crawls everything reachable from one base type.
    ///
    /// Connection errors abort the crawl. Any other failure below the base
    /// only drops the affected subtree.
    pub async fn discover<T: UaTransport + ?Sized>(
        &mut self,
        browser: &AddressSpaceBrowser<'_, T>,
        base: &NodeId,
        of_base_data_variable_type: bool,
    ) -> OpcUaResult<()> {
        let base = browser.namespaces().canonical(base)?;
        let root_class = if of_base_data_variable_type {
            NodeClass::VariableType
        } else {
            NodeClass::ObjectType
        };
        let root = self.push(
            None,
            StructureNode {
                browse_name: QualifiedName::new(base.uri.clone(), ""),
                node_id: base.clone(),
                node_class: root_class,
                modelling_rule: ModellingRule::Mandatory,
                of_base_data_variable_type,
                ..Default::default()
            },
        );

        let context = BrowseContext::object_and_variable();
        let mut stack: Vec<Pending> = browser
            .browse(&base, &context)
            .await?
            .into_iter()
            .rev()
            .map(|result| Pending {
                parent: root,
                result,
                depth: 1,
            })
            .collect();

        while let Some(Pending {
            parent,
            result,
            depth,
        }) = stack.pop()
        {
            let modelling_rule = if result.node_class.is_type_class() {
                ModellingRule::default()
            } else {
                match browser.browse_modelling_rule(&result.node_id).await {
                    Ok(rule) => rule,
                    Err(e) if e.is_connection() => return Err(e),
                    Err(e) => {
                        tracing::warn!(node = %result.node_id, error = %e, "Modelling rule lookup failed");
                        ModellingRule::default()
                    }
                }
            };

            let node_id = result.node_id.clone();
            let current = self.register(parent, result, modelling_rule, of_base_data_variable_type);

            if depth >= self.max_depth {
                tracing::debug!(node = %node_id, depth, "Crawl depth bound reached");
                continue;
            }
            if self.is_ancestor(parent, &node_id) {
                tracing::debug!(node = %node_id, "Skipping cyclic reference");
                continue;
            }

            match browser.browse(&node_id, &context).await {
                Ok(children) => stack.extend(children.into_iter().rev().map(|result| Pending {
                    parent: current,
                    result,
                    depth: depth + 1,
                })),
                Err(e) if e.is_connection() => return Err(e),
                Err(e) => {
                    tracing::warn!(node = %node_id, error = %e, "Browse failed, skipping subtree");
                }
            }
        }

        tracing::debug!(
            base = %base,
            nodes = self.arena.len(),
            types = self.types.len(),
            "Type discovery finished"
        );
        Ok(())
    }

    fn push(&mut self, parent: Option<BiNodeId>, node: StructureNode) -> BiNodeId {
        let id = self.arena.len();
        self.arena.push(StructureBiNode {
            node,
            parent,
            children: Vec::new(),
            is_type: false,
        });
        if let Some(parent) = parent {
            self.arena[parent].children.push(id);
        }
        id
    }

    /// Adds a crawl node below `parent` and registers it if it is the first
    /// occurrence of a type.
    fn register(
        &mut self,
        parent: BiNodeId,
        result: BrowseResult,
        modelling_rule: ModellingRule,
        of_base_data_variable_type: bool,
    ) -> BiNodeId {
        let is_type_class = result.node_class.is_type_class();
        let type_name = result.browse_name.to_string();
        let node_id = result.node_id.clone();

        let current = self.push(
            Some(parent),
            StructureNode {
                node_id: result.node_id,
                browse_name: result.browse_name,
                type_definition: result.type_definition,
                node_class: result.node_class,
                modelling_rule,
                of_base_data_variable_type,
                children: Vec::new(),
            },
        );

        if is_type_class {
            if self.types.contains_key(&type_name) {
                tracing::trace!(type_name = %type_name, "Found type again");
            } else {
                self.arena[current].is_type = true;
                self.types.insert(type_name.clone(), current);
                self.name_to_id.insert(type_name, node_id);
                if self.types.len() % PROGRESS_INTERVAL == 0 {
                    tracing::debug!(count = self.types.len(), "Discovering types");
                }
            }
        }
        current
    }

    fn is_ancestor(&self, from: BiNodeId, node_id: &NodeId) -> bool {
        let mut current = Some(from);
        let mut steps = 0;
        while let Some(id) = current {
            if &self.arena[id].node.node_id == node_id || steps > self.arena.len() {
                return true;
            }
            current = self.arena[id].parent;
            steps += 1;
        }
        false
    }

    // =========================================================================
    // Flattening
    // =========================================================================

    /// Flattens every type registered in `namespace_uri` into `map`.
    ///
    /// Entries already in the map are kept. Returns the number of inserted
    /// types; a type that cannot be flattened is logged and skipped.
    pub fn build(&self, namespace_uri: &str, map: &mut TypeMap) -> usize {
        let mut inserted = 0;
        for (type_name, &id) in &self.types {
            if self.arena[id].namespace_uri() != namespace_uri {
                continue;
            }
            match self.flatten(type_name, id) {
                Ok(node) => {
                    if map.insert(type_name.clone(), node) {
                        inserted += 1;
                    } else {
                        tracing::trace!(type_name = %type_name, "Type already in map");
                    }
                }
                Err(e) => {
                    tracing::warn!(type_name = %type_name, error = %e, "Failed to flatten type");
                }
            }
        }
        inserted
    }

    /// Merges the declared children of a type and all its ancestors,
    /// root first.
    pub fn flatten(&self, type_name: &str, id: BiNodeId) -> OpcUaResult<StructureNode> {
        let mut bloodline = Vec::new();
        let mut current = Some(id);
        while let Some(index) = current {
            if bloodline.len() > self.arena.len() || index >= self.arena.len() {
                return Err(SchemaError::BrokenAncestry {
                    type_name: type_name.to_string(),
                }
                .into());
            }
            bloodline.push(index);
            current = self.arena[index].parent;
        }

        let mut node = self.arena[id].node.clone();
        for &ancestor in bloodline.iter().rev() {
            for &child in &self.arena[ancestor].children {
                let bi = &self.arena[child];
                if bi.is_type || bi.node.node_class.is_type_class() {
                    continue;
                }
                node.merge_child(self.to_structure(child));
            }
        }
        Ok(node)
    }

    /// Copies a crawl subtree into an owned tree, skipping nested types.
    fn to_structure(&self, id: BiNodeId) -> StructureNode {
        let bi = &self.arena[id];
        let mut node = bi.node.clone();
        node.children = bi
            .children
            .iter()
            .filter(|&&child| {
                let child = &self.arena[child];
                !child.is_type && !child.node.node_class.is_type_class()
            })
            .map(|&child| self.to_structure(child))
            .collect();
        node
    }

    // =========================================================================
    // Substitution
    // =========================================================================

    /// Replaces the children of every declaration typed by a mapped type with
    /// that type's flattened children.
    ///
    /// A type reached again while it is being expanded is left as declared.
    pub fn substitute(&self, staging: &TypeMap) -> TypeMap {
        let id_to_name: HashMap<&NodeId, &str> = self
            .name_to_id
            .iter()
            .map(|(name, id)| (id, name.as_str()))
            .collect();

        let mut finished = TypeMap::new();
        for (type_name, entry) in staging.iter() {
            let mut node = entry.clone();
            let mut expanding = vec![type_name.to_string()];
            Self::substitute_children(&mut node, staging, &id_to_name, &mut expanding);
            finished.insert(type_name, node);
        }
        finished
    }

    fn substitute_children(
        node: &mut StructureNode,
        staging: &TypeMap,
        id_to_name: &HashMap<&NodeId, &str>,
        expanding: &mut Vec<String>,
    ) {
        for child in node.children.iter_mut() {
            let target = id_to_name
                .get(&child.type_definition)
                .and_then(|name| staging.get(name).map(|entry| (*name, entry)));

            match target {
                Some((name, _)) if expanding.iter().any(|n| n == name) => {
                    tracing::trace!(type_name = %name, "Recursive type, not expanded");
                }
                Some((name, entry)) => {
                    child.children = entry.children.clone();
                    child.of_base_data_variable_type = entry.of_base_data_variable_type;
                    expanding.push(name.to_string());
                    Self::substitute_children(child, staging, id_to_name, expanding);
                    expanding.pop();
                }
                None => Self::substitute_children(child, staging, id_to_name, expanding),
            }
        }
    }

    // =========================================================================
    // Namespace information
    // =========================================================================

    /// Derives the machine and identification type names of a namespace.
    ///
    /// The identification type is a type of the namespace derived directly
    /// from the machinery identification type; the machine type is the type
    /// with the companion machine type id derived directly from
    /// BaseObjectType. Missing ones fall back to
    /// `{Namespace}IdentificationType` and `{Namespace}Type`.
    pub fn namespace_information(&self, namespace_uri: &str) -> NamespaceInformation {
        let namespace = namespace_uri
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(namespace_uri)
            .to_string();

        let identification_parent =
            NodeId::new(ids::MACHINERY_NAMESPACE_URI, ids::MACHINE_IDENTIFICATION_TYPE);

        let identification_type = self
            .types_in(namespace_uri)
            .find(|bi| {
                bi.parent
                    .is_some_and(|parent| self.arena[parent].node.node_id == identification_parent)
            })
            .map(|bi| bi.node.browse_name.name.clone())
            .unwrap_or_else(|| format!("{namespace}IdentificationType"));

        let namespace_type = self
            .types_in(namespace_uri)
            .filter(|bi| bi.parent.is_some_and(|parent| self.is_object_root(parent)))
            .find(|bi| bi.node.node_id.id == ids::COMPANION_MACHINE_TYPE)
            .map(|bi| bi.node.browse_name.name.clone())
            .unwrap_or_else(|| format!("{namespace}Type"));

        NamespaceInformation {
            namespace,
            namespace_uri: namespace_uri.to_string(),
            namespace_type,
            identification_type,
        }
    }

    /// Returns `true` for the crawl root started at BaseObjectType.
    fn is_object_root(&self, index: BiNodeId) -> bool {
        let node = &self.arena[index];
        node.parent.is_none() && node.node.node_id.id == format!("i={}", ids::BASE_OBJECT_TYPE)
    }

    fn types_in<'s>(&'s self, namespace_uri: &'s str) -> impl Iterator<Item = &'s StructureBiNode> + 's {
        self.types
            .values()
            .map(move |&id| &self.arena[id])
            .filter(move |bi| bi.namespace_uri() == namespace_uri)
    }

    // =========================================================================
    // Arena construction (tests)
    // =========================================================================

    #[cfg(test)]
    pub(crate) fn insert_for_test(
        &mut self,
        parent: Option<BiNodeId>,
        result: BrowseResult,
        modelling_rule: ModellingRule,
    ) -> BiNodeId {
        match parent {
            Some(parent) => self.register(parent, result, modelling_rule, false),
            None => self.push(
                None,
                StructureNode {
                    node_id: result.node_id,
                    browse_name: result.browse_name,
                    node_class: result.node_class,
                    modelling_rule,
                    ..Default::default()
                },
            ),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
