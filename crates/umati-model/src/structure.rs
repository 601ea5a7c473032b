// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Finalized type descriptors and the type map that owns them.
//!
//! A [`StructureNode`] is a fully owned tree: each child is stored by value,
//! so a descriptor taken out of the [`TypeMap`] can be inspected without any
//! further lookups.

use std::collections::btree_map::{self, BTreeMap};

use serde::{Deserialize, Serialize};

use crate::node::{NodeId, QualifiedName};
use crate::types::{ModellingRule, NodeClass};

// =============================================================================
// StructureNode
// =============================================================================

/// A finalized type descriptor or one of its declared children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureNode {
    /// The declaring node.
    pub node_id: NodeId,
    /// Browse name of the declaring node.
    pub browse_name: QualifiedName,
    /// Type definition of the declaring node (null for type nodes).
    pub type_definition: NodeId,
    /// Class of the declaring node.
    pub node_class: NodeClass,
    /// Modelling rule attached to the declaration.
    pub modelling_rule: ModellingRule,
    /// `true` if the type ultimately derives from the base data variable type.
    pub of_base_data_variable_type: bool,
    /// Declared children in insertion order.
    pub children: Vec<StructureNode>,
}

/// What [`StructureNode::merge_child`] did with a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No child with the same browse name existed; it was appended.
    Appended,
    /// An optional child with the same browse name was replaced.
    Replaced,
    /// A mandatory child with the same browse name was kept.
    Kept,
}

impl StructureNode {
    /// Returns the direct child with the given browse name.
    pub fn child(&self, browse_name: &QualifiedName) -> Option<&StructureNode> {
        self.children.iter().find(|c| &c.browse_name == browse_name)
    }

    /// Returns the first direct child whose browse name has the given name,
    /// regardless of namespace.
    pub fn child_by_name(&self, name: &str) -> Option<&StructureNode> {
        self.children.iter().find(|c| c.browse_name.name == name)
    }

    /// Merges one inherited or redeclared child into this node.
    ///
    /// Children are keyed by browse name. A redeclaration replaces an
    /// existing `Optional`/`OptionalPlaceholder` child and moves it to the end;
    /// `Mandatory`/`MandatoryPlaceholder` children are never replaced.
    pub fn merge_child(&mut self, child: StructureNode) -> MergeOutcome {
        let existing = self
            .children
            .iter()
            .position(|c| *c == child || c.browse_name == child.browse_name);

        match existing {
            None => {
                self.children.push(child);
                MergeOutcome::Appended
            }
            Some(index) if self.children[index].modelling_rule.is_overridable() => {
                self.children.remove(index);
                self.children.push(child);
                MergeOutcome::Replaced
            }
            Some(_) => MergeOutcome::Kept,
        }
    }

    /// Returns the number of nodes in this tree, including itself.
    pub fn tree_size(&self) -> usize {
        1 + self.children.iter().map(StructureNode::tree_size).sum::<usize>()
    }
}

// =============================================================================
// TypeMap
// =============================================================================

/// Qualified type name to finalized type descriptor.
///
/// Keys have the form `"{uri};{browseName}"`. Each key is written at most
/// once; later inserts for the same key are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeMap {
    entries: BTreeMap<String, StructureNode>,
}

impl TypeMap {
    /// Creates an empty type map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a descriptor. Returns `false` and leaves the map unchanged if
    /// the key is already present.
    pub fn insert(&mut self, type_name: impl Into<String>, node: StructureNode) -> bool {
        match self.entries.entry(type_name.into()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(node);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Returns the descriptor for a qualified type name.
    pub fn get(&self, type_name: &str) -> Option<&StructureNode> {
        self.entries.get(type_name)
    }

    /// Returns `true` if the map holds the given type name.
    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries ordered by type name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StructureNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates type names in order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
