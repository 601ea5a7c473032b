// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node classes, modelling rules and browse results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::node::{NodeId, QualifiedName};

// =============================================================================
// NodeClass
// =============================================================================

/// The category of a node in the address space.
///
/// The numeric values are the protocol's node class bits, so a set of
/// classes can be OR-ed into a browse filter mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Not reported (the result mask did not request it).
    #[default]
    Unspecified,
    /// Object node.
    Object,
    /// Variable node.
    Variable,
    /// Method node.
    Method,
    /// Object type node.
    ObjectType,
    /// Variable type node.
    VariableType,
    /// Reference type node.
    ReferenceType,
    /// Data type node.
    DataType,
    /// View node.
    View,
}

impl NodeClass {
    /// Returns the protocol bit value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::Unspecified => 0,
            Self::Object => 1,
            Self::Variable => 2,
            Self::Method => 4,
            Self::ObjectType => 8,
            Self::VariableType => 16,
            Self::ReferenceType => 32,
            Self::DataType => 64,
            Self::View => 128,
        }
    }

    /// Creates from the protocol bit value.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Object),
            2 => Some(Self::Variable),
            4 => Some(Self::Method),
            8 => Some(Self::ObjectType),
            16 => Some(Self::VariableType),
            32 => Some(Self::ReferenceType),
            64 => Some(Self::DataType),
            128 => Some(Self::View),
            _ => None,
        }
    }

    /// Returns `true` for `ObjectType` and `VariableType`, the classes that
    /// can be registered in a type map.
    #[inline]
    pub const fn is_type_class(&self) -> bool {
        matches!(self, Self::ObjectType | Self::VariableType)
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::Object => "Object",
            Self::Variable => "Variable",
            Self::Method => "Method",
            Self::ObjectType => "ObjectType",
            Self::VariableType => "VariableType",
            Self::ReferenceType => "ReferenceType",
            Self::DataType => "DataType",
            Self::View => "View",
        }
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u32> for NodeClass {
    type Error = ModelError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or(ModelError::UnknownNodeClass(value))
    }
}

// =============================================================================
// ModellingRule
// =============================================================================

/// Whether an instance must, may, or may as a named slot contain a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModellingRule {
    /// The child must exist on every instance.
    Mandatory,
    /// The child may exist.
    #[default]
    Optional,
    /// One or more children following this template must exist.
    MandatoryPlaceholder,
    /// Any number of children following this template may exist.
    OptionalPlaceholder,
}

impl ModellingRule {
    /// Parses the browse name of one of the four modelling rule objects.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Mandatory" => Some(Self::Mandatory),
            "Optional" => Some(Self::Optional),
            "MandatoryPlaceholder" => Some(Self::MandatoryPlaceholder),
            "OptionalPlaceholder" => Some(Self::OptionalPlaceholder),
            _ => None,
        }
    }

    /// Classifies the browse name of a modelling rule object.
    ///
    /// Unknown names fall back to [`ModellingRule::Optional`].
    pub fn from_browse_name(name: &str) -> Self {
        Self::parse(name).unwrap_or_default()
    }

    /// Returns `true` if a redeclaration in a subtype may replace a child
    /// carrying this rule.
    #[inline]
    pub const fn is_overridable(&self) -> bool {
        matches!(self, Self::Optional | Self::OptionalPlaceholder)
    }

    /// Returns `true` for the placeholder variants.
    #[inline]
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::MandatoryPlaceholder | Self::OptionalPlaceholder)
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mandatory => "Mandatory",
            Self::Optional => "Optional",
            Self::MandatoryPlaceholder => "MandatoryPlaceholder",
            Self::OptionalPlaceholder => "OptionalPlaceholder",
        }
    }
}

impl fmt::Display for ModellingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// BrowseResult
// =============================================================================

/// One discovered reference.
///
/// Fields not requested through the browse result mask keep their default
/// (null id, empty name, [`NodeClass::Unspecified`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseResult {
    /// Target node.
    pub node_id: NodeId,
    /// Class of the target node.
    pub node_class: NodeClass,
    /// Type definition of the target node.
    pub type_definition: NodeId,
    /// Type of the traversed reference.
    pub reference_type: NodeId,
    /// Browse name of the target node.
    pub browse_name: QualifiedName,
}

// =============================================================================
// Tests
// =============================================================================
