// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # umati-model
//!
//! Protocol-neutral model of a machine information address space.
//!
//! Everything in this crate is expressed in terms of namespace URIs rather
//! than the session-local numeric namespace indices a server hands out, so
//! values stay valid across reconnects and can be compared between sessions:
//!
//! - **Identifiers**: [`NodeId`] and [`QualifiedName`], both `(uri, text)` pairs
//! - **Browse output**: [`BrowseResult`], [`NodeClass`]
//! - **Type descriptors**: [`StructureNode`], [`ModellingRule`]
//! - **Type map**: [`TypeMap`], keyed by `"{uri};{browseName}"`
//!
//! ## Example
//!
//! ```
//! use umati_model::{NodeId, QualifiedName};
//!
//! let objects: NodeId = "ns0;i=85".parse().unwrap();
//! assert_eq!(objects.uri, "ns0");
//! assert_eq!(objects.id, "i=85");
//!
//! let name = QualifiedName::new("ns1", "MachineToolType");
//! assert_eq!(name.to_string(), "ns1;MachineToolType");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod node;
pub mod structure;
pub mod types;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::{ModelError, ModelResult};
pub use node::{NodeId, QualifiedName};
pub use structure::{MergeOutcome, StructureNode, TypeMap};
pub use types::{BrowseResult, ModellingRule, NodeClass};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
