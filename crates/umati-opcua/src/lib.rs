// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA address space crawler.
//!
//! This crate connects to an OPC UA server through an abstract
//! [`UaTransport`], crawls the type hierarchy below the base object and base
//! variable types, and flattens every discovered type into a self-contained
//! [`StructureNode`](umati_model::StructureNode) tree stored in a
//! [`TypeMap`](umati_model::TypeMap).
//!
//! # Features
//!
//! - Namespace index/URI translation that survives reordered namespace tables
//! - Paginated browsing with node class and result masks
//! - Memoized, depth-bounded subtype queries
//! - Type inheritance flattening with modelling rule overrides
//! - Browse path resolution
//! - Background reconnection with a full cache rebuild on every connect
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Not connected, no endpoint, connect failures
//! ├── Status        - Bad status code reported by the server
//! ├── Schema        - Unexpected result shape or unknown namespace
//! ├── NotFound      - A lookup matched nothing
//! └── Configuration - Invalid settings
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use umati_opcua::{ClientConfig, ConnectionManager, ConnectionState};
//!
//! let config = ClientConfig::builder()
//!     .endpoint("opc.tcp://localhost:4840")
//!     .expected_type_namespace("http://opcfoundation.org/UA/MachineTool/")
//!     .build()?;
//!
//! let manager = ConnectionManager::new(config, transport)?;
//! manager.start()?;
//! manager.wait_for_state(ConnectionState::Connected, Duration::from_secs(10)).await;
//!
//! for info in manager.namespace_information().await {
//!     let machine = manager
//!         .type_descriptor(&format!("{};{}", info.namespace_uri, info.namespace_type))
//!         .await?;
//!     println!("{} has {} children", info.namespace_type, machine.children.len());
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod browse;
pub mod client;
pub mod error;
pub mod hierarchy;
pub mod namespace;
pub mod path;
pub mod type_map;
pub mod types;

// Re-export commonly used types
pub use browse::{AddressSpaceBrowser, BrowseContext, IdentificationValue, NodeClassMask, ResultMask};
pub use client::{ConnectionManager, ConnectionState, ConnectionStats, UaTransport};
pub use error::{
    ConfigurationError, ConnectionError, ErrorCode, ErrorSeverity, NotFoundError, OpcUaError,
    OpcUaResult, ProtocolStatusError, SchemaError,
};
pub use hierarchy::TypeHierarchyResolver;
pub use namespace::NamespaceCache;
pub use path::BrowsePathResolver;
pub use type_map::{NamespaceInformation, TypeMapBuilder};
pub use types::{
    ids, AttributeId, BrowseDirection, ClientConfig, ClientConfigBuilder, NodeIdentifier,
    SecurityMode, StatusCode, UaNodeId, UaQualifiedName, UserIdentity,
};
