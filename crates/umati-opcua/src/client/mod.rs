// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection handling.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    ConnectionManager                            │
//! │        (reconnect loop, state channel, public operations)       │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │ one tokio::sync::Mutex
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Session                                 │
//! │   (NamespaceCache, TypeHierarchyResolver, TypeMap, registry)    │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       UaTransport                               │
//! │                 (abstract protocol stack)                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod manager;
mod session;
mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use manager::ConnectionManager;
pub use session::{ConnectionState, ConnectionStats, Session};
pub use transport::{
    BrowseDescription, BrowsePath, BrowsePathResult, BrowseResponse, DataValue,
    EndpointDescription, ReadResponse, ReadValueId, ReferenceDescription, RelativePathElement,
    SessionOptions, TranslateResponse, UaTransport, ValueCallback, Variant,
};
