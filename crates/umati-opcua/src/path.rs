// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Browse path translation.

use umati_model::{NodeId, QualifiedName};

use crate::client::{BrowsePath, RelativePathElement, UaTransport};
use crate::error::{NotFoundError, OpcUaError, OpcUaResult, SchemaError};
use crate::namespace::NamespaceCache;
use crate::types::{ids, StatusCode, UaNodeId};

/// Resolves a child of a node by browse name through the server's
/// path translation service.
pub struct BrowsePathResolver<'a, T: UaTransport + ?Sized> {
    transport: &'a T,
    namespaces: &'a NamespaceCache,
}

impl<'a, T: UaTransport + ?Sized> BrowsePathResolver<'a, T> {
    /// Creates a resolver over one session.
    pub fn new(transport: &'a T, namespaces: &'a NamespaceCache) -> Self {
        Self {
            transport,
            namespaces,
        }
    }

    /// Follows one hierarchical hop from `start` to the child named
    /// `browse_name`.
    ///
    /// A server answering with several targets is ambiguous; the first one
    /// is used and every candidate is logged.
    pub async fn resolve(&self, start: &NodeId, browse_name: &QualifiedName) -> OpcUaResult<NodeId> {
        if start.is_null() {
            return Err(SchemaError::NullArgument { argument: "start" }.into());
        }
        if browse_name.is_null() {
            return Err(SchemaError::NullArgument {
                argument: "browse_name",
            }
            .into());
        }

        let path = BrowsePath {
            start: self.namespaces.encode(start)?,
            elements: vec![RelativePathElement {
                reference_type: UaNodeId::numeric(0, ids::HIERARCHICAL_REFERENCES),
                is_inverse: false,
                include_subtypes: true,
                target_name: self.namespaces.encode_name(browse_name)?,
            }],
        };

        let response = self.transport.translate_browse_path(&path).await?;
        if response.status.is_bad() {
            tracing::error!(start = %start, status = %response.status, "Translate failed");
            return Err(OpcUaError::bad_status("TranslateBrowsePath", start, response.status));
        }

        let mut results = response.results;
        if results.len() != 1 {
            return Err(
                SchemaError::unexpected_result_count("TranslateBrowsePath", 1, results.len()).into(),
            );
        }
        let result = results.remove(0);

        if result.status == StatusCode::BAD_NO_MATCH {
            return Err(NotFoundError::no_target(start, browse_name).into());
        }
        if result.status.is_bad() {
            tracing::warn!(start = %start, name = %browse_name, status = %result.status, "Bad path status");
            return Err(OpcUaError::bad_status("TranslateBrowsePath", start, result.status));
        }

        let mut targets = result.targets.into_iter();
        let Some(first) = targets.next() else {
            return Err(NotFoundError::no_target(start, browse_name).into());
        };

        let rest: Vec<UaNodeId> = targets.collect();
        if !rest.is_empty() {
            tracing::warn!(
                start = %start,
                name = %browse_name,
                count = rest.len() + 1,
                "Path is ambiguous, using the first target"
            );
            for candidate in std::iter::once(&first).chain(rest.iter()) {
                tracing::warn!(candidate = %candidate, "Path candidate");
            }
        }

        self.namespaces.decode(&first)
    }

    /// Follows several hops, one browse name per hop.
    pub async fn resolve_all(&self, start: &NodeId, names: &[QualifiedName]) -> OpcUaResult<NodeId> {
        let mut current = start.clone();
        for name in names {
            current = self.resolve(&current, name).await?;
        }
        Ok(current)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockTransport;
    use crate::client::BrowsePathResult;
    use crate::types::UaQualifiedName;

    fn start() -> NodeId {
        NodeId::new("ns1", "i=1")
    }

    fn name(name: &str) -> QualifiedName {
        QualifiedName::new("ns1", name)
    }

    fn translation(transport: &mut MockTransport, status: StatusCode, targets: Vec<UaNodeId>) {
        transport.set_translation(
            UaNodeId::numeric(1, 1),
            UaQualifiedName::new(1, "Identification"),
            BrowsePathResult { status, targets },
        );
    }

    #[tokio::test]
    async fn test_resolve_single_target() {
        let mut transport = MockTransport::new();
        translation(&mut transport, StatusCode::GOOD, vec![UaNodeId::numeric(1, 7)]);
        let namespaces = transport.namespace_cache();
        let resolver = BrowsePathResolver::new(&transport, &namespaces);

        let target = resolver.resolve(&start(), &name("Identification")).await.unwrap();
        assert_eq!(target, NodeId::new("ns1", "i=7"));
    }

    #[tokio::test]
    async fn test_resolve_ambiguous_takes_first() {
        let mut transport = MockTransport::new();
        translation(
            &mut transport,
            StatusCode::GOOD,
            vec![UaNodeId::numeric(1, 7), UaNodeId::numeric(1, 8)],
        );
        let namespaces = transport.namespace_cache();
        let resolver = BrowsePathResolver::new(&transport, &namespaces);

        let target = resolver.resolve(&start(), &name("Identification")).await.unwrap();
        assert_eq!(target, NodeId::new("ns1", "i=7"));
    }

    #[tokio::test]
    async fn test_resolve_no_match() {
        let transport = MockTransport::new();
        let namespaces = transport.namespace_cache();
        let resolver = BrowsePathResolver::new(&transport, &namespaces);

        let err = resolver.resolve(&start(), &name("Missing")).await.unwrap_err();
        assert!(matches!(err, OpcUaError::NotFound(NotFoundError::NoTarget { .. })));
    }

    #[tokio::test]
    async fn test_resolve_empty_targets() {
        let mut transport = MockTransport::new();
        translation(&mut transport, StatusCode::GOOD, Vec::new());
        let namespaces = transport.namespace_cache();
        let resolver = BrowsePathResolver::new(&transport, &namespaces);

        let err = resolver.resolve(&start(), &name("Identification")).await.unwrap_err();
        assert!(matches!(err, OpcUaError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resolve_bad_element_status() {
        let mut transport = MockTransport::new();
        translation(&mut transport, StatusCode::BAD_TOO_MANY_MATCHES, Vec::new());
        let namespaces = transport.namespace_cache();
        let resolver = BrowsePathResolver::new(&transport, &namespaces);

        let err = resolver.resolve(&start(), &name("Identification")).await.unwrap_err();
        assert_eq!(err.status_code(), Some(StatusCode::BAD_TOO_MANY_MATCHES));
    }

    #[tokio::test]
    async fn test_resolve_null_arguments() {
        let transport = MockTransport::new();
        let namespaces = transport.namespace_cache();
        let resolver = BrowsePathResolver::new(&transport, &namespaces);

        let err = resolver.resolve(&NodeId::null(), &name("X")).await.unwrap_err();
        assert!(matches!(
            err,
            OpcUaError::Schema(SchemaError::NullArgument { argument: "start" })
        ));

        let err = resolver
            .resolve(&start(), &QualifiedName::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OpcUaError::Schema(SchemaError::NullArgument {
                argument: "browse_name"
            })
        ));
    }

    #[tokio::test]
    async fn test_resolve_all() {
        let mut transport = MockTransport::new();
        translation(&mut transport, StatusCode::GOOD, vec![UaNodeId::numeric(1, 7)]);
        transport.set_translation(
            UaNodeId::numeric(1, 7),
            UaQualifiedName::new(1, "SerialNumber"),
            BrowsePathResult {
                status: StatusCode::GOOD,
                targets: vec![UaNodeId::numeric(1, 9)],
            },
        );
        let namespaces = transport.namespace_cache();
        let resolver = BrowsePathResolver::new(&transport, &namespaces);

        let target = resolver
            .resolve_all(&start(), &[name("Identification"), name("SerialNumber")])
            .await
            .unwrap();
        assert_eq!(target, NodeId::new("ns1", "i=9"));
    }
}
