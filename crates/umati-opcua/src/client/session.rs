// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-connection state and the operations that run against it.
//!
//! A [`Session`] bundles the transport with everything derived from one
//! connection: the namespace table, the supertype cache, the type map and its
//! registry. [`ConnectionManager`](super::ConnectionManager) keeps exactly one
//! of these behind its lock.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use umati_model::{BrowseResult, ModellingRule, NodeId, QualifiedName, TypeMap};
use uuid::Uuid;

use crate::browse::{AddressSpaceBrowser, BrowseContext, IdentificationValue};
use crate::client::{EndpointDescription, SessionOptions, UaTransport, ValueCallback};
use crate::error::{ConnectionError, NotFoundError, OpcUaResult};
use crate::hierarchy::TypeHierarchyResolver;
use crate::namespace::NamespaceCache;
use crate::path::BrowsePathResolver;
use crate::type_map::{NamespaceInformation, TypeMapBuilder};
use crate::types::{ids, ClientConfig};

// =============================================================================
// ConnectionState
// =============================================================================

/// State of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session. The reconnect loop will try again.
    #[default]
    Disconnected,

    /// A connection attempt and the following rebuild are in progress.
    Connecting,

    /// Session established and caches rebuilt.
    Connected,

    /// Terminal. Entered once by shutdown.
    ShuttingDown,
}

impl ConnectionState {
    /// Returns `true` if operations may run.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` for the terminal state.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ShuttingDown)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::ShuttingDown => "ShuttingDown",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// ConnectionStats
// =============================================================================

/// Counters for connection activity.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rebuilds: AtomicU64,
    faults: AtomicU64,
    last_connected: Mutex<Option<DateTime<Utc>>>,
}

impl ConnectionStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the start of a connection attempt.
    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an established connection.
    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        *self.last_connected.lock() = Some(Utc::now());
    }

    /// Records a failed attempt.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed type map rebuild.
    pub fn record_rebuild(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a lost connection.
    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of connection attempts.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Returns the number of established connections.
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Returns the number of failed attempts.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Returns the number of type map rebuilds.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    /// Returns the number of detected connection losses.
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Returns when the last connection was established.
    pub fn last_connected(&self) -> Option<DateTime<Utc>> {
        *self.last_connected.lock()
    }
}

// =============================================================================
// Session
// =============================================================================

struct SubscriptionRecord {
    id: Uuid,
    node: NodeId,
    callback: ValueCallback,
    monitored_item: Option<u32>,
}

/// Transport plus the caches derived from the current connection.
pub struct Session<T: UaTransport> {
    transport: T,
    namespaces: NamespaceCache,
    hierarchy: TypeHierarchyResolver,
    type_map: TypeMap,
    registry: BTreeMap<String, NodeId>,
    namespace_infos: Vec<NamespaceInformation>,
    subscriptions: Vec<SubscriptionRecord>,
    max_pages: usize,
}

impl<T: UaTransport> Session<T> {
    /// Wraps a transport. Nothing is read until [`rebuild`](Self::rebuild).
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        Self {
            transport,
            namespaces: NamespaceCache::new(),
            hierarchy: TypeHierarchyResolver::new(config.max_type_depth),
            type_map: TypeMap::new(),
            registry: BTreeMap::new(),
            namespace_infos: Vec::new(),
            subscriptions: Vec::new(),
            max_pages: config.max_continuation_pages,
        }
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns `true` if the transport reports a live session.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Returns the namespace table.
    pub fn namespaces(&self) -> &NamespaceCache {
        &self.namespaces
    }

    /// Returns the finalized type map.
    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    /// Returns the qualified type name to node id registry.
    pub fn registry(&self) -> &BTreeMap<String, NodeId> {
        &self.registry
    }

    /// Returns the information of every namespace a type map was built for.
    pub fn namespace_information(&self) -> &[NamespaceInformation] {
        &self.namespace_infos
    }

    fn browser(&self) -> AddressSpaceBrowser<'_, T> {
        AddressSpaceBrowser::new(&self.transport, &self.namespaces, self.max_pages)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub(crate) async fn open(
        &mut self,
        config: &ClientConfig,
    ) -> OpcUaResult<EndpointDescription> {
        let endpoints = self.transport.get_endpoints(&config.endpoint).await?;
        let endpoint = endpoints
            .into_iter()
            .find(|e| e.security_mode == config.security_mode)
            .ok_or_else(|| ConnectionError::no_suitable_endpoint(config.security_mode.name()))?;

        tracing::debug!(
            endpoint = %endpoint.url,
            security_mode = %endpoint.security_mode,
            policy = %endpoint.security_policy_uri,
            "Selected endpoint"
        );
        self.transport
            .connect(&endpoint, &SessionOptions::from_config(config))
            .await?;
        Ok(endpoint)
    }

    pub(crate) async fn close(&mut self) -> OpcUaResult<()> {
        self.forget_monitored_items();
        if self.transport.is_connected() {
            self.transport.disconnect().await?;
        }
        Ok(())
    }

    /// Marks every subscription as needing a re-arm.
    pub(crate) fn forget_monitored_items(&mut self) {
        for record in &mut self.subscriptions {
            record.monitored_item = None;
        }
    }

    /// Re-reads the namespace table and rebuilds the type map from scratch.
    ///
    /// The supertype cache is emptied first. On success the new map replaces
    /// the old one and the number of types is returned; on failure the
    /// previous map stays in place.
    pub async fn rebuild(&mut self, config: &ClientConfig) -> OpcUaResult<usize> {
        self.namespaces.refresh(&self.transport).await?;
        self.hierarchy.clear();

        let browser = AddressSpaceBrowser::new(&self.transport, &self.namespaces, self.max_pages);
        let mut builder = TypeMapBuilder::new(config.max_crawl_depth);
        builder
            .discover(&browser, &ids::standard(ids::BASE_DATA_VARIABLE_TYPE), true)
            .await?;
        builder
            .discover(&browser, &ids::standard(ids::BASE_OBJECT_TYPE), false)
            .await?;

        let targets: Vec<String> = if config.expected_type_namespaces.is_empty() {
            builder.type_namespaces().into_iter().collect()
        } else {
            let known = self.namespaces.namespaces();
            config
                .expected_type_namespaces
                .iter()
                .filter(|uri| {
                    let present = known.contains(uri);
                    if !present {
                        tracing::warn!(namespace = %uri, "Expected namespace not found on server");
                    }
                    present
                })
                .cloned()
                .collect()
        };

        let mut staging = TypeMap::new();
        let mut infos = Vec::with_capacity(targets.len());
        for uri in &targets {
            let inserted = builder.build(uri, &mut staging);
            tracing::debug!(namespace = %uri, types = inserted, "Namespace types flattened");
            infos.push(builder.namespace_information(uri));
        }
        let type_map = builder.substitute(&staging);

        tracing::info!(
            types = type_map.len(),
            namespaces = targets.len(),
            "Type map rebuilt"
        );
        self.type_map = type_map;
        self.registry = builder.registry().clone();
        self.namespace_infos = infos;
        Ok(self.type_map.len())
    }

    /// Registers every recorded subscription with the transport again.
    ///
    /// Returns the number of subscriptions that are armed afterwards.
    pub async fn rearm_subscriptions(&mut self) -> usize {
        let mut armed = 0;
        for record in &mut self.subscriptions {
            if record.monitored_item.is_some() {
                armed += 1;
                continue;
            }
            let node = match self.namespaces.encode(&record.node) {
                Ok(node) => node,
                Err(e) => {
                    tracing::warn!(node = %record.node, error = %e, "Cannot re-arm subscription");
                    continue;
                }
            };
            match self.transport.subscribe(&node, record.callback.clone()).await {
                Ok(item) => {
                    record.monitored_item = Some(item);
                    armed += 1;
                }
                Err(e) => {
                    tracing::warn!(node = %record.node, error = %e, "Subscription re-arm failed");
                }
            }
        }
        if !self.subscriptions.is_empty() {
            tracing::debug!(armed, total = self.subscriptions.len(), "Subscriptions re-armed");
        }
        armed
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// See [`AddressSpaceBrowser::browse`].
    pub async fn browse(&self, start: &NodeId, context: &BrowseContext) -> OpcUaResult<Vec<BrowseResult>> {
        self.browser().browse(start, context).await
    }

    /// See [`AddressSpaceBrowser::browse_with_type_filter`].
    pub async fn browse_with_type_filter(
        &mut self,
        start: &NodeId,
        context: &BrowseContext,
        type_definition: &NodeId,
    ) -> OpcUaResult<Vec<BrowseResult>> {
        let browser = AddressSpaceBrowser::new(&self.transport, &self.namespaces, self.max_pages);
        browser
            .browse_with_type_filter(start, context, type_definition, &mut self.hierarchy)
            .await
    }

    /// See [`TypeHierarchyResolver::is_same_or_subtype`].
    pub async fn is_same_or_subtype(&mut self, expected: &NodeId, candidate: &NodeId) -> OpcUaResult<bool> {
        let browser = AddressSpaceBrowser::new(&self.transport, &self.namespaces, self.max_pages);
        self.hierarchy
            .is_same_or_subtype(&browser, expected, candidate)
            .await
    }

    /// See [`BrowsePathResolver::resolve`].
    pub async fn resolve_path(&self, start: &NodeId, browse_name: &QualifiedName) -> OpcUaResult<NodeId> {
        BrowsePathResolver::new(&self.transport, &self.namespaces)
            .resolve(start, browse_name)
            .await
    }

    /// See [`AddressSpaceBrowser::read_browse_name`].
    pub async fn read_browse_name(&self, node: &NodeId) -> OpcUaResult<String> {
        self.browser().read_browse_name(node).await
    }

    /// See [`AddressSpaceBrowser::read_node_values`].
    pub async fn read_node_values(&self, nodes: &[NodeId]) -> OpcUaResult<Vec<serde_json::Value>> {
        self.browser().read_node_values(nodes).await
    }

    /// See [`AddressSpaceBrowser::browse_modelling_rule`].
    pub async fn browse_modelling_rule(&self, node: &NodeId) -> OpcUaResult<ModellingRule> {
        self.browser().browse_modelling_rule(node).await
    }

    /// See [`AddressSpaceBrowser::type_definition`].
    pub async fn type_definition(&self, node: &NodeId) -> OpcUaResult<NodeId> {
        self.browser().type_definition(node).await
    }

    /// See [`AddressSpaceBrowser::implemented_namespace`].
    pub async fn implemented_namespace(&self, machine: &NodeId) -> OpcUaResult<String> {
        self.browser().implemented_namespace(machine).await
    }

    /// See [`AddressSpaceBrowser::machines_under`].
    pub async fn machines_under(&self, start: &NodeId) -> OpcUaResult<Vec<BrowseResult>> {
        self.browser().machines_under(start).await
    }

    /// See [`AddressSpaceBrowser::identification_values`].
    pub async fn identification_values(
        &self,
        identification: &NodeId,
    ) -> OpcUaResult<Vec<IdentificationValue>> {
        self.browser().identification_values(identification).await
    }

    /// Subscribes to value changes of a node and remembers the request so it
    /// survives reconnects.
    pub async fn subscribe(&mut self, node: &NodeId, callback: ValueCallback) -> OpcUaResult<Uuid> {
        let wire = self.namespaces.encode(node)?;
        let item = self.transport.subscribe(&wire, callback.clone()).await?;
        let id = Uuid::new_v4();
        self.subscriptions.push(SubscriptionRecord {
            id,
            node: node.clone(),
            callback,
            monitored_item: Some(item),
        });
        tracing::debug!(node = %node, subscription = %id, "Subscribed");
        Ok(id)
    }

    /// Removes a subscription.
    pub async fn unsubscribe(&mut self, id: Uuid) -> OpcUaResult<()> {
        let index = self
            .subscriptions
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| NotFoundError::Subscription { id: id.to_string() })?;
        let record = self.subscriptions.remove(index);
        if let Some(item) = record.monitored_item {
            self.transport.unsubscribe(item).await?;
        }
        Ok(())
    }

    /// Returns the number of recorded subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl<T: UaTransport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.transport.is_connected())
            .field("namespaces", &self.namespaces.len())
            .field("types", &self.type_map.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockTransport;
    use crate::types::{AttributeId, UaNodeId};

    fn config() -> ClientConfig {
        ClientConfig::new("opc.tcp://localhost:4840")
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert!(ConnectionState::ShuttingDown.is_terminal());
        assert!(!ConnectionState::Connecting.is_connected());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&ConnectionState::ShuttingDown).unwrap();
        assert_eq!(json, "\"shutting_down\"");
    }

    #[test]
    fn test_stats() {
        let stats = ConnectionStats::new();
        assert!(stats.last_connected().is_none());

        stats.record_attempt();
        stats.record_success();
        stats.record_attempt();
        stats.record_failure();

        assert_eq!(stats.attempts(), 2);
        assert_eq!(stats.successes(), 1);
        assert_eq!(stats.failures(), 1);
        assert!(stats.last_connected().is_some());
    }

    #[tokio::test]
    async fn test_rebuild_reads_namespaces() {
        let mut session = Session::new(MockTransport::new(), &config());
        let count = session.rebuild(&config()).await.unwrap();

        assert_eq!(count, 0);
        assert_eq!(session.namespaces().namespaces(), vec!["ns0", "ns1"]);
    }

    #[tokio::test]
    async fn test_rebuild_warns_on_missing_expected_namespace() {
        let config = ClientConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .expected_type_namespace("ns1")
            .expected_type_namespace("urn:absent")
            .build()
            .unwrap();
        let mut session = Session::new(MockTransport::new(), &config);
        session.rebuild(&config).await.unwrap();

        assert_eq!(session.namespace_information().len(), 1);
        assert_eq!(session.namespace_information()[0].namespace_uri, "ns1");
    }

    #[tokio::test]
    async fn test_subscriptions() {
        let mut session = Session::new(MockTransport::new(), &config());
        session.rebuild(&config()).await.unwrap();

        let callback: ValueCallback = std::sync::Arc::new(|_| {});
        let id = session
            .subscribe(&NodeId::new("ns1", "i=7"), callback)
            .await
            .unwrap();
        assert_eq!(session.subscription_count(), 1);

        session.forget_monitored_items();
        assert_eq!(session.rearm_subscriptions().await, 1);

        session.unsubscribe(id).await.unwrap();
        assert_eq!(session.subscription_count(), 0);
        assert!(session.unsubscribe(id).await.is_err());
    }

    #[tokio::test]
    async fn test_browse_name_uses_namespace_uri() {
        let mut transport = MockTransport::new();
        transport.set_attribute(
            UaNodeId::numeric(1, 7),
            AttributeId::BrowseName,
            crate::client::Variant::QualifiedName(crate::types::UaQualifiedName::new(1, "Identification")),
        );
        let mut session = Session::new(transport, &config());
        session.rebuild(&config()).await.unwrap();

        let name = session.read_browse_name(&NodeId::new("ns1", "i=7")).await.unwrap();
        assert_eq!(name, "ns1;Identification");
    }
}
