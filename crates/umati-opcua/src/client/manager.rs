// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection lifecycle and the public operation surface.
//!
//! ```text
//!                 connect ok + rebuild
//!  Disconnected ───────────────────────▶ Connected
//!       ▲   │                               │
//!       │   └──▶ Connecting ──(fails)──┐    │ transport fault
//!       │                              │    │
//!       └──────────────────────────────┴────┘
//!
//!  any state ──shutdown()──▶ ShuttingDown (terminal)
//! ```
//!
//! The session lives behind one `tokio::sync::Mutex`. The reconnect task
//! holds it for the whole connect, rebuild and publish sequence, so a caller
//! that observes `Connected` also observes the rebuilt caches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, MutexGuard, Notify};
use tokio::task::JoinHandle;
use umati_model::{BrowseResult, ModellingRule, NodeId, QualifiedName, StructureNode, TypeMap};
use uuid::Uuid;

use crate::browse::{BrowseContext, IdentificationValue};
use crate::client::session::{ConnectionState, ConnectionStats, Session};
use crate::client::{UaTransport, ValueCallback};
use crate::error::{ConnectionError, NotFoundError, OpcUaError, OpcUaResult};
use crate::type_map::NamespaceInformation;
use crate::types::ClientConfig;

struct Shared<T: UaTransport> {
    config: ClientConfig,
    session: tokio::sync::Mutex<Session<T>>,
    state: watch::Sender<ConnectionState>,
    stopped: AtomicBool,
    wake: Notify,
    stats: ConnectionStats,
}

impl<T: UaTransport> Shared<T> {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Publishes a state change. `ShuttingDown` is never left.
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            tracing::debug!(from = %current, to = %next, "Connection state changed");
            *current = next;
            true
        });
    }

    /// Runs one pass of the state machine: detects a lost session, or tries
    /// to establish one when disconnected.
    async fn connect_once(&self) -> OpcUaResult<()> {
        let mut session = self.session.lock().await;

        if self.stopped.load(Ordering::SeqCst) {
            return Err(ConnectionError::ShuttingDown.into());
        }

        if self.state() == ConnectionState::Connected {
            if session.is_connected() {
                return Ok(());
            }
            tracing::warn!(endpoint = %self.config.endpoint, "Connection lost");
            self.stats.record_fault();
            session.forget_monitored_items();
            self.set_state(ConnectionState::Disconnected);
        }

        self.set_state(ConnectionState::Connecting);
        self.stats.record_attempt();

        match self.establish(&mut session).await {
            Ok(types) => {
                self.stats.record_success();
                self.set_state(ConnectionState::Connected);
                tracing::info!(endpoint = %self.config.endpoint, types, "Connected");
                Ok(())
            }
            Err(e) => {
                self.stats.record_failure();
                if let Err(close) = session.close().await {
                    tracing::debug!(error = %close, "Disconnect after failed attempt");
                }
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn establish(&self, session: &mut Session<T>) -> OpcUaResult<usize> {
        session.open(&self.config).await?;
        let types = session.rebuild(&self.config).await?;
        self.stats.record_rebuild();
        session.rearm_subscriptions().await;
        Ok(types)
    }

    async fn run(self: Arc<Self>) {
        tracing::info!(
            endpoint = %self.config.endpoint,
            interval = %humantime::format_duration(self.config.reconnect_interval),
            "Reconnect loop started"
        );

        while !self.stopped.load(Ordering::SeqCst) {
            let delay = match self.connect_once().await {
                Ok(()) => self.config.reconnect_interval,
                Err(e) => {
                    if !self.stopped.load(Ordering::SeqCst) {
                        e.log("connect");
                    }
                    self.config.retry_delay
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.wake.notified() => {}
            }
        }

        tracing::info!("Reconnect loop stopped");
    }
}

// =============================================================================
// ConnectionManager
// =============================================================================

/// Owns one transport, keeps it connected, and exposes the crawl operations.
///
/// # Example
///
/// ```ignore
/// let manager = ConnectionManager::new(config, transport)?;
/// manager.start()?;
/// manager.wait_for_state(ConnectionState::Connected, Duration::from_secs(5)).await;
///
/// let machine = manager.type_descriptor("http://example.com/MachineTool/;MachineToolType").await?;
/// manager.shutdown().await?;
/// ```
pub struct ConnectionManager<T: UaTransport + 'static> {
    shared: Arc<Shared<T>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: UaTransport + 'static> ConnectionManager<T> {
    /// Creates a manager. The configuration is validated; nothing connects
    /// until [`start`](Self::start) or [`connect`](Self::connect).
    pub fn new(config: ClientConfig, transport: T) -> OpcUaResult<Self> {
        config.validate()?;
        let session = Session::new(transport, &config);
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                session: tokio::sync::Mutex::new(session),
                state,
                stopped: AtomicBool::new(false),
                wake: Notify::new(),
                stats: ConnectionStats::new(),
            }),
            task: Mutex::new(None),
        })
    }

    /// Spawns the reconnect loop. Calling it again while running is a no-op.
    pub fn start(&self) -> OpcUaResult<()> {
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(ConnectionError::ShuttingDown.into());
        }
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }
        *task = Some(tokio::spawn(self.shared.clone().run()));
        Ok(())
    }

    /// Runs one connection attempt on the calling task.
    pub async fn connect(&self) -> OpcUaResult<()> {
        self.shared.connect_once().await
    }

    /// Stops the reconnect loop, waits for it, and closes the session.
    ///
    /// Only the first call does anything.
    pub async fn shutdown(&self) -> OpcUaResult<()> {
        if self
            .shared
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        tracing::info!(endpoint = %self.shared.config.endpoint, "Shutting down");
        self.shared.state.send_replace(ConnectionState::ShuttingDown);
        self.shared.wake.notify_one();

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Reconnect task ended abnormally");
            }
        }

        self.shared.session.lock().await.close().await
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Returns a receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Waits until the state equals `state`. Returns `false` on timeout.
    pub async fn wait_for_state(&self, state: ConnectionState, timeout: Duration) -> bool {
        let mut receiver = self.shared.state.subscribe();
        tokio::time::timeout(timeout, receiver.wait_for(|current| *current == state))
            .await
            .map(|reached| reached.is_ok())
            .unwrap_or(false)
    }

    /// Returns the connection statistics.
    pub fn stats(&self) -> &ConnectionStats {
        &self.shared.stats
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Locks the session if it is usable.
    async fn session(&self) -> OpcUaResult<MutexGuard<'_, Session<T>>> {
        let session = self.shared.session.lock().await;
        match self.shared.state() {
            ConnectionState::Connected if session.is_connected() => Ok(session),
            ConnectionState::Connected => {
                self.shared.wake.notify_one();
                Err(OpcUaError::not_connected())
            }
            ConnectionState::ShuttingDown => Err(ConnectionError::ShuttingDown.into()),
            _ => Err(OpcUaError::not_connected()),
        }
    }

    /// Wakes the reconnect loop early when an operation hit a connection error.
    fn observe<R>(&self, result: OpcUaResult<R>) -> OpcUaResult<R> {
        if let Err(e) = &result {
            if e.is_connection() {
                self.shared.wake.notify_one();
            }
        }
        result
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Browses one hop from `start`.
    pub async fn browse(&self, start: &NodeId, context: &BrowseContext) -> OpcUaResult<Vec<BrowseResult>> {
        let session = self.session().await?;
        self.observe(session.browse(start, context).await)
    }

    /// Browses one hop, keeping results typed as `type_definition` or a subtype.
    pub async fn browse_with_type_filter(
        &self,
        start: &NodeId,
        context: &BrowseContext,
        type_definition: &NodeId,
    ) -> OpcUaResult<Vec<BrowseResult>> {
        let mut session = self.session().await?;
        let result = session
            .browse_with_type_filter(start, context, type_definition)
            .await;
        self.observe(result)
    }

    /// Resolves the child of `start` named `browse_name`.
    pub async fn resolve_path(&self, start: &NodeId, browse_name: &QualifiedName) -> OpcUaResult<NodeId> {
        let session = self.session().await?;
        self.observe(session.resolve_path(start, browse_name).await)
    }

    /// Reads a browse name as `"{uri};{name}"`.
    pub async fn read_browse_name(&self, node: &NodeId) -> OpcUaResult<String> {
        let session = self.session().await?;
        self.observe(session.read_browse_name(node).await)
    }

    /// Reads node values as JSON.
    pub async fn read_node_values(&self, nodes: &[NodeId]) -> OpcUaResult<Vec<serde_json::Value>> {
        let session = self.session().await?;
        self.observe(session.read_node_values(nodes).await)
    }

    /// Returns the modelling rule of a node.
    pub async fn browse_modelling_rule(&self, node: &NodeId) -> OpcUaResult<ModellingRule> {
        let session = self.session().await?;
        self.observe(session.browse_modelling_rule(node).await)
    }

    /// Returns the type definition of a node.
    pub async fn type_definition(&self, node: &NodeId) -> OpcUaResult<NodeId> {
        let session = self.session().await?;
        self.observe(session.type_definition(node).await)
    }

    /// Returns `true` if `candidate` is `expected` or one of its subtypes.
    pub async fn is_same_or_subtype(&self, expected: &NodeId, candidate: &NodeId) -> OpcUaResult<bool> {
        let mut session = self.session().await?;
        let result = session.is_same_or_subtype(expected, candidate).await;
        self.observe(result)
    }

    /// Returns the namespace table of the current session in index order.
    ///
    /// Indices are session-local, so this fails while not connected.
    pub async fn namespaces(&self) -> OpcUaResult<Vec<String>> {
        let session = self.session().await?;
        Ok(session.namespaces().namespaces())
    }

    /// Returns the namespace URI of the type a machine instance implements.
    pub async fn implemented_namespace(&self, machine: &NodeId) -> OpcUaResult<String> {
        let session = self.session().await?;
        self.observe(session.implemented_namespace(machine).await)
    }

    /// Lists the machine candidates directly below `start`.
    pub async fn machines_under(&self, start: &NodeId) -> OpcUaResult<Vec<BrowseResult>> {
        let session = self.session().await?;
        self.observe(session.machines_under(start).await)
    }

    /// Lists the value keys and nodes below a machine's identification object.
    pub async fn identification_values(
        &self,
        identification: &NodeId,
    ) -> OpcUaResult<Vec<IdentificationValue>> {
        let session = self.session().await?;
        self.observe(session.identification_values(identification).await)
    }

    // =========================================================================
    // Type map lookups
    //
    // Keys and node ids carry namespace URIs, not indices, so the map of the
    // last rebuild stays readable while the connection is down.
    // =========================================================================

    /// Returns a copy of the type map of the last rebuild.
    pub async fn type_map(&self) -> TypeMap {
        self.shared.session.lock().await.type_map().clone()
    }

    /// Returns the finalized descriptor of one type.
    pub async fn type_descriptor(&self, type_name: &str) -> OpcUaResult<StructureNode> {
        self.shared
            .session
            .lock()
            .await
            .type_map()
            .get(type_name)
            .cloned()
            .ok_or_else(|| NotFoundError::type_name(type_name).into())
    }

    /// Returns the node that defines a type.
    pub async fn type_node_id(&self, type_name: &str) -> OpcUaResult<NodeId> {
        self.shared
            .session
            .lock()
            .await
            .registry()
            .get(type_name)
            .cloned()
            .ok_or_else(|| NotFoundError::type_name(type_name).into())
    }

    /// Returns the machine and identification type names of every namespace
    /// with a type map.
    pub async fn namespace_information(&self) -> Vec<NamespaceInformation> {
        self.shared
            .session
            .lock()
            .await
            .namespace_information()
            .to_vec()
    }

    /// Subscribes to value changes. The subscription is re-armed after every
    /// reconnect.
    pub async fn subscribe(&self, node: &NodeId, callback: ValueCallback) -> OpcUaResult<Uuid> {
        let mut session = self.session().await?;
        let result = session.subscribe(node, callback).await;
        self.observe(result)
    }

    /// Removes a subscription.
    pub async fn unsubscribe(&self, id: Uuid) -> OpcUaResult<()> {
        let mut session = self.shared.session.lock().await;
        session.unsubscribe(id).await
    }
}

impl<T: UaTransport + 'static> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.shared.wake.notify_one();
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

impl<T: UaTransport + 'static> std::fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.shared.config.endpoint)
            .field("state", &self.shared.state())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
