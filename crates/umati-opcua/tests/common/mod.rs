// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory address space shared by the integration tests.
//!
//! Namespace table:
//!
//! | index | URI                                       |
//! |-------|-------------------------------------------|
//! | 0     | `ns0`                                     |
//! | 1     | `ns1`                                     |
//! | 2     | `http://opcfoundation.org/UA/Machinery/`  |
//!
//! Types:
//!
//! ```text
//! ns0;i=62 BaseVariableType
//! ├── ns0;i=63 BaseDataVariableType
//! │   └── ns0;i=2365 DataItemType
//! └── ns0;i=68 PropertyType
//! ns0;i=58 BaseObjectType
//! ├── ns2;i=1012 MachineIdentificationType
//! │   └── ns1;i=1020 MachineToolIdentificationType
//! │       └── SerialNumber (Mandatory, PropertyType)
//! └── ns1;i=1000 BaseMachineType
//!     ├── Identification (Mandatory, MachineToolIdentificationType)
//!     ├── Notes          (Optional)
//!     └── ns1;i=1014 MachineToolType
//!         ├── Notes      (Mandatory, DataItemType)
//!         └── Monitoring (Optional)
//! ```
//!
//! The type map crawl starts at BaseDataVariableType, so PropertyType is
//! never registered.
//!
//! Instances below `ns0;i=85`: `Machine` (MachineToolType) and two nodes
//! both named `Twin`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use umati_opcua::client::{
    BrowseDescription, BrowsePath, BrowsePathResult, BrowseResponse, DataValue,
    EndpointDescription, ReadResponse, ReadValueId, ReferenceDescription, SessionOptions,
    TranslateResponse, UaTransport, ValueCallback, Variant,
};
use umati_opcua::{
    ids, AttributeId, BrowseDirection, ClientConfig, ConnectionError, OpcUaResult, SecurityMode,
    StatusCode, UaNodeId, UaQualifiedName,
};

pub const MACHINERY: u16 = 2;

const OBJECT: u32 = 1;
const VARIABLE: u32 = 2;
const OBJECT_TYPE: u32 = 8;
const VARIABLE_TYPE: u32 = 16;

const TYPE_DEFINITION_FIELD: u32 = 0x20;

const BASE_VARIABLE_TYPE: u32 = 62;
const DATA_ITEM_TYPE: u32 = 2365;

const MANDATORY_RULE: u32 = 78;
const OPTIONAL_RULE: u32 = 80;

// =============================================================================
// Address space
// =============================================================================

#[derive(Debug, Clone)]
struct FixtureNode {
    browse_name: UaQualifiedName,
    node_class: u32,
    type_definition: UaNodeId,
}

#[derive(Debug, Clone)]
struct Reference {
    source: UaNodeId,
    reference_type: u32,
    target: UaNodeId,
}

#[derive(Debug, Default)]
struct AddressSpace {
    nodes: HashMap<UaNodeId, FixtureNode>,
    references: Vec<Reference>,
    values: HashMap<UaNodeId, Variant>,
}

impl AddressSpace {
    fn node(&mut self, id: UaNodeId, name: UaQualifiedName, class: u32, type_definition: UaNodeId) {
        self.nodes.insert(
            id,
            FixtureNode {
                browse_name: name,
                node_class: class,
                type_definition,
            },
        );
    }

    fn reference(&mut self, source: UaNodeId, reference_type: u32, target: UaNodeId) {
        self.references.push(Reference {
            source,
            reference_type,
            target,
        });
    }

    fn sub_type(&mut self, parent: UaNodeId, id: UaNodeId, name: UaQualifiedName, class: u32) {
        self.node(id.clone(), name, class, UaNodeId::null());
        self.reference(parent, ids::HAS_SUBTYPE, id);
    }

    fn declare(
        &mut self,
        parent: UaNodeId,
        id: UaNodeId,
        name: UaQualifiedName,
        class: u32,
        type_definition: UaNodeId,
        rule: u32,
    ) {
        let reference = if class == VARIABLE {
            ids::HAS_PROPERTY
        } else {
            ids::HAS_COMPONENT
        };
        self.node(id.clone(), name, class, type_definition.clone());
        self.reference(parent, reference, id.clone());
        self.reference(id.clone(), ids::HAS_TYPE_DEFINITION, type_definition);
        self.reference(id, ids::HAS_MODELLING_RULE, ns0(rule));
    }

    fn is_hierarchical(reference_type: u32) -> bool {
        matches!(
            reference_type,
            ids::HIERARCHICAL_REFERENCES
                | ids::ORGANIZES
                | ids::HAS_SUBTYPE
                | ids::HAS_PROPERTY
                | ids::HAS_COMPONENT
        )
    }

    fn matches_reference(requested: &UaNodeId, include_subtypes: bool, actual: u32) -> bool {
        if *requested == ns0(actual) {
            return true;
        }
        include_subtypes
            && *requested == ns0(ids::HIERARCHICAL_REFERENCES)
            && Self::is_hierarchical(actual)
    }

    fn describe(
        &self,
        target: &UaNodeId,
        reference_type: u32,
        is_forward: bool,
        result_mask: u32,
    ) -> Option<ReferenceDescription> {
        let node = self.nodes.get(target)?;
        let type_definition = if result_mask & TYPE_DEFINITION_FIELD != 0 {
            node.type_definition.clone()
        } else {
            UaNodeId::null()
        };
        Some(ReferenceDescription {
            node_id: target.clone(),
            browse_name: node.browse_name.clone(),
            node_class: node.node_class,
            type_definition,
            reference_type: ns0(reference_type),
            is_forward,
            display_name: node.browse_name.name.clone(),
        })
    }

    fn browse(&self, request: &BrowseDescription) -> Vec<ReferenceDescription> {
        let forward = matches!(request.direction, BrowseDirection::Forward | BrowseDirection::Both);
        let backward = matches!(request.direction, BrowseDirection::Backward | BrowseDirection::Both);

        self.references
            .iter()
            .filter(|r| Self::matches_reference(&request.reference_type, request.include_subtypes, r.reference_type))
            .filter_map(|r| {
                if forward && r.source == request.node_id {
                    self.describe(&r.target, r.reference_type, true, request.result_mask)
                } else if backward && r.target == request.node_id {
                    self.describe(&r.source, r.reference_type, false, request.result_mask)
                } else {
                    None
                }
            })
            .filter(|d| request.node_class_mask == 0 || d.node_class & request.node_class_mask != 0)
            .collect()
    }

    fn children_named(&self, start: &UaNodeId, name: &UaQualifiedName) -> Vec<UaNodeId> {
        self.references
            .iter()
            .filter(|r| r.source == *start && Self::is_hierarchical(r.reference_type))
            .filter(|r| {
                self.nodes
                    .get(&r.target)
                    .is_some_and(|n| n.browse_name == *name)
            })
            .map(|r| r.target.clone())
            .collect()
    }
}

pub fn ns0(id: u32) -> UaNodeId {
    UaNodeId::numeric(0, id)
}

pub fn ns1(id: u32) -> UaNodeId {
    UaNodeId::numeric(1, id)
}

fn q0(name: &str) -> UaQualifiedName {
    UaQualifiedName::new(0, name)
}

fn q1(name: &str) -> UaQualifiedName {
    UaQualifiedName::new(1, name)
}

fn machine_tool_space() -> AddressSpace {
    let mut space = AddressSpace::default();
    let machinery = |id| UaNodeId::numeric(MACHINERY, id);

    space.node(ns0(BASE_VARIABLE_TYPE), q0("BaseVariableType"), VARIABLE_TYPE, UaNodeId::null());
    space.node(ns0(ids::BASE_OBJECT_TYPE), q0("BaseObjectType"), OBJECT_TYPE, UaNodeId::null());
    space.node(ns0(ids::OBJECTS_FOLDER), q0("Objects"), OBJECT, ns0(ids::FOLDER_TYPE));
    space.node(ns0(MANDATORY_RULE), q0("Mandatory"), OBJECT, UaNodeId::null());
    space.node(ns0(OPTIONAL_RULE), q0("Optional"), OBJECT, UaNodeId::null());

    space.sub_type(
        ns0(BASE_VARIABLE_TYPE),
        ns0(ids::BASE_DATA_VARIABLE_TYPE),
        q0("BaseDataVariableType"),
        VARIABLE_TYPE,
    );
    space.sub_type(ns0(BASE_VARIABLE_TYPE), ns0(ids::PROPERTY_TYPE), q0("PropertyType"), VARIABLE_TYPE);
    space.sub_type(ns0(ids::BASE_DATA_VARIABLE_TYPE), ns0(DATA_ITEM_TYPE), q0("DataItemType"), VARIABLE_TYPE);

    space.sub_type(
        ns0(ids::BASE_OBJECT_TYPE),
        machinery(1012),
        UaQualifiedName::new(MACHINERY, "MachineIdentificationType"),
        OBJECT_TYPE,
    );
    space.sub_type(machinery(1012), ns1(1020), q1("MachineToolIdentificationType"), OBJECT_TYPE);
    space.declare(ns1(1020), ns1(1021), q1("SerialNumber"), VARIABLE, ns0(ids::PROPERTY_TYPE), MANDATORY_RULE);

    space.sub_type(ns0(ids::BASE_OBJECT_TYPE), ns1(1000), q1("BaseMachineType"), OBJECT_TYPE);
    space.declare(ns1(1000), ns1(1001), q1("Identification"), OBJECT, ns1(1020), MANDATORY_RULE);
    space.declare(ns1(1000), ns1(1002), q1("Notes"), VARIABLE, ns0(ids::BASE_DATA_VARIABLE_TYPE), OPTIONAL_RULE);

    space.sub_type(ns1(1000), ns1(1014), q1("MachineToolType"), OBJECT_TYPE);
    space.declare(ns1(1014), ns1(1015), q1("Notes"), VARIABLE, ns0(DATA_ITEM_TYPE), MANDATORY_RULE);
    space.declare(ns1(1014), ns1(1016), q1("Monitoring"), OBJECT, ns0(ids::BASE_OBJECT_TYPE), OPTIONAL_RULE);

    space.node(ns1(5000), q1("Machine"), OBJECT, ns1(1014));
    space.reference(ns0(ids::OBJECTS_FOLDER), ids::ORGANIZES, ns1(5000));
    space.reference(ns1(5000), ids::HAS_TYPE_DEFINITION, ns1(1014));
    space.node(ns1(5001), q1("Identification"), OBJECT, ns1(1020));
    space.reference(ns1(5000), ids::HAS_COMPONENT, ns1(5001));
    space.node(ns1(5002), q1("SerialNumber"), VARIABLE, ns0(ids::PROPERTY_TYPE));
    space.reference(ns1(5001), ids::HAS_PROPERTY, ns1(5002));
    space.values.insert(ns1(5002), Variant::String("SN-42".into()));

    space.node(ns1(5100), q1("Twin"), OBJECT, ns0(ids::BASE_OBJECT_TYPE));
    space.node(ns1(5101), q1("Twin"), OBJECT, ns0(ids::BASE_OBJECT_TYPE));
    space.reference(ns0(ids::OBJECTS_FOLDER), ids::ORGANIZES, ns1(5100));
    space.reference(ns0(ids::OBJECTS_FOLDER), ids::ORGANIZES, ns1(5101));
    space.reference(ns1(5100), ids::HAS_TYPE_DEFINITION, ns0(ids::BASE_OBJECT_TYPE));
    space.reference(ns1(5101), ids::HAS_TYPE_DEFINITION, ns0(ids::BASE_OBJECT_TYPE));

    space
}

// =============================================================================
// FixtureServer
// =============================================================================

/// Switches and counters shared between a test and its transport.
#[derive(Default)]
pub struct FixtureState {
    connected: AtomicBool,
    refuse_connections: AtomicBool,
    fail_reads: AtomicBool,
    page_size: AtomicUsize,
    connects: AtomicU32,
    request_timeout_ms: AtomicU64,
    browses: AtomicU32,
    browse_nexts: AtomicU32,
    subscribes: AtomicU32,
    next_item: AtomicU32,
    subscriptions: Mutex<HashMap<u32, (UaNodeId, ValueCallback)>>,
    continuations: Mutex<HashMap<Vec<u8>, Vec<ReferenceDescription>>>,
}

impl FixtureState {
    /// Simulates the server dropping the session.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.subscriptions.lock().unwrap().clear();
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Limits browse pages to `size` references (0 disables paging).
    pub fn set_page_size(&self, size: usize) {
        self.page_size.store(size, Ordering::SeqCst);
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Request timeout the last session was opened with.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.load(Ordering::SeqCst))
    }

    pub fn browses(&self) -> u32 {
        self.browses.load(Ordering::SeqCst)
    }

    pub fn browse_nexts(&self) -> u32 {
        self.browse_nexts.load(Ordering::SeqCst)
    }

    pub fn subscribes(&self) -> u32 {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    /// Delivers a value change to every subscription on `node`.
    pub fn emit(&self, node: &UaNodeId, value: DataValue) -> usize {
        let callbacks: Vec<ValueCallback> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|(n, _)| n == node)
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in &callbacks {
            callback(value.clone());
        }
        callbacks.len()
    }
}

/// A transport answering from [`machine_tool_space`].
pub struct FixtureServer {
    namespaces: Vec<String>,
    space: RwLock<AddressSpace>,
    endpoints: Vec<SecurityMode>,
    pub state: Arc<FixtureState>,
}

impl FixtureServer {
    pub fn new() -> Self {
        Self {
            namespaces: vec![
                "ns0".into(),
                "ns1".into(),
                ids::MACHINERY_NAMESPACE_URI.into(),
            ],
            space: RwLock::new(machine_tool_space()),
            endpoints: vec![SecurityMode::None],
            state: Arc::new(FixtureState::default()),
        }
    }

    /// Returns the switches; keep this before handing the server away.
    pub fn state(&self) -> Arc<FixtureState> {
        self.state.clone()
    }

    fn page(&self, mut references: Vec<ReferenceDescription>) -> BrowseResponse {
        let size = self.state.page_size.load(Ordering::SeqCst);
        if size == 0 || references.len() <= size {
            return BrowseResponse {
                status: StatusCode::GOOD,
                references,
                continuation_point: None,
            };
        }

        let rest = references.split_off(size);
        let token = self.state.next_item.fetch_add(1, Ordering::SeqCst);
        let continuation_point = format!("cp-{token}").into_bytes();
        self.state
            .continuations
            .lock()
            .unwrap()
            .insert(continuation_point.clone(), rest);

        BrowseResponse {
            status: StatusCode::GOOD,
            references,
            continuation_point: Some(continuation_point),
        }
    }

    fn require_connection(&self) -> OpcUaResult<()> {
        if self.state.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected.into())
        }
    }
}

#[async_trait]
impl UaTransport for FixtureServer {
    async fn get_endpoints(&self, url: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        if self.state.refuse_connections.load(Ordering::SeqCst) {
            return Err(ConnectionError::connect_failed(url, "connection refused").into());
        }
        Ok(self
            .endpoints
            .iter()
            .map(|mode| EndpointDescription::new(url, *mode))
            .collect())
    }

    async fn connect(&mut self, endpoint: &EndpointDescription, options: &SessionOptions) -> OpcUaResult<()> {
        if self.state.refuse_connections.load(Ordering::SeqCst) {
            return Err(ConnectionError::connect_failed(&endpoint.url, "connection refused").into());
        }
        self.state
            .request_timeout_ms
            .store(options.request_timeout.as_millis() as u64, Ordering::SeqCst);
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        self.state.drop_connection();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    async fn browse(&self, request: &BrowseDescription) -> OpcUaResult<BrowseResponse> {
        self.require_connection()?;
        self.state.browses.fetch_add(1, Ordering::SeqCst);
        let references = self.space.read().unwrap().browse(request);
        Ok(self.page(references))
    }

    async fn browse_next(&self, continuation_point: &[u8]) -> OpcUaResult<BrowseResponse> {
        self.require_connection()?;
        self.state.browse_nexts.fetch_add(1, Ordering::SeqCst);
        let rest = self.state.continuations.lock().unwrap().remove(continuation_point);
        match rest {
            Some(references) => Ok(self.page(references)),
            None => Ok(BrowseResponse {
                status: StatusCode::BAD_CONTINUATION_POINT_INVALID,
                ..Default::default()
            }),
        }
    }

    async fn read(&self, nodes: &[ReadValueId]) -> OpcUaResult<ReadResponse> {
        self.require_connection()?;
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Ok(ReadResponse {
                status: StatusCode::BAD_TOO_MANY_OPERATIONS,
                values: Vec::new(),
            });
        }

        let space = self.space.read().unwrap();
        let values = nodes
            .iter()
            .map(|request| {
                if request.node_id == ns0(ids::SERVER_NAMESPACE_ARRAY) {
                    let uris = self.namespaces.iter().cloned().map(Variant::String).collect();
                    return DataValue::good(Variant::Array(uris));
                }
                let Some(node) = space.nodes.get(&request.node_id) else {
                    return DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN);
                };
                match request.attribute {
                    AttributeId::NodeClass => DataValue::good(Variant::Int32(node.node_class as i32)),
                    AttributeId::BrowseName => {
                        DataValue::good(Variant::QualifiedName(node.browse_name.clone()))
                    }
                    AttributeId::DisplayName => {
                        DataValue::good(Variant::String(node.browse_name.name.clone()))
                    }
                    AttributeId::Value => match space.values.get(&request.node_id) {
                        Some(value) => DataValue::good(value.clone()),
                        None => DataValue::bad(StatusCode::BAD_NOT_READABLE),
                    },
                }
            })
            .collect();

        Ok(ReadResponse {
            status: StatusCode::GOOD,
            values,
        })
    }

    async fn translate_browse_path(&self, path: &BrowsePath) -> OpcUaResult<TranslateResponse> {
        self.require_connection()?;
        let space = self.space.read().unwrap();

        let mut current = vec![path.start.clone()];
        for element in &path.elements {
            current = current
                .iter()
                .flat_map(|start| space.children_named(start, &element.target_name))
                .collect();
        }

        let status = if current.is_empty() {
            StatusCode::BAD_NO_MATCH
        } else {
            StatusCode::GOOD
        };
        Ok(TranslateResponse {
            status: StatusCode::GOOD,
            results: vec![BrowsePathResult {
                status,
                targets: current,
            }],
        })
    }

    async fn subscribe(&self, node_id: &UaNodeId, callback: ValueCallback) -> OpcUaResult<u32> {
        self.require_connection()?;
        self.state.subscribes.fetch_add(1, Ordering::SeqCst);
        let item = self.state.next_item.fetch_add(1, Ordering::SeqCst);
        self.state
            .subscriptions
            .lock()
            .unwrap()
            .insert(item, (node_id.clone(), callback));
        Ok(item)
    }

    async fn unsubscribe(&self, monitored_item_id: u32) -> OpcUaResult<()> {
        self.state.subscriptions.lock().unwrap().remove(&monitored_item_id);
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub fn config() -> ClientConfig {
    ClientConfig::builder()
        .endpoint("opc.tcp://fixture:4840")
        .reconnect_interval(Duration::from_millis(20))
        .retry_delay(Duration::from_millis(20))
        .build()
        .unwrap()
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
