// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! The crawler never talks to a socket. Everything it needs from a server is
//! expressed through [`UaTransport`], which keeps the engine testable against
//! an in-memory address space and lets a real stack be plugged in later.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::OpcUaResult;
use crate::types::{
    AttributeId, BrowseDirection, ClientConfig, SecurityMode, StatusCode, UaNodeId, UaQualifiedName,
    UserIdentity,
};

// =============================================================================
// Endpoints
// =============================================================================

/// An endpoint offered by a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescription {
    /// Endpoint URL.
    pub url: String,

    /// Message security mode.
    pub security_mode: SecurityMode,

    /// Security policy URI.
    pub security_policy_uri: String,
}

impl EndpointDescription {
    /// Creates an endpoint description.
    pub fn new(url: impl Into<String>, security_mode: SecurityMode) -> Self {
        let policy = match security_mode {
            SecurityMode::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            SecurityMode::Sign | SecurityMode::SignAndEncrypt => {
                "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256"
            }
        };
        Self {
            url: url.into(),
            security_mode,
            security_policy_uri: policy.to_string(),
        }
    }
}

/// Settings the transport applies to the session it opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Identity presented when activating the session.
    pub identity: UserIdentity,

    /// Upper bound for every service call on the session. The transport
    /// enforces it and reports an elapsed call as a connection error.
    pub request_timeout: Duration,
}

impl SessionOptions {
    /// Takes the identity and request timeout from a client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            identity: config.user_identity.clone(),
            request_timeout: config.request_timeout,
        }
    }
}

// =============================================================================
// Browse
// =============================================================================

/// Parameters of one browse request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseDescription {
    /// Node to browse from.
    pub node_id: UaNodeId,

    /// Direction of the followed references.
    pub direction: BrowseDirection,

    /// Reference type to follow.
    pub reference_type: UaNodeId,

    /// Also follow subtypes of `reference_type`.
    pub include_subtypes: bool,

    /// Node class filter bits (0 = all).
    pub node_class_mask: u32,

    /// Which reference fields the server fills in.
    pub result_mask: u32,
}

/// One reference returned by a browse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceDescription {
    /// Target node.
    pub node_id: UaNodeId,

    /// Browse name of the target.
    pub browse_name: UaQualifiedName,

    /// Node class bits of the target.
    pub node_class: u32,

    /// Type definition of the target.
    pub type_definition: UaNodeId,

    /// Type of the followed reference.
    pub reference_type: UaNodeId,

    /// Direction of the followed reference.
    pub is_forward: bool,

    /// Display name of the target.
    pub display_name: String,
}

/// One page of browse results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseResponse {
    /// Operation status.
    pub status: StatusCode,

    /// References of this page.
    pub references: Vec<ReferenceDescription>,

    /// Set when more pages are available.
    pub continuation_point: Option<Vec<u8>>,
}

// =============================================================================
// Read
// =============================================================================

/// One attribute to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadValueId {
    /// Node to read.
    pub node_id: UaNodeId,

    /// Attribute to read.
    pub attribute: AttributeId,
}

impl ReadValueId {
    /// Creates a read of the value attribute.
    pub fn value(node_id: UaNodeId) -> Self {
        Self {
            node_id,
            attribute: AttributeId::Value,
        }
    }
}

/// A value with its status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataValue {
    /// Status of the value.
    pub status: StatusCode,

    /// The value.
    pub value: Variant,

    /// Source timestamp, if reported.
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    /// Creates a good data value.
    pub fn good(value: Variant) -> Self {
        Self {
            status: StatusCode::GOOD,
            value,
            source_timestamp: None,
        }
    }

    /// Creates a bad data value.
    pub fn bad(status: StatusCode) -> Self {
        Self {
            status,
            value: Variant::Empty,
            source_timestamp: None,
        }
    }
}

/// Result of a read service call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadResponse {
    /// Service status.
    pub status: StatusCode,

    /// One value per requested attribute.
    pub values: Vec<DataValue>,
}

// =============================================================================
// Variant
// =============================================================================

/// A dynamically typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Variant {
    /// No value.
    #[default]
    Empty,
    /// Boolean.
    Boolean(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit double.
    Double(f64),
    /// String.
    String(String),
    /// Date/time.
    DateTime(DateTime<Utc>),
    /// GUID.
    Guid(Uuid),
    /// Byte string.
    ByteString(Vec<u8>),
    /// Node id.
    NodeId(UaNodeId),
    /// Qualified name.
    QualifiedName(UaQualifiedName),
    /// Array of values.
    Array(Vec<Variant>),
}

impl Variant {
    /// Returns the type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Boolean(_) => "Boolean",
            Self::Int32(_) => "Int32",
            Self::UInt32(_) => "UInt32",
            Self::Int64(_) => "Int64",
            Self::Double(_) => "Double",
            Self::String(_) => "String",
            Self::DateTime(_) => "DateTime",
            Self::Guid(_) => "Guid",
            Self::ByteString(_) => "ByteString",
            Self::NodeId(_) => "NodeId",
            Self::QualifiedName(_) => "QualifiedName",
            Self::Array(_) => "Array",
        }
    }

    /// Attempts to get the value as an unsigned integer.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::UInt32(v) => Some(*v),
            Self::Int32(v) => u32::try_from(*v).ok(),
            Self::Int64(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Attempts to get the value as a list of strings.
    pub fn as_string_array(&self) -> Option<Vec<String>> {
        match self {
            Self::Array(items) => items
                .iter()
                .map(|item| match item {
                    Self::String(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// Converts to a JSON value.
    ///
    /// Byte strings are base64 encoded and date/times use RFC 3339.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Empty => serde_json::Value::Null,
            Self::Boolean(v) => json!(v),
            Self::Int32(v) => json!(v),
            Self::UInt32(v) => json!(v),
            Self::Int64(v) => json!(v),
            Self::Double(v) => json!(v),
            Self::String(v) => json!(v),
            Self::DateTime(v) => json!(v.to_rfc3339()),
            Self::Guid(v) => json!(v.to_string()),
            Self::ByteString(v) => json!(BASE64.encode(v)),
            Self::NodeId(v) => json!(v.to_string()),
            Self::QualifiedName(v) => json!({
                "namespaceIndex": v.namespace_index,
                "name": v.name,
            }),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(Variant::to_json).collect())
            }
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::Array(v) => write!(f, "[{} items]", v.len()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

// =============================================================================
// TranslateBrowsePath
// =============================================================================

/// One hop of a relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativePathElement {
    /// Reference type to follow.
    pub reference_type: UaNodeId,

    /// Follow the reference backwards.
    pub is_inverse: bool,

    /// Also follow subtypes of `reference_type`.
    pub include_subtypes: bool,

    /// Browse name of the hop target.
    pub target_name: UaQualifiedName,
}

/// A start node and a relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowsePath {
    /// Start node.
    pub start: UaNodeId,

    /// Path elements.
    pub elements: Vec<RelativePathElement>,
}

/// Result of translating one browse path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowsePathResult {
    /// Status of this path.
    pub status: StatusCode,

    /// Matching targets.
    pub targets: Vec<UaNodeId>,
}

/// Result of a translate service call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslateResponse {
    /// Service status.
    pub status: StatusCode,

    /// One result per requested path.
    pub results: Vec<BrowsePathResult>,
}

// =============================================================================
// UaTransport Trait
// =============================================================================

/// Callback invoked with each data change of a monitored node.
pub type ValueCallback = Arc<dyn Fn(DataValue) + Send + Sync>;

/// Abstract transport trait for OPC UA communication.
///
/// Calls return `Err` only when the exchange itself failed (no session,
/// closed channel). A server answering with a bad status is reported through
/// the `status` fields of the responses.
#[async_trait]
pub trait UaTransport: Send + Sync {
    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Lists the endpoints offered at `url`.
    async fn get_endpoints(&self, url: &str) -> OpcUaResult<Vec<EndpointDescription>>;

    /// Opens a session on the given endpoint.
    async fn connect(
        &mut self,
        endpoint: &EndpointDescription,
        options: &SessionOptions,
    ) -> OpcUaResult<()>;

    /// Closes the session.
    async fn disconnect(&mut self) -> OpcUaResult<()>;

    /// Returns `true` while the session is usable.
    fn is_connected(&self) -> bool;

    // =========================================================================
    // Services
    // =========================================================================

    /// Browses one node and returns the first page.
    async fn browse(&self, request: &BrowseDescription) -> OpcUaResult<BrowseResponse>;

    /// Fetches the next page for a continuation point.
    async fn browse_next(&self, continuation_point: &[u8]) -> OpcUaResult<BrowseResponse>;

    /// Reads node attributes.
    async fn read(&self, nodes: &[ReadValueId]) -> OpcUaResult<ReadResponse>;

    /// Translates one browse path to target node ids.
    async fn translate_browse_path(&self, path: &BrowsePath) -> OpcUaResult<TranslateResponse>;

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Starts monitoring the value of a node. Returns the monitored item id.
    async fn subscribe(&self, node_id: &UaNodeId, callback: ValueCallback) -> OpcUaResult<u32>;

    /// Stops monitoring a node.
    async fn unsubscribe(&self, monitored_item_id: u32) -> OpcUaResult<()>;
}

// =============================================================================
// Tests
// =============================================================================
