// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Wire-level OPC UA types and client configuration.
//!
//! - **UaNodeId**: a node identifier as the server encodes it, with a
//!   session-local namespace index
//! - **StatusCode**: protocol status with well-known names
//! - **ClientConfig**: connection and crawl settings with builder
//! - **ids**: well-known nodes of the standard namespace
//!
//! # Examples
//!
//! ```
//! use umati_opcua::types::{ClientConfig, SecurityMode, UaNodeId};
//!
//! let node: UaNodeId = "ns=2;s=Machine.Identification".parse().unwrap();
//! assert_eq!(node.namespace_index, 2);
//!
//! let config = ClientConfig::builder()
//!     .endpoint("opc.tcp://localhost:4840")
//!     .security_mode(SecurityMode::None)
//!     .expected_type_namespace("http://opcfoundation.org/UA/MachineTool/")
//!     .build()
//!     .unwrap();
//! assert_eq!(config.max_type_depth, 100);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigurationError, OpcUaError, OpcUaResult, SchemaError};

// =============================================================================
// UaNodeId
// =============================================================================

/// A node identifier in wire form.
///
/// The namespace index is only valid for the session that produced it. Use
/// [`NamespaceCache`](crate::namespace::NamespaceCache) to convert to and
/// from the session-independent [`umati_model::NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UaNodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl UaNodeId {
    /// Creates a node id.
    #[inline]
    pub fn new(namespace_index: u16, identifier: NodeIdentifier) -> Self {
        Self {
            namespace_index,
            identifier,
        }
    }

    /// Creates a numeric node id.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self::new(namespace_index, NodeIdentifier::Numeric(value))
    }

    /// Creates a string node id.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self::new(namespace_index, NodeIdentifier::String(value.into()))
    }

    /// Returns the null node id (ns=0, i=0).
    #[inline]
    pub const fn null() -> Self {
        Self {
            namespace_index: 0,
            identifier: NodeIdentifier::Numeric(0),
        }
    }

    /// Returns `true` if this is the null node id.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && matches!(self.identifier, NodeIdentifier::Numeric(0))
    }

    /// Converts to the OPC UA string format `ns=<index>;<identifier>`.
    pub fn to_opc_string(&self) -> String {
        if self.namespace_index == 0 {
            self.identifier.to_string()
        } else {
            format!("ns={};{}", self.namespace_index, self.identifier)
        }
    }
}

impl Default for UaNodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for UaNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_opc_string())
    }
}

impl FromStr for UaNodeId {
    type Err = OpcUaError;

    /// Parses `ns=2;i=1001`, `ns=2;s=Name`, `ns=2;g=<uuid>`, `ns=2;b=<base64>`
    /// or any of those without the `ns=` prefix (namespace 0).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns_str, id) = rest.split_once(';').ok_or_else(|| {
                    SchemaError::invalid_node_id(s, "Missing identifier after namespace")
                })?;
                let ns: u16 = ns_str
                    .parse()
                    .map_err(|_| SchemaError::invalid_node_id(s, "Invalid namespace index"))?;
                (ns, id)
            }
            None => (0, s),
        };

        Ok(Self::new(namespace_index, identifier_part.parse()?))
    }
}

// =============================================================================
// NodeIdentifier
// =============================================================================

/// The four identifier kinds of a node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),
    /// String identifier.
    String(String),
    /// GUID identifier.
    Guid(Uuid),
    /// Opaque (byte string) identifier.
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

impl FromStr for NodeIdentifier {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("i=") {
            let value: u32 = id
                .parse()
                .map_err(|_| SchemaError::invalid_node_id(s, "Invalid numeric identifier"))?;
            Ok(Self::Numeric(value))
        } else if let Some(id) = s.strip_prefix("s=") {
            Ok(Self::String(id.to_string()))
        } else if let Some(id) = s.strip_prefix("g=") {
            let uuid = Uuid::parse_str(id)
                .map_err(|e| SchemaError::invalid_node_id(s, format!("Invalid GUID: {}", e)))?;
            Ok(Self::Guid(uuid))
        } else if let Some(id) = s.strip_prefix("b=") {
            let bytes = BASE64
                .decode(id)
                .map_err(|e| SchemaError::invalid_node_id(s, format!("Invalid base64: {}", e)))?;
            Ok(Self::Opaque(bytes))
        } else {
            Err(SchemaError::invalid_node_id(
                s,
                "Unknown identifier type. Expected i=, s=, g=, or b=",
            )
            .into())
        }
    }
}

// =============================================================================
// UaQualifiedName
// =============================================================================

/// A browse name in wire form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UaQualifiedName {
    /// Namespace index.
    pub namespace_index: u16,
    /// The name.
    pub name: String,
}

impl UaQualifiedName {
    /// Creates a qualified name.
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }
}

impl fmt::Display for UaQualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace_index, self.name)
    }
}

// =============================================================================
// StatusCode
// =============================================================================

/// An OPC UA status code.
///
/// The top two bits carry the severity; a code is bad when bit 31 is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// Good.
    pub const GOOD: Self = Self(0x0000_0000);
    /// Unexpected error.
    pub const BAD_UNEXPECTED_ERROR: Self = Self(0x8001_0000);
    /// Internal error.
    pub const BAD_INTERNAL_ERROR: Self = Self(0x8002_0000);
    /// Resource unavailable.
    pub const BAD_RESOURCE_UNAVAILABLE: Self = Self(0x8004_0000);
    /// Communication error.
    pub const BAD_COMMUNICATION_ERROR: Self = Self(0x8005_0000);
    /// Timeout.
    pub const BAD_TIMEOUT: Self = Self(0x800A_0000);
    /// Service unsupported.
    pub const BAD_SERVICE_UNSUPPORTED: Self = Self(0x800B_0000);
    /// Server not connected.
    pub const BAD_SERVER_NOT_CONNECTED: Self = Self(0x800D_0000);
    /// Server halted.
    pub const BAD_SERVER_HALTED: Self = Self(0x800E_0000);
    /// Nothing to do.
    pub const BAD_NOTHING_TO_DO: Self = Self(0x800F_0000);
    /// Too many operations.
    pub const BAD_TOO_MANY_OPERATIONS: Self = Self(0x8010_0000);
    /// User access denied.
    pub const BAD_USER_ACCESS_DENIED: Self = Self(0x801F_0000);
    /// Session id invalid.
    pub const BAD_SESSION_ID_INVALID: Self = Self(0x8025_0000);
    /// Session closed.
    pub const BAD_SESSION_CLOSED: Self = Self(0x8026_0000);
    /// Node id invalid.
    pub const BAD_NODE_ID_INVALID: Self = Self(0x8033_0000);
    /// Node id unknown.
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    /// Attribute id invalid.
    pub const BAD_ATTRIBUTE_ID_INVALID: Self = Self(0x8035_0000);
    /// Not readable.
    pub const BAD_NOT_READABLE: Self = Self(0x803A_0000);
    /// Continuation point invalid.
    pub const BAD_CONTINUATION_POINT_INVALID: Self = Self(0x804A_0000);
    /// No continuation points available.
    pub const BAD_NO_CONTINUATION_POINTS: Self = Self(0x804B_0000);
    /// Reference type id invalid.
    pub const BAD_REFERENCE_TYPE_ID_INVALID: Self = Self(0x804C_0000);
    /// Browse direction invalid.
    pub const BAD_BROWSE_DIRECTION_INVALID: Self = Self(0x804D_0000);
    /// Too many matches.
    pub const BAD_TOO_MANY_MATCHES: Self = Self(0x806D_0000);
    /// No match.
    pub const BAD_NO_MATCH: Self = Self(0x806F_0000);

    /// Returns `true` if the severity bits are good.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` if bit 31 is set.
    #[inline]
    pub const fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Returns the symbolic name of well-known codes.
    pub fn name(&self) -> &'static str {
        match *self {
            Self::GOOD => "Good",
            Self::BAD_UNEXPECTED_ERROR => "BadUnexpectedError",
            Self::BAD_INTERNAL_ERROR => "BadInternalError",
            Self::BAD_RESOURCE_UNAVAILABLE => "BadResourceUnavailable",
            Self::BAD_COMMUNICATION_ERROR => "BadCommunicationError",
            Self::BAD_TIMEOUT => "BadTimeout",
            Self::BAD_SERVICE_UNSUPPORTED => "BadServiceUnsupported",
            Self::BAD_SERVER_NOT_CONNECTED => "BadServerNotConnected",
            Self::BAD_SERVER_HALTED => "BadServerHalted",
            Self::BAD_NOTHING_TO_DO => "BadNothingToDo",
            Self::BAD_TOO_MANY_OPERATIONS => "BadTooManyOperations",
            Self::BAD_USER_ACCESS_DENIED => "BadUserAccessDenied",
            Self::BAD_SESSION_ID_INVALID => "BadSessionIdInvalid",
            Self::BAD_SESSION_CLOSED => "BadSessionClosed",
            Self::BAD_NODE_ID_INVALID => "BadNodeIdInvalid",
            Self::BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
            Self::BAD_ATTRIBUTE_ID_INVALID => "BadAttributeIdInvalid",
            Self::BAD_NOT_READABLE => "BadNotReadable",
            Self::BAD_CONTINUATION_POINT_INVALID => "BadContinuationPointInvalid",
            Self::BAD_NO_CONTINUATION_POINTS => "BadNoContinuationPoints",
            Self::BAD_REFERENCE_TYPE_ID_INVALID => "BadReferenceTypeIdInvalid",
            Self::BAD_BROWSE_DIRECTION_INVALID => "BadBrowseDirectionInvalid",
            Self::BAD_TOO_MANY_MATCHES => "BadTooManyMatches",
            Self::BAD_NO_MATCH => "BadNoMatch",
            _ if self.is_bad() => "Bad",
            _ if self.is_good() => "Good",
            _ => "Uncertain",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.0)
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// No security (messages are neither signed nor encrypted).
    #[default]
    None,

    /// Messages are signed but not encrypted.
    Sign,

    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Returns the OPC UA security mode value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Sign => 2,
            Self::SignAndEncrypt => 3,
        }
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// BrowseDirection
// =============================================================================

/// OPC UA browse direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrowseDirection {
    /// Follow references from source to target.
    #[default]
    Forward,

    /// Follow references from target back to source.
    Backward,

    /// Follow references in both directions.
    Both,
}

impl BrowseDirection {
    /// Returns the OPC UA value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::Forward => 0,
            Self::Backward => 1,
            Self::Both => 2,
        }
    }
}

// =============================================================================
// AttributeId
// =============================================================================

/// The node attributes this crate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttributeId {
    /// Node class attribute.
    NodeClass,
    /// Browse name attribute.
    BrowseName,
    /// Display name attribute.
    DisplayName,
    /// Value attribute.
    #[default]
    Value,
}

impl AttributeId {
    /// Returns the OPC UA numeric value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::NodeClass => 2,
            Self::BrowseName => 3,
            Self::DisplayName => 4,
            Self::Value => 13,
        }
    }
}

// =============================================================================
// Well-known nodes
// =============================================================================

/// Well-known nodes of the standard namespace (index 0 in every session).
pub mod ids {
    /// HierarchicalReferences.
    pub const HIERARCHICAL_REFERENCES: u32 = 33;
    /// HasModellingRule.
    pub const HAS_MODELLING_RULE: u32 = 37;
    /// HasTypeDefinition.
    pub const HAS_TYPE_DEFINITION: u32 = 40;
    /// HasSubtype.
    pub const HAS_SUBTYPE: u32 = 45;
    /// HasProperty.
    pub const HAS_PROPERTY: u32 = 46;
    /// HasComponent.
    pub const HAS_COMPONENT: u32 = 47;
    /// Organizes.
    pub const ORGANIZES: u32 = 35;
    /// BaseObjectType.
    pub const BASE_OBJECT_TYPE: u32 = 58;
    /// FolderType.
    pub const FOLDER_TYPE: u32 = 61;
    /// BaseDataVariableType.
    pub const BASE_DATA_VARIABLE_TYPE: u32 = 63;
    /// PropertyType.
    pub const PROPERTY_TYPE: u32 = 68;
    /// ObjectsFolder.
    pub const OBJECTS_FOLDER: u32 = 85;
    /// Server_NamespaceArray.
    pub const SERVER_NAMESPACE_ARRAY: u32 = 2255;

    /// URI of the standard namespace.
    pub const STANDARD_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/";
    /// URI of the machinery companion namespace.
    pub const MACHINERY_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/Machinery/";
    /// MachineIdentificationType in the machinery namespace.
    pub const MACHINE_IDENTIFICATION_TYPE: &str = "i=1012";
    /// Identifier companion specifications use for their machine type.
    pub const COMPANION_MACHINE_TYPE: &str = "i=1014";

    /// Returns a standard-namespace node id in the model form.
    ///
    /// The URI is left empty, which the namespace cache maps to index 0.
    pub fn standard(id: u32) -> umati_model::NodeId {
        umati_model::NodeId::new("", format!("i={id}"))
    }
}

// =============================================================================
// UserIdentity
// =============================================================================

/// Credentials presented when activating a session.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserIdentity {
    /// Anonymous access.
    #[default]
    Anonymous,
    /// Username and password.
    UserName {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::UserName { username, .. } => f
                .debug_struct("UserName")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

// =============================================================================
// ClientConfig
// =============================================================================

/// Connection and crawl settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server endpoint URL (e.g., "opc.tcp://localhost:4840").
    pub endpoint: String,

    /// Required endpoint security mode.
    #[serde(default)]
    pub security_mode: SecurityMode,

    /// Session credentials.
    #[serde(default)]
    pub user_identity: UserIdentity,

    /// Per-call timeout handed to the transport through
    /// [`SessionOptions`](crate::client::SessionOptions) when a session opens.
    #[serde(default = "default_request_timeout")]
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Idle wait of the reconnect loop while connected.
    #[serde(default = "default_reconnect_interval")]
    #[serde(with = "humantime_serde")]
    pub reconnect_interval: Duration,

    /// Pause after a failed connection attempt.
    #[serde(default = "default_retry_delay")]
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Maximum supertype hops for subtype checks.
    #[serde(default = "default_max_type_depth")]
    pub max_type_depth: usize,

    /// Maximum recursion depth of the type crawl.
    #[serde(default = "default_max_crawl_depth")]
    pub max_crawl_depth: usize,

    /// Maximum number of pages followed for one browse call.
    #[serde(default = "default_max_continuation_pages")]
    pub max_continuation_pages: usize,

    /// Namespace URIs for which type maps are built.
    #[serde(default)]
    pub expected_type_namespaces: Vec<String>,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_reconnect_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_type_depth() -> usize {
    100
}

fn default_max_crawl_depth() -> usize {
    64
}

fn default_max_continuation_pages() -> usize {
    64
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Creates a configuration with just the endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Validates this configuration.
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.endpoint.is_empty() {
            return Err(ConfigurationError::missing_field("endpoint").into());
        }

        if !self.endpoint.starts_with("opc.tcp://") {
            return Err(ConfigurationError::invalid_endpoint(
                &self.endpoint,
                "Endpoint must start with opc.tcp://",
            )
            .into());
        }

        if let UserIdentity::UserName { username, .. } = &self.user_identity {
            if username.is_empty() {
                return Err(ConfigurationError::missing_field("user_identity.username").into());
            }
        }

        for (field, value) in [
            ("max_type_depth", self.max_type_depth),
            ("max_crawl_depth", self.max_crawl_depth),
            ("max_continuation_pages", self.max_continuation_pages),
        ] {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(field, "must be greater than 0").into());
            }
        }

        for (field, value) in [
            ("request_timeout", self.request_timeout),
            ("reconnect_interval", self.reconnect_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigurationError::invalid_value(field, "must be greater than 0").into());
            }
        }

        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            security_mode: SecurityMode::default(),
            user_identity: UserIdentity::default(),
            request_timeout: default_request_timeout(),
            reconnect_interval: default_reconnect_interval(),
            retry_delay: default_retry_delay(),
            max_type_depth: default_max_type_depth(),
            max_crawl_depth: default_max_crawl_depth(),
            max_continuation_pages: default_max_continuation_pages(),
            expected_type_namespaces: Vec::new(),
        }
    }
}

// =============================================================================
// ClientConfigBuilder
// =============================================================================

/// Builder for `ClientConfig`.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    endpoint: Option<String>,
    security_mode: Option<SecurityMode>,
    user_identity: Option<UserIdentity>,
    request_timeout: Option<Duration>,
    reconnect_interval: Option<Duration>,
    retry_delay: Option<Duration>,
    max_type_depth: Option<usize>,
    max_crawl_depth: Option<usize>,
    max_continuation_pages: Option<usize>,
    expected_type_namespaces: Vec<String>,
}

impl ClientConfigBuilder {
    /// Sets the server endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the security mode.
    pub fn security_mode(mut self, mode: SecurityMode) -> Self {
        self.security_mode = Some(mode);
        self
    }

    /// Sets username/password authentication.
    pub fn username(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.user_identity = Some(UserIdentity::UserName {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Sets anonymous authentication.
    pub fn anonymous(mut self) -> Self {
        self.user_identity = Some(UserIdentity::Anonymous);
        self
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the idle wait of the reconnect loop.
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = Some(interval);
        self
    }

    /// Sets the pause after a failed connection attempt.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Sets the supertype hop bound.
    pub fn max_type_depth(mut self, depth: usize) -> Self {
        self.max_type_depth = Some(depth);
        self
    }

    /// Sets the crawl recursion bound.
    pub fn max_crawl_depth(mut self, depth: usize) -> Self {
        self.max_crawl_depth = Some(depth);
        self
    }

    /// Sets the browse page bound.
    pub fn max_continuation_pages(mut self, pages: usize) -> Self {
        self.max_continuation_pages = Some(pages);
        self
    }

    /// Adds a namespace URI for which a type map is built.
    pub fn expected_type_namespace(mut self, uri: impl Into<String>) -> Self {
        self.expected_type_namespaces.push(uri.into());
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> OpcUaResult<ClientConfig> {
        let config = ClientConfig {
            endpoint: self
                .endpoint
                .ok_or_else(|| ConfigurationError::missing_field("endpoint"))?,
            security_mode: self.security_mode.unwrap_or_default(),
            user_identity: self.user_identity.unwrap_or_default(),
            request_timeout: self.request_timeout.unwrap_or_else(default_request_timeout),
            reconnect_interval: self
                .reconnect_interval
                .unwrap_or_else(default_reconnect_interval),
            retry_delay: self.retry_delay.unwrap_or_else(default_retry_delay),
            max_type_depth: self.max_type_depth.unwrap_or_else(default_max_type_depth),
            max_crawl_depth: self.max_crawl_depth.unwrap_or_else(default_max_crawl_depth),
            max_continuation_pages: self
                .max_continuation_pages
                .unwrap_or_else(default_max_continuation_pages),
            expected_type_namespaces: self.expected_type_namespaces,
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// humantime_serde helper
// =============================================================================

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime::format_duration(*duration)
            .to_string()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // UaNodeId Tests
    // =========================================================================

    #[test]
    fn test_ua_node_id_parse() {
        let node: UaNodeId = "ns=2;i=1001".parse().unwrap();
        assert_eq!(node, UaNodeId::numeric(2, 1001));

        let node: UaNodeId = "i=85".parse().unwrap();
        assert_eq!(node, UaNodeId::numeric(0, 85));

        let node: UaNodeId = "ns=3;s=Machine;Axis".parse().unwrap();
        assert_eq!(node, UaNodeId::string(3, "Machine;Axis"));
    }

    #[test]
    fn test_ua_node_id_guid_and_opaque() {
        let node: UaNodeId = "ns=1;g=550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        assert!(matches!(node.identifier, NodeIdentifier::Guid(_)));

        let node: UaNodeId = "ns=1;b=SGVsbG8=".parse().unwrap();
        assert_eq!(node.identifier, NodeIdentifier::Opaque(b"Hello".to_vec()));
        assert_eq!(node.to_opc_string(), "ns=1;b=SGVsbG8=");
    }

    #[test]
    fn test_ua_node_id_invalid() {
        assert!("ns=x;i=1".parse::<UaNodeId>().is_err());
        assert!("ns=1".parse::<UaNodeId>().is_err());
        assert!("x=1".parse::<UaNodeId>().is_err());
        assert!("i=abc".parse::<UaNodeId>().is_err());
    }

    #[test]
    fn test_ua_node_id_null() {
        assert!(UaNodeId::null().is_null());
        assert!(UaNodeId::default().is_null());
        assert!(!UaNodeId::numeric(1, 0).is_null());
    }

    // =========================================================================
    // StatusCode Tests
    // =========================================================================

    #[test]
    fn test_status_code() {
        assert!(StatusCode::GOOD.is_good());
        assert!(!StatusCode::GOOD.is_bad());
        assert!(StatusCode::BAD_NO_MATCH.is_bad());
        assert_eq!(StatusCode::BAD_NO_MATCH.name(), "BadNoMatch");
        assert_eq!(StatusCode(0x80FF_0000).name(), "Bad");
        assert_eq!(StatusCode(0x4000_0000).name(), "Uncertain");
        assert_eq!(
            StatusCode::BAD_NODE_ID_UNKNOWN.to_string(),
            "BadNodeIdUnknown (0x80340000)"
        );
    }

    // =========================================================================
    // ClientConfig Tests
    // =========================================================================

    #[test]
    fn test_config_builder_defaults() {
        let config = ClientConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .build()
            .unwrap();

        assert_eq!(config.security_mode, SecurityMode::None);
        assert_eq!(config.user_identity, UserIdentity::Anonymous);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect_interval, Duration::from_secs(1));
        assert_eq!(config.max_type_depth, 100);
        assert!(config.expected_type_namespaces.is_empty());
    }

    #[test]
    fn test_config_validation() {
        assert!(ClientConfig::builder().build().is_err());
        assert!(ClientConfig::new("http://localhost").validate().is_err());
        assert!(ClientConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .max_type_depth(0)
            .build()
            .is_err());
        assert!(ClientConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .username("", "secret")
            .build()
            .is_err());
    }

    #[test]
    fn test_config_serde() {
        let json = r#"{
            "endpoint": "opc.tcp://machine:4840",
            "security_mode": "sign_and_encrypt",
            "user_identity": { "type": "user_name", "username": "op", "password": "pw" },
            "reconnect_interval": "250ms",
            "expected_type_namespaces": ["http://opcfoundation.org/UA/MachineTool/"]
        }"#;

        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.security_mode, SecurityMode::SignAndEncrypt);
        assert_eq!(config.reconnect_interval, Duration::from_millis(250));
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.max_crawl_depth, 64);
        assert!(config.validate().is_ok());

        let back = serde_json::to_string(&config).unwrap();
        assert!(back.contains("\"250ms\""));
    }

    #[test]
    fn test_user_identity_debug_hides_password() {
        let identity = UserIdentity::UserName {
            username: "op".into(),
            password: "secret".into(),
        };
        let debug = format!("{:?}", identity);
        assert!(debug.contains("op"));
        assert!(!debug.contains("secret"));
    }
}
