// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for address space crawling.
//!
//! Errors are grouped by what went wrong rather than by which component
//! raised them, so callers can react uniformly:
//!
//! ```text
//! OpcUaError
//! ├── Connection    - no session, or a session could not be established
//! ├── Status        - the server answered with a non-good status code
//! ├── Schema        - the answer did not have the expected shape
//! ├── NotFound      - a lookup legitimately matched nothing
//! └── Configuration - invalid settings
//! ```
//!
//! None of these are retried by the engine. Only the background reconnect
//! loop retries, and it retries connecting, never an in-flight call.
//!
//! # Examples
//!
//! ```
//! use umati_opcua::error::{OpcUaError, NotFoundError, ErrorSeverity};
//!
//! let error = OpcUaError::from(NotFoundError::no_target("ns0;i=85", "ns1;Identification"));
//! assert_eq!(error.category(), "not_found");
//! assert_eq!(error.severity(), ErrorSeverity::Warning);
//! assert!(!error.is_retryable());
//! ```

use std::fmt;

use thiserror::Error;
use tracing::Level;

use crate::types::StatusCode;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type for the crawler.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// No usable session.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// The server reported a non-good status.
    #[error("{0}")]
    Status(#[from] ProtocolStatusError),

    /// A structural expectation was violated.
    #[error("{0}")]
    Schema(#[from] SchemaError),

    /// A lookup found zero matches.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// Invalid configuration.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a schema error.
    #[inline]
    pub fn schema(error: SchemaError) -> Self {
        Self::Schema(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates a "not connected" error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a protocol status error.
    pub fn bad_status(
        operation: impl Into<String>,
        node: impl fmt::Display,
        status: StatusCode,
    ) -> Self {
        Self::Status(ProtocolStatusError::new(operation, node, status))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if a later attempt may succeed without caller changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Status(e) => e.is_retryable(),
            Self::Schema(_) | Self::NotFound(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns `true` for connection errors.
    #[inline]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns the status code carried by a protocol status error.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Status(e) => Some(e.status),
            _ => None,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Status(_) => ErrorSeverity::Error,
            Self::Schema(_) => ErrorSeverity::Error,
            Self::NotFound(_) => ErrorSeverity::Warning,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Status(_) => "status",
            Self::Schema(_) => "schema",
            Self::NotFound(_) => "not_found",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Status(_) => ErrorCode::new(2, 1),
            Self::Schema(e) => e.error_code(),
            Self::NotFound(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Session-level errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// An operation was attempted while no session is established.
    #[error("Not connected to OPC UA server")]
    NotConnected,

    /// The server offers no endpoint with the configured security mode.
    #[error("No suitable endpoint found with security mode '{security_mode}'")]
    NoSuitableEndpoint {
        /// Required security mode.
        security_mode: String,
    },

    /// The transport failed to establish a session.
    #[error("Failed to connect to '{endpoint}': {message}")]
    ConnectFailed {
        /// Target endpoint.
        endpoint: String,
        /// Transport message.
        message: String,
    },

    /// The transport lost its session during a call.
    #[error("Connection closed: {reason}")]
    Closed {
        /// Reason reported by the transport.
        reason: String,
    },

    /// The manager is shutting down.
    #[error("Connection manager is shutting down")]
    ShuttingDown,
}

impl ConnectionError {
    /// Creates a no suitable endpoint error.
    pub fn no_suitable_endpoint(security_mode: impl Into<String>) -> Self {
        Self::NoSuitableEndpoint {
            security_mode: security_mode.into(),
        }
    }

    /// Creates a connect failure.
    pub fn connect_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a closed connection error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ShuttingDown)
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::Closed { .. } => ErrorSeverity::Warning,
            Self::ShuttingDown => ErrorSeverity::Info,
            Self::NoSuitableEndpoint { .. } | Self::ConnectFailed { .. } => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotConnected => ErrorCode::new(1, 1),
            Self::NoSuitableEndpoint { .. } => ErrorCode::new(1, 2),
            Self::ConnectFailed { .. } => ErrorCode::new(1, 3),
            Self::Closed { .. } => ErrorCode::new(1, 4),
            Self::ShuttingDown => ErrorCode::new(1, 5),
        }
    }
}

// =============================================================================
// ProtocolStatusError
// =============================================================================

/// The server answered a request with a non-good status code.
#[derive(Debug, Clone, Error)]
#[error("{operation} on '{node}' failed with {status}")]
pub struct ProtocolStatusError {
    /// Service that failed (e.g. `Browse`).
    pub operation: String,
    /// Node the request was about.
    pub node: String,
    /// Reported status.
    pub status: StatusCode,
}

impl ProtocolStatusError {
    /// Creates a protocol status error.
    pub fn new(operation: impl Into<String>, node: impl fmt::Display, status: StatusCode) -> Self {
        Self {
            operation: operation.into(),
            node: node.to_string(),
            status,
        }
    }

    /// Returns `true` for statuses that describe a transient server condition.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.status,
            StatusCode::BAD_TIMEOUT
                | StatusCode::BAD_TOO_MANY_OPERATIONS
                | StatusCode::BAD_RESOURCE_UNAVAILABLE
                | StatusCode::BAD_SERVER_HALTED
        )
    }
}

// =============================================================================
// SchemaError
// =============================================================================

/// A structural expectation about the server's answer was violated.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Wrong number of results.
    #[error("{operation} returned {actual} results, expected {expected}")]
    UnexpectedResultCount {
        /// Service that was called.
        operation: String,
        /// Expected count.
        expected: usize,
        /// Actual count.
        actual: usize,
    },

    /// A value had an unexpected type.
    #[error("Unexpected value type for '{node}': expected {expected}, got {actual}")]
    UnexpectedValueType {
        /// Node that was read.
        node: String,
        /// Expected type.
        expected: String,
        /// Actual type.
        actual: String,
    },

    /// A node had a class the operation cannot handle.
    #[error("Invalid node class {node_class} for '{node}'")]
    InvalidNodeClass {
        /// Offending node.
        node: String,
        /// Its class.
        node_class: String,
    },

    /// A namespace URI is not in the current namespace table.
    #[error("Namespace URI '{uri}' is not known to the server")]
    UnknownNamespaceUri {
        /// The URI.
        uri: String,
    },

    /// A namespace index is not in the current namespace table.
    #[error("Namespace index {index} is not known to the server")]
    UnknownNamespaceIndex {
        /// The index.
        index: u16,
    },

    /// A required argument was null.
    #[error("Argument '{argument}' must not be null")]
    NullArgument {
        /// Argument name.
        argument: &'static str,
    },

    /// A node identifier could not be parsed.
    #[error("Invalid node id '{node_id}': {reason}")]
    InvalidNodeId {
        /// The identifier.
        node_id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Browse continuation did not end within the configured page bound.
    #[error("Browse of '{node}' exceeded {max_pages} continuation pages")]
    TooManyPages {
        /// Browsed node.
        node: String,
        /// Configured bound.
        max_pages: usize,
    },

    /// A parent chain in the crawl forest is broken or cyclic.
    #[error("Broken ancestry for type '{type_name}'")]
    BrokenAncestry {
        /// Type being flattened.
        type_name: String,
    },
}

impl SchemaError {
    /// Creates an unexpected result count error.
    pub fn unexpected_result_count(
        operation: impl Into<String>,
        expected: usize,
        actual: usize,
    ) -> Self {
        Self::UnexpectedResultCount {
            operation: operation.into(),
            expected,
            actual,
        }
    }

    /// Creates an unexpected value type error.
    pub fn unexpected_value_type(
        node: impl fmt::Display,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::UnexpectedValueType {
            node: node.to_string(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an invalid node class error.
    pub fn invalid_node_class(node: impl fmt::Display, node_class: impl fmt::Display) -> Self {
        Self::InvalidNodeClass {
            node: node.to_string(),
            node_class: node_class.to_string(),
        }
    }

    /// Creates an unknown namespace URI error.
    pub fn unknown_namespace_uri(uri: impl Into<String>) -> Self {
        Self::UnknownNamespaceUri { uri: uri.into() }
    }

    /// Creates an invalid node id error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnexpectedResultCount { .. } => ErrorCode::new(3, 1),
            Self::UnexpectedValueType { .. } => ErrorCode::new(3, 2),
            Self::InvalidNodeClass { .. } => ErrorCode::new(3, 3),
            Self::UnknownNamespaceUri { .. } => ErrorCode::new(3, 4),
            Self::UnknownNamespaceIndex { .. } => ErrorCode::new(3, 5),
            Self::NullArgument { .. } => ErrorCode::new(3, 6),
            Self::InvalidNodeId { .. } => ErrorCode::new(3, 7),
            Self::TooManyPages { .. } => ErrorCode::new(3, 8),
            Self::BrokenAncestry { .. } => ErrorCode::new(3, 9),
        }
    }
}

// =============================================================================
// NotFoundError
// =============================================================================

/// A lookup legitimately matched nothing.
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// Browse path translation yielded no target.
    #[error("No node named '{name}' below '{start}'")]
    NoTarget {
        /// Start node.
        start: String,
        /// Requested browse name.
        name: String,
    },

    /// A type name is not in the type map.
    #[error("Type '{type_name}' is not in the type map")]
    TypeNotFound {
        /// Qualified type name.
        type_name: String,
    },

    /// A reference expected on a node is missing.
    #[error("Node '{node}' has no {reference} reference")]
    Reference {
        /// Node that was browsed.
        node: String,
        /// Missing reference.
        reference: String,
    },

    /// No subscription is registered under a handle.
    #[error("Unknown subscription {id}")]
    Subscription {
        /// Subscription handle.
        id: String,
    },
}

impl NotFoundError {
    /// Creates a missing path target error.
    pub fn no_target(start: impl fmt::Display, name: impl fmt::Display) -> Self {
        Self::NoTarget {
            start: start.to_string(),
            name: name.to_string(),
        }
    }

    /// Creates a missing type error.
    pub fn type_name(type_name: impl Into<String>) -> Self {
        Self::TypeNotFound {
            type_name: type_name.into(),
        }
    }

    /// Creates a missing reference error.
    pub fn reference(node: impl fmt::Display, reference: impl Into<String>) -> Self {
        Self::Reference {
            node: node.to_string(),
            reference: reference.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NoTarget { .. } => ErrorCode::new(4, 1),
            Self::TypeNotFound { .. } => ErrorCode::new(4, 2),
            Self::Reference { .. } => ErrorCode::new(4, 3),
            Self::Subscription { .. } => ErrorCode::new(4, 4),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid client settings.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required field is missing.
    #[error("Missing required field: {field}")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// The endpoint URL is malformed.
    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint {
        /// The URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// A numeric setting is out of range.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Reason.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingField { .. } => ErrorCode::new(5, 1),
            Self::InvalidEndpoint { .. } => ErrorCode::new(5, 2),
            Self::InvalidValue { .. } => ErrorCode::new(5, 3),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code for categorization.
///
/// Format: `UA-XXYY` where XX is category and YY is specific error.
///
/// Categories:
/// - 1: Connection
/// - 2: Status
/// - 3: Schema
/// - 4: NotFound
/// - 5: Configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1-5).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Result type for crawler operations.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// Tests
// =============================================================================
