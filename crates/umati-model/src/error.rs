// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the address space model.

use thiserror::Error;

/// Errors raised while parsing or validating model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A node id string was not in `"<uri>;<id>"` form.
    #[error("Invalid node id '{input}': {reason}")]
    InvalidNodeId {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A qualified name string was not in `"<uri>;<name>"` form.
    #[error("Invalid qualified name '{input}': {reason}")]
    InvalidQualifiedName {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A numeric node class value outside the defined set.
    #[error("Unknown node class value {0}")]
    UnknownNodeClass(u32),
}

impl ModelError {
    /// Creates an invalid node id error.
    pub fn invalid_node_id(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid qualified name error.
    pub fn invalid_qualified_name(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQualifiedName {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::invalid_node_id("abc", "missing ';' separator");
        assert_eq!(err.to_string(), "Invalid node id 'abc': missing ';' separator");

        let err = ModelError::UnknownNodeClass(3);
        assert_eq!(err.to_string(), "Unknown node class value 3");
    }
}
