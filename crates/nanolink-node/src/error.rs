// ============================================
// File: crates/nanolink-node/src/error.rs
// ============================================
//! # Node Error Types
//!
//! ## Creation Reason
//! Defines the error surface of the link-layer node: argument validation,
//! state conflicts, and wrapped protocol/crypto failures.
//!
//! ## Main Functionality
//! - `NodeError`: Primary error enum for node operations
//! - `Result<T>`: Type alias using `NodeError`
//!
//! ## Error Philosophy
//! Radio write failures are NOT errors here: mid-transfer they surface
//! through the `SendStatus` observable, and during pairing they are
//! transient and retried. `NodeError` covers what the caller got wrong
//! or what the node could not even start.
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use nanolink_common::error::CommonError;
use nanolink_core::error::CoreError;

use crate::node::LinkStateKind;

// ============================================
// Result Type Alias
// ============================================

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

// ============================================
// NodeError
// ============================================

/// Error surface of the link-layer node.
#[derive(Error, Debug)]
pub enum NodeError {
    /// The node is disabled; no radio operation is possible.
    #[error("Node is disabled")]
    Disabled,

    /// An exclusive radio operation is already in progress.
    #[error("Node is busy: state is {state}")]
    Busy {
        /// The state occupying the radio
        state: LinkStateKind,
    },

    /// Channel index outside `0..MAX_CHANNELS`.
    #[error("Invalid channel: {0}")]
    InvalidChannel(u8),

    /// No device is paired on the addressed channel.
    #[error("Channel {0} is not paired")]
    NotPaired(u8),

    /// Message exceeds the maximum transferable size.
    #[error("Message too large: max {max} bytes, got {actual}")]
    MessageTooLarge {
        /// Maximum allowed plaintext size
        max: usize,
        /// Actual size submitted
        actual: usize,
    },

    /// Message is empty.
    #[error("Message is empty")]
    EmptyMessage,

    /// Configuration blob could not be parsed.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the blob
        reason: String,
    },

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the core crate.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from the common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl NodeError {
    /// Creates an `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the operation may succeed when retried later
    /// (the node was merely busy or disabled).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Busy { .. } | Self::Disabled)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NodeError::InvalidChannel(9);
        assert!(err.to_string().contains('9'));

        let err = NodeError::MessageTooLarge {
            max: 2048,
            actual: 2049,
        };
        assert!(err.to_string().contains("2048"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(NodeError::Disabled.is_transient());
        assert!(NodeError::Busy {
            state: LinkStateKind::Transmitting
        }
        .is_transient());
        assert!(!NodeError::InvalidChannel(0).is_transient());
    }

    #[test]
    fn test_core_error_conversion() {
        let core = CoreError::EmptyMessage;
        let node: NodeError = core.into();
        assert!(matches!(node, NodeError::Core(_)));
    }
}
