// ============================================
// File: crates/nanolink-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Provides foundational error types and result aliases used across
//! all NanoLink crates, enabling consistent error handling.
//!
//! ## Main Functionality
//! - `CommonError`: Base error enum for common operations
//! - `Result<T>`: Type alias using `CommonError`
//!
//! ## Design Philosophy
//! - Use `thiserror` for ergonomic error definitions
//! - Each crate may define its own error types that wrap `CommonError`
//! - Errors should be informative without leaking sensitive information
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never include key material in error messages
//! - Keep error variants specific but not too granular
//! - Implement `From` traits for seamless error propagation
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

// ============================================
// CommonError
// ============================================

/// Common error types shared across NanoLink crates.
///
/// # Categories
/// - **Validation**: Input validation failures (addresses, identifiers)
/// - **Encoding**: Serialization/deserialization errors
/// - **Internal**: Unexpected internal state
///
/// # Example
/// ```
/// use nanolink_common::error::{CommonError, Result};
///
/// fn validate_input(data: &[u8]) -> Result<()> {
///     if data.is_empty() {
///         return Err(CommonError::invalid_input("data", "cannot be empty"));
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum CommonError {
    // ========================================
    // Validation Errors
    // ========================================

    /// Invalid input data provided.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Name of the field or parameter
        field: String,
        /// Description of what's wrong
        reason: String,
    },

    /// Data length doesn't match expected size.
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// A peer address failed the validity predicate.
    #[error("Invalid address: {reason}")]
    InvalidAddress {
        /// Why the address is not acceptable
        reason: String,
    },

    // ========================================
    // Encoding Errors
    // ========================================

    /// Failed to decode/deserialize data.
    #[error("Decoding error: {context}")]
    Decoding {
        /// What was being decoded
        context: String,
        /// Error details
        details: String,
    },

    // ========================================
    // Internal Errors
    // ========================================

    /// Internal error (bug or unexpected condition).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of what went wrong
        message: String,
    },
}

impl CommonError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidLength` error.
    #[must_use]
    pub const fn invalid_length(expected: usize, actual: usize) -> Self {
        Self::InvalidLength { expected, actual }
    }

    /// Creates an `InvalidAddress` error.
    pub fn invalid_address(reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            reason: reason.into(),
        }
    }

    /// Creates a `Decoding` error.
    pub fn decoding(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Decoding {
            context: context.into(),
            details: details.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error indicates a caller mistake.
    ///
    /// Caller errors are caused by invalid input or requests, not by
    /// link-layer issues.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::InvalidLength { .. } | Self::InvalidAddress { .. }
        )
    }
}

// ============================================
// Tests
// ============================================
