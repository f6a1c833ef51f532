// ============================================
// File: crates/nanolink-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types specific to protocol and cryptographic operations
//! in the NanoLink core crate.
//!
//! ## Main Functionality
//! - `CoreError`: Primary error enum for core operations
//! - Classification helpers separating crypto from protocol failures
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material in error messages
//! - Replay and key-exchange failures may indicate an attack; keep them
//!   loggable without leaking secrets
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use nanolink_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for protocol and cryptographic operations.
///
/// # Security Note
/// Error messages are designed to be informative for debugging
/// without revealing sensitive information like key material.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Cryptographic Errors
    // ========================================

    /// X25519 key exchange produced an unusable shared secret.
    #[error("Key exchange failed: {reason}")]
    KeyExchange {
        /// Why key exchange failed
        reason: String,
    },

    /// Wrong-sized key material supplied.
    #[error("Invalid key size: expected {expected}, got {actual}")]
    InvalidKeySize {
        /// Expected key length in bytes
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// Ciphertext is shorter than the nonce prefix.
    #[error("Ciphertext too short: need at least {expected} bytes, got {actual}")]
    CiphertextTooShort {
        /// Minimum expected length
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// Replay detected (counter not advancing).
    #[error("Replay detected: counter {received} not greater than {highest_seen}")]
    Replay {
        /// Counter value received
        received: u32,
        /// Highest counter accepted so far
        highest_seen: u32,
    },

    // ========================================
    // Protocol Errors
    // ========================================

    /// Unknown fragment code byte.
    #[error("Unknown fragment code: 0x{0:02x}")]
    UnknownFragmentCode(u8),

    /// Frame is too short to carry a fragment header.
    #[error("Frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum expected length
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// Message exceeds the maximum transferable size.
    #[error("Message too large: max {max} bytes, got {actual}")]
    MessageTooLarge {
        /// Maximum allowed size
        max: usize,
        /// Actual size submitted
        actual: usize,
    },

    /// Message is empty (nothing to fragment).
    #[error("Message is empty")]
    EmptyMessage,

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `KeyExchange` error.
    pub fn key_exchange(reason: impl Into<String>) -> Self {
        Self::KeyExchange {
            reason: reason.into(),
        }
    }

    /// Creates a `Replay` error.
    #[must_use]
    pub const fn replay(received: u32, highest_seen: u32) -> Self {
        Self::Replay {
            received,
            highest_seen,
        }
    }

    /// Creates a `FrameTooShort` error.
    #[must_use]
    pub const fn frame_too_short(expected: usize, actual: usize) -> Self {
        Self::FrameTooShort { expected, actual }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this is a cryptographic error.
    #[must_use]
    pub const fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::KeyExchange { .. }
                | Self::InvalidKeySize { .. }
                | Self::CiphertextTooShort { .. }
                | Self::Replay { .. }
        )
    }

    /// Returns `true` if this error might indicate an attack.
    ///
    /// These errors warrant additional logging/monitoring.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(self, Self::Replay { .. } | Self::KeyExchange { .. })
    }
}

// ============================================
// Tests
// ============================================
