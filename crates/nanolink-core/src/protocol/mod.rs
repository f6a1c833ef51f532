// ============================================
// File: crates/nanolink-core/src/protocol/mod.rs
// ============================================
//! # Wire Protocol Module
//!
//! ## Creation Reason
//! Defines the 32-byte radio frame format and the fragmentation engine
//! that carries arbitrary messages over it.
//!
//! ## Main Functionality
//! - [`header`]: Fragment header codec (code byte + countdown index)
//! - [`fragment`]: Fragmentation and per-pipe reassembly
//!
//! ## Frame Format
//! ```text
//! ┌────────┬─────────────────┬──────────────────────┬──────────────┐
//! │ code   │ index (u16 LE)  │ payload (≤ 29 bytes) │ zero padding │
//! │ 1 byte │ 2 bytes         │                      │ to 32 bytes  │
//! └────────┴─────────────────┴──────────────────────┴──────────────┘
//! ```
//!
//! The index counts DOWN: the first fragment of an F-fragment message
//! carries `F - 1`, the last always carries 0. Trailing zero bytes of the
//! payload are stripped on receive - a payload genuinely ending in 0x00
//! loses those bytes (ciphertext payloads make this statistically rare).
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod fragment;
pub mod header;

// Re-export primary types at module level
pub use fragment::{Fragmenter, Reassembler, RECEIVE_TIMEOUT};
pub use header::{FragmentCode, FragmentHeader, CONTINUE_CODE, START_CODE};

// ============================================
// Constants
// ============================================

/// Wire frame size on the radio, in bytes.
pub const MAX_PACKET_SIZE: usize = 32;

/// In-frame header size: 1-byte code + 2-byte little-endian index.
pub const HEADER_SIZE: usize = 3;

/// Payload capacity of a single fragment.
pub const FRAGMENT_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - HEADER_SIZE;

/// Maximum plaintext message size accepted for transfer.
///
/// Ciphertext grows by the 12-byte nonce, so the largest wire message is
/// 2060 bytes (71 fragments).
pub const MAX_MSG_SIZE: usize = 2048;

/// Maximum fragments accumulated for a single incoming message.
pub const MAX_PACKETS_RCV: usize = 100;
