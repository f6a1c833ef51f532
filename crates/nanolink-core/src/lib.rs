// ============================================
// File: crates/nanolink-core/src/lib.rs
// ============================================
//! # NanoLink Core - Protocol & Cryptography Library
//!
//! ## Creation Reason
//! Provides the wire protocol and cryptographic operations for the NanoLink
//! radio link layer. This crate is the security backbone of the system.
//!
//! ## Main Functionality
//!
//! ### Protocol Module ([`protocol`])
//! - Fragment header codec (start/continue codes, countdown index)
//! - Fragmentation of messages into 32-byte radio frames
//! - Per-pipe reassembly with inactivity expiry
//!
//! ### Crypto Module ([`crypto`])
//! - Key types (`DeviceKeyPair`, `PeerPublicKey`, `SharedKey`)
//! - X25519 shared-secret derivation
//! - Per-peer secure channel (ChaCha20 + counter nonces + replay rejection)
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              nanolink-node                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   nanolink-core  ◄──   nanolink-transport          │
//! │   You are here        │                            │
//! │         │             │                            │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             nanolink-common                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Guarantees
//! - **Confidentiality**: ChaCha20 stream encryption of message payloads
//! - **Replay Protection**: Monotonic counters embedded in every nonce
//! - **Forward Secrecy**: None - pairing derives one long-lived key per peer
//!
//! Note that the transport deliberately provides no integrity tag: the
//! link carries confidentiality and replay resistance only.
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL cryptographic code uses audited RustCrypto/dalek implementations
//! - NEVER implement custom crypto primitives
//! - Secret keys MUST implement Zeroize for secure cleanup
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod protocol;

// Re-export commonly used items
pub use crypto::{DeviceKeyPair, PeerPublicKey, SecureChannel, SharedKey};
pub use error::{CoreError, Result};
pub use protocol::{FragmentCode, FragmentHeader, Fragmenter, Reassembler};
