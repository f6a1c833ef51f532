// ============================================
// File: crates/nanolink-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes all cryptographic operations for the NanoLink link layer,
//! using audited RustCrypto and dalek implementations.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: Key types and X25519 shared-secret derivation
//! - [`channel`]: Per-peer secure channel (ChaCha20 + replay rejection)
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Pairing Phase                            │
//! │  Device A                                     Device B      │
//! │    │  X25519 Public Key ─────────────────────► │            │
//! │    │ ◄───────────────────── X25519 Public Key  │            │
//! │    │                                           │            │
//! │    │        X25519 Diffie-Hellman              │            │
//! │    │              │                            │            │
//! │    │              ▼                            │            │
//! │    │      Shared Key (32 bytes, no KDF)        │            │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Transport Phase                          │
//! │                                                             │
//! │  Shared Key + (IV ∥ Counter) ──► ChaCha20 ──► keystream XOR │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//! - **Confidentiality**: ChaCha20 stream cipher
//! - **Replay Protection**: Monotonic counter embedded in every nonce
//! - **No integrity tag**: tampering is not detected at this layer
//!
//! ## ⚠️ Important Note for Next Developer
//! - The shared key is the raw X25519 output by design - the peer stores
//!   the same 32 bytes, and the exported configuration depends on it
//! - NEVER roll your own crypto
//! - Secret key types implement Zeroize
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod channel;
pub mod keys;

// Re-export primary types at module level
pub use channel::SecureChannel;
pub use keys::{DeviceKeyPair, PeerPublicKey, SharedKey};

// ============================================
// Constants
// ============================================

/// Size of X25519 public, private and shared keys in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of the ChaCha20 nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Size of the per-message counter embedded in the nonce, in bytes.
pub const COUNTER_SIZE: usize = 4;

/// Size of the random IV prefix of the nonce, in bytes.
pub const IV_SIZE: usize = NONCE_SIZE - COUNTER_SIZE;
