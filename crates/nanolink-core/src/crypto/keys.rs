// ============================================
// File: crates/nanolink-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Defines key types used throughout the NanoLink pairing protocol with
//! proper security properties (Zeroize on drop, redacted Debug output).
//!
//! ## Main Functionality
//! - `DeviceKeyPair`: Long-lived X25519 key pair identifying this device
//! - `PeerPublicKey`: A paired peer's X25519 public key
//! - `SharedKey`: Raw X25519 shared secret, keying the secure channel
//!
//! ## Key Lifecycle
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  DeviceKeyPair (Long-lived)                                │
//! │  ├─ Generated at construction, or imported from the saved  │
//! │  │  configuration blob                                     │
//! │  └─ One per device; exchanged during pairing               │
//! │                                                            │
//! │  SharedKey (Per-peer)                                      │
//! │  ├─ Derived once per pairing via X25519                    │
//! │  ├─ Stored in the peer's directory slot                    │
//! │  └─ Zeroed when the slot is cleared                        │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The device secret is a `StaticSecret`, NOT an ephemeral one: the
//!   configuration export round-trips the private key
//! - Private keys should NEVER be logged or serialized carelessly
//! - The shared key is the raw Diffie-Hellman output (no KDF) - both
//!   sides must store bitwise-identical keys
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::KEY_SIZE;
use crate::error::{CoreError, Result};

// ============================================
// DeviceKeyPair (X25519)
// ============================================

/// Long-lived X25519 key pair identifying this device.
///
/// # Purpose
/// The public half is exchanged during pairing; the secret half derives
/// one shared key per paired peer.
///
/// # Security
/// - Secret key is zeroed on drop (via `StaticSecret`)
/// - Never serialize the secret key outside `export` (configuration blob)
/// - Generate using the OS random number generator
///
/// # Example
/// ```
/// use nanolink_core::crypto::{DeviceKeyPair, PeerPublicKey};
///
/// let alice = DeviceKeyPair::generate();
/// let bob = DeviceKeyPair::generate();
///
/// let alice_shared = alice
///     .diffie_hellman(&PeerPublicKey::from_bytes(bob.public_key_bytes()))
///     .unwrap();
/// let bob_shared = bob
///     .diffie_hellman(&PeerPublicKey::from_bytes(alice.public_key_bytes()))
///     .unwrap();
///
/// // Both parties hold the same shared secret
/// assert_eq!(alice_shared, bob_shared);
/// ```
pub struct DeviceKeyPair {
    /// X25519 secret key (zeroed on drop by the dalek implementation)
    secret: StaticSecret,
    /// Matching public key, cached at construction
    public: X25519PublicKey,
}

impl DeviceKeyPair {
    /// Generates a new random device key pair.
    ///
    /// Uses the operating system's secure random number generator.
    #[must_use]
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Restores a key pair from raw key bytes (configuration import).
    ///
    /// The provided public key is stored verbatim; it is the caller's
    /// exported value and round-trips through `export`.
    ///
    /// # Errors
    /// Returns an error if either slice is not exactly 32 bytes.
    pub fn from_bytes(public: &[u8], private: &[u8]) -> Result<Self> {
        let secret_bytes: [u8; KEY_SIZE] =
            private.try_into().map_err(|_| CoreError::InvalidKeySize {
                expected: KEY_SIZE,
                actual: private.len(),
            })?;
        let public_bytes: [u8; KEY_SIZE] =
            public.try_into().map_err(|_| CoreError::InvalidKeySize {
                expected: KEY_SIZE,
                actual: public.len(),
            })?;
        Ok(Self {
            secret: StaticSecret::from(secret_bytes),
            public: X25519PublicKey::from(public_bytes),
        })
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; KEY_SIZE] {
        self.public.to_bytes()
    }

    /// Exports the secret key bytes for the configuration blob.
    ///
    /// # Security Warning
    /// Handle the returned bytes with extreme care; zero them after use.
    #[must_use]
    pub fn private_key_bytes(&self) -> [u8; KEY_SIZE] {
        self.secret.to_bytes()
    }

    /// Derives the shared key for a peer.
    ///
    /// # Errors
    /// Returns `KeyExchange` if the exchange is non-contributory (the peer
    /// supplied a low-order point and the output would be all zeros).
    pub fn diffie_hellman(&self, peer: &PeerPublicKey) -> Result<SharedKey> {
        let peer_key = X25519PublicKey::from(*peer.as_bytes());
        let shared = self.secret.diffie_hellman(&peer_key);
        if !shared.was_contributory() {
            return Err(CoreError::key_exchange("non-contributory peer key"));
        }
        Ok(SharedKey::from_bytes(shared.to_bytes()))
    }
}

impl fmt::Debug for DeviceKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print private key material
        let bytes = self.public.as_bytes();
        f.debug_struct("DeviceKeyPair")
            .field(
                "public",
                &format_args!(
                    "{:02x}{:02x}{:02x}{:02x}...",
                    bytes[0], bytes[1], bytes[2], bytes[3]
                ),
            )
            .finish_non_exhaustive()
    }
}

// ============================================
// PeerPublicKey
// ============================================

/// A peer's X25519 public key.
///
/// Safe to share and persist. Serialized as base64 in human-readable
/// formats (the configuration blob) and as raw bytes otherwise.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PeerPublicKey([u8; KEY_SIZE]);

impl PeerPublicKey {
    /// Creates a public key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a public key from a byte slice.
    ///
    /// # Errors
    /// Returns an error if the slice is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CoreError::InvalidKeySize {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Returns the raw public key bytes (owned).
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; KEY_SIZE] {
        self.0
    }
}

impl fmt::Debug for PeerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show truncated hex for debugging
        write!(
            f,
            "PeerPublicKey({:02x}{:02x}{:02x}{:02x}...)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl fmt::Display for PeerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE64.encode(self.0))
    }
}

impl Serialize for PeerPublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&BASE64.encode(self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for PeerPublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            BASE64.decode(&s).map_err(serde::de::Error::custom)?
        } else {
            <Vec<u8>>::deserialize(deserializer)?
        };
        Self::from_slice(&bytes)
            .map_err(|_| serde::de::Error::invalid_length(bytes.len(), &"32 bytes"))
    }
}

// ============================================
// SharedKey
// ============================================

/// Symmetric key shared with one paired peer.
///
/// # Purpose
/// The raw X25519 Diffie-Hellman output, used directly as the ChaCha20
/// key of that peer's secure channel.
///
/// # Security
/// - Zeroed on drop
/// - Never logged or serialized
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; KEY_SIZE]);

impl SharedKey {
    /// Creates a shared key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates an all-zero key (the state of an unpaired slot).
    #[must_use]
    pub const fn zeroed() -> Self {
        Self([0u8; KEY_SIZE])
    }

    /// Returns the raw key bytes.
    ///
    /// # Security Warning
    /// Handle the returned reference carefully. Do not log or store the
    /// key material in unprotected storage.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material
        write!(f, "SharedKey([REDACTED])")
    }
}

impl PartialEq for SharedKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SharedKey {}

// ============================================
// Tests
// ============================================
