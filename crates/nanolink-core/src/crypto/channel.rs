// ============================================
// File: crates/nanolink-core/src/crypto/channel.rs
// ============================================
//! # Per-Peer Secure Channel
//!
//! ## Creation Reason
//! Provides confidentiality and replay rejection for message payloads
//! exchanged with one paired peer, using the ChaCha20 stream cipher.
//!
//! ## Main Functionality
//! - `SecureChannel`: key + monotonic send counter + highest-seen counter
//! - Nonce construction from a random IV and the counter
//! - Replay rejection on receive
//!
//! ## Ciphertext Format
//! ```text
//! ┌──────────────────────┬──────────────────┬───────────────────────┐
//! │ IV (8 random bytes)  │ Counter (u32 LE) │ body (keystream XOR)  │
//! └──────────────────────┴──────────────────┴───────────────────────┘
//!          └────────── nonce (12 bytes) ──────────┘
//! ```
//!
//! ## Security Properties
//! - **Confidentiality**: ChaCha20 keystream XOR
//! - **Replay Protection**: received counter must exceed the highest seen
//! - **No integrity tag**: tampering is NOT detected at this layer
//!
//! ## ⚠️ Important Note for Next Developer
//! - Counters are NOT persisted: a reboot resets the replay window to the
//!   peer's counter from the previous session
//! - The send counter wraps at 2³²; the replay window is broken past that
//!   point (a warning is logged at the wrap)
//! - `set_key` MUST reset both counters - reusing a counter under a new
//!   key is harmless, reusing a nonce under the same key is catastrophic
//!
//! ## Last Modified
//! v0.1.0 - Initial secure channel implementation

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::warn;

use super::{SharedKey, COUNTER_SIZE, IV_SIZE, NONCE_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// SecureChannel
// ============================================

/// Encrypting/decrypting state for one paired peer.
///
/// # Example
/// ```
/// use nanolink_core::crypto::{SecureChannel, SharedKey};
///
/// let key = SharedKey::from_bytes([0x42; 32]);
/// let mut sender = SecureChannel::new(key.clone());
/// let mut receiver = SecureChannel::new(key);
///
/// let ciphertext = sender.encrypt(b"hello");
/// assert_eq!(receiver.decrypt(&ciphertext).unwrap(), b"hello");
///
/// // The same ciphertext is rejected a second time
/// assert!(receiver.decrypt(&ciphertext).is_err());
/// ```
pub struct SecureChannel {
    /// ChaCha20 key (the raw X25519 shared secret).
    key: SharedKey,
    /// Counter of the last message encrypted on this channel.
    send_counter: u32,
    /// Highest counter accepted from the peer so far.
    highest_seen: u32,
}

impl SecureChannel {
    /// Creates a channel keyed with `key`, counters at zero.
    #[must_use]
    pub const fn new(key: SharedKey) -> Self {
        Self {
            key,
            send_counter: 0,
            highest_seen: 0,
        }
    }

    /// Creates an unkeyed channel (all-zero key), as held by a free slot.
    #[must_use]
    pub const fn unkeyed() -> Self {
        Self::new(SharedKey::zeroed())
    }

    /// Installs a new key and resets both counters.
    pub fn set_key(&mut self, key: SharedKey) {
        self.key = key;
        self.send_counter = 0;
        self.highest_seen = 0;
    }

    /// Returns the counter of the last encrypted message.
    #[must_use]
    pub const fn send_counter(&self) -> u32 {
        self.send_counter
    }

    /// Returns the highest counter accepted from the peer.
    #[must_use]
    pub const fn highest_seen(&self) -> u32 {
        self.highest_seen
    }

    /// Encrypts a plaintext, producing `nonce ∥ body`.
    ///
    /// The counter is incremented before use, so the first message on a
    /// fresh channel carries counter 1 and is accepted by a peer whose
    /// receive side starts at 0.
    #[must_use]
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8> {
        self.send_counter = self.send_counter.wrapping_add(1);
        if self.send_counter == 0 {
            // Past this point the peer rejects everything until rekeyed
            warn!("secure channel send counter wrapped; replay window is broken");
        }

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce[..IV_SIZE]);
        nonce[IV_SIZE..].copy_from_slice(&self.send_counter.to_le_bytes());

        let mut output = Vec::with_capacity(NONCE_SIZE + plaintext.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(plaintext);

        let mut cipher = ChaCha20::new(self.key.as_bytes().into(), (&nonce).into());
        cipher.apply_keystream(&mut output[NONCE_SIZE..]);

        output
    }

    /// Decrypts `nonce ∥ body`, enforcing replay rejection.
    ///
    /// # Errors
    /// - `CiphertextTooShort` if the input cannot contain a nonce
    /// - `Replay` if the embedded counter does not advance past the
    ///   highest counter already accepted
    pub fn decrypt(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
        if bytes.len() < NONCE_SIZE {
            return Err(CoreError::CiphertextTooShort {
                expected: NONCE_SIZE,
                actual: bytes.len(),
            });
        }

        let mut counter_bytes = [0u8; COUNTER_SIZE];
        counter_bytes.copy_from_slice(&bytes[IV_SIZE..NONCE_SIZE]);
        let received = u32::from_le_bytes(counter_bytes);

        if received <= self.highest_seen {
            return Err(CoreError::replay(received, self.highest_seen));
        }
        self.highest_seen = received;

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[..NONCE_SIZE]);
        let mut plaintext = bytes[NONCE_SIZE..].to_vec();

        let mut cipher = ChaCha20::new(self.key.as_bytes().into(), (&nonce).into());
        cipher.apply_keystream(&mut plaintext);

        Ok(plaintext)
    }
}

impl std::fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key is redacted by SharedKey's Debug
        f.debug_struct("SecureChannel")
            .field("send_counter", &self.send_counter)
            .field("highest_seen", &self.highest_seen)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
