// ============================================
// File: crates/nanolink-node/src/directory.rs
// ============================================
//! # Paired Device Directory
//!
//! ## Creation Reason
//! Maintains the fixed-size table of paired peers: their addresses, key
//! material, secure channels and per-peer mailboxes, plus the JSON
//! snapshot used by configuration export/import.
//!
//! ## Main Functionality
//! - `Mailbox`: bounded FIFO of completed plaintext messages
//! - `PairedDevice`: one channel slot (address + keys + secure channel)
//! - `Directory`: slot allocation, UID lookup, install/clear, snapshot
//!
//! ## Invariants
//! - At most one slot holds a given UID (`install` clears duplicates)
//! - A slot's shared key is always the X25519 of the local private key
//!   and the slot's stored peer public key
//! - A mailbox never holds more than [`MAX_MAILBOX_MSG`] messages; a push
//!   into a full mailbox evicts the oldest
//!
//! ## ⚠️ Important Note for Next Developer
//! - Clearing a slot zeroes its key material (via `SecureChannel::set_key`
//!   with a zeroed key) and empties the mailbox
//! - The directory never touches the radio; the node re-opens reading
//!   pipes after directory mutations
//!
//! ## Last Modified
//! v0.1.0 - Initial directory implementation

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use nanolink_common::types::{Address, RadioId, MAX_CHANNELS};
use nanolink_core::crypto::{DeviceKeyPair, PeerPublicKey, SecureChannel, SharedKey};
use nanolink_core::error::Result as CoreResult;

// ============================================
// Constants
// ============================================

/// Maximum messages held per peer mailbox.
pub const MAX_MAILBOX_MSG: usize = 3;

// ============================================
// Mailbox
// ============================================

/// Bounded FIFO of completed plaintext messages from one peer.
#[derive(Debug, Default)]
pub struct Mailbox {
    messages: VecDeque<Vec<u8>>,
}

impl Mailbox {
    /// Creates an empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if no message is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Appends a message, evicting the oldest when full.
    pub fn push(&mut self, message: Vec<u8>) {
        if self.messages.len() >= MAX_MAILBOX_MSG {
            self.messages.pop_front();
            debug!("mailbox full; oldest message evicted");
        }
        self.messages.push_back(message);
    }

    /// Removes and returns the oldest message.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.messages.pop_front()
    }

    /// Discards all messages.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

// ============================================
// PairedDevice
// ============================================

/// One channel slot of the directory.
#[derive(Debug)]
pub struct PairedDevice {
    /// Peer address; `None` means the slot is free.
    pub(crate) addr: Option<Address>,
    /// Peer public key, kept for export and re-derivation.
    pub(crate) public_key: Option<PeerPublicKey>,
    /// Secure channel keyed by the derived shared secret.
    pub(crate) channel: SecureChannel,
    /// Completed messages from this peer.
    pub(crate) mailbox: Mailbox,
}

impl PairedDevice {
    fn free() -> Self {
        Self {
            addr: None,
            public_key: None,
            channel: SecureChannel::unkeyed(),
            mailbox: Mailbox::new(),
        }
    }

    /// Returns `true` if a peer is paired on this slot.
    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        self.addr.is_some()
    }

    /// Returns the peer address, if paired.
    #[must_use]
    pub const fn addr(&self) -> Option<Address> {
        self.addr
    }

    /// Returns the stored peer public key, if any.
    #[must_use]
    pub const fn public_key(&self) -> Option<PeerPublicKey> {
        self.public_key
    }

    /// Frees the slot, zeroing key material and dropping the mailbox.
    pub fn clear(&mut self) {
        self.addr = None;
        self.public_key = None;
        self.channel.set_key(SharedKey::zeroed());
        self.mailbox.clear();
    }
}

// ============================================
// Directory
// ============================================

/// Fixed-size table of paired peers.
#[derive(Debug)]
pub struct Directory {
    slots: [PairedDevice; MAX_CHANNELS],
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| PairedDevice::free()),
        }
    }

    /// Lowest free slot index, or `None` when every slot is occupied.
    #[must_use]
    pub fn available_channel(&self) -> Option<u8> {
        self.slots
            .iter()
            .position(|slot| !slot.is_occupied())
            .map(|idx| idx as u8)
    }

    /// Borrows a slot by channel index.
    #[must_use]
    pub fn device(&self, channel: u8) -> Option<&PairedDevice> {
        self.slots.get(channel as usize)
    }

    /// Mutably borrows a slot by channel index.
    pub(crate) fn device_mut(&mut self, channel: u8) -> Option<&mut PairedDevice> {
        self.slots.get_mut(channel as usize)
    }

    /// Mutably borrows the slot paired to `addr`, if any.
    pub(crate) fn device_by_addr_mut(&mut self, addr: &Address) -> Option<&mut PairedDevice> {
        self.slots
            .iter_mut()
            .find(|slot| slot.addr.as_ref() == Some(addr))
    }

    /// Returns the paired address of a channel.
    #[must_use]
    pub fn addr(&self, channel: u8) -> Option<Address> {
        self.device(channel).and_then(PairedDevice::addr)
    }

    /// Returns the UID of the peer paired on a channel.
    #[must_use]
    pub fn uid(&self, channel: u8) -> Option<RadioId> {
        self.addr(channel).map(|addr| addr.uid())
    }

    /// Finds the channel holding `uid`.
    #[must_use]
    pub fn channel_of(&self, uid: &RadioId) -> Option<u8> {
        self.slots
            .iter()
            .position(|slot| slot.addr.map(|addr| addr.uid()) == Some(*uid))
            .map(|idx| idx as u8)
    }

    /// Iterates over the indices of occupied slots.
    pub fn occupied_channels(&self) -> impl Iterator<Item = u8> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_occupied())
            .map(|(idx, _)| idx as u8)
    }

    /// Installs a peer on a channel.
    ///
    /// When a public key is supplied, the shared secret is derived and
    /// the slot's secure channel rekeyed; a derivation failure leaves the
    /// slot untouched. Any other slot already holding the same UID is
    /// cleared first, so a UID never occupies two slots.
    ///
    /// # Errors
    /// Propagates key-derivation failures from the core crate.
    pub fn install(
        &mut self,
        channel: u8,
        addr: Address,
        public_key: Option<&PeerPublicKey>,
        keys: &DeviceKeyPair,
    ) -> CoreResult<()> {
        let shared = match public_key {
            Some(peer) => Some(keys.diffie_hellman(peer)?),
            None => None,
        };

        // One slot per UID
        if let Some(existing) = self.channel_of(&addr.uid()) {
            if existing != channel {
                debug!(uid = %addr.uid(), existing, "clearing duplicate pairing");
                self.clear(existing);
            }
        }

        let Some(slot) = self.slots.get_mut(channel as usize) else {
            return Ok(());
        };
        slot.clear();
        slot.addr = Some(addr);
        if let (Some(peer), Some(shared)) = (public_key, shared) {
            slot.public_key = Some(*peer);
            slot.channel.set_key(shared);
        }
        Ok(())
    }

    /// Frees a channel slot.
    pub fn clear(&mut self, channel: u8) {
        if let Some(slot) = self.slots.get_mut(channel as usize) {
            slot.clear();
        }
    }

    /// Frees the slot holding `uid`; returns `true` if one was found.
    pub fn clear_uid(&mut self, uid: &RadioId) -> bool {
        match self.channel_of(uid) {
            Some(channel) => {
                self.clear(channel);
                true
            }
            None => false,
        }
    }

    /// Empties every mailbox (used when the node is disabled).
    pub fn clear_mailboxes(&mut self) {
        for slot in &mut self.slots {
            slot.mailbox.clear();
        }
    }

    // ========================================
    // Snapshot (JSON model)
    // ========================================

    /// Builds the JSON snapshot of the directory.
    ///
    /// # Arguments
    /// * `with_keys` - include the peers' public keys
    #[must_use]
    pub fn snapshot(&self, with_keys: bool) -> DirectorySnapshot {
        let addr = self
            .slots
            .iter()
            .map(|slot| {
                slot.addr
                    .map_or_else(|| "0".to_string(), |addr| addr.as_str().to_string())
            })
            .collect();
        let pub_key = with_keys.then(|| {
            self.slots
                .iter()
                .map(|slot| slot.public_key)
                .collect::<Vec<_>>()
        });
        DirectorySnapshot { addr, pub_key }
    }

    /// Applies a snapshot, slot by slot.
    ///
    /// Import is zero-tolerant: a `"0"` entry clears the slot, a missing
    /// entry leaves it alone, anything unparseable or underivable is
    /// skipped with a warning and the slot left cleared.
    pub fn apply_snapshot(&mut self, snapshot: &DirectorySnapshot, keys: &DeviceKeyPair) {
        for channel in 0..MAX_CHANNELS {
            let Some(entry) = snapshot.addr.get(channel) else {
                continue;
            };
            if entry == "0" {
                self.clear(channel as u8);
                continue;
            }
            let addr = match Address::parse(entry) {
                Ok(addr) => addr,
                Err(error) => {
                    warn!(%error, slot = channel, "skipping invalid address in snapshot");
                    self.clear(channel as u8);
                    continue;
                }
            };
            let public_key = snapshot
                .pub_key
                .as_ref()
                .and_then(|list| list.get(channel).copied().flatten());
            if let Err(error) = self.install(channel as u8, addr, public_key.as_ref(), keys) {
                warn!(%error, slot = channel, "skipping underivable peer in snapshot");
                self.clear(channel as u8);
            }
        }
    }
}

// ============================================
// DirectorySnapshot
// ============================================

/// Serialized form of the directory.
///
/// # Format
/// ```json
/// { "addr": ["1BBBB", "0", "0", "0", "0"],
///   "pubKey": ["base64...", null, null, null, null] }
/// ```
/// `"0"` marks a free slot; `pubKey` is present only when keys were
/// requested at export time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    /// Per-slot address strings (`"0"` = free).
    pub addr: Vec<String>,
    /// Per-slot peer public keys, when exported.
    #[serde(rename = "pubKey", default, skip_serializing_if = "Option::is_none")]
    pub pub_key: Option<Vec<Option<PeerPublicKey>>>,
}

// ============================================
// Tests
// ============================================
