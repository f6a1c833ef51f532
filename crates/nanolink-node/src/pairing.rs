// ============================================
// File: crates/nanolink-node/src/pairing.rs
// ============================================
//! # Pairing Handshake State
//!
//! ## Creation Reason
//! Holds the transient state of the four-step pairing handshake and the
//! decision logic applied to a validated address assignment. The node
//! drives the radio; this module decides what an assignment means.
//!
//! ## Handshake Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │   Listen role                          Transmit role         │
//! │                                                              │
//! │   1. read public key on CFGTX  ◄──  1. write public key      │
//! │   2. write public key on CFGRX ──►  2. read public key,      │
//! │      derive shared secret              derive shared secret  │
//! │   3. read encrypted assignment ◄──  3. write encrypted       │
//! │      validate, install/unpair          assignment            │
//! │   4. write encrypted           ──►  4. read assignment,      │
//! │      assignment                        validate, install     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! An assignment is the sender's own 5-byte address: digit `slot+1` to
//! offer a pairing, digit `'0'` to request unpair of the embedded UID.
//!
//! ## Role Selection
//! Every device starts in the Listen role. If no peer key arrives within
//! [`PAIRING_LISTEN_TIME`], it flips to Transmit. The overall deadline
//! [`PAIRING_TIMEOUT`] is anchored at `start_pairing` and survives the
//! role flip.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Re-pairing a UID that is already in the directory TOGGLES the link:
//!   the existing slot is cleared and the handshake completes as an
//!   unpair. Pairing the same two devices twice leaves them unpaired.
//! - Radio write failures during pairing are transient; every write is
//!   retried each [`PAIRING_INTERVAL`] until the deadline
//!
//! ## Last Modified
//! v0.1.0 - Initial pairing state

use std::time::{Duration, Instant};

use tracing::{info, warn};

use nanolink_common::types::Address;
use nanolink_core::crypto::{DeviceKeyPair, PeerPublicKey, SecureChannel};

use crate::directory::Directory;

// ============================================
// Constants
// ============================================

/// Hard deadline for the whole handshake, measured from `start_pairing`.
pub const PAIRING_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the Listen role waits before flipping to Transmit.
pub const PAIRING_LISTEN_TIME: Duration = Duration::from_secs(5);

/// Minimum spacing between radio write attempts.
pub const PAIRING_INTERVAL: Duration = Duration::from_millis(250);

// ============================================
// PairingContext
// ============================================

/// Transient state of one pairing attempt.
///
/// Created by `start_pairing`, carried inside the link state for the
/// duration of the handshake, and dropped on completion, abort or
/// timeout.
#[derive(Debug)]
pub struct PairingContext {
    /// When `start_pairing` was called; anchors every deadline.
    pub started_at: Instant,
    /// Time of the last radio write attempt.
    pub last_attempt: Option<Instant>,
    /// Peer public key received in step 1/2.
    pub peer_public: Option<PeerPublicKey>,
    /// Temporary secure channel keyed by the freshly derived secret.
    pub channel: SecureChannel,
    /// Slot reserved for the new peer; `None` when every slot is taken
    /// (only an unpair request can be issued).
    pub slot: Option<u8>,
    /// Pre-encrypted assignment, written by the Transmit role in step 3.
    pub pending: Vec<u8>,
    /// Peer public key received and shared secret derived.
    pub got_pub_key: bool,
    /// Own public key acknowledged by the peer.
    pub sent_pub_key: bool,
    /// Valid assignment received and applied.
    pub got_ack: bool,
    /// Own assignment acknowledged by the peer.
    pub sent_ack: bool,
    /// This handshake is an unpair (requested or discovered).
    pub unpair_request: bool,
}

impl PairingContext {
    /// Creates a fresh context.
    ///
    /// # Arguments
    /// * `started_at` - The instant `start_pairing` was called
    /// * `slot` - The lowest free channel slot, if any
    #[must_use]
    pub fn new(started_at: Instant, slot: Option<u8>) -> Self {
        Self {
            started_at,
            last_attempt: None,
            peer_public: None,
            channel: SecureChannel::unkeyed(),
            slot,
            pending: Vec::new(),
            got_pub_key: false,
            sent_pub_key: false,
            got_ack: false,
            sent_ack: false,
            unpair_request: false,
        }
    }

    /// Returns `true` when enough time has passed for another write.
    #[must_use]
    pub fn interval_elapsed(&self, now: Instant) -> bool {
        self.last_attempt
            .map_or(true, |last| now.saturating_duration_since(last) > PAIRING_INTERVAL)
    }

    /// Returns `true` once the listen phase has run out.
    #[must_use]
    pub fn listen_phase_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) > PAIRING_LISTEN_TIME
    }

    /// Returns `true` once the overall deadline has passed.
    #[must_use]
    pub fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) > PAIRING_TIMEOUT
    }

    /// The pipe digit this device offers in its own assignment.
    #[must_use]
    pub fn offered_pipe(&self) -> u8 {
        if self.unpair_request {
            0
        } else {
            self.slot.map_or(0, |slot| slot + 1)
        }
    }
}

// ============================================
// Assignment Application
// ============================================

/// What a validated peer assignment means for the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOutcome {
    /// Keep going: the Listen role still owes its own assignment.
    Respond,
    /// Handshake finished successfully.
    Complete,
    /// Handshake must be aborted.
    Abort(&'static str),
}

/// Applies an assignment received by the Listen role (step 3).
///
/// Decision order, matching the wire protocol:
/// 1. A UID already in the directory is cleared and the handshake turns
///    into an unpair acknowledgement
/// 2. An unpair request for an unknown UID aborts
/// 3. Otherwise the peer is installed on the reserved slot, or the
///    handshake aborts when no slot is free
pub fn apply_listen_assignment(
    ctx: &mut PairingContext,
    directory: &mut Directory,
    keys: &DeviceKeyPair,
    received: Address,
) -> AssignmentOutcome {
    if directory.clear_uid(&received.uid()) {
        info!(peer = %received, "peer already paired; cleared (unpair handshake)");
        ctx.unpair_request = true;
        return AssignmentOutcome::Respond;
    }
    if received.is_unpair() {
        warn!(peer = %received, "unpair request for unknown device");
        return AssignmentOutcome::Abort("unknown unpair target");
    }
    let Some(slot) = ctx.slot else {
        warn!("all channels occupied");
        return AssignmentOutcome::Abort("all channels occupied");
    };
    let Some(peer_public) = ctx.peer_public else {
        return AssignmentOutcome::Abort("assignment before key exchange");
    };
    match directory.install(slot, received, Some(&peer_public), keys) {
        Ok(()) => {
            info!(peer = %received, slot, "peer paired");
            AssignmentOutcome::Respond
        }
        Err(error) => {
            warn!(%error, "shared key derivation failed");
            AssignmentOutcome::Abort("key derivation failed")
        }
    }
}

/// Applies an assignment received by the Transmit role (step 4).
///
/// The Transmit role has already sent its own assignment, so any outcome
/// here terminates the handshake.
pub fn apply_transmit_assignment(
    ctx: &mut PairingContext,
    directory: &mut Directory,
    keys: &DeviceKeyPair,
    received: Address,
) -> AssignmentOutcome {
    if received.is_unpair() {
        return if directory.clear_uid(&received.uid()) {
            info!(peer = %received, "unpair acknowledged");
            AssignmentOutcome::Complete
        } else {
            warn!(peer = %received, "unpair acknowledgement for unknown device");
            AssignmentOutcome::Abort("unknown unpair target")
        };
    }
    if ctx.unpair_request {
        warn!(peer = %received, "expected an unpair acknowledgement");
        return AssignmentOutcome::Abort("expected unpair acknowledgement");
    }
    let Some(slot) = ctx.slot else {
        return AssignmentOutcome::Abort("all channels occupied");
    };
    let Some(peer_public) = ctx.peer_public else {
        return AssignmentOutcome::Abort("assignment before key exchange");
    };
    match directory.install(slot, received, Some(&peer_public), keys) {
        Ok(()) => {
            info!(peer = %received, slot, "peer paired");
            AssignmentOutcome::Complete
        }
        Err(error) => {
            warn!(%error, "shared key derivation failed");
            AssignmentOutcome::Abort("key derivation failed")
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with_peer(slot: Option<u8>) -> (PairingContext, DeviceKeyPair) {
        let keys = DeviceKeyPair::generate();
        let peer = DeviceKeyPair::generate();
        let mut ctx = PairingContext::new(Instant::now(), slot);
        ctx.peer_public = Some(PeerPublicKey::from_bytes(peer.public_key_bytes()));
        (ctx, keys)
    }

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    #[test]
    fn test_interval_gating() {
        let start = Instant::now();
        let mut ctx = PairingContext::new(start, Some(0));

        // First attempt is immediate
        assert!(ctx.interval_elapsed(start));

        ctx.last_attempt = Some(start);
        assert!(!ctx.interval_elapsed(start + Duration::from_millis(100)));
        assert!(ctx.interval_elapsed(start + Duration::from_millis(251)));
    }

    #[test]
    fn test_deadlines() {
        let start = Instant::now();
        let ctx = PairingContext::new(start, Some(0));

        assert!(!ctx.listen_phase_expired(start + Duration::from_millis(4_999)));
        assert!(ctx.listen_phase_expired(start + Duration::from_millis(5_001)));

        assert!(!ctx.expired(start + Duration::from_millis(9_999)));
        assert!(ctx.expired(start + Duration::from_millis(10_001)));
    }

    #[test]
    fn test_offered_pipe() {
        let start = Instant::now();
        assert_eq!(PairingContext::new(start, Some(2)).offered_pipe(), 3);
        assert_eq!(PairingContext::new(start, None).offered_pipe(), 0);

        let mut ctx = PairingContext::new(start, Some(2));
        ctx.unpair_request = true;
        assert_eq!(ctx.offered_pipe(), 0);
    }

    #[test]
    fn test_listen_assignment_installs_new_peer() {
        let (mut ctx, keys) = context_with_peer(Some(1));
        let mut directory = Directory::new();

        let outcome = apply_listen_assignment(&mut ctx, &mut directory, &keys, addr("1BBBB"));
        assert_eq!(outcome, AssignmentOutcome::Respond);
        assert_eq!(directory.addr(1), Some(addr("1BBBB")));
        assert!(!ctx.unpair_request);
    }

    #[test]
    fn test_listen_assignment_toggles_known_uid() {
        let (mut ctx, keys) = context_with_peer(Some(1));
        let mut directory = Directory::new();
        directory.install(0, addr("1BBBB"), None, &keys).unwrap();

        // The same UID arrives again (fresh pairing attempt by the peer)
        let outcome = apply_listen_assignment(&mut ctx, &mut directory, &keys, addr("2BBBB"));
        assert_eq!(outcome, AssignmentOutcome::Respond);
        assert!(ctx.unpair_request);
        assert_eq!(directory.channel_of(&addr("2BBBB").uid()), None);
    }

    #[test]
    fn test_listen_assignment_aborts_on_unknown_unpair() {
        let (mut ctx, keys) = context_with_peer(Some(0));
        let mut directory = Directory::new();

        let outcome = apply_listen_assignment(&mut ctx, &mut directory, &keys, addr("0BBBB"));
        assert!(matches!(outcome, AssignmentOutcome::Abort(_)));
    }

    #[test]
    fn test_listen_assignment_aborts_when_full() {
        let (mut ctx, keys) = context_with_peer(None);
        let mut directory = Directory::new();

        let outcome = apply_listen_assignment(&mut ctx, &mut directory, &keys, addr("1BBBB"));
        assert!(matches!(outcome, AssignmentOutcome::Abort(_)));
    }

    #[test]
    fn test_transmit_assignment_completes_pairing() {
        let (mut ctx, keys) = context_with_peer(Some(0));
        let mut directory = Directory::new();

        let outcome = apply_transmit_assignment(&mut ctx, &mut directory, &keys, addr("1BBBB"));
        assert_eq!(outcome, AssignmentOutcome::Complete);
        assert_eq!(directory.addr(0), Some(addr("1BBBB")));
    }

    #[test]
    fn test_transmit_assignment_unpair_ack() {
        let (mut ctx, keys) = context_with_peer(Some(0));
        ctx.unpair_request = true;
        let mut directory = Directory::new();
        directory.install(0, addr("1BBBB"), None, &keys).unwrap();

        let outcome = apply_transmit_assignment(&mut ctx, &mut directory, &keys, addr("0BBBB"));
        assert_eq!(outcome, AssignmentOutcome::Complete);
        assert_eq!(directory.addr(0), None);
    }

    #[test]
    fn test_transmit_assignment_rejects_mismatched_unpair() {
        // We asked for an unpair but the peer offered a fresh pairing
        let (mut ctx, keys) = context_with_peer(Some(0));
        ctx.unpair_request = true;
        let mut directory = Directory::new();

        let outcome = apply_transmit_assignment(&mut ctx, &mut directory, &keys, addr("1BBBB"));
        assert!(matches!(outcome, AssignmentOutcome::Abort(_)));
    }

    #[test]
    fn test_transmit_assignment_unknown_unpair_ack_aborts() {
        let (mut ctx, keys) = context_with_peer(Some(0));
        ctx.unpair_request = true;
        let mut directory = Directory::new();

        let outcome = apply_transmit_assignment(&mut ctx, &mut directory, &keys, addr("0BBBB"));
        assert!(matches!(outcome, AssignmentOutcome::Abort(_)));
    }
}
