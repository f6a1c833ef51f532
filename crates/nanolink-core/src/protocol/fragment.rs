// ============================================
// File: crates/nanolink-core/src/protocol/fragment.rs
// ============================================
//! # Fragmentation & Reassembly Engine
//!
//! ## Creation Reason
//! Messages exceed the 32-byte radio MTU; this module splits outgoing
//! byte strings into headed fragments and reassembles incoming fragments
//! into complete messages.
//!
//! ## Main Functionality
//! - `Fragmenter`: emits one zero-padded 32-byte frame per call, so the
//!   orchestrator can send exactly one fragment per tick
//! - `Reassembler`: per-pipe accumulation with completion detection and
//!   inactivity expiry
//! - `strip_trailing_zeros` / `zero_pad`: the padding convention shared
//!   with the pairing handshake frames
//!
//! ## Main Logical Flow (receive)
//! 1. Parse the header from the raw frame
//! 2. On a start code, drop any partial message and arm a new one
//! 3. Strip payload padding, append, count
//! 4. On index 0, deliver if the fragment count matches, else discard
//!
//! ## ⚠️ Important Note for Next Developer
//! - Padding removal is the end-of-payload delimiter: a payload that
//!   genuinely ends in 0x00 loses those bytes. Ciphertext payloads make
//!   this statistically rare; it is a known protocol fragility.
//! - A partial message idle longer than [`RECEIVE_TIMEOUT`] must be
//!   discarded by calling `expire` from the orchestrator tick.
//!
//! ## Last Modified
//! v0.1.0 - Initial fragmentation engine

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::header::{FragmentCode, FragmentHeader};
use super::{FRAGMENT_PAYLOAD_SIZE, HEADER_SIZE, MAX_PACKETS_RCV, MAX_PACKET_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// Inactivity timeout after which a partial message is discarded.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Largest payload whose countdown index still fits the u16 header field.
const MAX_FRAGMENTABLE: usize = FRAGMENT_PAYLOAD_SIZE * (u16::MAX as usize + 1);

// ============================================
// Padding Helpers
// ============================================

/// Returns `bytes` with trailing zero bytes removed.
#[must_use]
pub fn strip_trailing_zeros(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}

/// Zero-pads `bytes` into a full radio frame.
///
/// Inputs longer than a frame are truncated, matching the transmit path
/// where callers never exceed [`MAX_PACKET_SIZE`].
#[must_use]
pub fn zero_pad(bytes: &[u8]) -> [u8; MAX_PACKET_SIZE] {
    let mut frame = [0u8; MAX_PACKET_SIZE];
    let len = bytes.len().min(MAX_PACKET_SIZE);
    frame[..len].copy_from_slice(&bytes[..len]);
    frame
}

// ============================================
// Fragmenter
// ============================================

/// Splits one outgoing message into headed, padded radio frames.
///
/// # Example
/// ```
/// use nanolink_core::protocol::Fragmenter;
///
/// let mut fragmenter = Fragmenter::new(vec![0xAB; 40]).unwrap();
/// assert_eq!(fragmenter.total_fragments(), 2);
///
/// let first = fragmenter.next_frame().unwrap();
/// assert_eq!(first[0], b'M'); // start code
/// let second = fragmenter.next_frame().unwrap();
/// assert_eq!(second[0], b'C'); // continue code
/// assert!(fragmenter.next_frame().is_none());
/// ```
#[derive(Debug)]
pub struct Fragmenter {
    /// The complete message being transferred.
    payload: Vec<u8>,
    /// Number of fragments already emitted.
    emitted: usize,
    /// Total fragments for this message.
    total: usize,
}

impl Fragmenter {
    /// Creates a fragmenter for `payload`.
    ///
    /// # Errors
    /// - `EmptyMessage` for a zero-length payload (nothing to send)
    /// - `MessageTooLarge` when the countdown index would overflow
    pub fn new(payload: Vec<u8>) -> Result<Self> {
        if payload.is_empty() {
            return Err(CoreError::EmptyMessage);
        }
        if payload.len() > MAX_FRAGMENTABLE {
            return Err(CoreError::MessageTooLarge {
                max: MAX_FRAGMENTABLE,
                actual: payload.len(),
            });
        }
        let total = payload.len().div_ceil(FRAGMENT_PAYLOAD_SIZE);
        Ok(Self {
            payload,
            emitted: 0,
            total,
        })
    }

    /// Total number of fragments this message occupies.
    #[must_use]
    pub const fn total_fragments(&self) -> usize {
        self.total
    }

    /// Number of fragments not yet emitted.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.total - self.emitted
    }

    /// Returns `true` once every fragment has been emitted.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.emitted == self.total
    }

    /// Emits the next zero-padded 32-byte frame, or `None` when done.
    pub fn next_frame(&mut self) -> Option<[u8; MAX_PACKET_SIZE]> {
        if self.is_complete() {
            return None;
        }

        let offset = self.emitted * FRAGMENT_PAYLOAD_SIZE;
        let end = (offset + FRAGMENT_PAYLOAD_SIZE).min(self.payload.len());
        let chunk = &self.payload[offset..end];

        let code = if self.emitted == 0 {
            FragmentCode::Start
        } else {
            FragmentCode::Continue
        };
        // Countdown index: the final fragment always carries 0
        let index = (self.total - 1 - self.emitted) as u16;

        let mut frame = [0u8; MAX_PACKET_SIZE];
        FragmentHeader::new(code, index).write_to(&mut frame);
        frame[HEADER_SIZE..HEADER_SIZE + chunk.len()].copy_from_slice(chunk);

        self.emitted += 1;
        Some(frame)
    }
}

// ============================================
// Reassembler
// ============================================

/// Accumulates incoming fragments into complete messages for one pipe.
///
/// A start fragment always resets the buffer, so a lost final fragment
/// cannot poison the next message. Completion is detected by index 0;
/// the message is delivered only when the observed fragment count matches
/// the count announced by the start fragment.
#[derive(Debug, Default)]
pub struct Reassembler {
    /// Payload bytes accumulated so far.
    buffer: Vec<u8>,
    /// Fragment count announced by the start fragment.
    expected: u16,
    /// Fragments accepted into the buffer.
    received: u16,
    /// Arrival time of the most recent fragment.
    last_rx: Option<Instant>,
}

impl Reassembler {
    /// Creates an idle reassembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when no partial message is buffered.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Feeds one raw radio frame; returns a complete message if this
    /// fragment finished one.
    ///
    /// # Errors
    /// `FrameTooShort` or `UnknownFragmentCode` for unparseable frames;
    /// the partial state is left untouched in that case.
    pub fn push(&mut self, frame: &[u8], now: Instant) -> Result<Option<Vec<u8>>> {
        let header = FragmentHeader::decode(frame)?;
        let payload = strip_trailing_zeros(&frame[HEADER_SIZE..]);

        if header.is_start() {
            // New message: drop whatever came before
            self.reset();
            self.expected = header.index.saturating_add(1);
        }

        if (self.received as usize) < MAX_PACKETS_RCV {
            self.buffer.extend_from_slice(payload);
            self.received += 1;
            self.last_rx = Some(now);
        }

        if !header.is_final() {
            return Ok(None);
        }

        // Final fragment: deliver or discard
        let complete = self.received == self.expected;
        if !complete {
            warn!(
                expected = self.expected,
                received = self.received,
                "incomplete message discarded"
            );
        }
        let message = std::mem::take(&mut self.buffer);
        self.reset();
        Ok(complete.then_some(message))
    }

    /// Discards a partial message that has been idle past the timeout.
    ///
    /// Returns `true` if a partial message was discarded.
    pub fn expire(&mut self, now: Instant) -> bool {
        let stale = match self.last_rx {
            Some(last) if !self.buffer.is_empty() => {
                now.saturating_duration_since(last) > RECEIVE_TIMEOUT
            }
            _ => false,
        };
        if stale {
            debug!("partial message timed out; clearing reassembly buffer");
            self.reset();
        }
        stale
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.expected = 0;
        self.received = 0;
        self.last_rx = None;
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic test payload with no trailing zero byte.
    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 255) as u8 + 1).collect()
    }

    fn roundtrip(payload: Vec<u8>) -> Option<Vec<u8>> {
        let mut fragmenter = Fragmenter::new(payload).unwrap();
        let mut reassembler = Reassembler::new();
        let now = Instant::now();

        let mut delivered = None;
        while let Some(frame) = fragmenter.next_frame() {
            if let Some(msg) = reassembler.push(&frame, now).unwrap() {
                delivered = Some(msg);
            }
        }
        delivered
    }

    #[test]
    fn test_roundtrip_various_sizes() {
        for len in [1, 28, 29, 30, 58, 100, 112, 2048] {
            let payload = sample(len);
            assert_eq!(
                roundtrip(payload.clone()).as_deref(),
                Some(payload.as_slice()),
                "roundtrip failed for length {len}"
            );
        }
    }

    #[test]
    fn test_fragment_count() {
        // 112 bytes (100-byte plaintext + 12-byte nonce) = 4 fragments
        let fragmenter = Fragmenter::new(sample(112)).unwrap();
        assert_eq!(fragmenter.total_fragments(), 4);

        assert_eq!(Fragmenter::new(sample(29)).unwrap().total_fragments(), 1);
        assert_eq!(Fragmenter::new(sample(30)).unwrap().total_fragments(), 2);
    }

    #[test]
    fn test_countdown_index_layout() {
        let mut fragmenter = Fragmenter::new(sample(70)).unwrap(); // 3 fragments
        let frames: Vec<_> = std::iter::from_fn(|| fragmenter.next_frame()).collect();
        assert_eq!(frames.len(), 3);

        let headers: Vec<_> = frames
            .iter()
            .map(|f| FragmentHeader::decode(f).unwrap())
            .collect();
        assert_eq!(headers[0].code, FragmentCode::Start);
        assert_eq!(headers[0].index, 2);
        assert_eq!(headers[1].code, FragmentCode::Continue);
        assert_eq!(headers[1].index, 1);
        assert_eq!(headers[2].code, FragmentCode::Continue);
        // Final fragment always carries index 0
        assert_eq!(headers[2].index, 0);
    }

    #[test]
    fn test_empty_message_rejected() {
        assert!(matches!(
            Fragmenter::new(Vec::new()),
            Err(CoreError::EmptyMessage)
        ));
    }

    #[test]
    fn test_dropped_fragment_discards_message() {
        let mut fragmenter = Fragmenter::new(sample(100)).unwrap(); // 4 fragments
        let mut reassembler = Reassembler::new();
        let now = Instant::now();

        let frames: Vec<_> = std::iter::from_fn(|| fragmenter.next_frame()).collect();
        // Drop the second fragment
        assert!(reassembler.push(&frames[0], now).unwrap().is_none());
        assert!(reassembler.push(&frames[2], now).unwrap().is_none());
        // Count mismatch at the final fragment: nothing delivered
        assert!(reassembler.push(&frames[3], now).unwrap().is_none());
        assert!(reassembler.is_idle());
    }

    #[test]
    fn test_start_fragment_resets_partial() {
        let mut first = Fragmenter::new(sample(100)).unwrap();
        let mut second = Fragmenter::new(sample(40)).unwrap();
        let mut reassembler = Reassembler::new();
        let now = Instant::now();

        // Two fragments of an abandoned message
        reassembler.push(&first.next_frame().unwrap(), now).unwrap();
        reassembler.push(&first.next_frame().unwrap(), now).unwrap();

        // A fresh message delivers cleanly despite the partial
        let mut delivered = None;
        while let Some(frame) = second.next_frame() {
            if let Some(msg) = reassembler.push(&frame, now).unwrap() {
                delivered = Some(msg);
            }
        }
        assert_eq!(delivered, Some(sample(40)));
    }

    #[test]
    fn test_inactivity_expiry() {
        let mut fragmenter = Fragmenter::new(sample(100)).unwrap();
        let mut reassembler = Reassembler::new();
        let start = Instant::now();

        reassembler
            .push(&fragmenter.next_frame().unwrap(), start)
            .unwrap();
        assert!(!reassembler.is_idle());

        // Not yet stale
        assert!(!reassembler.expire(start + Duration::from_millis(900)));
        assert!(!reassembler.is_idle());

        // Past the timeout
        assert!(reassembler.expire(start + Duration::from_millis(1001)));
        assert!(reassembler.is_idle());
    }

    #[test]
    fn test_unparseable_frame_is_an_error() {
        let mut reassembler = Reassembler::new();
        let now = Instant::now();

        let mut frame = [0u8; MAX_PACKET_SIZE];
        frame[0] = b'Z';
        assert!(reassembler.push(&frame, now).is_err());
        assert!(reassembler.push(&[b'M'], now).is_err());
    }

    #[test]
    fn test_trailing_zero_payload_is_truncated() {
        // Documented protocol fragility: zero padding doubles as the
        // end-of-payload delimiter, so a message genuinely ending in 0x00
        // comes back shortened.
        let mut payload = sample(20);
        payload.extend_from_slice(&[0, 0, 0]);

        let delivered = roundtrip(payload).unwrap();
        assert_eq!(delivered, sample(20));
    }

    #[test]
    fn test_strip_and_pad_helpers() {
        assert_eq!(strip_trailing_zeros(&[1, 2, 0, 3, 0, 0]), &[1, 2, 0, 3]);
        assert_eq!(strip_trailing_zeros(&[0, 0]), &[] as &[u8]);
        assert_eq!(strip_trailing_zeros(&[]), &[] as &[u8]);

        let frame = zero_pad(&[9, 9]);
        assert_eq!(frame.len(), MAX_PACKET_SIZE);
        assert_eq!(&frame[..2], &[9, 9]);
        assert!(frame[2..].iter().all(|&b| b == 0));
    }
}
