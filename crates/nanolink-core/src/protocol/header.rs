// ============================================
// File: crates/nanolink-core/src/protocol/header.rs
// ============================================
//! # Fragment Header Codec
//!
//! ## Creation Reason
//! Provides binary serialization and deserialization for the 3-byte
//! fragment header carried at the front of every data frame.
//!
//! ## Main Functionality
//! - `FragmentCode`: start/continue discriminant bytes
//! - `FragmentHeader`: code + countdown index, encode/decode
//!
//! ## Parsing Strategy
//! 1. Check minimum frame length
//! 2. Read and validate the code byte
//! 3. Read the little-endian index
//!
//! The header is parsed from the RAW frame, before padding removal:
//! the countdown index of a final fragment is zero, and stripping must
//! never be allowed to eat header bytes.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always validate buffer lengths before reading
//! - All multi-byte integers on the wire are little-endian
//!
//! ## Last Modified
//! v0.1.0 - Initial header codec

use bytes::{Buf, BufMut, BytesMut};

use super::HEADER_SIZE;
use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// Code byte of the first fragment of a message (ASCII `'M'`).
pub const START_CODE: u8 = b'M';

/// Code byte of every subsequent fragment (ASCII `'C'`).
pub const CONTINUE_CODE: u8 = b'C';

// ============================================
// FragmentCode
// ============================================

/// Discriminant of a fragment within a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentCode {
    /// First fragment; resets the receiver's reassembly buffer.
    Start,
    /// Any following fragment.
    Continue,
}

impl FragmentCode {
    /// Maps a wire byte to a code.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            START_CODE => Some(Self::Start),
            CONTINUE_CODE => Some(Self::Continue),
            _ => None,
        }
    }

    /// Returns the wire byte for this code.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Start => START_CODE,
            Self::Continue => CONTINUE_CODE,
        }
    }
}

// ============================================
// FragmentHeader
// ============================================

/// The 3-byte header of a data frame.
///
/// # Countdown Index
/// The index holds the number of fragments REMAINING after this one, so
/// the first fragment of an F-fragment message carries `F - 1` and the
/// final fragment always carries `0`. The receiver learns the expected
/// total from the start fragment and detects completion from index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    /// Start/continue discriminant.
    pub code: FragmentCode,
    /// Countdown fragment index.
    pub index: u16,
}

impl FragmentHeader {
    /// Creates a header.
    #[must_use]
    pub const fn new(code: FragmentCode, index: u16) -> Self {
        Self { code, index }
    }

    /// Returns `true` for the first fragment of a message.
    #[must_use]
    pub const fn is_start(&self) -> bool {
        matches!(self.code, FragmentCode::Start)
    }

    /// Returns `true` for the final fragment of a message.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        self.index == 0
    }

    /// Encodes the header into a buffer.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(HEADER_SIZE);
        buf.put_u8(self.code.as_byte());
        buf.put_u16_le(self.index);
    }

    /// Writes the header into the first [`HEADER_SIZE`] bytes of a frame.
    pub fn write_to(&self, frame: &mut [u8]) {
        frame[0] = self.code.as_byte();
        frame[1..HEADER_SIZE].copy_from_slice(&self.index.to_le_bytes());
    }

    /// Decodes a header from the front of a raw frame.
    ///
    /// # Errors
    /// - `FrameTooShort` if fewer than [`HEADER_SIZE`] bytes are available
    /// - `UnknownFragmentCode` for an unrecognized code byte
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(CoreError::frame_too_short(HEADER_SIZE, buf.len()));
        }
        let code_byte = buf.get_u8();
        let code =
            FragmentCode::from_byte(code_byte).ok_or(CoreError::UnknownFragmentCode(code_byte))?;
        let index = buf.get_u16_le();
        Ok(Self { code, index })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_byte_mapping() {
        assert_eq!(FragmentCode::from_byte(b'M'), Some(FragmentCode::Start));
        assert_eq!(FragmentCode::from_byte(b'C'), Some(FragmentCode::Continue));
        assert_eq!(FragmentCode::from_byte(b'X'), None);
        assert_eq!(FragmentCode::Start.as_byte(), b'M');
        assert_eq!(FragmentCode::Continue.as_byte(), b'C');
    }

    #[test]
    fn test_header_roundtrip() {
        let original = FragmentHeader::new(FragmentCode::Start, 71);

        let mut buf = BytesMut::new();
        original.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);

        let decoded = FragmentHeader::decode(&buf).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_index_is_little_endian() {
        let header = FragmentHeader::new(FragmentCode::Continue, 0x0102);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(&buf[..], &[b'C', 0x02, 0x01]);
    }

    #[test]
    fn test_write_to_frame() {
        let mut frame = [0u8; 32];
        FragmentHeader::new(FragmentCode::Start, 3).write_to(&mut frame);
        assert_eq!(&frame[..HEADER_SIZE], &[b'M', 0x03, 0x00]);
    }

    #[test]
    fn test_decode_rejects_short_frame() {
        let result = FragmentHeader::decode(&[b'M', 0x00]);
        assert!(matches!(result, Err(CoreError::FrameTooShort { .. })));
    }

    #[test]
    fn test_decode_rejects_unknown_code() {
        let result = FragmentHeader::decode(&[b'Z', 0x00, 0x00]);
        assert!(matches!(result, Err(CoreError::UnknownFragmentCode(b'Z'))));
    }

    #[test]
    fn test_final_and_start_predicates() {
        assert!(FragmentHeader::new(FragmentCode::Start, 0).is_final());
        assert!(FragmentHeader::new(FragmentCode::Start, 0).is_start());
        assert!(!FragmentHeader::new(FragmentCode::Continue, 2).is_final());
        assert!(!FragmentHeader::new(FragmentCode::Continue, 2).is_start());
    }
}
