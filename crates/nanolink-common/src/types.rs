// ============================================
// File: crates/nanolink-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the fundamental identifiers of the NanoLink link layer,
//! ensuring type safety and consistent wire representations.
//!
//! ## Main Functionality
//! - `RadioId`: 4-character device identifier (the UID half of an address)
//! - `Address`: 5-byte logical peer address (`pipe digit ∥ UID`) that
//!   doubles as the transceiver-level pipe address
//! - Type conversions and serialization implementations
//!
//! ## Main Logical Flow
//! 1. A `RadioId` is assigned at device construction
//! 2. Pairing exchanges `Address` values naming the peer's listening pipe
//! 3. Addresses are handed to the radio transport as raw 5-byte slices
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Address` construction is validating - an `Address` value always
//!   satisfies the wire predicate (length 5, digit '0'..'5', alnum UID)
//! - `RadioId` normalization replaces non-alphanumeric bytes so every
//!   derived address stays valid
//! - Maintain backward-compatible serialization formats
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

// ============================================
// Constants
// ============================================

/// Number of concurrently paired peers a device supports.
pub const MAX_CHANNELS: usize = 5;

/// Length of a device identifier in bytes.
pub const RADIO_ID_LEN: usize = 4;

/// Length of a logical peer address in bytes (pipe digit + UID).
pub const ADDRESS_LEN: usize = 5;

// ============================================
// RadioId
// ============================================

/// Opaque 4-character alphanumeric device identifier.
///
/// # Normalization
/// - Shorter inputs are left-padded with `'0'`
/// - Longer inputs are truncated to the first 4 characters
/// - Non-alphanumeric bytes are replaced with `'0'` so that any address
///   built from this identifier satisfies the address validity predicate
///
/// # Example
/// ```
/// use nanolink_common::types::RadioId;
///
/// assert_eq!(RadioId::new("AB").as_str(), "00AB");
/// assert_eq!(RadioId::new("LONGID").as_str(), "LONG");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RadioId([u8; RADIO_ID_LEN]);

impl RadioId {
    /// Creates a normalized `RadioId` from an arbitrary string.
    #[must_use]
    pub fn new(id: &str) -> Self {
        let mut bytes = [b'0'; RADIO_ID_LEN];
        let src: Vec<u8> = id
            .bytes()
            .map(|b| if b.is_ascii_alphanumeric() { b } else { b'0' })
            .collect();
        if src.len() >= RADIO_ID_LEN {
            bytes.copy_from_slice(&src[..RADIO_ID_LEN]);
        } else {
            // Left-pad with '0'
            bytes[RADIO_ID_LEN - src.len()..].copy_from_slice(&src);
        }
        Self(bytes)
    }

    /// Creates a `RadioId` from exactly 4 alphanumeric bytes.
    ///
    /// # Errors
    /// Returns an error if any byte is not ASCII alphanumeric.
    pub fn from_bytes(bytes: [u8; RADIO_ID_LEN]) -> Result<Self, CommonError> {
        if bytes.iter().all(u8::is_ascii_alphanumeric) {
            Ok(Self(bytes))
        } else {
            Err(CommonError::invalid_input(
                "radio_id",
                "must be ASCII alphanumeric",
            ))
        }
    }

    /// Returns the raw identifier bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; RADIO_ID_LEN] {
        &self.0
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Always ASCII by construction
        std::str::from_utf8(&self.0).expect("RadioId is ASCII by construction")
    }
}

impl fmt::Debug for RadioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RadioId({})", self.as_str())
    }
}

impl fmt::Display for RadioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RadioId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RadioId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

// ============================================
// Address
// ============================================

/// Logical peer address: a pipe digit followed by the peer's `RadioId`.
///
/// # Wire Format
/// ```text
/// ┌───────┬──────────────────────┐
/// │ digit │   UID (4 bytes)      │   5 bytes total
/// └───────┴──────────────────────┘
///   '0'       = unpair sentinel
///   '1'..'5'  = the peer's listening pipe for this link
/// ```
///
/// The same 5 bytes are handed to the radio as the transceiver-level
/// pipe address, so an `Address` is both a directory key and a wire value.
///
/// # Validity Predicate
/// length 5 ∧ first char in `'0'..='5'` ∧ remaining chars alphanumeric.
/// Constructed values always satisfy the predicate.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Builds an address from a pipe number and a device identifier.
    ///
    /// # Arguments
    /// * `pipe` - Pipe number `0..=5` (0 is the unpair sentinel)
    /// * `uid` - The device identifier to embed
    ///
    /// # Errors
    /// Returns an error if `pipe` exceeds [`MAX_CHANNELS`].
    pub fn new(pipe: u8, uid: RadioId) -> Result<Self, CommonError> {
        if pipe as usize > MAX_CHANNELS {
            return Err(CommonError::invalid_input(
                "pipe",
                format!("must be 0..={MAX_CHANNELS}"),
            ));
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[0] = b'0' + pipe;
        bytes[1..].copy_from_slice(uid.as_bytes());
        Ok(Self(bytes))
    }

    /// Parses and validates an address from a string.
    ///
    /// # Errors
    /// Returns an error describing the first failed predicate clause.
    pub fn parse(s: &str) -> Result<Self, CommonError> {
        let bytes = s.as_bytes();
        if bytes.len() != ADDRESS_LEN {
            return Err(CommonError::invalid_address(format!(
                "expected {ADDRESS_LEN} characters, got {}",
                bytes.len()
            )));
        }
        if !(b'0'..=b'0' + MAX_CHANNELS as u8).contains(&bytes[0]) {
            return Err(CommonError::invalid_address(
                "pipe digit must be in '0'..='5'",
            ));
        }
        if !bytes[1..].iter().all(u8::is_ascii_alphanumeric) {
            return Err(CommonError::invalid_address("UID must be alphanumeric"));
        }
        let mut addr = [0u8; ADDRESS_LEN];
        addr.copy_from_slice(bytes);
        Ok(Self(addr))
    }

    /// Checks the validity predicate without constructing an address.
    #[must_use]
    pub fn is_valid(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    /// Returns the pipe number named by the leading digit (`0..=5`).
    #[must_use]
    pub const fn pipe(&self) -> u8 {
        self.0[0] - b'0'
    }

    /// Returns the embedded device identifier.
    #[must_use]
    pub fn uid(&self) -> RadioId {
        let mut uid = [0u8; RADIO_ID_LEN];
        uid.copy_from_slice(&self.0[1..]);
        RadioId(uid)
    }

    /// Returns `true` if this address is an unpair request (pipe digit 0).
    #[must_use]
    pub const fn is_unpair(&self) -> bool {
        self.0[0] == b'0'
    }

    /// Returns the raw 5-byte wire address.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).expect("Address is ASCII by construction")
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.as_str())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Address {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_id_normalization() {
        assert_eq!(RadioId::new("ABCD").as_str(), "ABCD");
        assert_eq!(RadioId::new("AB").as_str(), "00AB");
        assert_eq!(RadioId::new("").as_str(), "0000");
        assert_eq!(RadioId::new("ABCDEF").as_str(), "ABCD");
        // Non-alphanumeric bytes are neutralized
        assert_eq!(RadioId::new("A-C!").as_str(), "A0C0");
    }

    #[test]
    fn test_radio_id_from_bytes() {
        assert!(RadioId::from_bytes(*b"A1b2").is_ok());
        assert!(RadioId::from_bytes(*b"A 22").is_err());
    }

    #[test]
    fn test_address_validity_predicate() {
        assert!(Address::is_valid("1ABCD"));
        assert!(Address::is_valid("0ABCD"));
        assert!(Address::is_valid("51234"));
        // Wrong length
        assert!(!Address::is_valid("1ABC"));
        assert!(!Address::is_valid("1ABCDE"));
        // Pipe digit out of range
        assert!(!Address::is_valid("6ABCD"));
        assert!(!Address::is_valid("XABCD"));
        // Non-alphanumeric UID
        assert!(!Address::is_valid("1AB D"));
    }

    #[test]
    fn test_address_accessors() {
        let addr = Address::parse("3WXYZ").unwrap();
        assert_eq!(addr.pipe(), 3);
        assert_eq!(addr.uid().as_str(), "WXYZ");
        assert!(!addr.is_unpair());
        assert_eq!(addr.as_bytes(), b"3WXYZ");

        let unpair = Address::parse("0WXYZ").unwrap();
        assert!(unpair.is_unpair());
    }

    #[test]
    fn test_address_construction() {
        let uid = RadioId::new("BBBB");
        let addr = Address::new(1, uid).unwrap();
        assert_eq!(addr.as_str(), "1BBBB");
        assert!(Address::new(6, uid).is_err());
    }

    #[test]
    fn test_address_serde_roundtrip() {
        let addr = Address::parse("2ABCD").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"2ABCD\"");
        let restored: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, restored);

        // Invalid strings are rejected on deserialization
        assert!(serde_json::from_str::<Address>("\"9ABCD\"").is_err());
    }
}
