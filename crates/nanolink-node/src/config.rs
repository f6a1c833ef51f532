// ============================================
// File: crates/nanolink-node/src/config.rs
// ============================================
//! # Configuration Import/Export
//!
//! ## Creation Reason
//! The host application persists the node's pairing state (directory +
//! personal keys) across power cycles; this module defines the JSON
//! blob it stores and reloads.
//!
//! ## Blob Format
//! ```json
//! {
//!   "pairedDevices": {
//!     "addr": ["1BBBB", "0", "0", "0", "0"],
//!     "pubKey": ["base64...", null, null, null, null]
//!   },
//!   "personalKeys": {
//!     "publicKey": "base64...",
//!     "privateKey": "base64..."
//!   }
//! }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Import installs personal keys BEFORE the directory: every peer's
//!   shared secret is re-derived from the imported private key
//! - Secure-channel counters are NOT part of the blob; a reload resets
//!   the replay window to the peer's previous-session counter
//! - The blob contains the PRIVATE key; the host must store it safely
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration blob

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use nanolink_core::crypto::DeviceKeyPair;

use crate::directory::DirectorySnapshot;
use crate::error::{NodeError, Result};

// ============================================
// DeviceConfig
// ============================================

/// The persisted configuration blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Directory snapshot (addresses + peer public keys).
    #[serde(rename = "pairedDevices")]
    pub paired_devices: DirectorySnapshot,
    /// This device's own key pair.
    #[serde(rename = "personalKeys")]
    pub personal_keys: PersonalKeys,
}

impl DeviceConfig {
    /// Serializes the blob to JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a blob from JSON.
    ///
    /// # Errors
    /// Returns an error for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================
// PersonalKeys
// ============================================

/// Base64 form of the device key pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalKeys {
    /// X25519 public key, base64.
    #[serde(rename = "publicKey")]
    pub public_key: String,
    /// X25519 private key, base64.
    #[serde(rename = "privateKey")]
    pub private_key: String,
}

impl PersonalKeys {
    /// Encodes a key pair for the blob.
    #[must_use]
    pub fn from_keypair(keys: &DeviceKeyPair) -> Self {
        Self {
            public_key: BASE64.encode(keys.public_key_bytes()),
            private_key: BASE64.encode(keys.private_key_bytes()),
        }
    }

    /// Decodes the key pair from the blob.
    ///
    /// # Errors
    /// Returns an error for invalid base64 or wrong-sized keys.
    pub fn to_keypair(&self) -> Result<DeviceKeyPair> {
        let public = BASE64
            .decode(&self.public_key)
            .map_err(|e| NodeError::invalid_config(format!("publicKey: {e}")))?;
        let private = BASE64
            .decode(&self.private_key)
            .map_err(|e| NodeError::invalid_config(format!("privateKey: {e}")))?;
        Ok(DeviceKeyPair::from_bytes(&public, &private)?)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personal_keys_roundtrip() {
        let keys = DeviceKeyPair::generate();
        let encoded = PersonalKeys::from_keypair(&keys);
        let restored = encoded.to_keypair().unwrap();

        assert_eq!(keys.public_key_bytes(), restored.public_key_bytes());
        assert_eq!(keys.private_key_bytes(), restored.private_key_bytes());
    }

    #[test]
    fn test_personal_keys_rejects_bad_base64() {
        let bad = PersonalKeys {
            public_key: "not base64!!!".into(),
            private_key: "also not".into(),
        };
        assert!(matches!(
            bad.to_keypair(),
            Err(NodeError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_personal_keys_rejects_wrong_length() {
        let keys = DeviceKeyPair::generate();
        let truncated = PersonalKeys {
            public_key: BASE64.encode(keys.public_key_bytes()),
            private_key: BASE64.encode(&keys.private_key_bytes()[..16]),
        };
        assert!(truncated.to_keypair().is_err());
    }

    #[test]
    fn test_config_json_field_names() {
        let keys = DeviceKeyPair::generate();
        let config = DeviceConfig {
            paired_devices: DirectorySnapshot {
                addr: vec!["0".into(); 5],
                pub_key: None,
            },
            personal_keys: PersonalKeys::from_keypair(&keys),
        };

        let json = config.to_json().unwrap();
        assert!(json.contains("\"pairedDevices\""));
        assert!(json.contains("\"personalKeys\""));
        assert!(json.contains("\"publicKey\""));
        assert!(json.contains("\"privateKey\""));

        let parsed = DeviceConfig::from_json(&json).unwrap();
        assert_eq!(parsed.paired_devices.addr, config.paired_devices.addr);
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(DeviceConfig::from_json("{ not json").is_err());
        assert!(DeviceConfig::from_json("{}").is_err());
    }
}
