// ============================================
// File: crates/nanolink-node/src/lib.rs
// ============================================
//! # NanoLink Node - Pairing, Directory & Orchestration
//!
//! ## Creation Reason
//! The top half of the NanoLink radio link layer: the paired-device
//! directory, the four-step pairing handshake and the tick-driven
//! orchestrator the host application talks to.
//!
//! ## Main Functionality
//! - [`node`]: `RadioNode` - the public face of the link layer
//! - [`directory`]: paired-device table, mailboxes, JSON snapshot
//! - [`pairing`]: handshake context and assignment decisions
//! - [`config`]: persisted configuration blob (import/export)
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │       nanolink-node  ◄── You are here              │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   nanolink-core        nanolink-transport          │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             nanolink-common                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```
//! use nanolink_node::RadioNode;
//! use nanolink_transport::mock::RadioMedium;
//!
//! let medium = RadioMedium::new();
//! let mut node = RadioNode::new(medium.endpoint(), "AAAA");
//! node.begin();
//! loop {
//!     node.tick();
//!     # break;
//!     // ... host work ...
//! }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `tick()` must be called frequently: transfers advance one fragment
//!   per tick and pairing deadlines are wall-clock comparisons
//! - The node owns the radio exclusively; never share it
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod directory;
pub mod error;
pub mod node;
pub mod pairing;

// Re-export commonly used items
pub use config::DeviceConfig;
pub use directory::{Directory, Mailbox, PairedDevice, MAX_MAILBOX_MSG};
pub use error::{NodeError, Result};
pub use node::{LinkStateKind, RadioNode, SendState, SendStatus};
pub use pairing::{PairingContext, PAIRING_INTERVAL, PAIRING_LISTEN_TIME, PAIRING_TIMEOUT};
