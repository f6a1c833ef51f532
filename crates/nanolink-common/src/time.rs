// ============================================
// File: crates/nanolink-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! The link layer is tick-driven: all waiting (pairing intervals, receive
//! timeouts, listen-phase duration) is expressed as comparisons against a
//! monotonic clock, re-checked on every tick. Injecting the clock as a
//! trait keeps those timeout paths deterministic under test.
//!
//! ## Main Functionality
//! - `Clock`: Monotonic time source trait
//! - `SystemClock`: Production implementation backed by `Instant::now`
//! - `ManualClock`: Test implementation advanced by hand
//!
//! ## ⚠️ Important Note for Next Developer
//! - `ManualClock` clones share the same offset, so a test can hold a
//!   handle while the node under test owns another
//! - The offset is stored as milliseconds in an `AtomicU64`; overflow is
//!   not a practical concern
//!
//! ## Last Modified
//! v0.1.0 - Initial clock abstraction

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================
// Clock Trait
// ============================================

/// Monotonic time source.
///
/// # Purpose
/// Abstracts `Instant::now()` so that timeout logic (pairing deadlines,
/// reassembly expiry, retry intervals) can run against a controlled clock
/// in tests.
pub trait Clock {
    /// Returns the current monotonic instant.
    fn now(&self) -> Instant;
}

// ============================================
// SystemClock
// ============================================

/// Production clock backed by the operating system's monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// ============================================
// ManualClock
// ============================================

/// Test clock advanced explicitly by the caller.
///
/// # Example
/// ```
/// use nanolink_common::time::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let start = clock.now();
///
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(clock.now() - start, Duration::from_millis(250));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    /// Reference instant captured at construction.
    base: Instant,
    /// Milliseconds advanced past the reference; shared across clones.
    offset_millis: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a new manual clock anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_millis: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advances the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        self.advance_millis(duration.as_millis() as u64);
    }

    /// Advances the clock by a number of milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.offset_millis.fetch_add(millis, Ordering::Relaxed);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_millis.load(Ordering::Relaxed))
    }
}

// ============================================
// Tests
// ============================================
