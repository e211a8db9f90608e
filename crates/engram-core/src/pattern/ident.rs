//! Pattern identity and time primitives
//!
//! - [`PatternId`]: opaque 128-bit identity, generated lock-free from UUID v4
//!   entropy, with a canonical 32-character hex form used in on-disk
//!   filenames
//! - [`Timestamp`] / [`Duration`]: microsecond precision since the Unix
//!   epoch, compact enough to store in a `u64` atomic

use std::fmt;
use std::io::{Read, Write};
use std::ops::{Add, Sub};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::wire;

// ============================================================================
// PATTERN ID
// ============================================================================

/// Opaque 128-bit pattern identity
///
/// Two 64-bit words, totally ordered and hashable. Generation draws UUID v4
/// entropy, so ids are collision-free within a process without any shared
/// counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct PatternId {
    hi: u64,
    lo: u64,
}

/// Ordered pattern pair, keyed as (predecessor, successor) or
/// (source, target) depending on the call site.
pub type PatternPair = (PatternId, PatternId);

impl PatternId {
    /// The all-zero id, never produced by [`PatternId::generate`]
    pub const NIL: PatternId = PatternId { hi: 0, lo: 0 };

    /// Generate a fresh unique id
    pub fn generate() -> Self {
        let (hi, lo) = Uuid::new_v4().as_u64_pair();
        Self { hi, lo }
    }

    /// Construct from raw words (high word first)
    pub fn from_words(hi: u64, lo: u64) -> Self {
        Self { hi, lo }
    }

    /// Raw words (high word first)
    pub fn words(&self) -> (u64, u64) {
        (self.hi, self.lo)
    }

    /// Canonical form: 32 lowercase hex characters, high word first
    pub fn to_hex(&self) -> String {
        format!("{:016x}{:016x}", self.hi, self.lo)
    }

    /// Parse the canonical hex form. Returns `None` for anything that is
    /// not exactly 32 hex characters.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let hi = u64::from_str_radix(&s[..16], 16).ok()?;
        let lo = u64::from_str_radix(&s[16..], 16).ok()?;
        Some(Self { hi, lo })
    }

    /// Encode as 2 x u64 little-endian
    pub fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        wire::write_u64(w, self.hi)?;
        wire::write_u64(w, self.lo)
    }

    /// Decode from 2 x u64 little-endian
    pub fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let hi = wire::read_u64(r)?;
        let lo = wire::read_u64(r)?;
        Ok(Self { hi, lo })
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// ============================================================================
// TIMESTAMP & DURATION
// ============================================================================

/// Signed span between two timestamps, in microseconds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Duration(i64);

impl Duration {
    /// Zero-length span
    pub const ZERO: Duration = Duration(0);

    /// From microseconds
    pub const fn from_micros(micros: i64) -> Self {
        Duration(micros)
    }

    /// From milliseconds
    pub const fn from_millis(millis: i64) -> Self {
        Duration(millis * 1_000)
    }

    /// From seconds
    pub const fn from_secs(secs: i64) -> Self {
        Duration(secs * 1_000_000)
    }

    /// From minutes
    pub const fn from_mins(mins: i64) -> Self {
        Duration(mins * 60 * 1_000_000)
    }

    /// Microsecond count
    pub const fn as_micros(&self) -> i64 {
        self.0
    }

    /// Millisecond count (truncating)
    pub const fn as_millis(&self) -> i64 {
        self.0 / 1_000
    }

    /// Fractional seconds
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// True for spans of negative length
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

/// Microsecond-precision instant since the Unix epoch
///
/// Compact (`i64` micros) so it can be stored in an atomic word where a
/// field is updated concurrently, and convertible to `chrono` types for
/// anything human-facing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The epoch itself
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Current wall-clock time
    pub fn now() -> Self {
        Timestamp(Utc::now().timestamp_micros())
    }

    /// From microseconds since the epoch
    pub const fn from_micros(micros: i64) -> Self {
        Timestamp(micros)
    }

    /// Microseconds since the epoch
    pub const fn to_micros(&self) -> i64 {
        self.0
    }

    /// Convert to a `chrono` instant. Values outside chrono's range clamp
    /// to the epoch.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_micros(self.0)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Convert from a `chrono` instant
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Timestamp(dt.timestamp_micros())
    }

    /// Span since an earlier instant (negative if `earlier` is later)
    pub fn since(&self, earlier: Timestamp) -> Duration {
        Duration(self.0 - earlier.0)
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Timestamp) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 + rhs.0)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 - rhs.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}

// ============================================================================
// TESTS
// ============================================================================
