//! Typed identifiers for segments and records.
//!
//! These wrap the raw `u64` values that appear in segment file names,
//! preventing a segment sequence number from being confused with a
//! record index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic segment sequence number.
///
/// Segments in a WAL directory are numbered contiguously starting from
/// the first segment's sequence; the number forms the first half of the
/// segment file name.
///
/// # Example
///
/// ```rust
/// use plinth_common::types::SegmentSeq;
///
/// let seq = SegmentSeq::new(3);
/// assert_eq!(seq.next().as_u64(), 4);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SegmentSeq(u64);

impl SegmentSeq {
    /// Creates a new `SegmentSeq` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for SegmentSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SegmentSeq({})", self.0)
    }
}

impl fmt::Display for SegmentSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SegmentSeq {
    #[inline]
    fn from(seq: u64) -> Self {
        Self::new(seq)
    }
}

impl From<SegmentSeq> for u64 {
    #[inline]
    fn from(seq: SegmentSeq) -> Self {
        seq.0
    }
}

/// Overall record index within a WAL.
///
/// Records are numbered across the whole log, independent of which
/// segment holds them. The index of the first record in a segment forms
/// the second half of the segment file name, so replay from an index
/// can pick the right segment without reading the others.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RecordIndex(u64);

impl RecordIndex {
    /// Creates a new `RecordIndex` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(ind: u64) -> Self {
        Self(ind)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next record index.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for RecordIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordIndex({})", self.0)
    }
}

impl fmt::Display for RecordIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordIndex {
    #[inline]
    fn from(ind: u64) -> Self {
        Self::new(ind)
    }
}

impl From<RecordIndex> for u64 {
    #[inline]
    fn from(ind: RecordIndex) -> Self {
        ind.0
    }
}
