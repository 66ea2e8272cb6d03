//! WAL error types.
//!
//! This module defines all error types for the write-ahead log.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for WAL operations.
pub type WalResult<T> = Result<T, WalError>;

/// Sections of an on-disk frame, used to pinpoint where a torn or
/// partial frame was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSection {
    /// The 8-byte length field.
    Header,
    /// The 4-byte checksum field.
    Checksum,
    /// The record payload.
    Data,
    /// The zero padding after the payload.
    Padding,
}

impl fmt::Display for FrameSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Header => "header",
            Self::Checksum => "checksum",
            Self::Data => "data",
            Self::Padding => "padding",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// I/O error from the underlying filesystem.
    #[error("WAL I/O error: {source}")]
    Io {
        /// The originating I/O error.
        #[from]
        source: io::Error,
    },

    /// A write returned a short byte count mid-frame.
    #[error("torn write of frame {section}")]
    TornWrite {
        /// The frame section whose write came up short.
        section: FrameSection,
    },

    /// A read yielded fewer bytes than one frame requires.
    #[error("read frame partially ({bytes_read} bytes): {section} is torn")]
    PartialFrame {
        /// The frame section whose read came up short.
        section: FrameSection,
        /// Bytes consumed by the failed deframe attempt.
        bytes_read: usize,
    },

    /// The payload checksum does not match the stored checksum.
    #[error(
        "checksum mismatch: computed {computed:#010x}, stored {stored:#010x} ({bytes_read} bytes read)"
    )]
    ChecksumMismatch {
        /// Rolling checksum computed over the payloads read so far.
        computed: u32,
        /// Checksum stored in the frame.
        stored: u32,
        /// Bytes consumed by the failed deframe attempt.
        bytes_read: usize,
    },

    /// The frame was written, but the segment has reached its size hint.
    #[error("segment size reached")]
    SegmentFull {
        /// Bytes the triggering frame occupies on disk; the append itself
        /// succeeded.
        bytes_written: usize,
    },

    /// Another file descriptor holds the advisory lock on a segment file.
    #[error("segment file already locked: {path}")]
    AlreadyLocked {
        /// The contended segment file.
        path: PathBuf,
    },

    /// The WAL directory violates a structural invariant.
    #[error("WAL directory corrupted: {reason}")]
    Corruption {
        /// Description of the violated invariant.
        reason: String,
    },

    /// A published segment file name does not parse.
    #[error("segment file name must be {{seq:016x}}-{{ind:016x}} with the segment extension: {path}")]
    InvalidSegmentName {
        /// The offending path.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("WAL configuration error: {reason}")]
    Config {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// The handle has no open scratch segment (a previous cut failed or
    /// the WAL was closed mid-operation).
    #[error("no active scratch segment")]
    NoActiveScratch,
}

impl WalError {
    /// Creates a corruption error.
    pub fn corruption(reason: impl Into<String>) -> Self {
        Self::Corruption {
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config_error(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns true for the tail errors that recovery repairs in place by
    /// truncating: a partial frame or a checksum mismatch.
    pub fn is_recoverable_tail(&self) -> bool {
        matches!(
            self,
            Self::PartialFrame { .. } | Self::ChecksumMismatch { .. }
        )
    }

    /// Returns true if this error indicates on-disk corruption.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Corruption { .. } | Self::ChecksumMismatch { .. } | Self::InvalidSegmentName { .. }
        )
    }
}
