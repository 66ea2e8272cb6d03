//! WAL configuration.

use std::path::PathBuf;

use plinth_common::constants::{DEFAULT_SEGMENT_SIZE, SEGMENT_EXT};
use plinth_common::types::{RecordIndex, SegmentSeq};

use crate::segment::{scratch_dir, Segment};

/// Configuration for a write-ahead log.
///
/// # Example
///
/// ```rust,ignore
/// use plinth_wal::WalConfig;
///
/// let config = WalConfig::new("data/wal").with_size_hint(16 * 1024 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Directory holding the published segments. The scratch directory
    /// is this path with a `.tmp` suffix.
    pub dir: PathBuf,

    /// Target segment size in bytes. Advisory: the frame that trips the
    /// threshold still lands in the segment, so files can end slightly
    /// larger.
    pub size_hint: usize,

    /// Segment file extension, including the leading dot. Fixed for the
    /// lifetime of a WAL directory.
    pub segment_ext: String,
}

impl WalConfig {
    /// Creates a configuration for the given directory with defaults.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            size_hint: DEFAULT_SEGMENT_SIZE,
            segment_ext: SEGMENT_EXT.to_string(),
        }
    }

    /// Sets the segment size hint.
    #[must_use]
    pub fn with_size_hint(mut self, size_hint: usize) -> Self {
        self.size_hint = size_hint;
        self
    }

    /// Sets the segment file extension (must include the leading dot).
    #[must_use]
    pub fn with_segment_ext(mut self, ext: impl Into<String>) -> Self {
        self.segment_ext = ext.into();
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.size_hint == 0 {
            return Err("segment size hint must be positive".to_string());
        }
        if self.segment_ext.len() < 2 || !self.segment_ext.starts_with('.') {
            return Err("segment extension must be a dot followed by a name".to_string());
        }
        if self.segment_ext.contains(std::path::is_separator) {
            return Err("segment extension must not contain path separators".to_string());
        }
        Ok(())
    }

    /// The scratch directory that shadows the published directory.
    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        scratch_dir(&self.dir)
    }

    /// Builds a segment descriptor under this configuration.
    pub(crate) fn segment(&self, seq: SegmentSeq, ind: RecordIndex) -> Segment {
        Segment {
            seq,
            ind,
            dir: self.dir.clone(),
            size_hint: self.size_hint,
            ext: self.segment_ext.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WalConfig::new("/tmp/wal");
        assert_eq!(config.dir, PathBuf::from("/tmp/wal"));
        assert_eq!(config.size_hint, DEFAULT_SEGMENT_SIZE);
        assert_eq!(config.segment_ext, ".seg");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = WalConfig::new("/tmp/wal")
            .with_size_hint(1024)
            .with_segment_ext(".wal");
        assert_eq!(config.size_hint, 1024);
        assert_eq!(config.segment_ext, ".wal");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(WalConfig::new("/tmp/wal")
            .with_size_hint(0)
            .validate()
            .is_err());
        assert!(WalConfig::new("/tmp/wal")
            .with_segment_ext("seg")
            .validate()
            .is_err());
        assert!(WalConfig::new("/tmp/wal")
            .with_segment_ext(".")
            .validate()
            .is_err());
        assert!(WalConfig::new("/tmp/wal")
            .with_segment_ext(".a/b")
            .validate()
            .is_err());
    }

    #[test]
    fn test_scratch_dir() {
        let config = WalConfig::new("/data/wal");
        assert_eq!(config.scratch_dir(), PathBuf::from("/data/wal.tmp"));
    }
}
