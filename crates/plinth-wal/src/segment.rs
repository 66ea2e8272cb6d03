//! Segment descriptors, file naming, and segment file opening.
//!
//! A segment is a file holding a contiguous, append-order run of frames.
//! Segment files are named `{seq:016x}-{ind:016x}{ext}` where `seq` is
//! the monotonic segment number and `ind` is the overall index of the
//! first record in the segment; the fixed-width lowercase hex makes a
//! lexicographic sort equal to a numeric sort.
//!
//! An in-progress segment lives in the scratch directory (the published
//! directory path plus a `.tmp` suffix) until it is published.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use plinth_common::constants::SCRATCH_DIR_SUFFIX;
use plinth_common::types::{RecordIndex, SegmentSeq};

use crate::error::WalResult;
use crate::io::{lock_file_nonblocking, preallocate};
use crate::reader::SegmentReader;
use crate::writer::SegmentReadWriter;

/// Descriptor of one segment file.
///
/// Carries everything needed to locate and size the file; the descriptor
/// itself holds no file handles. A published segment is immutable.
#[derive(Debug, Clone)]
pub struct Segment {
    pub(crate) seq: SegmentSeq,
    pub(crate) ind: RecordIndex,
    /// Published directory; the scratch directory is derived from it.
    pub(crate) dir: PathBuf,
    pub(crate) size_hint: usize,
    pub(crate) ext: String,
}

impl Segment {
    /// The segment's sequence number.
    #[must_use]
    pub fn seq(&self) -> SegmentSeq {
        self.seq
    }

    /// The overall index of the first record in this segment.
    #[must_use]
    pub fn ind(&self) -> RecordIndex {
        self.ind
    }

    /// The segment's file name, without a directory.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{:016x}-{:016x}{}",
            self.seq.as_u64(),
            self.ind.as_u64(),
            self.ext
        )
    }

    /// Path of the segment once published.
    #[must_use]
    pub fn published_path(&self) -> PathBuf {
        self.dir.join(self.file_name())
    }

    /// Path of the segment while it is the scratch.
    #[must_use]
    pub fn scratch_path(&self) -> PathBuf {
        scratch_dir(&self.dir).join(self.file_name())
    }

    /// Opens the published segment file read-only for replay, taking the
    /// advisory lock.
    pub(crate) fn open_published(&self) -> WalResult<SegmentReader> {
        let path = self.published_path();
        let file = OpenOptions::new().read(true).open(&path)?;
        lock_file_nonblocking(&file, &path)?;
        SegmentReader::new(self.clone(), file)
    }

    /// Creates the scratch segment file, preallocating `size_hint` bytes.
    pub(crate) fn create_scratch(&self) -> WalResult<SegmentReadWriter> {
        self.new_scratch(true)
    }

    /// Opens an existing scratch segment file for recovery.
    pub(crate) fn open_scratch(&self) -> WalResult<SegmentReadWriter> {
        self.new_scratch(false)
    }

    fn new_scratch(&self, create: bool) -> WalResult<SegmentReadWriter> {
        // held so publish can fsync the directory after the rename
        let dir_file = File::open(&self.dir)?;

        let path = self.scratch_path();
        let mut options = OpenOptions::new();
        options.read(true).write(true);
        if create {
            options.create(true);
            #[cfg(unix)]
            {
                use plinth_common::constants::SEGMENT_FILE_MODE;
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(SEGMENT_FILE_MODE);
            }
        }
        let file = options.open(&path)?;
        lock_file_nonblocking(&file, &path)?;
        if create {
            preallocate(&file, self.size_hint as u64)?;
        }

        SegmentReadWriter::new(self.clone(), file, dir_file)
    }
}

/// The scratch directory that shadows a published directory.
pub(crate) fn scratch_dir(dir: &Path) -> PathBuf {
    // normalize so a trailing separator cannot split the suffix off
    let mut os: OsString = dir.components().collect::<PathBuf>().into_os_string();
    os.push(SCRATCH_DIR_SUFFIX);
    PathBuf::from(os)
}

/// Parses `{seq:016x}-{ind:016x}{ext}` out of a path's file name.
///
/// Returns `None` for anything that is not exactly two 16-digit runs of
/// lowercase hex separated by `-` and followed by the extension.
pub(crate) fn parse_seq_ind(path: &Path, ext: &str) -> Option<(SegmentSeq, RecordIndex)> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(ext)?;
    let (seq_hex, ind_hex) = stem.split_once('-')?;
    if !is_fixed_lower_hex(seq_hex) || !is_fixed_lower_hex(ind_hex) {
        return None;
    }
    let seq = u64::from_str_radix(seq_hex, 16).ok()?;
    let ind = u64::from_str_radix(ind_hex, 16).ok()?;
    Some((SegmentSeq::new(seq), RecordIndex::new(ind)))
}

fn is_fixed_lower_hex(s: &str) -> bool {
    s.len() == 16 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
