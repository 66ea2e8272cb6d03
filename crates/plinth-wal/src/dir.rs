//! WAL directory enumeration and structural validation.
//!
//! The published directory holds immutable segments; its `.tmp` sibling
//! holds at most one in-progress scratch segment. Discovery collects
//! both, checks the invariants, and hands the engine a validated view.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::WalConfig;
use crate::error::{WalError, WalResult};
use crate::segment::{parse_seq_ind, scratch_dir, Segment};

/// Validated view of a WAL directory pair.
#[derive(Debug)]
pub(crate) struct DirScan {
    /// Published segments in `seq` order.
    pub(crate) published: Vec<Segment>,
    /// The outstanding scratch segment, if a parsable one exists.
    pub(crate) scratch: Option<Segment>,
}

/// Enumerates and validates the segments under a config's directories.
///
/// Invariants enforced:
/// - published sequence numbers are contiguous
/// - at most one scratch segment exists
/// - a scratch's sequence is one past the largest published sequence
///
/// An unparsable scratch file name is treated as "no scratch"; an
/// unparsable published file name is an error.
pub(crate) fn find_segments(config: &WalConfig) -> WalResult<DirScan> {
    let ext = &config.segment_ext;
    let published_paths = segment_paths(&config.dir, ext)?;
    let scratch_paths = segment_paths(&scratch_dir(&config.dir), ext)?;

    if scratch_paths.len() > 1 {
        return Err(WalError::corruption(
            "there must be at most 1 outstanding scratch segment",
        ));
    }

    let mut published = Vec::with_capacity(published_paths.len());
    let mut max_seq: Option<u64> = None;
    for path in &published_paths {
        let (seq, ind) =
            parse_seq_ind(path, ext).ok_or_else(|| WalError::InvalidSegmentName {
                path: path.clone(),
            })?;
        match max_seq {
            Some(max) if seq.as_u64() != max + 1 => {
                return Err(WalError::corruption(format!(
                    "sequences must be contiguous: missing seq {}",
                    max + 1
                )));
            }
            _ => {}
        }
        max_seq = Some(seq.as_u64());
        published.push(config.segment(seq, ind));
    }

    let mut scratch = None;
    if let Some(path) = scratch_paths.first() {
        // an invalid scratch name is quietly ignored
        if let Some((seq, ind)) = parse_seq_ind(path, ext) {
            if let Some(max) = max_seq {
                if seq.as_u64() != max + 1 {
                    return Err(WalError::corruption(format!(
                        "outstanding scratch seq must be one past the largest published: got {seq}"
                    )));
                }
            }
            scratch = Some(config.segment(seq, ind));
        }
    }

    Ok(DirScan { published, scratch })
}

/// Collects segment files directly inside `dir`, sorted by file name.
///
/// Nested directories are not descended into; a missing directory yields
/// an empty list. The fixed-width hex naming makes the lexicographic
/// sort numeric.
fn segment_paths(dir: &Path, ext: &str) -> WalResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_segment = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(ext));
        if is_segment {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
