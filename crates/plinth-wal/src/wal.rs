//! The WAL engine: open/recover, append, cut-on-full, sync, visit.

use std::fmt;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use plinth_common::types::{RecordIndex, SegmentSeq};

use crate::config::WalConfig;
use crate::dir::{self, DirScan};
use crate::error::{WalError, WalResult};
use crate::segment::Segment;
use crate::writer::SegmentReadWriter;

/// A write-ahead log over a directory of segment files.
///
/// Appends go to a single in-progress *scratch* segment that lives in a
/// sibling `.tmp` directory; when the scratch reaches the configured size
/// hint it is *published* — truncated, fsynced, and renamed into the main
/// directory — and a fresh scratch is started. On open, a leftover
/// scratch is scanned to its last valid frame, truncated past any torn
/// or corrupt tail, and published, so every record previously
/// acknowledged as durable is replayable.
///
/// A `Wal` is a single-owner handle: mutating operations take
/// `&mut self` and there is no internal synchronization. Cross-process
/// exclusion comes from non-blocking advisory locks on every open
/// segment file.
pub struct Wal {
    config: WalConfig,
    published: Vec<Segment>,
    scratch: Option<SegmentReadWriter>,
    last_ind: RecordIndex,
}

impl Wal {
    /// Opens a WAL directory, creating it if missing, and recovers any
    /// existing segments.
    ///
    /// Recovery publishes a leftover scratch segment after truncating
    /// its invalid tail (a checksum mismatch there is demoted to a
    /// warning — it means either a preallocated-but-unfinished tail or
    /// corruption, and truncation is the correct repair for both), then
    /// starts a fresh scratch at the next sequence number.
    pub fn open(config: WalConfig) -> WalResult<Self> {
        config.validate().map_err(WalError::config_error)?;

        if ensure_dir(&config.dir)? {
            info!(dir = %config.dir.display(), "created WAL directory");
        }
        let scratch_dir = config.scratch_dir();
        if ensure_dir(&scratch_dir)? {
            info!(dir = %scratch_dir.display(), "created WAL scratch directory");
        }

        let DirScan {
            mut published,
            scratch,
        } = dir::find_segments(&config)?;

        let mut last_ind = RecordIndex::new(0);
        let scratch_rw = match scratch {
            None => match published.last() {
                Some(last) => {
                    let mut reader = last.open_published()?;
                    let tail = reader.seek_to_last_frame()?;
                    last_ind = tail.last_ind;
                    config
                        .segment(last.seq().next(), last_ind.next())
                        .create_scratch()?
                }
                None => config
                    .segment(SegmentSeq::new(0), RecordIndex::new(0))
                    .create_scratch()?,
            },
            Some(existing) => {
                // publish the leftover scratch, truncating partial frames
                let mut old = existing.open_scratch()?;
                let tail = old.seek_to_last_frame()?;
                last_ind = tail.last_ind;
                if let Some(damage) = &tail.damage {
                    warn!(
                        error = %damage,
                        offset = tail.offset,
                        "recovering scratch segment with damaged tail"
                    );
                }
                let sealed = old.publish()?;
                let next = config.segment(sealed.seq().next(), last_ind.next());
                published.push(sealed);
                next.create_scratch()?
            }
        };

        Ok(Self {
            config,
            published,
            scratch: Some(scratch_rw),
            last_ind,
        })
    }

    /// Appends one record, cutting to a new segment first if the current
    /// one filled up. Returns the number of bytes the record's frame
    /// occupies.
    ///
    /// The bytes are only guaranteed to be in the user-space buffer;
    /// call [`sync`](Self::sync) to make them durable.
    pub fn append(&mut self, payload: &[u8]) -> WalResult<usize> {
        let scratch = self.scratch.as_mut().ok_or(WalError::NoActiveScratch)?;
        let n = match scratch.frame(payload) {
            Ok(n) => n,
            Err(WalError::SegmentFull { bytes_written }) => {
                // the record that tripped the threshold is already in the
                // segment being cut; do not re-append it
                self.cut()?;
                bytes_written
            }
            Err(err) => return Err(err),
        };
        self.last_ind = self.last_ind.next();
        Ok(n)
    }

    /// Publishes the current scratch segment and starts a new one.
    fn cut(&mut self) -> WalResult<()> {
        let scratch = self.scratch.take().ok_or(WalError::NoActiveScratch)?;
        let sealed = scratch.publish()?;
        let next = self
            .config
            .segment(sealed.seq().next(), self.last_ind.next());
        self.published.push(sealed);
        self.scratch = Some(next.create_scratch()?);
        Ok(())
    }

    /// Flushes buffered appends and fsyncs the scratch segment, making
    /// every append so far durable.
    pub fn sync(&mut self) -> WalResult<()> {
        self.scratch
            .as_mut()
            .ok_or(WalError::NoActiveScratch)?
            .sync()
    }

    /// Applies `f` to every record in every published segment, in append
    /// order.
    ///
    /// Records still in the scratch segment are not visited: replay
    /// covers what has been durably published. Closing and reopening the
    /// WAL publishes the scratch and makes its records visitable.
    /// Visitation stops at the first error from `f` or from I/O.
    pub fn visit<F>(&self, mut f: F) -> WalResult<()>
    where
        F: FnMut(&[u8]) -> WalResult<()>,
    {
        for segment in &self.published {
            let mut reader = segment.open_published()?;
            while let Some((payload, _)) = reader.deframe()? {
                f(&payload)?;
            }
        }
        Ok(())
    }

    /// The published segments, in sequence order.
    #[must_use]
    pub fn published_segments(&self) -> &[Segment] {
        &self.published
    }

    /// Flushes and closes the scratch segment. Does not sync and does
    /// not publish; remember to call [`sync`](Self::sync) first if the
    /// tail records must be durable.
    pub fn close(mut self) -> WalResult<()> {
        match self.scratch.take() {
            Some(scratch) => scratch.close(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Wal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wal")
            .field("dir", &self.config.dir)
            .field("published", &self.published.len())
            .field("last_ind", &self.last_ind)
            .finish()
    }
}

/// Creates `path` with owner-only permissions if it does not exist.
/// Returns true if the directory was created.
fn ensure_dir(path: &Path) -> WalResult<bool> {
    if path.exists() {
        return Ok(false);
    }
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use plinth_common::constants::WAL_DIR_MODE;
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(WAL_DIR_MODE);
    }
    builder.create(path)?;
    Ok(true)
}
