//! Buffered appending into the scratch segment, and its promotion to a
//! published segment.

use std::fs;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};

use crate::error::{WalError, WalResult};
use crate::frame::Framer;
use crate::io::fsync;
use crate::reader::{SegmentReader, TailScan};
use crate::segment::Segment;

/// Read/writer over the scratch segment.
///
/// Reading and writing share one file description: the buffered reader
/// and writer each wrap a clone of the same handle, so a recovery scan
/// positions the offset at the valid tail and subsequent appends continue
/// from there. The published directory handle is held for the
/// fsync-after-rename in [`publish`](Self::publish).
pub(crate) struct SegmentReadWriter {
    reader: SegmentReader,
    framer: Framer<BufWriter<File>>,
    dir_file: File,
}

impl SegmentReadWriter {
    pub(crate) fn new(segment: Segment, file: File, dir_file: File) -> WalResult<Self> {
        let bw = BufWriter::with_capacity(segment.size_hint, file.try_clone()?);
        Ok(Self {
            reader: SegmentReader::new(segment, file)?,
            framer: Framer::new(bw),
            dir_file,
        })
    }

    /// Appends one frame to the user-space buffer.
    ///
    /// If the total bytes moved through this segment (recovered tail plus
    /// appended frames) reach the size hint, the append still succeeds
    /// but [`WalError::SegmentFull`] is returned carrying the frame's
    /// byte count; the caller decides when to cut.
    pub(crate) fn frame(&mut self, data: &[u8]) -> WalResult<usize> {
        let n = self.framer.frame(data)?;
        let total = self.reader.bytes_read() + self.framer.bytes_written();
        if total >= self.reader.segment().size_hint {
            return Err(WalError::SegmentFull { bytes_written: n });
        }
        Ok(n)
    }

    /// Scans to the last valid frame; used when recovering an existing
    /// scratch.
    pub(crate) fn seek_to_last_frame(&mut self) -> WalResult<TailScan> {
        self.reader.seek_to_last_frame()
    }

    /// Flushes the user-space buffer and fsyncs the file.
    pub(crate) fn sync(&mut self) -> WalResult<()> {
        self.framer.get_mut().flush()?;
        fsync(self.reader.file())?;
        Ok(())
    }

    /// Promotes the scratch to a published segment:
    /// flush, truncate to the current offset (reclaiming unused
    /// preallocation), fsync, rename into the published directory, fsync
    /// the directory. Consumes the writer; dropping the handles releases
    /// the advisory locks.
    pub(crate) fn publish(mut self) -> WalResult<Segment> {
        self.framer.get_mut().flush()?;

        let mut f = self.reader.file();
        let offset = f.stream_position()?;
        self.reader.file().set_len(offset)?;
        fsync(self.reader.file())?;

        let segment = self.reader.segment().clone();
        fs::rename(segment.scratch_path(), segment.published_path())?;
        fsync(&self.dir_file)?;

        Ok(segment)
    }

    /// Flushes remaining buffered data and closes the file. Does not
    /// sync to disk.
    pub(crate) fn close(mut self) -> WalResult<()> {
        self.framer.get_mut().flush()?;
        Ok(())
    }
}
