//! Sequential reading of one segment file.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};

use plinth_common::types::RecordIndex;

use crate::error::{WalError, WalResult};
use crate::frame::Deframer;
use crate::segment::Segment;

/// Result of scanning a segment to its last valid frame.
#[derive(Debug)]
pub(crate) struct TailScan {
    /// Index of the last good record, or the segment's first index when
    /// the segment holds no valid frames.
    pub(crate) last_ind: RecordIndex,
    /// File offset just past the last valid frame.
    pub(crate) offset: u64,
    /// The tail error the scan recovered from, if any. Truncating at
    /// `offset` is the correct repair either way.
    pub(crate) damage: Option<WalError>,
}

/// Buffered sequential deframer over one segment file.
///
/// The buffered reader wraps a clone of the segment's file handle, so
/// the file offset it advances is shared with the handle used for
/// truncation and sync.
pub(crate) struct SegmentReader {
    segment: Segment,
    file: File,
    deframer: Deframer<BufReader<File>>,
}

impl SegmentReader {
    pub(crate) fn new(segment: Segment, file: File) -> WalResult<Self> {
        let br = BufReader::with_capacity(segment.size_hint, file.try_clone()?);
        Ok(Self {
            segment,
            file,
            deframer: Deframer::new(br),
        })
    }

    pub(crate) fn segment(&self) -> &Segment {
        &self.segment
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }

    /// Reads the next frame; `Ok(None)` at the end of the data.
    pub(crate) fn deframe(&mut self) -> WalResult<Option<(Vec<u8>, usize)>> {
        self.deframer.deframe()
    }

    /// Total bytes consumed from the segment so far.
    pub(crate) fn bytes_read(&self) -> usize {
        self.deframer.bytes_read()
    }

    /// Repositions the reader `n` bytes before its current logical
    /// position, discarding the read buffer, so the next read restarts at
    /// the beginning of a failed frame.
    pub(crate) fn undo(&mut self, n: usize) -> WalResult<()> {
        self.deframer
            .get_mut()
            .seek(SeekFrom::Current(-(n as i64)))?;
        self.deframer.undo(n);
        Ok(())
    }

    /// Deframes until the end of the valid data.
    ///
    /// Stops cleanly at end-of-data; on a checksum mismatch or partial
    /// frame it rewinds to the start of the bad frame and stops, leaving
    /// the file offset at the valid tail. Any other error propagates.
    pub(crate) fn seek_to_last_frame(&mut self) -> WalResult<TailScan> {
        let mut frames: u64 = 0;
        let mut damage = None;
        loop {
            let err = match self.deframer.deframe() {
                Ok(Some(_)) => {
                    frames += 1;
                    continue;
                }
                Ok(None) => break,
                Err(err) => err,
            };
            match err {
                WalError::PartialFrame { bytes_read, .. }
                | WalError::ChecksumMismatch { bytes_read, .. } => {
                    self.undo(bytes_read)?;
                    damage = Some(err);
                    break;
                }
                other => return Err(other),
            }
        }

        let last_ind = if frames == 0 {
            self.segment.ind
        } else {
            RecordIndex::new(self.segment.ind.as_u64() + frames - 1)
        };
        let mut f = &self.file;
        let offset = f.stream_position()?;
        Ok(TailScan {
            last_ind,
            offset,
            damage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{frame_size, Framer};
    use plinth_common::constants::SEGMENT_EXT;
    use plinth_common::types::SegmentSeq;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_segment_file(path: &Path, payloads: &[&[u8]], tail_garbage: &[u8]) {
        let mut bytes = Vec::new();
        let mut framer = Framer::new(&mut bytes);
        for payload in payloads {
            framer.frame(payload).unwrap();
        }
        bytes.extend_from_slice(tail_garbage);
        std::fs::File::create(path)
            .unwrap()
            .write_all(&bytes)
            .unwrap();
    }

    fn reader_for(dir: &Path, ind: u64, name: &str) -> SegmentReader {
        let segment = Segment {
            seq: SegmentSeq::new(0),
            ind: RecordIndex::new(ind),
            dir: dir.to_path_buf(),
            size_hint: 1024,
            ext: SEGMENT_EXT.to_string(),
        };
        let file = std::fs::File::open(dir.join(name)).unwrap();
        SegmentReader::new(segment, file).unwrap()
    }

    #[test]
    fn test_seek_to_last_frame_clean() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seg");
        write_segment_file(&path, &[b"a", b"bb", b"ccc"], &[]);

        let mut reader = reader_for(tmp.path(), 10, "seg");
        let scan = reader.seek_to_last_frame().unwrap();
        assert_eq!(scan.last_ind, RecordIndex::new(12));
        assert_eq!(
            scan.offset,
            (frame_size(1) + frame_size(2) + frame_size(3)) as u64
        );
        assert!(scan.damage.is_none());
    }

    #[test]
    fn test_seek_to_last_frame_stops_at_torn_tail() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seg");
        // a torn header: fewer than 8 bytes after the last whole frame
        write_segment_file(&path, &[b"a", b"bb"], &[0x01, 0x02, 0x03]);

        let mut reader = reader_for(tmp.path(), 0, "seg");
        let scan = reader.seek_to_last_frame().unwrap();
        assert_eq!(scan.last_ind, RecordIndex::new(1));
        assert_eq!(scan.offset, (frame_size(1) + frame_size(2)) as u64);
        assert!(matches!(
            scan.damage,
            Some(WalError::PartialFrame { .. })
        ));
    }

    #[test]
    fn test_seek_to_last_frame_stops_at_checksum_damage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seg");
        write_segment_file(&path, &[b"a", b"bb"], &[]);

        // corrupt one payload byte of the second frame
        let mut bytes = std::fs::read(&path).unwrap();
        let second_data = frame_size(1) + 12;
        bytes[second_data] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let mut reader = reader_for(tmp.path(), 0, "seg");
        let scan = reader.seek_to_last_frame().unwrap();
        assert_eq!(scan.last_ind, RecordIndex::new(0));
        assert_eq!(scan.offset, frame_size(1) as u64);
        assert!(matches!(
            scan.damage,
            Some(WalError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_seek_to_last_frame_empty_segment() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seg");
        write_segment_file(&path, &[], &[]);

        let mut reader = reader_for(tmp.path(), 7, "seg");
        let scan = reader.seek_to_last_frame().unwrap();
        assert_eq!(scan.last_ind, RecordIndex::new(7));
        assert_eq!(scan.offset, 0);
        assert!(scan.damage.is_none());
    }

    #[test]
    fn test_deframe_resumes_after_undo() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seg");
        write_segment_file(&path, &[b"hello"], &[0xaa, 0xbb]);

        let mut reader = reader_for(tmp.path(), 0, "seg");
        let (data, n) = reader.deframe().unwrap().unwrap();
        assert_eq!(data, b"hello");

        // undo rewinds the position but not the rolling checksum, so
        // re-reading even a valid frame fails the checksum: undo exists
        // to abandon a bad tail, not to re-read good frames
        reader.undo(n).unwrap();
        assert_eq!(reader.bytes_read(), 0);
        let err = reader.deframe().unwrap_err();
        assert!(matches!(err, WalError::ChecksumMismatch { .. }));
    }
}
