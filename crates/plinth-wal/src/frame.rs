//! Frame encoding and decoding.
//!
//! A frame is the on-disk representation of one record:
//!
//! 1. 8 bytes, little-endian length field:
//!    - most significant bit: 1 means the frame carries padding
//!    - bits 56..=62: number of padding bytes (`pad_len`)
//!    - least significant 4 bytes: payload length in bytes (`actual_len`)
//! 2. 4 bytes: little-endian CRC32 (Castagnoli) checksum
//! 3. `actual_len` bytes: the payload
//! 4. `pad_len` bytes: zero padding, up to 8 bytes
//!
//! Padding forces 8-byte alignment of the length field so it never
//! suffers a torn write. The checksum is *rolling*: each frame stores the
//! cumulative CRC over every payload written through the same codec
//! instance, so a reader must consume frames in order and keep its own
//! running sum in lockstep.

use std::io::{self, Read, Write};

use plinth_common::constants::{FRAME_ALIGN, FRAME_CHECKSUM_SIZE, FRAME_HEADER_SIZE};

use crate::error::{FrameSection, WalError, WalResult};

/// Set on the length field's most significant bit when padding follows
/// the payload.
const PAD_PRESENT: u64 = 1 << 63;

const ZERO_PAD: [u8; FRAME_ALIGN] = [0u8; FRAME_ALIGN];

/// Packs a payload length into the 8-byte length field and returns it
/// with the padding length.
///
/// The encoder always pads: a payload that is already 8-byte aligned gets
/// a full 8 bytes of padding, so `pad_len` is in `1..=8`.
pub(crate) fn encode_frame_size(actual_len: u32) -> (u64, u8) {
    let pad_len = (FRAME_ALIGN - (actual_len as usize % FRAME_ALIGN)) as u8;
    let mut len_field = u64::from(actual_len);
    if pad_len != 0 {
        len_field |= u64::from(0x80 | pad_len) << 56;
    }
    (len_field, pad_len)
}

/// Unpacks an 8-byte length field into payload length and padding length.
///
/// A clear most significant bit means no padding; frames produced by
/// [`Framer`] always have it set.
pub(crate) fn decode_frame_size(len_field: u64) -> (u32, u8) {
    let actual_len = len_field as u32;
    let pad_len = if len_field & PAD_PRESENT != 0 {
        ((len_field ^ PAD_PRESENT) >> 56) as u8
    } else {
        0
    };
    (actual_len, pad_len)
}

/// Total on-disk size of a frame holding `data_len` payload bytes.
#[must_use]
pub fn frame_size(data_len: usize) -> usize {
    let pad_len = FRAME_ALIGN - data_len % FRAME_ALIGN;
    FRAME_HEADER_SIZE + FRAME_CHECKSUM_SIZE + data_len + pad_len
}

/// Encodes frames into any byte sink.
///
/// Stateful in exactly one way: the rolling checksum. Construct a fresh
/// `Framer` to start a new segment session.
pub(crate) struct Framer<W> {
    w: W,
    crc: u32,
    bytes_written: usize,
}

impl<W: Write> Framer<W> {
    pub(crate) fn new(w: W) -> Self {
        Self {
            w,
            crc: 0,
            bytes_written: 0,
        }
    }

    /// Writes one frame and returns the number of bytes emitted.
    ///
    /// Every section write is byte-count checked; a short write fails
    /// with [`WalError::TornWrite`] naming the section.
    pub(crate) fn frame(&mut self, data: &[u8]) -> WalResult<usize> {
        let (len_field, pad_len) = encode_frame_size(data.len() as u32);

        self.crc = crc32c::crc32c_append(self.crc, data);
        let checksum = self.crc;

        let mut nn = 0;
        nn += self.write_section(&len_field.to_le_bytes(), FrameSection::Header)?;
        nn += self.write_section(&checksum.to_le_bytes(), FrameSection::Checksum)?;
        nn += self.write_section(data, FrameSection::Data)?;
        if pad_len != 0 {
            nn += self.write_section(&ZERO_PAD[..pad_len as usize], FrameSection::Padding)?;
        }
        Ok(nn)
    }

    fn write_section(&mut self, buf: &[u8], section: FrameSection) -> WalResult<usize> {
        let n = self.w.write(buf)?;
        self.bytes_written += n;
        if n != buf.len() {
            return Err(WalError::TornWrite { section });
        }
        Ok(n)
    }

    /// Total bytes emitted through this framer.
    pub(crate) fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub(crate) fn get_mut(&mut self) -> &mut W {
        &mut self.w
    }
}

/// Decodes frames from any byte source, rebuilding the rolling checksum
/// in lockstep with the writer that produced them.
pub(crate) struct Deframer<R> {
    r: R,
    crc: u32,
    bytes_read: usize,
}

impl<R: Read> Deframer<R> {
    pub(crate) fn new(r: R) -> Self {
        Self {
            r,
            crc: 0,
            bytes_read: 0,
        }
    }

    /// Reads one frame, returning the payload and the number of bytes
    /// consumed. Returns `Ok(None)` at the end of the data.
    ///
    /// Short reads mid-frame fail with [`WalError::PartialFrame`]; a
    /// checksum mismatch fails with [`WalError::ChecksumMismatch`] before
    /// the padding is consumed. Both carry the byte count consumed so the
    /// caller can reposition.
    pub(crate) fn deframe(&mut self) -> WalResult<Option<(Vec<u8>, usize)>> {
        let mut nn = 0;

        let mut len_field_buf = [0u8; FRAME_HEADER_SIZE];
        let n = self.read_full(&mut len_field_buf)?;
        nn += n;
        if n == 0 {
            return Ok(None);
        }
        if n != FRAME_HEADER_SIZE {
            return Err(WalError::PartialFrame {
                section: FrameSection::Header,
                bytes_read: nn,
            });
        }
        let (actual_len, pad_len) = decode_frame_size(u64::from_le_bytes(len_field_buf));

        let mut checksum_buf = [0u8; FRAME_CHECKSUM_SIZE];
        let n = self.read_full(&mut checksum_buf)?;
        nn += n;
        if n != FRAME_CHECKSUM_SIZE {
            return Err(WalError::PartialFrame {
                section: FrameSection::Checksum,
                bytes_read: nn,
            });
        }
        let stored = u32::from_le_bytes(checksum_buf);

        let mut data = vec![0u8; actual_len as usize];
        let n = self.read_full(&mut data)?;
        nn += n;
        if n != data.len() {
            return Err(WalError::PartialFrame {
                section: FrameSection::Data,
                bytes_read: nn,
            });
        }

        self.crc = crc32c::crc32c_append(self.crc, &data);
        if self.crc != stored {
            return Err(WalError::ChecksumMismatch {
                computed: self.crc,
                stored,
                bytes_read: nn,
            });
        }

        if pad_len != 0 {
            let mut pad_buf = [0u8; FRAME_ALIGN];
            let want = pad_len as usize;
            let n = self.read_full(&mut pad_buf[..want])?;
            nn += n;
            if n != want {
                return Err(WalError::PartialFrame {
                    section: FrameSection::Padding,
                    bytes_read: nn,
                });
            }
        }

        Ok(Some((data, nn)))
    }

    /// Reads until `buf` is full or the source is exhausted, returning
    /// the number of bytes read. Unlike `read_exact`, end-of-data is not
    /// an error here: the caller tells a clean end from a torn frame by
    /// the count.
    fn read_full(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        let res = loop {
            if filled == buf.len() {
                break Ok(());
            }
            match self.r.read(&mut buf[filled..]) {
                Ok(0) => break Ok(()),
                Ok(n) => filled += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        self.bytes_read += filled;
        res.map(|()| filled)
    }

    /// Rolls the byte count back by `n`, after the caller has repositioned
    /// the underlying source to the start of a failed frame.
    pub(crate) fn undo(&mut self, n: usize) {
        self.bytes_read -= n;
    }

    /// Total bytes consumed through this deframer.
    pub(crate) fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    pub(crate) fn get_mut(&mut self) -> &mut R {
        &mut self.r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frame_bytes(data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut framer = Framer::new(&mut buf);
        framer.frame(data).unwrap();
        buf
    }

    #[test]
    fn test_write_and_read_three_frames() {
        let want = b"hello world!";
        let total_frames = 3;

        let mut buf = Vec::new();
        let mut framer = Framer::new(&mut buf);
        for _ in 0..total_frames {
            framer.frame(want).unwrap();
        }

        let mut deframer = Deframer::new(Cursor::new(buf));
        let mut n_frames = 0;
        while let Some((got, _)) = deframer.deframe().unwrap() {
            n_frames += 1;
            assert_eq!(got.as_slice(), want, "frame #{n_frames} payload mismatch");
        }
        assert_eq!(n_frames, total_frames);
    }

    #[test]
    fn test_torn_frame_is_partial_at_every_length() {
        let frame = frame_bytes(b"Hello world!");

        for i in 1..frame.len() {
            let mut deframer = Deframer::new(Cursor::new(frame[..i].to_vec()));
            match deframer.deframe() {
                Err(WalError::PartialFrame { .. }) => {}
                other => panic!("tore off {} bytes, expected PartialFrame, got {other:?}", frame.len() - i),
            }
        }
    }

    #[test]
    fn test_flip_checksum_bit_fails_checksum() {
        let mut frame = frame_bytes(b"Hello world!");

        // flip the 7th bit of the 3rd checksum byte
        frame[8 + 3] ^= 1 << 6;

        let mut deframer = Deframer::new(Cursor::new(frame));
        assert!(matches!(
            deframer.deframe(),
            Err(WalError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_flip_data_bit_fails_checksum() {
        let mut frame = frame_bytes(b"Hello world!");

        // flip the 5th bit of the 11th data byte
        frame[11 + 5] ^= 1 << 4;

        let mut deframer = Deframer::new(Cursor::new(frame));
        assert!(matches!(
            deframer.deframe(),
            Err(WalError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_checksum_rolls_across_frames() {
        // The second frame's stored checksum covers both payloads, so a
        // fresh deframer started at the second frame must fail.
        let mut buf = Vec::new();
        let mut framer = Framer::new(&mut buf);
        let first = framer.frame(b"first").unwrap();
        framer.frame(b"second").unwrap();

        let mut deframer = Deframer::new(Cursor::new(buf[first..].to_vec()));
        assert!(matches!(
            deframer.deframe(),
            Err(WalError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_frame_alignment() {
        for data_len in 0..=64usize {
            let size = frame_size(data_len);
            assert_eq!(size % 8, 4, "frame_size({data_len})");

            let (_, pad_len) = encode_frame_size(data_len as u32);
            assert!((1..=8).contains(&pad_len), "pad_len for {data_len}");
            assert_eq!(
                size,
                FRAME_HEADER_SIZE + FRAME_CHECKSUM_SIZE + data_len + pad_len as usize
            );
        }
    }

    #[test]
    fn test_frame_size_matches_bytes_emitted() {
        for data in [&b""[..], b"a", b"12345678", b"Hello world!"] {
            assert_eq!(frame_bytes(data).len(), frame_size(data.len()));
        }
    }

    #[test]
    fn test_decode_frame_size_round_trip() {
        for len in [0u32, 1, 7, 8, 9, 4096] {
            let (field, pad_len) = encode_frame_size(len);
            let (got_len, got_pad) = decode_frame_size(field);
            assert_eq!(got_len, len);
            assert_eq!(got_pad, pad_len);
        }
    }

    #[test]
    fn test_decode_accepts_unpadded_frames() {
        // Externally produced frames may clear the MSB: pad_len is 0.
        let (len, pad) = decode_frame_size(12);
        assert_eq!(len, 12);
        assert_eq!(pad, 0);
    }

    #[test]
    fn test_empty_source_is_end_of_data() {
        let mut deframer = Deframer::new(Cursor::new(Vec::new()));
        assert!(deframer.deframe().unwrap().is_none());
        assert_eq!(deframer.bytes_read(), 0);
    }

    #[test]
    fn test_byte_accounting() {
        let data = b"abc";
        let frame = frame_bytes(data);

        let mut deframer = Deframer::new(Cursor::new(frame.clone()));
        let (_, n) = deframer.deframe().unwrap().unwrap();
        assert_eq!(n, frame.len());
        assert_eq!(n, frame_size(data.len()));
        assert_eq!(deframer.bytes_read(), n);

        deframer.undo(n);
        assert_eq!(deframer.bytes_read(), 0);
    }
}
