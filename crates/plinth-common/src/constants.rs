//! System-wide constants for the Plinth WAL.

/// Default preallocated size of each segment file, in bytes.
///
/// The actual file may grow slightly past this: the size check fires
/// after a frame has been written, so the final frame of a segment can
/// push the file beyond the hint.
pub const DEFAULT_SEGMENT_SIZE: usize = 64 * 1000 * 1000;

/// Default segment file extension.
pub const SEGMENT_EXT: &str = ".seg";

/// Suffix appended to the published directory path to form the scratch
/// directory that holds the in-progress segment.
pub const SCRATCH_DIR_SUFFIX: &str = ".tmp";

/// Owner read/write permission for segment files.
pub const SEGMENT_FILE_MODE: u32 = 0o600;

/// Owner read/write/execute permission for WAL directories.
pub const WAL_DIR_MODE: u32 = 0o700;

/// Length of the frame length field, in bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Length of the frame checksum field, in bytes.
pub const FRAME_CHECKSUM_SIZE: usize = 4;

/// Frame payloads are zero-padded to this alignment.
pub const FRAME_ALIGN: usize = 8;
