//! # plinth-wal
//!
//! An append-only, crash-safe write-ahead log over preallocated segment
//! files.
//!
//! A WAL exists for durability: a record is copied into the log before
//! the write it represents is acknowledged. If the machine crashes after
//! the log write, the record is recovered and re-applied on restart; if
//! it crashes before, the write can be retried safely.
//!
//! Durability is a trade-off the caller controls. An append only lands
//! in a user-space buffer; it becomes durable when [`Wal::sync`] runs.
//! Sync after every append for the strongest guarantee, after every N
//! appends to bound the loss window, on a timer, or never and let the
//! OS write back dirty pages — the log is agnostic, call
//! [`Wal::append`] and [`Wal::sync`] as you please.
//!
//! Records are framed with a rolling CRC32 (Castagnoli) checksum and
//! written to segment files named `{seq:016x}-{ind:016x}.seg`, where
//! `seq` numbers the segment and `ind` is the overall index of its first
//! record — so replay from an index does not need to read every segment.
//! When a segment reaches its size hint it is atomically published
//! (truncate, fsync, rename, directory fsync) and a new one begins.
//!
//! ## Example
//!
//! ```rust,ignore
//! use plinth_wal::{Wal, WalConfig};
//!
//! let mut wal = Wal::open(WalConfig::new("data/wal"))?;
//! wal.append(b"first record")?;
//! wal.sync()?;
//! wal.visit(|record| {
//!     println!("{} bytes", record.len());
//!     Ok(())
//! })?;
//! wal.close()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// WAL configuration.
pub mod config;
/// Error types.
pub mod error;
/// Frame encoding and decoding.
pub mod frame;
/// Segment descriptors and file naming.
pub mod segment;
/// The WAL engine.
pub mod wal;

mod dir;
mod io;
mod reader;
mod writer;

pub use config::WalConfig;
pub use error::{FrameSection, WalError, WalResult};
pub use frame::frame_size;
pub use segment::Segment;
pub use wal::Wal;

pub use plinth_common::types::{RecordIndex, SegmentSeq};
