//! # plinth-common
//!
//! Common types and constants for the Plinth write-ahead log.
//!
//! This crate provides the foundational pieces shared by the WAL core:
//!
//! - **Types**: the typed identifiers [`SegmentSeq`] and [`RecordIndex`]
//! - **Constants**: on-disk geometry, file modes, and naming conventions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod types;

pub use types::{RecordIndex, SegmentSeq};
