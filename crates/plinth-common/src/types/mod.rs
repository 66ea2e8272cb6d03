//! Core type definitions for the Plinth WAL.

mod ids;

pub use ids::{RecordIndex, SegmentSeq};
