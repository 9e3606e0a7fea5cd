//! Parallel pseudorandom generator bank
//!
//! Noise for a realization is split into partitions, each fed by its own
//! stream. Streams are derived from a master seed and a [`StreamTable`] of
//! precomputed stream ids, so the same seed and partition count reproduce
//! the same noise bit for bit whatever the number of worker threads.

mod bank;
mod table;

pub use bank::{NoiseStream, PrngBank, StreamState};
pub use table::{StreamTable, DEFAULT_STREAM_COUNT};
