//! Bank of independent normal-variate streams
//!
//! # Implementation
//!
//! All streams share one ChaCha8 key expanded from the master seed and
//! differ in their 64-bit stream id, taken from a [`StreamTable`]. ChaCha
//! streams with distinct ids never overlap, and a stream's position is a
//! single word counter, so its whole state fits in a [`StreamState`].
//!
//! Distinct streams can be advanced concurrently (hand out `&mut` to
//! each); the borrow checker rules out two callers sharing one stream.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::table::{splitmix64, StreamTable};
use crate::core_types::{ArmaError, ResourceError};

/// Fixed-size snapshot of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    /// ChaCha key shared by every stream of a bank
    pub key: [u8; 32],
    /// Stream id
    pub stream: u64,
    /// Position in 32-bit words
    pub word_pos: u128,
}

impl StreamState {
    /// Size of [`StreamState::to_bytes`]
    pub const SIZE: usize = 56;

    /// Little-endian encoding: key, stream id, word position
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..32].copy_from_slice(&self.key);
        out[32..40].copy_from_slice(&self.stream.to_le_bytes());
        out[40..].copy_from_slice(&self.word_pos.to_le_bytes());
        out
    }

    /// Inverse of [`StreamState::to_bytes`]
    #[must_use]
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes[..32]);
        let mut stream = [0u8; 8];
        stream.copy_from_slice(&bytes[32..40]);
        let mut word_pos = [0u8; 16];
        word_pos.copy_from_slice(&bytes[40..]);
        Self {
            key,
            stream: u64::from_le_bytes(stream),
            word_pos: u128::from_le_bytes(word_pos),
        }
    }
}

/// One partition's generator
pub struct NoiseStream {
    rng: ChaCha8Rng,
    partition: usize,
}

impl NoiseStream {
    fn from_state(state: &StreamState, partition: usize) -> Self {
        let mut rng = ChaCha8Rng::from_seed(state.key);
        rng.set_stream(state.stream);
        rng.set_word_pos(state.word_pos);
        Self { rng, partition }
    }

    /// Next standard normal variate
    #[inline]
    pub fn sample(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }

    /// Fill `out` with normal variates multiplied by `scale`
    pub fn fill(&mut self, out: &mut [f64], scale: f64) {
        for v in out {
            *v = scale * self.sample();
        }
    }

    /// Raw 64-bit output, mostly useful for diagnostics
    pub fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Partition this stream was created for
    #[must_use]
    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Snapshot of the current position
    #[must_use]
    pub fn state(&self) -> StreamState {
        StreamState {
            key: self.rng.get_seed(),
            stream: self.rng.get_stream(),
            word_pos: self.rng.get_word_pos(),
        }
    }
}

impl Iterator for NoiseStream {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.sample())
    }
}

/// Expand a master seed into a 256-bit ChaCha key
fn derive_key(master_seed: u64) -> [u8; 32] {
    let mut state = master_seed;
    let mut key = [0u8; 32];
    for chunk in key.chunks_exact_mut(8) {
        chunk.copy_from_slice(&splitmix64(&mut state).to_le_bytes());
    }
    key
}

/// One independent stream per partition, reproducible from the master seed
pub struct PrngBank {
    streams: Vec<NoiseStream>,
}

impl PrngBank {
    /// Create `partitions` streams from `table` and `master_seed`
    ///
    /// # Errors
    ///
    /// [`ResourceError::InsufficientStreams`] if the table has fewer stream
    /// parameter sets than `partitions`.
    pub fn new(
        table: &StreamTable,
        master_seed: u64,
        partitions: usize,
    ) -> Result<Self, ArmaError> {
        if partitions > table.len() {
            return Err(ResourceError::InsufficientStreams {
                requested: partitions,
                available: table.len(),
            }
            .into());
        }
        let key = derive_key(master_seed);
        let streams = table.ids()[..partitions]
            .iter()
            .enumerate()
            .map(|(partition, &stream)| {
                NoiseStream::from_state(
                    &StreamState {
                        key,
                        stream,
                        word_pos: 0,
                    },
                    partition,
                )
            })
            .collect();
        debug!(partitions, master_seed, "PRNG bank initialized");
        Ok(Self { streams })
    }

    /// Rebuild a bank from persisted stream states
    #[must_use]
    pub fn restore(states: &[StreamState]) -> Self {
        Self {
            streams: states
                .iter()
                .enumerate()
                .map(|(partition, state)| NoiseStream::from_state(state, partition))
                .collect(),
        }
    }

    /// Snapshot of every stream, in partition order
    #[must_use]
    pub fn states(&self) -> Vec<StreamState> {
        self.streams.iter().map(NoiseStream::state).collect()
    }

    /// Number of streams
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// True for a bank without streams
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Stream of one partition
    pub fn stream_mut(&mut self, partition: usize) -> Option<&mut NoiseStream> {
        self.streams.get_mut(partition)
    }

    /// All streams, for handing one to each worker
    pub fn streams_mut(&mut self) -> &mut [NoiseStream] {
        &mut self.streams
    }
}
