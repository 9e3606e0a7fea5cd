//! Precomputed stream parameters
//!
//! A [`StreamTable`] lists the ChaCha stream ids handed out to partitions.
//! It is built once per process (or loaded by the caller) and passed
//! explicitly to every [`super::PrngBank`]; there is no global table.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::core_types::{ArmaError, Violation};

/// Stream parameter sets in [`StreamTable::default`]
pub const DEFAULT_STREAM_COUNT: usize = 1024;

/// Seed of the default table
const DEFAULT_TABLE_SEED: u64 = 0x5EED_0F57_AEA4;

/// SplitMix64 step, used to expand seeds into keys and stream ids
#[inline]
pub(crate) fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Immutable list of distinct stream ids, one per possible partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamTable {
    ids: Vec<u64>,
}

impl StreamTable {
    /// Derive `count` distinct stream ids from `seed`
    ///
    /// SplitMix64 is a bijection on its counter, so successive outputs never
    /// repeat within 2^64 draws.
    #[must_use]
    pub fn generate(seed: u64, count: usize) -> Self {
        let mut state = seed;
        Self {
            ids: (0..count).map(|_| splitmix64(&mut state)).collect(),
        }
    }

    /// Wrap stream ids obtained elsewhere (for example loaded from disk)
    ///
    /// # Errors
    ///
    /// Returns [`Violation::DuplicateStream`] if an id repeats, since two
    /// partitions would then draw the same sequence.
    pub fn from_ids(ids: Vec<u64>) -> Result<Self, ArmaError> {
        let mut seen = FxHashSet::default();
        if let Some(index) = ids.iter().position(|id| !seen.insert(*id)) {
            return Err(Violation::DuplicateStream { index }.into());
        }
        Ok(Self { ids })
    }

    /// Number of stream parameter sets
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True for a table with no streams
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// All stream ids in partition order
    #[must_use]
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }
}

impl Default for StreamTable {
    fn default() -> Self {
        Self::generate(DEFAULT_TABLE_SEED, DEFAULT_STREAM_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_distinct() {
        let table = StreamTable::generate(42, 4096);
        let unique: FxHashSet<_> = table.ids().iter().collect();
        assert_eq!(unique.len(), 4096);
    }

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(StreamTable::generate(7, 16), StreamTable::generate(7, 16));
        assert_ne!(StreamTable::generate(7, 16), StreamTable::generate(8, 16));
    }

    #[test]
    fn test_from_ids_rejects_duplicates() {
        let err = StreamTable::from_ids(vec![3, 9, 3]).unwrap_err();
        assert_eq!(err, ArmaError::Domain(Violation::DuplicateStream { index: 2 }));
        assert_eq!(StreamTable::from_ids(vec![1, 2]).unwrap().len(), 2);
    }
}
