//! Spatial noise partitions
//!
//! The grid is cut into `x` by `y` column tiles spanning every time slice.
//! Tile `i` draws from PRNG stream `i`, time-major inside the tile, so the
//! noise at a cell depends only on the grid, the tile shape and the seed.

use rayon::prelude::*;

use crate::core_types::{ArmaError, Array3, ResourceError, Shape3};
use crate::prng::PrngBank;

/// Default tile edge along `x` and `y`
pub const DEFAULT_PARTITION_SHAPE: [usize; 2] = [16, 16];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tile {
    x0: usize,
    y0: usize,
    ex: usize,
    ey: usize,
}

/// Column tiling of a grid's spatial plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoisePartitions {
    points: Shape3,
    tiles: Vec<Tile>,
}

impl NoisePartitions {
    /// Tile the spatial plane of `points` with tiles of `shape = [x, y]`
    ///
    /// Zero tile edges are treated as one.
    #[must_use]
    pub fn new(points: Shape3, shape: [usize; 2]) -> Self {
        let (px, py) = (shape[0].max(1), shape[1].max(1));
        let mut tiles = Vec::new();
        for x0 in (0..points.x).step_by(px) {
            for y0 in (0..points.y).step_by(py) {
                tiles.push(Tile {
                    x0,
                    y0,
                    ex: px.min(points.x - x0),
                    ey: py.min(points.y - y0),
                });
            }
        }
        Self { points, tiles }
    }

    /// Number of tiles, one PRNG stream each
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// True for a grid with an empty spatial plane
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Draw `slices` time slices of noise scaled by `scale`
    ///
    /// Each tile's stream advances by exactly `slices · tile cells` draws, so
    /// consecutive calls continue the same sequence as one long call.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InsufficientStreams`] when the bank holds
    /// fewer streams than there are tiles.
    pub fn draw(&self, bank: &mut PrngBank, slices: usize, scale: f64) -> Result<Array3, ArmaError> {
        if bank.len() < self.tiles.len() {
            return Err(ResourceError::InsufficientStreams {
                requested: self.tiles.len(),
                available: bank.len(),
            }
            .into());
        }
        let shape = Shape3::new(slices, self.points.x, self.points.y);
        let mut out = Array3::zeros(shape);
        if shape.volume() == 0 {
            return Ok(out);
        }

        let streams = &mut bank.streams_mut()[..self.tiles.len()];
        let draws: Vec<Vec<f64>> = streams
            .par_iter_mut()
            .zip(self.tiles.par_iter())
            .map(|(stream, tile)| {
                let mut values = vec![0.0; slices * tile.ex * tile.ey];
                stream.fill(&mut values, scale);
                values
            })
            .collect();

        for (tile, values) in self.tiles.iter().zip(&draws) {
            let mut rows = values.chunks_exact(tile.ey);
            for t in 0..slices {
                for x in tile.x0..tile.x0 + tile.ex {
                    if let Some(row) = rows.next() {
                        let start = out.offset(t, x, tile.y0);
                        out.as_mut_slice()[start..start + tile.ey].copy_from_slice(row);
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::StreamTable;

    #[test]
    fn test_tiles_cover_plane() {
        let parts = NoisePartitions::new(Shape3::new(4, 10, 7), [4, 3]);
        assert_eq!(parts.len(), 3 * 3);
        let covered: usize = parts.tiles.iter().map(|t| t.ex * t.ey).sum();
        assert_eq!(covered, 70);
        assert!(NoisePartitions::new(Shape3::new(4, 0, 7), [4, 3]).is_empty());
    }

    #[test]
    fn test_split_draws_equal_single_draw() {
        let points = Shape3::new(6, 5, 5);
        let parts = NoisePartitions::new(points, [2, 3]);
        let table = StreamTable::generate(3, 16);

        let mut bank = PrngBank::new(&table, 99, parts.len()).unwrap();
        let whole = parts.draw(&mut bank, 6, 1.0).unwrap();

        let mut bank = PrngBank::new(&table, 99, parts.len()).unwrap();
        let head = parts.draw(&mut bank, 2, 1.0).unwrap();
        let tail = parts.draw(&mut bank, 4, 1.0).unwrap();
        assert_eq!(whole.time_range(0, 2), head);
        assert_eq!(whole.time_range(2, 4), tail);
    }

    #[test]
    fn test_small_bank_is_resource_error() {
        let parts = NoisePartitions::new(Shape3::new(1, 8, 8), [2, 2]);
        let table = StreamTable::generate(3, 16);
        let mut bank = PrngBank::new(&table, 1, 4).unwrap();
        assert!(matches!(
            parts.draw(&mut bank, 1, 1.0),
            Err(ArmaError::Resource(ResourceError::InsufficientStreams {
                requested: 16,
                available: 4
            }))
        ));
    }
}
