//! Realization engine and time-window streaming
//!
//! A [`SurfaceEngine`] holds everything a realization needs from a fitted
//! model: the AR coefficients, the MA kernel, the noise scale and the noise
//! partitioning. [`SurfaceStream`] produces consecutive time windows and
//! carries just enough history (the last MA-order noise slices and AR-order
//! field slices) for the windows to join seamlessly. History is kept in the
//! latent Gaussian field; a model with a transformed marginal maps each
//! window on the way out.

use std::sync::Arc;
use tracing::{debug, info};

use super::partition::NoisePartitions;
use super::{create_evaluator, FilterEvaluator};
use crate::core_types::{ArmaError, Array3, ResourceError, Shape3, Violation};
use crate::model::ArmaModel;
use crate::nit::NitTransform;
use crate::prng::{PrngBank, StreamState, StreamTable};
use crate::profiler::ProfilerScope;

/// Generates realizations of one fitted model
pub struct SurfaceEngine {
    points: Shape3,
    phi: Array3,
    kernel: Array3,
    std_dev: f64,
    partitions: NoisePartitions,
    table: StreamTable,
    seed: u64,
    evaluator: Box<dyn FilterEvaluator>,
    transform: Option<Arc<NitTransform>>,
}

impl SurfaceEngine {
    /// Create an engine for the published coefficients of `model`
    ///
    /// # Arguments
    ///
    /// * `model` - Fitted model
    /// * `table` - Precomputed stream parameters, one per noise partition
    ///
    /// # Errors
    ///
    /// [`ArmaError::NotFitted`] before a successful fit, and
    /// [`ResourceError::InsufficientStreams`] when the grid needs more
    /// partitions than `table` provides.
    pub fn new(model: &ArmaModel, table: &StreamTable) -> Result<Self, ArmaError> {
        let coefficients = model.coefficients()?;
        let config = model.config();
        let points = model.grid().points();
        let partitions = NoisePartitions::new(points, config.realization.partition_shape);
        if partitions.len() > table.len() {
            return Err(ResourceError::InsufficientStreams {
                requested: partitions.len(),
                available: table.len(),
            }
            .into());
        }
        let kernel = coefficients.ma_kernel();
        let evaluator = create_evaluator(&config.realization, kernel.len());
        Ok(Self {
            points,
            phi: coefficients.phi.clone(),
            kernel,
            std_dev: coefficients.white_noise_variance.sqrt(),
            partitions,
            table: table.clone(),
            seed: config.seed,
            evaluator,
            transform: model.transform(),
        })
    }

    /// Replace the evaluator, e.g. with an accelerated one
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Box<dyn FilterEvaluator>) -> Self {
        info!(
            "Using {} evaluator (accelerated: {})",
            evaluator.name(),
            evaluator.is_accelerated()
        );
        self.evaluator = evaluator;
        self
    }

    /// Evaluator in use
    #[must_use]
    pub fn evaluator(&self) -> &dyn FilterEvaluator {
        self.evaluator.as_ref()
    }

    /// Grid extent of a full realization
    #[must_use]
    pub fn points(&self) -> Shape3 {
        self.points
    }

    /// Noise partitioning of the grid
    #[must_use]
    pub fn partitions(&self) -> &NoisePartitions {
        &self.partitions
    }

    /// Start a fresh stream at time slice zero
    ///
    /// # Errors
    ///
    /// Fails if the PRNG bank cannot be built.
    pub fn stream(&self) -> Result<SurfaceStream<'_>, ArmaError> {
        let bank = PrngBank::new(&self.table, self.seed, self.partitions.len())?;
        Ok(self.stream_with_bank(bank))
    }

    fn stream_with_bank(&self, bank: PrngBank) -> SurfaceStream<'_> {
        let empty = Array3::zeros(Shape3::new(0, self.points.x, self.points.y));
        SurfaceStream {
            engine: self,
            bank,
            noise_history: empty.clone(),
            field_history: empty,
            position: 0,
        }
    }

    /// Whole realization over the grid
    ///
    /// # Errors
    ///
    /// Propagates PRNG and evaluator failures.
    pub fn generate(&self) -> Result<Array3, ArmaError> {
        let _scope = ProfilerScope::new("generate");
        self.stream()?.next_window(self.points.t)
    }

    /// Time slices `start..start + count` of the full realization
    ///
    /// The preceding slices are evaluated and discarded, so the window is
    /// identical to the same slices of [`Self::generate`].
    ///
    /// # Errors
    ///
    /// A shape violation if the window leaves the grid.
    pub fn window(&self, start: usize, count: usize) -> Result<Array3, ArmaError> {
        let end = start.checked_add(count).filter(|&end| end <= self.points.t);
        if end.is_none() {
            return Err(Violation::ShapeMismatch {
                what: "time window",
                expected: self.points,
                actual: Shape3::new(start.saturating_add(count), self.points.x, self.points.y),
            }
            .into());
        }
        let _scope = ProfilerScope::new("window");
        let mut stream = self.stream()?;
        stream.skip(start)?;
        stream.next_window(count)
    }
}

/// Consecutive time windows of one realization
///
/// The stream is not bounded by the grid's time extent: it keeps producing
/// slices for as long as it is asked to.
pub struct SurfaceStream<'a> {
    engine: &'a SurfaceEngine,
    bank: PrngBank,
    noise_history: Array3,
    field_history: Array3,
    position: usize,
}

impl SurfaceStream<'_> {
    /// Next `count` time slices
    ///
    /// # Errors
    ///
    /// Propagates PRNG and evaluator failures.
    pub fn next_window(&mut self, count: usize) -> Result<Array3, ArmaError> {
        let mut window = self.advance(count)?;
        if let Some(transform) = &self.engine.transform {
            transform.transform_realization(&mut window);
        }
        Ok(window)
    }

    /// Latent Gaussian slices, before any marginal transform
    fn advance(&mut self, count: usize) -> Result<Array3, ArmaError> {
        let engine = self.engine;
        let fresh = engine.partitions.draw(&mut self.bank, count, engine.std_dev)?;

        let noise = self.noise_history.concat_t(&fresh)?;
        let h_ma = self.noise_history.shape().t;
        let mut moving = Array3::zeros(noise.shape());
        engine
            .evaluator
            .apply_moving_average(&engine.kernel, &noise, &mut moving, h_ma)?;

        let h_ar = self.field_history.shape().t;
        let mut field = self.field_history.concat_t(&moving.time_range(h_ma, count))?;
        engine
            .evaluator
            .apply_autoregressive(&engine.phi, &mut field, h_ar)?;

        self.noise_history = noise.tail_t(engine.kernel.shape().t - 1);
        self.field_history = field.tail_t(engine.phi.shape().t - 1);
        debug!(
            start = self.position,
            count,
            evaluator = engine.evaluator.name(),
            "window generated"
        );
        self.position += count;
        Ok(field.time_range(h_ar, count))
    }

    /// Advance by `count` slices without returning them
    ///
    /// # Errors
    ///
    /// Same as [`Self::next_window`].
    pub fn skip(&mut self, count: usize) -> Result<(), ArmaError> {
        self.advance(count).map(|_| ())
    }

    /// Index of the next slice to be produced
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// PRNG states of every partition at the current position
    #[must_use]
    pub fn bank_states(&self) -> Vec<StreamState> {
        self.bank.states()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acf::AcfParams;
    use crate::core_types::Grid;
    use crate::model::ModelConfig;
    use crate::nit::{NitConfig, TargetDistribution};
    use crate::realization::RealizationPath;

    fn fitted(points: Shape3, config: ModelConfig) -> ArmaModel {
        let grid = Grid::unit(points).unwrap();
        let mut model = ArmaModel::from_params(grid, &AcfParams::exponential(1.0, 2.0), config).unwrap();
        model.fit().unwrap();
        model
    }

    #[test]
    fn test_unfitted_model_is_rejected() {
        let grid = Grid::unit(Shape3::new(8, 4, 4)).unwrap();
        let model = ArmaModel::from_params(grid, &AcfParams::default(), ModelConfig::default()).unwrap();
        assert!(matches!(
            SurfaceEngine::new(&model, &StreamTable::default()),
            Err(ArmaError::NotFitted)
        ));
    }

    #[test]
    fn test_windows_join_into_full_realization() {
        let mut config = ModelConfig::arma(Shape3::new(1, 1, 1), Shape3::new(1, 1, 0));
        config.realization.path = RealizationPath::Direct;
        config.realization.partition_shape = [3, 3];
        let model = fitted(Shape3::new(12, 7, 5), config);
        let engine = SurfaceEngine::new(&model, &StreamTable::default()).unwrap();
        let full = engine.generate().unwrap();

        let mut stream = engine.stream().unwrap();
        let mut joined = stream.next_window(5).unwrap();
        for count in [1, 4, 2] {
            joined = joined.concat_t(&stream.next_window(count).unwrap()).unwrap();
        }
        assert_eq!(stream.position(), 12);
        assert_eq!(joined, full);
        assert_eq!(engine.window(4, 3).unwrap(), full.time_range(4, 3));
    }

    #[test]
    fn test_transformed_windows_join() {
        let nit = NitConfig {
            distribution: TargetDistribution::GramCharlier {
                skewness: -0.2,
                kurtosis: 3.3,
            },
            ..NitConfig::default()
        };
        let mut config = ModelConfig::ar(Shape3::new(1, 1, 0)).with_nit(nit);
        config.realization.path = RealizationPath::Direct;
        let model = fitted(Shape3::new(10, 6, 4), config.clone());
        let engine = SurfaceEngine::new(&model, &StreamTable::default()).unwrap();
        let full = engine.generate().unwrap();
        assert_eq!(engine.window(3, 4).unwrap(), full.time_range(3, 4));

        let mut stream = engine.stream().unwrap();
        let head = stream.next_window(6).unwrap();
        assert_eq!(head.concat_t(&stream.next_window(4).unwrap()).unwrap(), full);

        config.nit = None;
        let gaussian = SurfaceEngine::new(&fitted(Shape3::new(10, 6, 4), config), &StreamTable::default())
            .unwrap()
            .generate()
            .unwrap();
        assert_ne!(gaussian, full);
    }

    #[test]
    fn test_window_outside_grid_is_domain_error() {
        let model = fitted(Shape3::new(4, 4, 4), ModelConfig::ar(Shape3::new(1, 0, 0)));
        let engine = SurfaceEngine::new(&model, &StreamTable::default()).unwrap();
        assert!(matches!(engine.window(3, 2), Err(ArmaError::Domain(_))));
    }

    #[test]
    fn test_small_table_is_resource_error() {
        let mut config = ModelConfig::ar(Shape3::new(1, 0, 0));
        config.realization.partition_shape = [2, 2];
        let model = fitted(Shape3::new(2, 16, 16), config);
        let table = StreamTable::generate(1, 32);
        assert!(matches!(
            SurfaceEngine::new(&model, &table),
            Err(ArmaError::Resource(ResourceError::InsufficientStreams {
                requested: 64,
                available: 32
            }))
        ));
    }
}
