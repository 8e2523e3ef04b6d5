use std::num::NonZeroUsize;

use log::{debug, info};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    config::TrainingConfig,
    gradient::{Gradient, Gradienter},
    samples::SampleSet,
    stats::TrainStats,
};

/// Mini-batch stochastic gradient descent.
///
/// Every epoch shuffles a private copy of the samples, splits it in consecutive
/// batches of `batch_size` and takes one step of length `step_size` in the
/// opposite direction of each batch's gradient.
#[derive(Debug, Clone)]
pub struct Sgd<R: Rng = StdRng> {
    step_size: f32,
    batch_size: NonZeroUsize,
    rng: R,
}

impl Sgd<StdRng> {
    /// Returns a new `Sgd` shuffling with an OS-seeded rng.
    ///
    /// # Arguments
    /// * `step_size` - The *length* of each descent step.
    /// * `batch_size` - The amount of samples per gradient computation.
    pub fn new(step_size: f32, batch_size: NonZeroUsize) -> Self {
        Self::with_rng(step_size, batch_size, StdRng::from_os_rng())
    }

    /// Returns a new `Sgd` whose shuffles are reproducible given `seed`.
    pub fn seeded(step_size: f32, batch_size: NonZeroUsize, seed: u64) -> Self {
        Self::with_rng(step_size, batch_size, StdRng::seed_from_u64(seed))
    }

    /// Builds an `Sgd` following a training config.
    pub fn from_config(config: &TrainingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self::with_rng(config.step_size, config.batch_size, rng)
    }
}

impl<R: Rng> Sgd<R> {
    /// Returns a new `Sgd` shuffling with the given rng.
    pub fn with_rng(step_size: f32, batch_size: NonZeroUsize, rng: R) -> Self {
        Self {
            step_size,
            batch_size,
            rng,
        }
    }

    pub fn step_size(&self) -> f32 {
        self.step_size
    }

    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    /// Trains the gradienter's model for `epochs` epochs over `samples`.
    ///
    /// `samples` is copied once up front, the caller's set is never reordered.
    ///
    /// # Arguments
    /// * `gradienter` - Computes the gradient of each batch.
    /// * `samples` - The training samples, may be empty.
    /// * `epochs` - The amount of full passes over the samples.
    ///
    /// # Returns
    /// The counters of the run.
    pub fn train<I, O, G>(
        &mut self,
        gradienter: &mut G,
        samples: &SampleSet<I, O>,
        epochs: usize,
    ) -> TrainStats
    where
        I: Clone,
        O: Clone,
        G: Gradienter<I, O> + ?Sized,
    {
        info!(
            "training {epochs} epochs over {} samples (step size {}, batch size {})",
            samples.len(),
            self.step_size,
            self.batch_size
        );

        let mut working = samples.clone();
        let mut stats = TrainStats::default();

        for _ in 0..epochs {
            self.epoch(gradienter, &mut working, &mut stats);
        }

        info!(
            "training done after {} epochs, {} steps",
            stats.epochs(),
            stats.batches()
        );
        stats
    }

    /// Runs a single epoch over an already copied working set.
    pub(crate) fn epoch<I, O, G>(
        &mut self,
        gradienter: &mut G,
        working: &mut SampleSet<I, O>,
        stats: &mut TrainStats,
    ) where
        G: Gradienter<I, O> + ?Sized,
    {
        working.shuffle(&mut self.rng);

        for batch in working.batches(self.batch_size) {
            let n = batch.len();
            gradienter.gradient(batch).add_to_vars(-self.step_size);
            stats.add_batch(n);
        }

        stats.bump_epoch();
        debug!("epoch {} done, {} steps so far", stats.epochs(), stats.batches());
    }
}

/// Trains the gradienter's model with mini-batch SGD for `epochs` epochs.
///
/// Shorthand for `Sgd::new(step_size, batch_size).train(gradienter, samples, epochs)`.
pub fn sgd<I, O, G>(
    gradienter: &mut G,
    samples: &SampleSet<I, O>,
    step_size: f32,
    epochs: usize,
    batch_size: NonZeroUsize,
) -> TrainStats
where
    I: Clone,
    O: Clone,
    G: Gradienter<I, O> + ?Sized,
{
    Sgd::new(step_size, batch_size).train(gradienter, samples, epochs)
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::samples::Batch;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Gradient(Vec<usize>),
        Apply(f32),
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    struct Recorder {
        log: Log,
    }

    struct RecordedGradient {
        log: Log,
    }

    impl Gradient for RecordedGradient {
        fn add_to_vars(self, scale: f32) {
            self.log.borrow_mut().push(Event::Apply(scale));
        }
    }

    impl Gradienter<usize, usize> for Recorder {
        type Gradient = RecordedGradient;

        fn gradient(&mut self, batch: Batch<'_, usize, usize>) -> RecordedGradient {
            assert!(batch.iter().all(|(x, y)| *y == *x * 2));
            self.log
                .borrow_mut()
                .push(Event::Gradient(batch.inputs().to_vec()));
            RecordedGradient {
                log: Rc::clone(&self.log),
            }
        }
    }

    fn recorder() -> (Recorder, Log) {
        let log = Log::default();
        (Recorder { log: Rc::clone(&log) }, log)
    }

    fn samples(n: usize) -> SampleSet<usize, usize> {
        SampleSet::from_pairs((0..n).map(|i| (i, i * 2)))
    }

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn ten_samples_in_batches_of_three_for_two_epochs() {
        let (mut g, log) = recorder();
        let stats = Sgd::seeded(0.5, nz(3), 0).train(&mut g, &samples(10), 2);

        assert_eq!(stats, TrainStats::new(2, 8, 20));

        let log = log.borrow();
        assert_eq!(log.len(), 16);

        let sizes: Vec<_> = log
            .iter()
            .filter_map(|e| match e {
                Event::Gradient(xs) => Some(xs.len()),
                Event::Apply(_) => None,
            })
            .collect();
        assert_eq!(sizes, [3, 3, 3, 1, 3, 3, 3, 1]);

        // Every gradient is applied right after being computed, descending.
        for pair in log.chunks(2) {
            assert!(matches!(pair[0], Event::Gradient(_)));
            assert_eq!(pair[1], Event::Apply(-0.5));
        }
    }

    #[test]
    fn every_sample_is_used_once_per_epoch() {
        let (mut g, log) = recorder();
        Sgd::seeded(0.1, nz(4), 11).train(&mut g, &samples(13), 3);

        let seen: Vec<_> = log
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Gradient(xs) => Some(xs.clone()),
                Event::Apply(_) => None,
            })
            .collect();

        // 13 samples in batches of 4: 4 steps per epoch.
        for epoch in seen.chunks(4) {
            let mut idxs: Vec<_> = epoch.concat();
            idxs.sort_unstable();
            assert_eq!(idxs, (0..13).collect::<Vec<_>>());
        }
    }

    #[test]
    fn gradient_calls_are_epochs_times_batches() {
        for (n, b, epochs) in [(0, 1, 5), (1, 1, 3), (7, 7, 2), (8, 3, 4), (5, 10, 6)] {
            let (mut g, log) = recorder();
            let stats = Sgd::seeded(1.0, nz(b), 0).train(&mut g, &samples(n), epochs);

            assert_eq!(stats.batches(), epochs * n.div_ceil(b), "n={n} b={b}");
            assert_eq!(stats.epochs(), epochs);
            assert_eq!(log.borrow().len(), 2 * stats.batches());
        }
    }

    #[test]
    fn zero_epochs_do_nothing() {
        let (mut g, log) = recorder();
        let stats = Sgd::seeded(1.0, nz(2), 0).train(&mut g, &samples(6), 0);

        assert_eq!(stats, TrainStats::default());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn callers_samples_are_left_untouched() {
        let original = samples(32);
        let snapshot = original.clone();

        let (mut g, _log) = recorder();
        Sgd::seeded(0.1, nz(5), 42).train(&mut g, &original, 10);

        assert_eq!(original, snapshot);
    }

    #[test]
    fn seeded_runs_visit_batches_in_the_same_order() {
        let (mut a, log_a) = recorder();
        let (mut b, log_b) = recorder();
        Sgd::seeded(0.1, nz(3), 5).train(&mut a, &samples(9), 2);
        Sgd::seeded(0.1, nz(3), 5).train(&mut b, &samples(9), 2);

        assert_eq!(*log_a.borrow(), *log_b.borrow());
    }

    #[test]
    fn step_size_sign_is_flipped_for_the_update() {
        let (mut g, log) = recorder();
        sgd(&mut g, &samples(2), -0.25, 1, nz(2));

        assert_eq!(log.borrow()[1], Event::Apply(0.25));
    }

    #[test]
    fn from_config_uses_the_configured_hyperparameters() {
        let config = TrainingConfig {
            step_size: 0.125,
            batch_size: nz(4),
            seed: Some(8),
            ..TrainingConfig::default()
        };
        let mut from_config = Sgd::from_config(&config);
        assert_eq!(from_config.step_size(), 0.125);
        assert_eq!(from_config.batch_size(), nz(4));

        let (mut a, log_a) = recorder();
        let (mut b, log_b) = recorder();
        from_config.train(&mut a, &samples(10), 2);
        Sgd::seeded(0.125, nz(4), 8).train(&mut b, &samples(10), 2);

        assert_eq!(*log_a.borrow(), *log_b.borrow());
        assert_eq!(log_a.borrow()[1], Event::Apply(-0.125));
    }

    #[test]
    fn boxed_gradienters_train_too() {
        let (g, log) = recorder();
        let mut boxed: Box<dyn Gradienter<usize, usize, Gradient = RecordedGradient>> = Box::new(g);
        Sgd::seeded(0.1, nz(2), 0).train(&mut boxed, &samples(4), 1);

        assert_eq!(log.borrow().len(), 4);
    }
}
