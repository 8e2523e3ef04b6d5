/// Counters accumulated over a training run.
///
/// Fields are private so the counters can evolve without breaking the public API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainStats {
    epochs: usize,
    batches: usize,
    samples: usize,
}

impl TrainStats {
    /// Creates a new `TrainStats`.
    ///
    /// # Args
    /// * `epochs` - Number of completed epochs.
    /// * `batches` - Number of gradient steps taken.
    /// * `samples` - Total number of samples the gradients were computed over.
    pub fn new(epochs: usize, batches: usize, samples: usize) -> Self {
        Self {
            epochs,
            batches,
            samples,
        }
    }

    /// Returns the number of completed epochs.
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Returns the number of gradient steps taken.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Returns the number of samples processed, counting repeats across epochs.
    pub fn samples(&self) -> usize {
        self.samples
    }

    #[inline]
    pub(crate) fn bump_epoch(&mut self) {
        self.epochs += 1;
    }

    #[inline]
    pub(crate) fn add_batch(&mut self, samples: usize) {
        self.batches += 1;
        self.samples += samples;
    }
}
