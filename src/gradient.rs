use crate::samples::Batch;

/// An update computed against a specific set of trainable parameters.
pub trait Gradient {
    /// Adds `scale` times this gradient to the parameters it was computed against.
    ///
    /// # Args
    /// * `scale` - The factor applied to the gradient, `-step_size` for a descent step.
    fn add_to_vars(self, scale: f32);
}

/// Computes gradients from batches of samples.
///
/// This is the training policy boundary: the trainer treats implementations as a
/// black box mapping a batch to an update of the model's parameters. It is called
/// synchronously once per batch, always with disjoint batches within an epoch.
pub trait Gradienter<I, O> {
    type Gradient: Gradient;

    /// Computes the gradient of the loss over `batch`.
    ///
    /// # Args
    /// * `batch` - A non-empty view over the samples in this step.
    ///
    /// # Returns
    /// A gradient ready to be applied to the model's parameters.
    fn gradient(&mut self, batch: Batch<'_, I, O>) -> Self::Gradient;
}

impl<I, O, T: Gradienter<I, O> + ?Sized> Gradienter<I, O> for Box<T> {
    type Gradient = T::Gradient;

    fn gradient(&mut self, batch: Batch<'_, I, O>) -> Self::Gradient {
        (**self).gradient(batch)
    }
}
