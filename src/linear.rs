use std::sync::Arc;

use ndarray::{Array1, ArrayView1};
use parking_lot::Mutex;

use crate::{
    gradient::{Gradient, Gradienter},
    samples::{Batch, SampleSet},
};

/// The parameters of a `LinearRegression`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearParams {
    pub weights: Array1<f32>,
    pub bias: f32,
}

/// Least-squares linear regression, `y = w·x + b`.
///
/// Clones share the same parameters, so a clone can be used to monitor a model
/// while it is being trained.
#[derive(Debug, Clone)]
pub struct LinearRegression {
    params: Arc<Mutex<LinearParams>>,
}

impl LinearRegression {
    /// Creates a new regression over `features` inputs, all parameters zeroed.
    pub fn new(features: usize) -> Self {
        Self::from_params(LinearParams {
            weights: Array1::zeros(features),
            bias: 0.0,
        })
    }

    pub fn from_params(params: LinearParams) -> Self {
        Self {
            params: Arc::new(Mutex::new(params)),
        }
    }

    /// Returns a snapshot of the current parameters.
    pub fn params(&self) -> LinearParams {
        self.params.lock().clone()
    }

    pub fn predict(&self, x: ArrayView1<f32>) -> f32 {
        let params = self.params.lock();
        params.weights.dot(&x) + params.bias
    }

    /// Mean squared error over `samples`, zero when there are none.
    pub fn loss(&self, samples: &SampleSet<Array1<f32>, f32>) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }

        let params = self.params.lock();
        let total: f32 = samples
            .iter()
            .map(|(x, y)| (params.weights.dot(x) + params.bias - y).powi(2))
            .sum();

        total / samples.len() as f32
    }
}

/// The mean squared error gradient of a batch, bound to the model it came from.
#[derive(Debug)]
pub struct LinearGradient {
    params: Arc<Mutex<LinearParams>>,
    weights: Array1<f32>,
    bias: f32,
}

impl LinearGradient {
    pub fn weights(&self) -> ArrayView1<'_, f32> {
        self.weights.view()
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }
}

impl Gradient for LinearGradient {
    fn add_to_vars(self, scale: f32) {
        let mut params = self.params.lock();
        params.weights.scaled_add(scale, &self.weights);
        params.bias += scale * self.bias;
    }
}

impl Gradienter<Array1<f32>, f32> for LinearRegression {
    type Gradient = LinearGradient;

    fn gradient(&mut self, batch: Batch<'_, Array1<f32>, f32>) -> LinearGradient {
        let params = self.params.lock();
        let mut weights = Array1::zeros(params.weights.len());
        let mut bias = 0.0;

        // d/dw mean((w·x + b - y)^2) = mean(2 (w·x + b - y) x)
        let scale = 2.0 / batch.len().max(1) as f32;
        for (x, y) in batch.iter() {
            let err = params.weights.dot(x) + params.bias - y;
            weights.scaled_add(scale * err, x);
            bias += scale * err;
        }
        drop(params);

        LinearGradient {
            params: Arc::clone(&self.params),
            weights,
            bias,
        }
    }
}
