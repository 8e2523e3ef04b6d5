pub mod config;
pub mod error;
pub mod gradient;
pub mod interactive;
pub mod interrupt;
pub mod linear;
pub mod samples;
pub mod sgd;
mod stats;

pub use config::TrainingConfig;
pub use error::{Result, TrainErr};
pub use gradient::{Gradient, Gradienter};
pub use interactive::{sgd_interactive, InteractiveTrainer};
pub use interrupt::{CtrlC, InterruptSource};
pub use linear::{LinearParams, LinearRegression};
pub use samples::{Batch, SampleSet};
pub use sgd::{sgd, Sgd};
pub use stats::TrainStats;
