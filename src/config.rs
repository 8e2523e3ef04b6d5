use std::{fs, num::NonZeroUsize, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Result, TrainErr};

const DEFAULT_STEP_SIZE: f32 = 0.05;
const DEFAULT_EPOCHS: usize = 100;
const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(16) {
    Some(n) => n,
    None => unreachable!(),
};

/// Hyperparameters of a training run.
///
/// Missing fields take their default value when deserializing, so a config file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// The length of each descent step.
    pub step_size: f32,
    /// Samples per gradient step; the last batch of an epoch may be smaller.
    pub batch_size: NonZeroUsize,
    /// Epochs to run when not training interactively.
    pub epochs: usize,
    /// Seed for the shuffling rng, `None` seeds it from the OS.
    pub seed: Option<u64>,
    /// Train until interrupted instead of for `epochs` epochs.
    pub interactive: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            step_size: DEFAULT_STEP_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            epochs: DEFAULT_EPOCHS,
            seed: None,
            interactive: false,
        }
    }
}

impl TrainingConfig {
    /// Parses and validates a JSON config.
    ///
    /// # Errors
    /// `TrainErr::Config` if `s` is not a valid document, `TrainErr::InvalidConfig`
    /// if a value is out of range.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_json_str(&s)
    }

    /// Checks the values that can't be guaranteed by their types.
    pub fn validate(&self) -> Result<()> {
        if !self.step_size.is_finite() {
            return Err(TrainErr::InvalidConfig(format!(
                "step_size must be finite, got {}",
                self.step_size
            )));
        }

        Ok(())
    }
}
