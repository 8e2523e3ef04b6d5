use std::{env, process};

use anyhow::Context;
use log::info;
use ndarray::{array, Array1};
use rand::{rngs::StdRng, Rng, SeedableRng};

use neural_sgd::{CtrlC, InteractiveTrainer, LinearRegression, SampleSet, Sgd, TrainingConfig};

const NUM_SAMPLES: usize = 256;
const NOISE: f32 = 0.05;

/// Samples of `y = 3 x0 - 2 x1 + 1` with a bit of uniform noise.
fn synthetic_samples(seed: Option<u64>) -> SampleSet<Array1<f32>, f32> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    (0..NUM_SAMPLES)
        .map(|_| {
            let x0: f32 = rng.random_range(-1.0..1.0);
            let x1: f32 = rng.random_range(-1.0..1.0);
            let noise = rng.random_range(-NOISE..NOISE);
            (array![x0, x1], 3.0 * x0 - 2.0 * x1 + 1.0 + noise)
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut config_path = None;
    let mut interactive = false;

    for arg in &args[1..] {
        match arg.as_str() {
            "-i" | "--interactive" => interactive = true,
            flag if flag.starts_with('-') => {
                eprintln!("Usage: {} [config.json] [--interactive]", args[0]);
                eprintln!("Set RUST_LOG=info (or debug) for training logs.");
                process::exit(1);
            }
            path => config_path = Some(path),
        }
    }

    let mut config = match config_path {
        Some(path) => TrainingConfig::from_path(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => TrainingConfig::default(),
    };
    config.interactive |= interactive;

    let samples = synthetic_samples(config.seed);
    let mut model = LinearRegression::new(2);
    let sgd = Sgd::from_config(&config);
    info!(
        "{} samples, step size {}, batches of {}",
        samples.len(),
        sgd.step_size(),
        sgd.batch_size()
    );

    let stats = if config.interactive {
        let monitor = model.clone();
        let mut epoch = 0;
        let mut report = || {
            println!("epoch {epoch}: loss {:.6}", monitor.loss(&samples));
            epoch += 1;
        };

        InteractiveTrainer::new(sgd).train(&mut model, &samples, CtrlC::new(), Some(&mut report))?
    } else {
        let mut sgd = sgd;
        sgd.train(&mut model, &samples, config.epochs)
    };

    let params = model.params();
    info!("final loss {:.6}", model.loss(&samples));
    println!(
        "trained for {} epochs ({} steps): weights {}, bias {:.4}",
        stats.epochs(),
        stats.batches(),
        params.weights,
        params.bias
    );

    Ok(())
}
