use std::{error::Error, fmt, io};

/// The crate's result type.
pub type Result<T> = std::result::Result<T, TrainErr>;

/// Failures surfaced outside the training loop itself.
#[derive(Debug)]
pub enum TrainErr {
    /// Inputs and expected outputs were given with different lengths.
    SampleLengthMismatch { inputs: usize, outputs: usize },
    /// A configuration value is out of its valid domain.
    InvalidConfig(String),
    /// A configuration document could not be parsed.
    Config(serde_json::Error),
    /// The interrupt observer could not register with the platform.
    Interrupt(io::Error),
    Io(io::Error),
}

impl fmt::Display for TrainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainErr::SampleLengthMismatch { inputs, outputs } => write!(
                f,
                "sample length mismatch: got {inputs} inputs and {outputs} outputs"
            ),
            TrainErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            TrainErr::Config(e) => write!(f, "config parse error: {e}"),
            TrainErr::Interrupt(e) => write!(f, "failed to observe interrupts: {e}"),
            TrainErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for TrainErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainErr::Config(e) => Some(e),
            TrainErr::Interrupt(e) | TrainErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TrainErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for TrainErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<TrainErr> for io::Error {
    fn from(value: TrainErr) -> Self {
        match value {
            TrainErr::Io(e) | TrainErr::Interrupt(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
