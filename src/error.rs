use std::path::PathBuf;

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("No usable analysis length for {sample_rate} Hz with a {window_time} s window")]
    NoTransformLength { sample_rate: u32, window_time: f64 },

    #[error(
        "Biquad coefficient arrays differ in length: b0={b0} b1={b1} b2={b2} a1={a1} a2={a2}"
    )]
    FilterShape {
        b0: usize,
        b1: usize,
        b2: usize,
        a1: usize,
        a2: usize,
    },

    #[error("Failed to parse config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Meter worker thread panicked")]
    WorkerPanicked,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
