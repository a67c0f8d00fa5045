//! Sound level meter engine: calibrated Leq, A-weighted Leq and (third-)octave
//! band levels from a stream of microphone sample blocks.

pub mod audio;
pub mod config;
pub mod error;
pub mod output;
pub mod signal;

pub use audio::indicators::IndicatorEngine;
pub use audio::samples::{AcousticIndicatorsData, BlockStatus, MeterEvent, SampleBlock};
pub use audio::stream::{spawn, BlockSender, MeterStream, StreamStats};
pub use config::{AnalysisConfig, Config};
pub use error::{EngineError, EngineResult};
pub use signal::decay::LevelDecay;
pub use signal::spectrum::SpectrumData;
