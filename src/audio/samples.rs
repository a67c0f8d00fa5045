//! Records flowing into and out of the meter.

use serde::Serialize;

use crate::signal::spectrum::SpectrumData;

/// Outcome of the capture read that produced a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    Ok,
    /// Capture stopped (explicitly or by a short read). Last block of the stream.
    Aborted,
    /// The device reported an error. Last block of the stream.
    DeviceError,
}

impl BlockStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BlockStatus::Ok)
    }
}

/// Mono samples in full scale (`-1.0..=1.0`). `epoch` is the capture time in
/// milliseconds of the last sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    pub epoch: i64,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub status: BlockStatus,
}

impl SampleBlock {
    pub fn new(epoch: i64, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            epoch,
            samples,
            sample_rate,
            status: BlockStatus::Ok,
        }
    }

    pub fn aborted(epoch: i64, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            status: BlockStatus::Aborted,
            ..Self::new(epoch, samples, sample_rate)
        }
    }

    pub fn device_error(epoch: i64, sample_rate: u32) -> Self {
        Self {
            status: BlockStatus::DeviceError,
            ..Self::new(epoch, Vec::new(), sample_rate)
        }
    }

    /// Block from a capture read that filled `read` samples of `buffer`. A short
    /// read keeps the valid samples and marks the block aborted.
    pub fn from_read(epoch: i64, mut buffer: Vec<f32>, read: usize, sample_rate: u32) -> Self {
        if read < buffer.len() {
            buffer.truncate(read);
            Self::aborted(epoch, buffer, sample_rate)
        } else {
            Self::new(epoch, buffer, sample_rate)
        }
    }

    /// Block from signed 16-bit PCM.
    pub fn from_pcm16(epoch: i64, pcm: &[i16], sample_rate: u32) -> Self {
        let samples = pcm.iter().map(|&s| s as f32 / 32768.0).collect();
        Self::new(epoch, samples, sample_rate)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Broadband and band levels of one analysis frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcousticIndicatorsData {
    /// Capture time (ms) of the frame's first sample.
    pub epoch: i64,
    /// Unweighted equivalent level (dB) of the samples since the previous record.
    pub leq: f64,
    /// A-weighted equivalent level (dB) over the same samples.
    pub laeq: f64,
    /// Unweighted RMS in full scale over the same samples.
    pub rms: f64,
    pub third_octave: Vec<f64>,
    pub nominal_frequencies: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeterEvent {
    Indicators(AcousticIndicatorsData),
    Spectrum(SpectrumData),
    /// Terminal marker: no more records follow for this stream.
    Aborted { epoch: i64, status: BlockStatus },
}

impl MeterEvent {
    pub fn epoch(&self) -> i64 {
        match self {
            MeterEvent::Indicators(data) => data.epoch,
            MeterEvent::Spectrum(data) => data.epoch,
            MeterEvent::Aborted { epoch, .. } => *epoch,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MeterEvent::Aborted { .. })
    }
}
