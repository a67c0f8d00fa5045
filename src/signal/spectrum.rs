//! Frame to calibrated power spectrum (dB per bin).

use serde::Serialize;

use super::bands::{aggregate_bands, FrequencyBand, OctaveBase, OctaveWindow};
use super::bluestein::ChirpTransform;
use super::fft::RealFft;
use super::window::Frame;
use crate::error::EngineResult;

/// Energy correction of the Hann window relative to a rectangular one.
const HANN_CORRECTION: f64 = 0.375;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumData {
    pub epoch: i64,
    /// Level in dB of bins `0..window_size / 2`.
    pub spectrum: Vec<f64>,
    pub sample_rate: u32,
}

impl SpectrumData {
    pub fn frequency_bands(
        &self,
        first_frequency: f64,
        last_frequency: f64,
        base: OctaveBase,
        band_division: f64,
        window: OctaveWindow,
    ) -> EngineResult<Vec<FrequencyBand>> {
        let mut bands =
            FrequencyBand::empty_bands(first_frequency, last_frequency, base, band_division)?;
        self.aggregate_into(&mut bands, band_division, window);
        Ok(bands)
    }

    pub fn aggregate_into(&self, bands: &mut [FrequencyBand], band_division: f64, window: OctaveWindow) {
        aggregate_bands(&self.spectrum, self.sample_rate, bands, band_division, window);
    }
}

enum Transform {
    /// Packed real FFT into a buffer of `window_size + 2` values.
    Real { fft: RealFft, buffer: Vec<f64> },
    Chirp {
        transform: ChirpTransform<f64>,
        input: Vec<f64>,
        output: Vec<f64>,
    },
}

/// Turns frames of one fixed size into dB spectra. Power-of-two sizes use the
/// real FFT, anything else the chirp transform. Buffers are reused across frames.
pub struct SpectrumAnalyzer {
    window_size: usize,
    gain: f64,
    reference: f64,
    transform: Transform,
}

impl SpectrumAnalyzer {
    pub fn new(window_size: usize, hann: bool, gain: f64) -> Self {
        assert!(window_size >= 2, "spectrum needs at least two samples per frame");
        let correction = if hann { HANN_CORRECTION } else { 1.0 };
        let n = window_size as f64;
        let transform = if window_size.is_power_of_two() {
            Transform::Real {
                fft: RealFft::new(window_size),
                buffer: vec![0.0; window_size + 2],
            }
        } else {
            Transform::Chirp {
                transform: ChirpTransform::new(window_size),
                input: vec![0.0; window_size],
                output: vec![0.0; 2 * window_size],
            }
        };
        Self {
            window_size,
            gain,
            reference: n * n / 2.0 * correction,
            transform,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn bin_count(&self) -> usize {
        self.window_size / 2
    }

    pub fn uses_chirp_transform(&self) -> bool {
        matches!(self.transform, Transform::Chirp { .. })
    }

    /// Writes the level of every bin of `samples` into `levels`.
    pub fn levels_into(&mut self, samples: &[f32], levels: &mut Vec<f64>) {
        assert_eq!(
            samples.len(),
            self.window_size,
            "frame size does not match the analyzer"
        );
        let bins: &[f64] = match &mut self.transform {
            Transform::Real { fft, buffer } => {
                for (dst, &src) in buffer.iter_mut().zip(samples) {
                    *dst = src as f64;
                }
                fft.forward(buffer);
                &buffer[..]
            }
            Transform::Chirp {
                transform,
                input,
                output,
            } => {
                for (dst, &src) in input.iter_mut().zip(samples) {
                    *dst = src as f64;
                }
                transform.fft_into(input, output);
                &output[..]
            }
        };

        levels.clear();
        levels.extend(bins.chunks_exact(2).take(self.window_size / 2).map(|bin| {
            let power = bin[0] * bin[0] + bin[1] * bin[1];
            10.0 * (power / self.reference).log10() + self.gain
        }));
    }

    pub fn analyze(&mut self, frame: &Frame, sample_rate: u32) -> SpectrumData {
        let mut spectrum = Vec::with_capacity(self.bin_count());
        self.levels_into(&frame.samples, &mut spectrum);
        SpectrumData {
            epoch: frame.start_epoch,
            spectrum,
            sample_rate,
        }
    }
}
