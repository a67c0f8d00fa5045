//! Sample blocks in, calibrated indicator and spectrum records out.

use crate::audio::samples::{AcousticIndicatorsData, MeterEvent, SampleBlock};
use crate::config::AnalysisConfig;
use crate::error::{EngineError, EngineResult};
use crate::signal::bands::{aggregate_bands, FrequencyBand};
use crate::signal::biquad::{a_weighting, BiquadBank};
use crate::signal::spectrum::{SpectrumAnalyzer, SpectrumData};
use crate::signal::window::Windower;

/// Everything that depends on the sample rate, built once per rate.
struct RateState {
    sample_rate: u32,
    windower: Windower,
    analyzer: SpectrumAnalyzer,
    bands: Vec<FrequencyBand>,
    nominal_frequencies: Vec<f64>,
    weighting: BiquadBank,
    levels: Vec<f64>,
    raw_energy: f64,
    weighted_energy: f64,
    sample_count: usize,
}

impl RateState {
    fn new(config: &AnalysisConfig, sample_rate: u32) -> EngineResult<Self> {
        let (window_size, hop_size) = config.frame_geometry(sample_rate)?;
        let analyzer = SpectrumAnalyzer::new(window_size, config.hann_window, config.calibration_gain);
        let bands = FrequencyBand::empty_bands(
            config.first_frequency,
            config.last_frequency,
            config.octave_base,
            config.band_division,
        )?;
        let nominal_frequencies = bands
            .iter()
            .map(|band| band.nominal_frequency(config.octave_base))
            .collect();
        log::info!(
            "Configured {} Hz: window {} samples, hop {}, {} bands, {}",
            sample_rate,
            window_size,
            hop_size,
            bands.len(),
            if analyzer.uses_chirp_transform() { "chirp transform" } else { "real FFT" }
        );
        Ok(Self {
            sample_rate,
            windower: Windower::new(sample_rate, window_size, hop_size, config.hann_window),
            levels: Vec::with_capacity(analyzer.bin_count()),
            analyzer,
            bands,
            nominal_frequencies,
            weighting: a_weighting(sample_rate)?,
            raw_energy: 0.0,
            weighted_energy: 0.0,
            sample_count: 0,
        })
    }

    fn reset(&mut self) {
        self.windower.reset();
        self.weighting.reset();
        self.raw_energy = 0.0;
        self.weighted_energy = 0.0;
        self.sample_count = 0;
    }
}

pub struct IndicatorEngine {
    config: AnalysisConfig,
    state: Option<RateState>,
    frames_dropped: u64,
}

impl IndicatorEngine {
    pub fn new(config: AnalysisConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: None,
            frames_dropped: 0,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Rate the engine is currently configured for, if any block was seen.
    pub fn sample_rate(&self) -> Option<u32> {
        self.state.as_ref().map(|state| state.sample_rate)
    }

    /// Frames discarded because they held non-finite samples.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Forget partial frames and filter memory; the rate configuration stays.
    pub fn reset(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.reset();
        }
    }

    pub fn process(&mut self, block: &SampleBlock) -> EngineResult<Vec<MeterEvent>> {
        let mut events = Vec::new();
        self.process_into(block, &mut events)?;
        Ok(events)
    }

    /// Appends one `Indicators` and one `Spectrum` event per completed frame,
    /// then an `Aborted` marker if the block ends the stream.
    pub fn process_into(&mut self, block: &SampleBlock, events: &mut Vec<MeterEvent>) -> EngineResult<()> {
        if self.sample_rate() != Some(block.sample_rate) {
            let configured = if block.sample_rate == 0 {
                Err(EngineError::InvalidSampleRate(block.sample_rate))
            } else {
                RateState::new(&self.config, block.sample_rate)
            };
            match configured {
                Ok(state) => self.state = Some(state),
                // the end of the stream is reported even when its last block is unusable
                Err(err) if block.status.is_terminal() => {
                    log::warn!("Ignoring samples of the final block at {} ms: {}", block.epoch, err);
                    self.finish(block, events);
                    return Ok(());
                }
                Err(err) => {
                    self.state = None;
                    return Err(err);
                }
            }
        }
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };
        let RateState {
            sample_rate,
            windower,
            analyzer,
            bands,
            nominal_frequencies,
            weighting,
            levels,
            raw_energy,
            weighted_energy,
            sample_count,
        } = state;
        let gain = self.config.calibration_gain;

        let total = block.samples.len();
        let mut input = &block.samples[..];
        while !input.is_empty() {
            let start = total - input.len();
            let frame = windower.feed(block.epoch, &mut input);
            let consumed = &block.samples[start..total - input.len()];
            *raw_energy += consumed.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>();
            *weighted_energy += weighting.filter_energy(consumed);
            *sample_count += consumed.len();

            let Some(frame) = frame else {
                continue;
            };
            if frame.samples.iter().any(|s| !s.is_finite()) {
                log::warn!("Dropping frame at {} ms: non-finite samples", frame.start_epoch);
                self.frames_dropped += 1;
                weighting.reset();
                *raw_energy = 0.0;
                *weighted_energy = 0.0;
                *sample_count = 0;
                continue;
            }

            let count = *sample_count as f64;
            let mean_square = *raw_energy / count;
            let leq = gain + 10.0 * mean_square.log10();
            let laeq = gain + 10.0 * (*weighted_energy / count).log10();
            *raw_energy = 0.0;
            *weighted_energy = 0.0;
            *sample_count = 0;

            analyzer.levels_into(&frame.samples, levels);
            aggregate_bands(
                levels,
                *sample_rate,
                bands,
                self.config.band_division,
                self.config.octave_window,
            );

            events.push(MeterEvent::Indicators(AcousticIndicatorsData {
                epoch: frame.start_epoch,
                leq,
                laeq,
                rms: mean_square.sqrt(),
                third_octave: bands.iter().map(|band| band.spl).collect(),
                nominal_frequencies: nominal_frequencies.clone(),
            }));
            events.push(MeterEvent::Spectrum(SpectrumData {
                epoch: frame.start_epoch,
                spectrum: levels.clone(),
                sample_rate: *sample_rate,
            }));
        }

        log::debug!(
            "Processed block at {} ms: {} samples, {} pending",
            block.epoch,
            total,
            windower.samples_until_frame()
        );

        if block.status.is_terminal() {
            self.finish(block, events);
        }
        Ok(())
    }

    fn finish(&mut self, block: &SampleBlock, events: &mut Vec<MeterEvent>) {
        log::info!("Stream ended at {} ms ({:?})", block.epoch, block.status);
        events.push(MeterEvent::Aborted {
            epoch: block.epoch,
            status: block.status,
        });
        self.reset();
    }
}
