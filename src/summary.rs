use serde::Serialize;

use noisemeter::config::DisplayConfig;
use noisemeter::{AcousticIndicatorsData, LevelDecay, StreamStats};

#[derive(Debug, Serialize)]
pub struct BandLevel {
    pub nominal_frequency: f64,
    pub leq: f64,
}

#[derive(Debug, Serialize)]
pub struct FileSummary {
    pub file: String,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub records: u64,
    pub leq: f64,
    pub laeq: f64,
    pub lafmax: f64,
    pub lasmax: f64,
    pub bands: Vec<BandLevel>,
    pub blocks_dropped: u64,
    pub events_dropped: u64,
}

/// Folds the indicator records of one recording into its summary. The
/// Fast/Slow maxima come from decay filters fed with each record's LAeq.
pub struct SummaryBuilder {
    fast: LevelDecay,
    slow: LevelDecay,
    records: u64,
    leq_energy: f64,
    laeq_energy: f64,
    lafmax: f64,
    lasmax: f64,
    band_energy: Vec<f64>,
    nominal_frequencies: Vec<f64>,
}

impl SummaryBuilder {
    /// `interval` is the time between records (the analysis hop) in seconds.
    pub fn new(display: &DisplayConfig, interval: f64) -> Self {
        Self {
            fast: LevelDecay::new(display.fast_decay_rate, interval),
            slow: LevelDecay::new(display.slow_decay_rate, interval),
            records: 0,
            leq_energy: 0.0,
            laeq_energy: 0.0,
            lafmax: f64::NEG_INFINITY,
            lasmax: f64::NEG_INFINITY,
            band_energy: Vec::new(),
            nominal_frequencies: Vec::new(),
        }
    }

    pub fn add(&mut self, data: &AcousticIndicatorsData) {
        self.records += 1;
        self.leq_energy += power(data.leq);
        self.laeq_energy += power(data.laeq);
        self.lafmax = self.lafmax.max(self.fast.weighted_value(data.laeq));
        self.lasmax = self.lasmax.max(self.slow.weighted_value(data.laeq));

        if self.band_energy.len() != data.third_octave.len() {
            self.band_energy = vec![0.0; data.third_octave.len()];
            self.nominal_frequencies = data.nominal_frequencies.clone();
        }
        for (energy, spl) in self.band_energy.iter_mut().zip(&data.third_octave) {
            *energy += power(*spl);
        }
    }

    pub fn finish(self, file: String, sample_rate: u32, duration_secs: f64, stats: StreamStats) -> FileSummary {
        let records = self.records;
        FileSummary {
            file,
            sample_rate,
            duration_secs,
            records,
            leq: energetic_mean(self.leq_energy, records),
            laeq: energetic_mean(self.laeq_energy, records),
            lafmax: self.lafmax,
            lasmax: self.lasmax,
            bands: self
                .nominal_frequencies
                .iter()
                .zip(&self.band_energy)
                .map(|(&nominal_frequency, &energy)| BandLevel {
                    nominal_frequency,
                    leq: energetic_mean(energy, records),
                })
                .collect(),
            blocks_dropped: stats.blocks_dropped,
            events_dropped: stats.events_dropped,
        }
    }
}

fn power(level: f64) -> f64 {
    let p = 10f64.powf(level / 10.0);
    if p.is_finite() { p } else { 0.0 }
}

fn energetic_mean(energy: f64, count: u64) -> f64 {
    if count == 0 {
        return f64::NEG_INFINITY;
    }
    10.0 * (energy / count as f64).log10()
}

pub fn print_table(summary: &FileSummary) {
    println!("{}", summary.file);
    println!(
        "  {:.1}s @ {}Hz, {} records",
        summary.duration_secs, summary.sample_rate, summary.records
    );
    println!(
        "  Leq {:6.1} dB   LAeq {:6.1} dB   LAFmax {:6.1} dB   LASmax {:6.1} dB",
        summary.leq, summary.laeq, summary.lafmax, summary.lasmax
    );
    for band in &summary.bands {
        println!("  {:>8} Hz  {:6.1} dB", band.nominal_frequency, band.leq);
    }
    if summary.blocks_dropped > 0 || summary.events_dropped > 0 {
        println!(
            "  dropped: {} blocks, {} events",
            summary.blocks_dropped, summary.events_dropped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(leq: f64, bands: Vec<f64>) -> AcousticIndicatorsData {
        AcousticIndicatorsData {
            epoch: 0,
            leq,
            laeq: leq,
            rms: 0.0,
            nominal_frequencies: (0..bands.len()).map(|i| 1000.0 * (i + 1) as f64).collect(),
            third_octave: bands,
        }
    }

    #[test]
    fn test_energetic_averages() {
        let mut builder = SummaryBuilder::new(&DisplayConfig::default(), 0.125);
        builder.add(&record(60.0, vec![50.0, f64::NEG_INFINITY]));
        builder.add(&record(70.0, vec![50.0, 40.0]));
        let summary = builder.finish("a.wav".into(), 48000, 0.25, StreamStats::default());

        let expected = 10.0 * ((1e6 + 1e7) / 2.0f64).log10();
        assert!((summary.leq - expected).abs() < 1e-9);
        assert!((summary.laeq - expected).abs() < 1e-9);
        assert_eq!(summary.records, 2);
        assert_eq!(summary.bands.len(), 2);
        assert!((summary.bands[0].leq - 50.0).abs() < 1e-9);
        assert!((summary.bands[1].leq - (40.0 - 10.0 * 2f64.log10())).abs() < 1e-9);
        assert_eq!(summary.bands[1].nominal_frequency, 2000.0);
    }

    #[test]
    fn test_fast_max_exceeds_slow_max() {
        let mut builder = SummaryBuilder::new(&DisplayConfig::default(), 0.125);
        for level in [40.0, 90.0, 40.0, 40.0] {
            builder.add(&record(level, Vec::new()));
        }
        let summary = builder.finish("b.wav".into(), 8000, 0.5, StreamStats::default());
        assert!(summary.lafmax < 90.0);
        assert!(summary.lafmax > summary.lasmax);
    }

    #[test]
    fn test_empty_summary() {
        let builder = SummaryBuilder::new(&DisplayConfig::default(), 0.125);
        let summary = builder.finish("c.wav".into(), 8000, 0.0, StreamStats::default());
        assert_eq!(summary.leq, f64::NEG_INFINITY);
        assert!(summary.bands.is_empty());
    }
}
