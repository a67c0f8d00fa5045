//! Display time weighting (IEC 61672-1 Fast/Slow) for meter readouts.

pub const FAST_DECAY_RATE: f64 = -34.7;
pub const SLOW_DECAY_RATE: f64 = -4.3;

/// Single-pole smoothing of successive levels in the power domain. Keep one
/// per displayed quantity.
#[derive(Debug, Clone)]
pub struct LevelDecay {
    weight: f64,
    integration: f64,
}

impl LevelDecay {
    /// `decay_rate` in dB/s (negative), `interval` in seconds between values.
    pub fn new(decay_rate: f64, interval: f64) -> Self {
        Self {
            weight: 10f64.powf(decay_rate * interval / 10.0),
            integration: 0.0,
        }
    }

    pub fn fast(interval: f64) -> Self {
        Self::new(FAST_DECAY_RATE, interval)
    }

    pub fn slow(interval: f64) -> Self {
        Self::new(SLOW_DECAY_RATE, interval)
    }

    /// Folds in `value` (dB) and returns the displayed level.
    pub fn weighted_value(&mut self, value: f64) -> f64 {
        self.integration =
            self.integration * self.weight + 10f64.powf(value / 10.0) * (1.0 - self.weight);
        10.0 * self.integration.log10()
    }
}
