//! Cascade of second-order IIR sections (direct form II) used for frequency
//! weighting, and the A-weighting design for a given sample rate.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct BiquadBank {
    b0: Vec<f64>,
    b1: Vec<f64>,
    b2: Vec<f64>,
    a1: Vec<f64>,
    a2: Vec<f64>,
    delay1: Vec<f64>,
    delay2: Vec<f64>,
}

impl BiquadBank {
    /// One section per index; `a0` is implicitly 1. All five arrays must have
    /// the same length.
    pub fn new(
        b0: Vec<f64>,
        b1: Vec<f64>,
        b2: Vec<f64>,
        a1: Vec<f64>,
        a2: Vec<f64>,
    ) -> EngineResult<Self> {
        let n = b0.len();
        if [b1.len(), b2.len(), a1.len(), a2.len()].iter().any(|&len| len != n) {
            return Err(EngineError::FilterShape {
                b0: b0.len(),
                b1: b1.len(),
                b2: b2.len(),
                a1: a1.len(),
                a2: a2.len(),
            });
        }
        Ok(Self {
            b0,
            b1,
            b2,
            a1,
            a2,
            delay1: vec![0.0; n],
            delay2: vec![0.0; n],
        })
    }

    pub fn sections(&self) -> usize {
        self.b0.len()
    }

    /// Clears the delay lines.
    pub fn reset(&mut self) {
        self.delay1.fill(0.0);
        self.delay2.fill(0.0);
    }

    #[inline]
    fn process(&mut self, sample: f64) -> f64 {
        let mut input = sample;
        for j in 0..self.b0.len() {
            let d1 = self.delay1[j];
            let d2 = self.delay2[j];
            input -= d1 * self.a1[j] + d2 * self.a2[j];
            let output = input * self.b0[j] + d1 * self.b1[j] + d2 * self.b2[j];
            self.delay2[j] = d1;
            self.delay1[j] = input;
            input = output;
        }
        input
    }

    /// Sum of squared cascade output over `samples`.
    pub fn filter_energy(&mut self, samples: &[f32]) -> f64 {
        samples
            .iter()
            .map(|&s| {
                let y = self.process(s as f64);
                y * y
            })
            .sum()
    }

    /// Energetic mean of the filtered samples, in dB.
    pub fn filter_then_leq(&mut self, samples: &[f32]) -> f64 {
        10.0 * (self.filter_energy(samples) / samples.len() as f64).log10()
    }

    /// Filters `samples_in` and keeps every `subsampling_factor`-th output
    /// (starting with the first). Returns the number of samples written.
    pub fn filter_slice(
        &mut self,
        samples_in: &[f32],
        samples_out: &mut [f32],
        subsampling_factor: usize,
    ) -> usize {
        assert!(subsampling_factor > 0, "subsampling factor must be positive");
        let needed = samples_in.len().div_ceil(subsampling_factor);
        assert!(
            samples_out.len() >= needed,
            "output holds {} samples, {} required",
            samples_out.len(),
            needed
        );
        let mut written = 0;
        for (i, &sample) in samples_in.iter().enumerate() {
            let y = self.process(sample as f64);
            if i % subsampling_factor == 0 {
                samples_out[written] = y as f32;
                written += 1;
            }
        }
        written
    }

    /// Complex response of the cascade at `frequency`.
    pub fn response(&self, frequency: f64, sample_rate: u32) -> Complex<f64> {
        let omega = 2.0 * PI * frequency / sample_rate as f64;
        let z1 = Complex::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        (0..self.sections()).fold(Complex::new(1.0, 0.0), |acc, j| {
            let num = z2 * self.b2[j] + z1 * self.b1[j] + self.b0[j];
            let den = z2 * self.a2[j] + z1 * self.a1[j] + 1.0;
            acc * num / den
        })
    }

    pub fn gain_db(&self, frequency: f64, sample_rate: u32) -> f64 {
        20.0 * self.response(frequency, sample_rate).norm().log10()
    }
}

/// Frequency at which the weighting reads 0 dB.
const REFERENCE_FREQUENCY: f64 = 1000.0;

/// Pole frequencies of the A curve (Hz).
const A_POLES: [f64; 4] = [20.598997, 107.65265, 737.86223, 12194.217];

/// A-weighting filter for `sample_rate`: the analog curve
/// `s^4 / ((s + w1)^2 (s + w2)(s + w3)(s + w4)^2)` split into three sections,
/// discretised with the bilinear transform and normalised to 0 dB at 1 kHz.
/// The 1 kHz reference must lie below Nyquist, so rates up to 2000 Hz are
/// rejected.
pub fn a_weighting(sample_rate: u32) -> EngineResult<BiquadBank> {
    if sample_rate <= 2 * REFERENCE_FREQUENCY as u32 {
        return Err(EngineError::InvalidSampleRate(sample_rate));
    }
    let [w1, w2, w3, w4] = A_POLES.map(|f| 2.0 * PI * f);
    let k = 2.0 * sample_rate as f64;

    // (numerator, denominator) as [s^2, s, 1] coefficients
    let analog = [
        ([1.0, 0.0, 0.0], [1.0, 2.0 * w1, w1 * w1]),
        ([1.0, 0.0, 0.0], [1.0, w2 + w3, w2 * w3]),
        ([0.0, 0.0, w4 * w4], [1.0, 2.0 * w4, w4 * w4]),
    ];
    let bilinear = |[c2, c1, c0]: [f64; 3]| {
        [
            c2 * k * k + c1 * k + c0,
            2.0 * (c0 - c2 * k * k),
            c2 * k * k - c1 * k + c0,
        ]
    };

    let (mut b0, mut b1, mut b2) = (Vec::new(), Vec::new(), Vec::new());
    let (mut a1, mut a2) = (Vec::new(), Vec::new());
    for (num, den) in analog {
        let [nb0, nb1, nb2] = bilinear(num);
        let [da0, da1, da2] = bilinear(den);
        b0.push(nb0 / da0);
        b1.push(nb1 / da0);
        b2.push(nb2 / da0);
        a1.push(da1 / da0);
        a2.push(da2 / da0);
    }

    let mut bank = BiquadBank::new(b0, b1, b2, a1, a2)?;
    let norm = 1.0 / bank.response(REFERENCE_FREQUENCY, sample_rate).norm();
    for b in [&mut bank.b0, &mut bank.b1, &mut bank.b2] {
        b[0] *= norm;
    }
    Ok(bank)
}
