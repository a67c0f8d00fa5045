//! Iterative radix-2 FFT working in place on interleaved `[re, im, re, im, ..]`
//! buffers, plus the packed real-input transform: N real samples go through an
//! N/2-point complex FFT and a twiddle recombination pass yields the N/2 + 1
//! unique bins.
//!
//! Every routine is generic over [`FftFloat`] so the single and double
//! precision variants share one implementation.

use std::f64::consts::PI;
use std::fmt::Debug;

use rustfft::num_traits::{Float, FloatConst};

/// Sample type accepted by the transforms (`f32` or `f64`).
pub trait FftFloat: Float + FloatConst + Default + Debug + Send + Sync + 'static {
    fn cast(value: f64) -> Self;
    fn widen(self) -> f64;
}

impl FftFloat for f32 {
    fn cast(value: f64) -> Self {
        value as f32
    }

    fn widen(self) -> f64 {
        self as f64
    }
}

impl FftFloat for f64 {
    fn cast(value: f64) -> Self {
        value
    }

    fn widen(self) -> f64 {
        self
    }
}

/// Forward transform of `length` complex values held in `ri[..2 * length]`.
///
/// Panics when `length` is not a power of two or `ri` is too short.
pub fn fft<T: FftFloat>(length: usize, ri: &mut [T]) {
    radix2(length, ri, false);
}

/// Inverse transform, scaled by `1 / length`.
///
/// Panics when `length` is not a power of two or `ri` is too short.
pub fn ifft<T: FftFloat>(length: usize, ri: &mut [T]) {
    radix2(length, ri, true);
}

fn radix2<T: FftFloat>(length: usize, ri: &mut [T], inverse: bool) {
    assert!(
        length.is_power_of_two(),
        "FFT length {length} is not a power of two"
    );
    assert!(
        ri.len() >= 2 * length,
        "FFT buffer holds {} values, {} required",
        ri.len(),
        2 * length
    );

    let half = T::cast(0.5);
    let mut l1 = length;
    while l1 > 1 {
        let l2 = l1 >> 1;
        let l22 = 2 * l2;
        let angle = PI / l2 as f64;
        let u_cos = angle.cos();
        let u_sin = if inverse { angle.sin() } else { -angle.sin() };
        let mut w_cos = 1.0f64;
        let mut w_sin = 0.0f64;

        for j in 0..l2 {
            let wc = T::cast(w_cos);
            let ws = T::cast(w_sin);
            let mut i = j;
            while i < length {
                let ir = 2 * i;
                let ii = ir + 1;
                let mut sum_re = ri[ir] + ri[ir + l22];
                let mut sum_im = ri[ii] + ri[ii + l22];
                let mut diff_re = ri[ir] - ri[ir + l22];
                let mut diff_im = ri[ii] - ri[ii + l22];
                if inverse {
                    sum_re = sum_re * half;
                    sum_im = sum_im * half;
                    diff_re = diff_re * half;
                    diff_im = diff_im * half;
                }
                ri[ir + l22] = diff_re * wc - diff_im * ws;
                ri[ii + l22] = diff_re * ws + diff_im * wc;
                ri[ir] = sum_re;
                ri[ii] = sum_im;
                i += l1;
            }
            let w = w_cos * u_cos - w_sin * u_sin;
            w_sin = w_cos * u_sin + w_sin * u_cos;
            w_cos = w;
        }
        l1 = l2;
    }

    // bit reversal
    let n2 = length >> 1;
    let mut j = 0;
    for i in 0..length.saturating_sub(1) {
        if i < j {
            ri.swap(2 * i, 2 * j);
            ri.swap(2 * i + 1, 2 * j + 1);
        }
        let mut k = n2;
        while k <= j {
            j -= k;
            k >>= 1;
        }
        j += k;
    }
}

/// Packed real transform of one fixed length `n`. The recombination weights
/// are computed once so repeated transforms do not allocate.
#[derive(Debug, Clone)]
pub struct RealFft {
    n: usize,
    a: Vec<f64>,
    b: Vec<f64>,
}

impl RealFft {
    /// Panics when `n` is not a power of two of at least 2.
    pub fn new(n: usize) -> Self {
        assert!(
            n >= 2 && n.is_power_of_two(),
            "real FFT length {n} is not a power of two"
        );
        let mut a = vec![0.0; n];
        let mut b = vec![0.0; n];
        for i in 0..n / 2 {
            let phase = 2.0 * PI / n as f64 * i as f64;
            a[2 * i] = 0.5 * (1.0 - phase.sin());
            a[2 * i + 1] = -0.5 * phase.cos();
            b[2 * i] = 0.5 * (1.0 + phase.sin());
            b[2 * i + 1] = 0.5 * phase.cos();
        }
        Self { n, a, b }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// `buf[..n]` holds the real samples on entry and `buf[..n + 2]` the
    /// interleaved bins `0..=n/2` on return.
    pub fn forward<T: FftFloat>(&self, buf: &mut [T]) {
        let n = self.n;
        let (a, b) = (&self.a, &self.b);
        assert!(buf.len() >= n + 2, "real FFT buffer must hold {} values", n + 2);

        fft(n / 2, buf);

        for k in 1..=n / 4 {
            let k2 = 2 * k;
            let nk = n - k2;
            let zr = buf[k2].widen();
            let zi = buf[k2 + 1].widen();
            let zr_n = buf[nk].widen();
            let zi_n = buf[nk + 1].widen();

            let xr = zr * a[k2] - zi * a[k2 + 1] + zr_n * b[k2] + zi_n * b[k2 + 1];
            let xi = zr * a[k2 + 1] + zi * a[k2] + zr_n * b[k2 + 1] - zi_n * b[k2];
            let xr_n = zr_n * a[nk] - zi_n * a[nk + 1] + zr * b[nk] + zi * b[nk + 1];
            let xi_n = zr_n * a[nk + 1] + zi_n * a[nk] + zr * b[nk + 1] - zi * b[nk];

            buf[k2] = T::cast(xr);
            buf[k2 + 1] = T::cast(xi);
            buf[nk] = T::cast(xr_n);
            buf[nk + 1] = T::cast(xi_n);
        }

        let re0 = buf[0];
        let im0 = buf[1];
        buf[n] = re0 - im0;
        buf[0] = re0 + im0;
        buf[1] = T::zero();
        buf[n + 1] = T::zero();
    }

    /// `buf[..n + 2]` holds interleaved bins on entry and `buf[..n]` the real
    /// samples on return.
    pub fn inverse<T: FftFloat>(&self, buf: &mut [T]) {
        let n = self.n;
        let (a, b) = (&self.a, &self.b);
        assert!(buf.len() >= n + 2, "real IFFT buffer must hold {} values", n + 2);

        for k in 1..=n / 4 {
            let k2 = 2 * k;
            let nk = n - k2;
            let xr = buf[k2].widen();
            let xi = buf[k2 + 1].widen();
            let xr_n = buf[nk].widen();
            let xi_n = buf[nk + 1].widen();

            let zr = xr * a[k2] + xi * a[k2 + 1] + xr_n * b[k2] - xi_n * b[k2 + 1];
            let zi = -xr * a[k2 + 1] + xi * a[k2] - xr_n * b[k2 + 1] - xi_n * b[k2];
            let zr_n = xr_n * a[nk] + xi_n * a[nk + 1] + xr * b[nk] - xi * b[nk + 1];
            let zi_n = -xr_n * a[nk + 1] + xi_n * a[nk] - xr * b[nk + 1] - xi * b[nk];

            buf[k2] = T::cast(zr);
            buf[k2 + 1] = T::cast(zi);
            buf[nk] = T::cast(zr_n);
            buf[nk + 1] = T::cast(zi_n);
        }

        let dc = buf[0].widen();
        let nyquist = buf[n].widen();
        buf[0] = T::cast(0.5 * dc + 0.5 * nyquist);
        buf[1] = T::cast(0.5 * dc - 0.5 * nyquist);
        ifft(n / 2, buf);
    }
}

/// Real-input FFT. Returns `input.len() + 2` interleaved values: the bins
/// `0..=N/2` of the full spectrum.
pub fn real_fft<T: FftFloat>(input: &[T]) -> Vec<T> {
    let mut out = vec![T::zero(); input.len() + 2];
    out[..input.len()].copy_from_slice(input);
    real_fft_in_place(input.len(), &mut out);
    out
}

/// One-shot form of [`RealFft::forward`].
pub fn real_fft_in_place<T: FftFloat>(n: usize, buf: &mut [T]) {
    RealFft::new(n).forward(buf);
}

/// Inverse of [`real_fft`]: takes `N + 2` interleaved bins, returns `N` samples.
pub fn real_ifft<T: FftFloat>(spectrum: &[T]) -> Vec<T> {
    let n = spectrum.len().saturating_sub(2);
    assert!(
        n >= 2 && n.is_power_of_two(),
        "real IFFT expects 2^k + 2 values, got {}",
        spectrum.len()
    );

    let mut buf = spectrum.to_vec();
    RealFft::new(n).inverse(&mut buf);
    buf.truncate(n);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::num_complex::Complex;
    use rustfft::FftPlanner;

    const EXPECTED_RAMP: [f64; 16] = [
        28.0,
        0.0,
        -4.0,
        9.65685424949238,
        -4.0,
        4.0,
        -4.0,
        1.6568542494923806,
        -4.0,
        0.0,
        -4.0,
        -1.6568542494923806,
        -4.0,
        -4.0,
        -4.0,
        -9.65685424949238,
    ];

    fn ramp_interleaved<T: FftFloat>() -> Vec<T> {
        (0..8)
            .flat_map(|i| [T::cast(i as f64), T::zero()])
            .collect()
    }

    fn test_signal(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (i as f64 * 0.37).sin() + 0.5 * (i as f64 * 1.3).cos())
            .collect()
    }

    #[test]
    fn test_fft_double_ramp() {
        let mut values = ramp_interleaved::<f64>();
        fft(values.len() / 2, &mut values);
        for (got, expected) in values.iter().zip(EXPECTED_RAMP.iter()) {
            assert!((got - expected).abs() < 1e-8, "{} != {}", got, expected);
        }
    }

    #[test]
    fn test_fft_float_ramp() {
        let mut values = ramp_interleaved::<f32>();
        fft(values.len() / 2, &mut values);
        for (got, expected) in values.iter().zip(EXPECTED_RAMP.iter()) {
            assert!((*got as f64 - expected).abs() < 1e-5, "{} != {}", got, expected);
        }
    }

    #[test]
    fn test_fft_matches_reference() {
        let len = 256;
        let signal = test_signal(2 * len);
        let mut values = signal.clone();
        fft(len, &mut values);

        let mut reference: Vec<Complex<f64>> = signal
            .chunks(2)
            .map(|c| Complex::new(c[0], c[1]))
            .collect();
        FftPlanner::<f64>::new()
            .plan_fft_forward(len)
            .process(&mut reference);

        for (i, c) in reference.iter().enumerate() {
            assert!((values[2 * i] - c.re).abs() < 1e-8);
            assert!((values[2 * i + 1] - c.im).abs() < 1e-8);
        }
    }

    #[test]
    fn test_fft_round_trip_double() {
        for len in [1usize, 2, 4, 8, 64, 1024] {
            let signal = test_signal(2 * len);
            let mut values = signal.clone();
            fft(len, &mut values);
            ifft(len, &mut values);
            for (got, expected) in values.iter().zip(signal.iter()) {
                assert!((got - expected).abs() < 1e-8, "len {}", len);
            }
        }
    }

    #[test]
    fn test_fft_round_trip_float() {
        let signal: Vec<f32> = test_signal(32).iter().map(|&v| v as f32).collect();
        let mut values = signal.clone();
        fft(16, &mut values);
        ifft(16, &mut values);
        for (got, expected) in values.iter().zip(signal.iter()) {
            assert!((got - expected).abs() < 1e-6);
        }
    }

    #[test]
    #[should_panic(expected = "not a power of two")]
    fn test_fft_rejects_non_power_of_two() {
        let mut values = vec![0.0f64; 12];
        fft(6, &mut values);
    }

    #[test]
    #[should_panic]
    fn test_fft_rejects_short_buffer() {
        let mut values = vec![0.0f64; 8];
        fft(8, &mut values);
    }

    #[test]
    fn test_real_fft_ramp() {
        let values: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let spectrum = real_fft(&values);
        assert_eq!(spectrum.len(), 10);
        for (got, expected) in spectrum.iter().zip(EXPECTED_RAMP.iter()) {
            assert!((got - expected).abs() < 1e-8);
        }
    }

    #[test]
    fn test_real_fft_incremental() {
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let expected = [36.0, 0.0, -4.0, 9.65685425, -4.0, 4.0, -4.0, 1.65685425, -4.0, 0.0];
        let spectrum = real_fft(&samples);
        for (got, want) in spectrum.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-8);
        }
        let origin = real_ifft(&spectrum);
        assert_eq!(origin.len(), samples.len());
        for (got, want) in origin.iter().zip(samples.iter()) {
            assert!((got - want).abs() < 1e-8);
        }
    }

    #[test]
    fn test_real_fft_float_incremental() {
        let samples = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let spectrum = real_fft(&samples);
        assert!((spectrum[0] - 36.0).abs() < 1e-5);
        assert!((spectrum[3] - 9.656855).abs() < 1e-5);
        let origin = real_ifft(&spectrum);
        for (got, want) in origin.iter().zip(samples.iter()) {
            assert!((got - want).abs() < 1e-5);
        }
    }

    #[test]
    fn test_real_fft_matches_reference() {
        let signal = test_signal(512);
        let spectrum = real_fft(&signal);

        let mut reference: Vec<Complex<f64>> =
            signal.iter().map(|&s| Complex::new(s, 0.0)).collect();
        FftPlanner::<f64>::new()
            .plan_fft_forward(signal.len())
            .process(&mut reference);

        for k in 0..=signal.len() / 2 {
            assert!((spectrum[2 * k] - reference[k].re).abs() < 1e-8, "bin {}", k);
            assert!((spectrum[2 * k + 1] - reference[k].im).abs() < 1e-8, "bin {}", k);
        }
    }

    #[test]
    fn test_real_fft_round_trip_sine() {
        let samples: Vec<f64> = (0..64)
            .map(|i| (2.0 * PI * 8.0 * i as f64 / 64.0).sin())
            .collect();
        let restored = real_ifft(&real_fft(&samples));
        assert_eq!(restored.len(), samples.len());
        for (got, want) in restored.iter().zip(samples.iter()) {
            assert!((got - want).abs() < 1e-8);
        }

        let samples: Vec<f32> = samples.iter().map(|&s| s as f32).collect();
        let restored = real_ifft(&real_fft(&samples));
        for (got, want) in restored.iter().zip(samples.iter()) {
            assert!((got - want).abs() < 1e-7);
        }
    }

    #[test]
    fn test_real_fft_round_trip_all_sizes() {
        for len in [2usize, 4, 8, 16, 128, 4096] {
            let signal = test_signal(len);
            let restored = real_ifft(&real_fft(&signal));
            for (got, want) in restored.iter().zip(signal.iter()) {
                assert!((got - want).abs() < 1e-8, "len {}", len);
            }
        }
    }

    #[test]
    fn test_real_fft_plan_reuse() {
        let plan = RealFft::new(64);
        assert_eq!(plan.len(), 64);
        let signal = test_signal(64);
        let expected = real_fft(&signal);

        let mut buf = vec![0.0; 66];
        for _ in 0..3 {
            buf[..64].copy_from_slice(&signal);
            plan.forward(&mut buf);
            assert_eq!(buf, expected);
        }
        plan.inverse(&mut buf);
        for (got, want) in buf[..64].iter().zip(signal.iter()) {
            assert!((got - want).abs() < 1e-8);
        }
    }

    #[test]
    #[should_panic(expected = "not a power of two")]
    fn test_real_fft_plan_rejects_odd_length() {
        RealFft::new(12);
    }

    #[test]
    fn test_real_fft_sine_levels() {
        let sample_rate = 64usize;
        let expected_level = 94.0;
        let peak = 10f64.powf(expected_level / 20.0) * 2f64.sqrt();
        let peaks = [5.0, 12.0, 20.0, 28.0];
        let signal: Vec<f64> = (0..sample_rate)
            .map(|i| {
                peaks
                    .iter()
                    .map(|f| peak * (2.0 * PI * f * i as f64 / sample_rate as f64).sin())
                    .sum()
            })
            .collect();

        let spectrum = real_fft(&signal);
        let v_ref = (signal.len() * signal.len()) as f64 / 2.0;
        for f in peaks {
            let k = f as usize;
            let power = spectrum[2 * k].powi(2) + spectrum[2 * k + 1].powi(2);
            let level = 10.0 * (power / v_ref).log10();
            assert!((level - expected_level).abs() < 1e-8, "{} Hz: {}", f, level);
        }
    }
}
