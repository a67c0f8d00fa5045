//! Chirp transform (Bluestein's algorithm): an arbitrary-length DFT expressed
//! as a circular convolution that the radix-2 FFT can evaluate.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;

use super::fft::{fft, ifft, FftFloat};

pub struct ChirpTransform<T: FftFloat> {
    len: usize,
    padded_len: usize,
    /// `exp(-iπ k² / n)` for `k` in `1 - n ..= n - 1`
    chirp: Vec<Complex<T>>,
    /// FFT of the reciprocal chirp, zero-padded to `padded_len`
    reciprocal_spectrum: Vec<T>,
    scratch: Vec<T>,
}

impl<T: FftFloat> ChirpTransform<T> {
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "chirp transform length must be positive");

        let chirp_len = 2 * len - 1;
        let padded_len = chirp_len.next_power_of_two();
        let period = 2 * len as u64;
        let chirp: Vec<Complex<T>> = (0..chirp_len)
            .map(|index| {
                let k = index as i64 - (len as i64 - 1);
                // k² mod 2n keeps the phase argument small
                let k2 = (k * k) as u64 % period;
                let angle = -PI * k2 as f64 / len as f64;
                Complex::new(T::cast(angle.cos()), T::cast(angle.sin()))
            })
            .collect();

        let mut reciprocal_spectrum = vec![T::zero(); 2 * padded_len];
        for (index, c) in chirp.iter().enumerate() {
            let inv = c.inv();
            reciprocal_spectrum[2 * index] = inv.re;
            reciprocal_spectrum[2 * index + 1] = inv.im;
        }
        fft(padded_len, &mut reciprocal_spectrum);

        Self {
            len,
            padded_len,
            chirp,
            reciprocal_spectrum,
            scratch: vec![T::zero(); 2 * padded_len],
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chirp(&self) -> &[Complex<T>] {
        &self.chirp
    }

    /// DFT of `input`, which holds either `n` real samples or `n` interleaved
    /// complex values. The result is always `2n` interleaved values.
    pub fn fft(&mut self, input: &[T]) -> Vec<T> {
        let mut out = vec![T::zero(); 2 * self.len];
        self.fft_into(input, &mut out);
        out
    }

    pub fn fft_into(&mut self, input: &[T], out: &mut [T]) {
        let n = self.len;
        let complex_input = match input.len() {
            l if l == 2 * n => true,
            l if l == n => false,
            l => panic!("chirp transform of length {n} cannot take {l} input values"),
        };
        assert!(out.len() >= 2 * n, "chirp transform output must hold {} values", 2 * n);

        self.scratch.fill(T::zero());
        for k in 0..n {
            let x = if complex_input {
                Complex::new(input[2 * k], input[2 * k + 1])
            } else {
                Complex::new(input[k], T::zero())
            };
            let y = x * self.chirp[n - 1 + k];
            self.scratch[2 * k] = y.re;
            self.scratch[2 * k + 1] = y.im;
        }

        fft(self.padded_len, &mut self.scratch);
        for k in 0..self.padded_len {
            let a = Complex::new(self.scratch[2 * k], self.scratch[2 * k + 1]);
            let b = Complex::new(
                self.reciprocal_spectrum[2 * k],
                self.reciprocal_spectrum[2 * k + 1],
            );
            let c = a * b;
            self.scratch[2 * k] = c.re;
            self.scratch[2 * k + 1] = c.im;
        }
        ifft(self.padded_len, &mut self.scratch);

        for k in 0..n {
            let i = n - 1 + k;
            let r = Complex::new(self.scratch[2 * i], self.scratch[2 * i + 1]) * self.chirp[i];
            out[2 * k] = r.re;
            out[2 * k + 1] = r.im;
        }
    }
}
