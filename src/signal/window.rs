//! Streaming overlap framer. Accepts sample chunks of any size and emits
//! `window_size` frames every `hop_size` samples, optionally Hann weighted.

use std::f64::consts::PI;

/// One analysis frame. `start_epoch` is the capture time (ms) of its first sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub samples: Vec<f32>,
    pub start_epoch: i64,
}

/// Symmetric Hann window of `size` taps.
pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| (0.5 * (1.0 - (2.0 * PI * i as f64 / (size - 1) as f64).cos())) as f32)
        .collect()
}

pub struct Windower {
    sample_rate: u32,
    window_size: usize,
    hop_size: usize,
    circular: Vec<f32>,
    cursor: usize,
    samples_until_frame: usize,
    window: Option<Vec<f32>>,
    frame: Frame,
}

impl Windower {
    pub fn new(sample_rate: u32, window_size: usize, hop_size: usize, apply_hann: bool) -> Self {
        assert!(sample_rate > 0, "sample rate must be positive");
        assert!(window_size > 0, "window size must be positive");
        assert!(
            hop_size > 0 && hop_size <= window_size,
            "hop size {hop_size} must be within 1..={window_size}"
        );
        Self {
            sample_rate,
            window_size,
            hop_size,
            circular: vec![0.0; window_size],
            cursor: 0,
            samples_until_frame: window_size,
            window: apply_hann.then(|| hann_window(window_size)),
            frame: Frame {
                samples: vec![0.0; window_size],
                start_epoch: 0,
            },
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn hann(&self) -> Option<&[f32]> {
        self.window.as_deref()
    }

    /// Samples still needed before the next frame is emitted. Pushing this many
    /// zeros flushes the trailing partial frame.
    pub fn samples_until_frame(&self) -> usize {
        self.samples_until_frame
    }

    /// Forget buffered samples; the next frame needs a full window again.
    pub fn reset(&mut self) {
        self.circular.fill(0.0);
        self.cursor = 0;
        self.samples_until_frame = self.window_size;
    }

    /// Consumes samples from the front of `input` until a frame completes or
    /// the input runs out. `epoch` stamps the last sample of the whole block.
    ///
    /// The returned frame lives in a buffer reused by the next call.
    pub fn feed(&mut self, epoch: i64, input: &mut &[f32]) -> Option<&Frame> {
        let mut to_fetch = input.len().min(self.samples_until_frame);
        while to_fetch > 0 {
            let copy = (self.window_size - self.cursor).min(to_fetch);
            self.circular[self.cursor..self.cursor + copy].copy_from_slice(&input[..copy]);
            *input = &input[copy..];
            self.cursor += copy;
            to_fetch -= copy;
            self.samples_until_frame -= copy;
            if self.cursor == self.window_size {
                self.cursor = 0;
            }
        }
        if self.samples_until_frame > 0 {
            return None;
        }

        // oldest sample sits at the cursor
        let tail = self.window_size - self.cursor;
        self.frame.samples[..tail].copy_from_slice(&self.circular[self.cursor..]);
        self.frame.samples[tail..].copy_from_slice(&self.circular[..self.cursor]);
        if let Some(window) = &self.window {
            for (sample, w) in self.frame.samples.iter_mut().zip(window) {
                *sample *= w;
            }
        }
        let ms_per_sample = 1000.0 / self.sample_rate as f64;
        let end_epoch = epoch as f64 - input.len() as f64 * ms_per_sample;
        self.frame.start_epoch = (end_epoch - self.window_size as f64 * ms_per_sample) as i64;
        self.samples_until_frame = self.hop_size;
        Some(&self.frame)
    }

    /// Pushes a whole block and returns every frame it completed.
    pub fn push_samples(&mut self, epoch: i64, samples: &[f32]) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut rest = samples;
        while !rest.is_empty() {
            if let Some(frame) = self.feed(epoch, &mut rest) {
                frames.push(frame.clone());
            }
        }
        frames
    }

    /// Weighted overlap-add of `frames` (as emitted by this windower): each
    /// frame is weighted again by the window and every output sample divided
    /// by the sum of squared window taps covering it.
    pub fn reconstruct_original_signal(&self, frames: &[Frame]) -> Vec<f64> {
        if frames.is_empty() {
            return Vec::new();
        }
        let len = (frames.len() - 1) * self.hop_size + self.window_size;
        let mut sum = vec![0.0f64; len];
        let mut norm = vec![0.0f64; len];
        for (i, frame) in frames.iter().enumerate() {
            let offset = i * self.hop_size;
            for (j, &sample) in frame.samples.iter().enumerate() {
                let w = self.window.as_ref().map_or(1.0, |w| w[j] as f64);
                sum[offset + j] += sample as f64 * w;
                norm[offset + j] += w * w;
            }
        }
        for (value, weight) in sum.iter_mut().zip(norm) {
            *value = if weight > 1e-12 { *value / weight } else { 0.0 };
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded_ones(size: usize) -> Vec<f32> {
        (0..size)
            .map(|i| if i >= 2 && i + 3 <= size { 1.0 } else { 0.0 })
            .collect()
    }

    fn ramp(size: usize) -> Vec<f32> {
        (0..size).map(|i| ((i * 37) % 101) as f32 / 10.0 - 5.0).collect()
    }

    /// Pushes `signal` in chunks of `chunk` samples, then flushes with zeros.
    fn frames_of(windower: &mut Windower, signal: &[f32], chunk: usize) -> Vec<Frame> {
        let mut frames = Vec::new();
        for (i, part) in signal.chunks(chunk).enumerate() {
            frames.extend(windower.push_samples((i * chunk + part.len()) as i64, part));
        }
        let flush = vec![0.0; windower.samples_until_frame()];
        frames.extend(windower.push_samples(signal.len() as i64, &flush));
        frames
    }

    #[test]
    fn test_hann_window() {
        let expected = [
            0.0, 0.0954915, 0.3454915, 0.6545085, 0.9045085, 1.0, 0.9045085, 0.6545085,
            0.3454915, 0.0954915, 0.0,
        ];
        let windower = Windower::new(44100, expected.len(), 1, true);
        for (w, e) in windower.hann().unwrap().iter().zip(expected.iter()) {
            assert!((w - e).abs() < 1e-6);
        }
    }

    #[test]
    fn test_overlap_frame_count() {
        let ones = padded_ones(13);
        let mut windower = Windower::new(1, 5, 2, true);
        let frames = windower.push_samples(0, &ones);
        assert_eq!(frames.len(), 5);
        let total: f32 = frames.iter().map(|f| f.samples.iter().sum::<f32>()).sum();
        assert!((total - ones.iter().sum::<f32>()).abs() < 1e-6);
    }

    #[test]
    fn test_partial_frame_is_held_back() {
        let mut windower = Windower::new(1000, 8, 8, false);
        assert!(windower.push_samples(0, &[1.0; 7]).is_empty());
        assert_eq!(windower.samples_until_frame(), 1);
        let frames = windower.push_samples(8, &[1.0]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].start_epoch, 0);
    }

    #[test]
    fn test_hann_reconstruction_segments() {
        for size in 9..=13 {
            let ones = padded_ones(size);
            let mut windower = Windower::new(1, 5, 2, true);
            let split = (size as f64 * 0.6) as usize;
            let mut frames = windower.push_samples(split as i64, &ones[..split]);
            frames.extend(windower.push_samples(size as i64, &ones[split..]));
            let flush = vec![0.0; windower.samples_until_frame()];
            frames.extend(windower.push_samples(size as i64, &flush));

            let restored = windower.reconstruct_original_signal(&frames);
            for (i, value) in ones.iter().enumerate() {
                assert!((restored[i] - *value as f64).abs() < 1e-8, "size {} index {}", size, i);
            }
        }
    }

    #[test]
    fn test_hann_reconstruction_small_pushes() {
        let ones = padded_ones(13);
        for chunk in [1usize, 2, 3] {
            let mut windower = Windower::new(1, 5, 2, true);
            let frames = frames_of(&mut windower, &ones, chunk);
            assert_eq!(frames.len(), 5, "chunk {}", chunk);
            let restored = windower.reconstruct_original_signal(&frames);
            for (i, value) in ones.iter().enumerate() {
                assert!((restored[i] - *value as f64).abs() < 1e-8, "chunk {} index {}", chunk, i);
            }
        }
    }

    #[test]
    fn test_rectangular_reconstruction_any_chunking() {
        let signal = ramp(97);
        for (window, hop) in [(8, 8), (8, 3), (16, 5), (7, 1)] {
            for chunk in [1usize, 2, 3, 5, 8, 13, 97] {
                let mut windower = Windower::new(8000, window, hop, false);
                let frames = frames_of(&mut windower, &signal, chunk);
                let restored = windower.reconstruct_original_signal(&frames);
                assert!(restored.len() >= signal.len());
                for (i, value) in signal.iter().enumerate() {
                    assert!(
                        (restored[i] - *value as f64).abs() < 1e-8,
                        "window {} hop {} chunk {} index {}",
                        window,
                        hop,
                        chunk,
                        i
                    );
                }
            }
        }
    }

    #[test]
    fn test_hann_reconstruction_interior() {
        // interior samples are covered by non-zero taps whatever the hop
        let signal = ramp(200);
        for hop in [1usize, 4, 7] {
            let mut windower = Windower::new(8000, 16, hop, true);
            let frames = frames_of(&mut windower, &signal, 11);
            let restored = windower.reconstruct_original_signal(&frames);
            for i in 16..signal.len() {
                assert!((restored[i] - signal[i] as f64).abs() < 1e-5, "hop {} index {}", hop, i);
            }
        }
    }

    #[test]
    fn test_frame_epochs() {
        let mut windower = Windower::new(1000, 100, 50, false);
        let frames = windower.push_samples(250, &[0.5; 250]);
        let epochs: Vec<i64> = frames.iter().map(|f| f.start_epoch).collect();
        assert_eq!(epochs, vec![0, 50, 100, 150]);
    }

    #[test]
    fn test_reset_drops_buffered_samples() {
        let mut windower = Windower::new(1000, 4, 2, false);
        windower.push_samples(3, &[9.0; 3]);
        windower.reset();
        let frames = windower.push_samples(4, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples, vec![1.0, 2.0, 3.0, 4.0]);
    }
}
