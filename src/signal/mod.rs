pub mod bands;
pub mod biquad;
pub mod bluestein;
pub mod decay;
pub mod fft;
pub mod spectrum;
pub mod window;
