pub mod decode;
pub mod indicators;
pub mod samples;
pub mod stream;
