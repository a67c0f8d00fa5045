use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "noisemeter",
    about = "Sound level meter: Leq, LAeq and third-octave levels of audio recordings"
)]
pub struct Cli {
    /// Input audio files (WAV, MP3, FLAC, OGG)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Config file (TOML). Defaults to ./noisemeter.toml or the user config dir
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write every record as JSON lines to <DIR>/<file stem>.jsonl
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Include per-frame spectra in the JSON-lines output
    #[arg(long)]
    pub spectrum: bool,

    /// Print summaries as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Samples per simulated capture block
    #[arg(long, default_value_t = 4096)]
    pub block_size: usize,

    /// Analysis window length in seconds
    #[arg(long, default_value_t = 0.125)]
    pub window_time: f64,

    /// Analysis hop in seconds (at most the window length)
    #[arg(long, default_value_t = 0.125)]
    pub hop_time: f64,

    /// Calibration gain in dB added to full-scale levels
    #[arg(long, default_value_t = noisemeter::config::DEFAULT_CALIBRATION_GAIN)]
    pub gain: f64,

    /// Octave base: 10 or 2
    #[arg(long, default_value_t = 10)]
    pub octave_base: u32,

    /// Bands per octave (3 = third octaves)
    #[arg(long, default_value_t = 3.0)]
    pub band_division: f64,

    /// Lowest band (Hz)
    #[arg(long, default_value_t = 20.0)]
    pub first_frequency: f64,

    /// Band limit (Hz); the band containing it is excluded
    #[arg(long, default_value_t = 12500.0)]
    pub last_frequency: f64,

    /// Attribute spectrum bins to bands with hard edges instead of band filter shapes
    #[arg(long)]
    pub rectangular: bool,

    /// Analyse frames without the Hann window
    #[arg(long)]
    pub no_hann: bool,
}
