mod cli;
mod summary;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use cli::Cli;
use noisemeter::audio::decode::decode_audio;
use noisemeter::config::{self, Config};
use noisemeter::output::RecordWriter;
use noisemeter::signal::bands::{OctaveBase, OctaveWindow};
use noisemeter::MeterEvent;
use summary::{FileSummary, SummaryBuilder};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect noisemeter.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("noisemeter.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("noisemeter").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("noisemeter").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    let mut cfg = match config_path {
        Some(ref path) => match config::load_config(path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) => {
                log::warn!("Failed to load config from {}: {}", path.display(), err);
                Config::default()
            }
        },
        None => Config::default(),
    };
    merge_cli(&cli, &mut cfg)?;
    cfg.validate().context("Invalid analysis settings")?;

    if let Some(ref dir) = cli.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    log::info!(
        "noisemeter - {} file(s), window {}s, hop {}s, gain {:.2} dB",
        cli.inputs.len(),
        cfg.analysis.window_time,
        cfg.analysis.hop_time,
        cfg.analysis.calibration_gain
    );

    let progress = MultiProgress::new();
    let results: Vec<(PathBuf, Result<FileSummary>)> = cli
        .inputs
        .par_iter()
        .map(|input| (input.clone(), analyze_file(input, &cli, &cfg, &progress)))
        .collect();

    let mut summaries = Vec::new();
    let mut failures = 0;
    for (input, result) in results {
        match result {
            Ok(summary) => summaries.push(summary),
            Err(err) => {
                failures += 1;
                log::error!("{}: {:#}", input.display(), err);
            }
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for summary in &summaries {
            summary::print_table(summary);
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} file(s) failed", failures, cli.inputs.len());
    }
    Ok(())
}

/// Command-line values override the file only when changed from their defaults.
fn merge_cli(cli: &Cli, cfg: &mut Config) -> Result<()> {
    let analysis = &mut cfg.analysis;
    if cli.window_time != 0.125 { analysis.window_time = cli.window_time; }
    if cli.hop_time != 0.125 { analysis.hop_time = cli.hop_time; }
    if cli.gain != config::DEFAULT_CALIBRATION_GAIN { analysis.calibration_gain = cli.gain; }
    if cli.band_division != 3.0 { analysis.band_division = cli.band_division; }
    if cli.first_frequency != 20.0 { analysis.first_frequency = cli.first_frequency; }
    if cli.last_frequency != 12500.0 { analysis.last_frequency = cli.last_frequency; }
    if cli.rectangular { analysis.octave_window = OctaveWindow::Rectangular; }
    if cli.no_hann { analysis.hann_window = false; }
    match cli.octave_base {
        10 => {}
        2 => analysis.octave_base = OctaveBase::B2,
        other => anyhow::bail!("Octave base must be 10 or 2, got {}", other),
    }
    if cli.block_size != 4096 { cfg.stream.block_size = cli.block_size; }
    Ok(())
}

fn analyze_file(input: &Path, cli: &Cli, cfg: &Config, progress: &MultiProgress) -> Result<FileSummary> {
    let audio = decode_audio(input)?;
    let (_, hop_size) = cfg
        .analysis
        .frame_geometry(audio.sample_rate)
        .with_context(|| format!("Cannot analyse {} Hz audio", audio.sample_rate))?;
    let blocks = audio.to_blocks(cfg.stream.block_size, 0);
    let expected_frames = audio.samples.len() / hop_size;

    // Offline input: size the queues for the whole file so nothing is dropped
    let capacity = cfg
        .stream
        .queue_capacity
        .max(blocks.len())
        .max(2 * expected_frames + 2);
    let (sender, stream) = noisemeter::spawn(cfg.analysis.clone(), capacity)?;
    for block in blocks {
        sender.push(block);
    }
    drop(sender);

    let mut writer = match cli.output_dir {
        Some(ref dir) => {
            let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("recording");
            Some(RecordWriter::new(&dir.join(format!("{}.jsonl", stem)))?)
        }
        None => None,
    };

    let pb = progress.add(ProgressBar::new(expected_frames as u64));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames {msg}")?
            .progress_chars("=>-"),
    );
    pb.set_message(input.display().to_string());

    let mut builder = SummaryBuilder::new(&cfg.display, hop_size as f64 / audio.sample_rate as f64);
    for event in stream.iter() {
        match &event {
            MeterEvent::Indicators(data) => {
                builder.add(data);
                pb.inc(1);
            }
            MeterEvent::Spectrum(_) if !cli.spectrum => continue,
            _ => {}
        }
        if let Some(ref mut writer) = writer {
            writer.write_record(&event)?;
        }
    }
    let stats = stream.join().context("Meter stream failed")?;
    if let Some(writer) = writer {
        writer.finish()?;
    }
    pb.finish_with_message(format!("{} done", input.display()));

    Ok(builder.finish(
        input.display().to_string(),
        audio.sample_rate,
        audio.duration_secs(),
        stats,
    ))
}
