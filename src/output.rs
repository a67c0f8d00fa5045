use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes one JSON document per line.
pub struct RecordWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    records: u64,
}

impl RecordWriter {
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create record file {}", path.display()))?;
        log::info!("Writing records to {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            records: 0,
        })
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record).context("Failed to serialize record")?;
        self.writer
            .write_all(b"\n")
            .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn finish(mut self) -> Result<u64> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        log::info!("Wrote {} records to {}", self.records, self.path.display());
        Ok(self.records)
    }
}
