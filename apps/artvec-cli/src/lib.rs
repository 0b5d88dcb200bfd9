//! Shared helpers of the `artvec` binary.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use artvec_core::types::ArtObject;

/// Logs to stderr; `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Parses one catalogue record per line. Blank lines are skipped.
pub fn parse_objects(reader: impl BufRead) -> Result<Vec<ArtObject>> {
    let mut objects = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let object: ArtObject = serde_json::from_str(&line).with_context(|| format!("line {}: invalid art object", n + 1))?;
        objects.push(object);
    }
    Ok(objects)
}

pub fn read_objects(path: &Path) -> Result<Vec<ArtObject>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_objects(BufReader::new(file))
}

pub fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}
