use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use clap::ArgMatches;
use tracing::info;

use varanno_genes::GeneIndex;

/// Derive the default output path: strip `.gz` then append `.bin`.
pub fn default_output_path(input: &str) -> String {
    let stripped = input.strip_suffix(".gz").unwrap_or(input);
    format!("{}.bin", stripped)
}

pub fn run_prep(matches: &ArgMatches) -> Result<()> {
    let gtf = matches
        .get_one::<String>("gtf")
        .expect("gtf path is required");
    let out = matches
        .get_one::<String>("output")
        .cloned()
        .unwrap_or_else(|| default_output_path(gtf));

    info!("parsing GTF: {}", gtf);
    let start = Instant::now();
    let index = GeneIndex::from_gtf(Path::new(gtf))
        .map_err(|e| anyhow::anyhow!("Failed to parse GTF: {}", e))?;
    info!(
        "  {} gene models parsed in {:.1}s",
        index.len(),
        start.elapsed().as_secs_f64()
    );

    info!("saving bincode: {}", out);
    let start = Instant::now();
    index
        .save_bin(Path::new(&out))
        .map_err(|e| anyhow::anyhow!("Failed to save bincode: {}", e))?;

    let size = std::fs::metadata(&out).map(|m| m.len()).unwrap_or(0);
    info!(
        "  wrote {} ({:.1} MB) in {:.1}s",
        out,
        size as f64 / 1_048_576.0,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
