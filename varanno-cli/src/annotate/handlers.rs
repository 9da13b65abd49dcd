use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::ArgMatches;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use varanno_annotate::{Annotator, OutputFormat, PipelineConfig, SessionContext, open_writer};
use varanno_core::utils::get_dynamic_reader_w_stdin;
use varanno_genes::{ChainLiftover, FastaSequences, GeneIndex};

fn load_config(matches: &ArgMatches) -> Result<PipelineConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => PipelineConfig::try_from(Path::new(path))
            .with_context(|| format!("Failed to load configuration: {}", path))?,
        None => PipelineConfig::default(),
    };

    // command line wins over the file
    if let Some(sample) = matches.get_one::<String>("sample") {
        config.sample = Some(sample.clone());
    }
    if let Some(analysis) = matches.get_one::<String>("analysis") {
        config.analysis = Some(analysis.clone());
    }
    if let Some(threads) = matches.get_one::<usize>("threads") {
        config.threads = *threads;
    }
    if matches.get_flag("write-absent") {
        config.write_absent = true;
    }
    Ok(config)
}

pub fn run_annotate(matches: &ArgMatches) -> Result<()> {
    let input = matches
        .get_one::<String>("vcf")
        .expect("vcf path is required");
    let format: OutputFormat = matches
        .get_one::<String>("format")
        .map(|f| f.parse())
        .transpose()?
        .unwrap_or_default();
    let config = load_config(matches)?;

    let session = SessionContext::new(
        config.analysis.clone(),
        matches.get_one::<String>("user").cloned(),
    );
    let mut annotator = Annotator::from_config(&config, session)?;

    if let Some(genes) = matches.get_one::<String>("genes") {
        let start = Instant::now();
        let index = GeneIndex::load(Path::new(genes))
            .with_context(|| format!("Failed to load gene models: {}", genes))?;
        info!(
            "loaded {} gene models from {} in {:.1}s",
            index.len(),
            genes,
            start.elapsed().as_secs_f64()
        );
        annotator = annotator.with_genes(index);
    }

    if let Some(fasta) = matches.get_one::<String>("fasta") {
        let sequences = FastaSequences::from_fasta(Path::new(fasta))
            .with_context(|| format!("Failed to load reference: {}", fasta))?;
        info!("loaded {} reference contigs from {}", sequences.len(), fasta);
        annotator = annotator.with_sequences(sequences);
    }

    if let Some(chain) = matches.get_one::<String>("chain") {
        let from = matches
            .get_one::<String>("chain-from")
            .cloned()
            .unwrap_or_else(|| config.genome_build.clone());
        let to = matches
            .get_one::<String>("chain-to")
            .context("--chain-to is needed with --chain")?;
        let liftover = ChainLiftover::from_file(Path::new(chain), &from, to)
            .with_context(|| format!("Failed to load chain file: {}", chain))?;
        annotator = annotator.with_liftover(liftover);
    } else if annotator.merger().needs_liftover() {
        anyhow::bail!("An annotation source uses another genome build; provide --chain");
    }

    let output = matches.get_one::<String>("output").map(Path::new);
    let mut writer = open_writer(output, format, annotator.schema())?;
    let reader = get_dynamic_reader_w_stdin(input)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let summary = annotator.run(reader, writer.as_mut(), |summary| {
        pb.set_message(format!(
            "{} records, {} variants",
            summary.records, summary.variants
        ));
    })?;

    pb.finish_with_message(format!(
        "{} records, {} variants, {} absent alleles, {} failed records",
        summary.records, summary.variants, summary.absent, summary.failed
    ));

    Ok(())
}
