use std::path::Path;

use anyhow::{Context, Result};
use clap::ArgMatches;

use varanno_annotate::{AnalysisSchema, Annotator, PipelineConfig, SessionContext};

pub fn run_config(matches: &ArgMatches) -> Result<()> {
    if matches.get_flag("schema") {
        println!("{}", PipelineConfig::json_schema()?);
        return Ok(());
    }
    if matches.get_flag("fields") {
        print!("{}", AnalysisSchema::embedded()?.to_toml_string()?);
        return Ok(());
    }

    match matches.get_one::<String>("check") {
        Some(path) => {
            let config = PipelineConfig::try_from(Path::new(path))
                .with_context(|| format!("Failed to load configuration: {}", path))?;
            let annotator = Annotator::from_config(&config, SessionContext::default())?;
            println!(
                "{}: {} schema fields, {} annotation sources, build {}",
                path,
                annotator.schema().len(),
                annotator.merger().sources().count(),
                config.genome_build
            );
        }
        None => {
            let config = PipelineConfig::default();
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
