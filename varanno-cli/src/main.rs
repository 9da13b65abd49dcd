mod annotate;
mod config;
mod normalize;
mod prep;

use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use tracing_subscriber::EnvFilter;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const PKG_NAME: &str = "varanno";
    pub const BIN_NAME: &str = "varanno";
    pub const DEFAULT_LOG_FILTER: &str = "varanno=info";
    pub const VERBOSE_LOG_FILTER: &str = "varanno=debug";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .about("Normalize, annotate and score variant calls against gene models and external annotation tables.")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log per-record diagnostics"),
        )
        .subcommand(annotate::cli::create_annotate_cli())
        .subcommand(normalize::cli::create_normalize_cli())
        .subcommand(prep::cli::create_prep_cli())
        .subcommand(config::cli::create_config_cli())
}

/// `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let fallback = if verbose {
        consts::VERBOSE_LOG_FILTER
    } else {
        consts::DEFAULT_LOG_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let app = build_parser();
    let matches = app.get_matches();
    init_logging(matches.get_flag("verbose"));

    match matches.subcommand() {
        //
        // ANNOTATE
        //
        Some((annotate::cli::ANNOTATE_CMD, matches)) => {
            annotate::handlers::run_annotate(matches)?;
        }

        //
        // NORMALIZE
        //
        Some((normalize::cli::NORMALIZE_CMD, matches)) => {
            normalize::handlers::run_normalize(matches)?;
        }

        //
        // PREP
        //
        Some((prep::cli::PREP_CMD, matches)) => {
            prep::handlers::run_prep(matches)?;
        }

        //
        // CONFIG
        //
        Some((config::cli::CONFIG_CMD, matches)) => {
            config::handlers::run_config(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn test_parser_is_consistent() {
        build_parser().debug_assert();
    }

    #[rstest]
    fn test_annotate_arguments() {
        let matches = build_parser()
            .try_get_matches_from([
                "varanno", "annotate", "--vcf", "calls.vcf", "--genes", "genes.bin", "--format", "json", "-v",
            ])
            .unwrap();
        assert_eq!(matches.get_flag("verbose"), true);
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, annotate::cli::ANNOTATE_CMD);
        assert_eq!(sub.get_one::<String>("vcf").map(String::as_str), Some("calls.vcf"));
        assert_eq!(sub.get_one::<String>("format").map(String::as_str), Some("json"));
    }

    #[rstest]
    #[case(&["varanno", "normalize", "--pos", "10", "--ref", "CTTT", "--alt", "CTT"], true)]
    #[case(&["varanno", "normalize", "--vcf", "calls.vcf"], true)]
    #[case(&["varanno", "normalize", "--pos", "10", "--ref", "CTTT"], false)]
    #[case(&["varanno", "normalize"], false)]
    fn test_normalize_arguments(#[case] args: &[&str], #[case] valid: bool) {
        assert_eq!(build_parser().try_get_matches_from(args).is_ok(), valid);
    }

    #[rstest]
    fn test_subcommand_required() {
        assert_eq!(build_parser().try_get_matches_from(["varanno"]).is_err(), true);
    }
}
