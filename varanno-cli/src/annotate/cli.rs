use clap::{Arg, ArgAction, Command, value_parser};

pub const ANNOTATE_CMD: &str = "annotate";
pub const DEFAULT_FORMAT: &str = "tsv";

pub fn create_annotate_cli() -> Command {
    Command::new(ANNOTATE_CMD)
        .about("Annotate a VCF: one output row per alternate allele and overlapping gene.")
        .arg(
            Arg::new("vcf")
                .long("vcf")
                .required(true)
                .help("Call file (VCF or VCF.gz), '-' for stdin"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Pipeline configuration (TOML or YAML); defaults apply when omitted"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Output path, gzipped when it ends in .gz (default: stdout)"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .default_value(DEFAULT_FORMAT)
                .help("Output format: tsv or json (one object per line)"),
        )
        .arg(
            Arg::new("genes")
                .long("genes")
                .short('g')
                .help("Gene models: a GTF/GTF.gz or a .bin written by `varanno prep`"),
        )
        .arg(
            Arg::new("fasta")
                .long("fasta")
                .help("Reference genome FASTA, enables codon and amino acid fields"),
        )
        .arg(
            Arg::new("chain")
                .long("chain")
                .help("UCSC chain file used to lift positions for sources of another build"),
        )
        .arg(
            Arg::new("chain-from")
                .long("chain-from")
                .requires("chain")
                .help("Build the chain file lifts from (default: the analysis build)"),
        )
        .arg(
            Arg::new("chain-to")
                .long("chain-to")
                .requires("chain")
                .help("Build the chain file lifts to"),
        )
        .arg(Arg::new("sample").long("sample").help("Sample column to read genotypes from"))
        .arg(Arg::new("analysis").long("analysis").help("Analysis name stamped on every row"))
        .arg(Arg::new("user").long("user").help("User stamped on every row"))
        .arg(
            Arg::new("threads")
                .long("threads")
                .short('t')
                .value_parser(value_parser!(usize))
                .help("Worker threads (default: from config, 0 for one per core)"),
        )
        .arg(
            Arg::new("write-absent")
                .long("write-absent")
                .action(ArgAction::SetTrue)
                .help("Also write alleles the sample does not carry"),
        )
}
