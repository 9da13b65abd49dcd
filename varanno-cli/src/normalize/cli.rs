use clap::{Arg, ArgGroup, Command, value_parser};

pub const NORMALIZE_CMD: &str = "normalize";

pub fn create_normalize_cli() -> Command {
    Command::new(NORMALIZE_CMD)
        .about("Print the canonical form of one allele, or of every alternate allele of a VCF.")
        .arg(
            Arg::new("pos")
                .long("pos")
                .value_parser(value_parser!(u64))
                .requires_all(["ref", "alt"])
                .help("1-based position of the allele"),
        )
        .arg(Arg::new("ref").long("ref").requires("pos").help("Reference allele"))
        .arg(Arg::new("alt").long("alt").requires("pos").help("Alternate allele"))
        .arg(
            Arg::new("vcf")
                .long("vcf")
                .help("Call file (VCF or VCF.gz), '-' for stdin"),
        )
        .group(
            ArgGroup::new("input")
                .args(["pos", "vcf"])
                .required(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Pipeline configuration, for the caller, sample and indel limits"),
        )
        .arg(Arg::new("sample").long("sample").help("Sample column to read genotypes from"))
}
