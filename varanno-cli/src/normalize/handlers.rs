use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::ArgMatches;
use tracing::warn;

use varanno_annotate::{AlleleExpander, AnnotateError, PipelineConfig, RecordHeader, VcfRecord};
use varanno_core::Normalizer;
use varanno_core::utils::get_dynamic_reader_w_stdin;

const COLUMNS: [&str; 9] = [
    "chrom", "pos", "ref", "alt", "type", "length", "exists", "raw_pos", "raw_alt",
];

fn optional(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn run_normalize(matches: &ArgMatches) -> Result<()> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => PipelineConfig::try_from(Path::new(path))
            .with_context(|| format!("Failed to load configuration: {}", path))?,
        None => PipelineConfig::default(),
    };
    if let Some(sample) = matches.get_one::<String>("sample") {
        config.sample = Some(sample.clone());
    }

    let normalizer = Normalizer::new(config.normalization.into());

    if let Some(pos) = matches.get_one::<u64>("pos") {
        let reference = matches.get_one::<String>("ref").expect("ref is required");
        let alternate = matches.get_one::<String>("alt").expect("alt is required");
        let allele = normalizer.normalize(*pos, reference, alternate)?;
        println!("{}", COLUMNS[1..7].join("\t"));
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            allele.pos,
            allele.reference,
            allele.alternate,
            allele.variant_type.as_str(),
            optional(allele.length),
            allele.exists
        );
        return Ok(());
    }

    let input = matches
        .get_one::<String>("vcf")
        .expect("vcf path is required");
    let expander = AlleleExpander::new(normalizer, config.caller, config.sample.clone());
    let reader = get_dynamic_reader_w_stdin(input)?;
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    writeln!(out, "{}", COLUMNS.join("\t"))?;

    let mut header: Option<RecordHeader> = None;
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_num = i + 1;
        if line.starts_with("##") || line.trim().is_empty() {
            continue;
        }
        if RecordHeader::is_header_line(&line) {
            header = Some(RecordHeader::parse(line_num, &line)?);
            continue;
        }
        let header = header.as_ref().ok_or(AnnotateError::MissingHeader)?;

        let alleles = VcfRecord::parse(header, line_num, &line)
            .and_then(|record| Ok((expander.expand(header, &record)?, record)));
        let (alleles, record) = match alleles {
            Ok(result) => result,
            Err(e) if e.is_record_level() => {
                warn!("skipping record: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        for allele in alleles {
            let variant = &allele.variant;
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                variant.chrom,
                variant.pos,
                variant.reference,
                variant.alternate,
                variant.variant_type.as_str(),
                optional(variant.length),
                allele.exists,
                record.pos(header),
                allele.raw_alternate,
            )?;
        }
    }
    out.flush()?;

    Ok(())
}
