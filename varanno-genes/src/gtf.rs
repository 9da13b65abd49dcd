use std::io::BufRead;
use std::path::Path;

use fxhash::FxHashMap;
use varanno_core::Strand;
use varanno_core::utils::{get_dynamic_reader, strip_chr_prefix};

use crate::errors::{GeneModelError, GeneModelResult};
use crate::gene::{Gene, is_translated_biotype};

/// Everything the GTF says about one transcript.
#[derive(Debug, Default)]
struct TranscriptRecord {
    gene_id: String,
    gene_name: String,
    biotype: String,
    transcript_id: String,
    chrom: String,
    strand: Strand,
    exons: Vec<(u64, u64)>,
    // (start, end, GTF frame)
    cds: Vec<(u64, u64, u8)>,
    stop_codons: Vec<(u64, u64)>,
    ensembl_canonical: bool,
    mane_select: bool,
}

impl TranscriptRecord {
    fn cds_length(&self) -> u64 {
        self.cds.iter().map(|(s, e, _)| e - s + 1).sum()
    }

    fn exonic_length(&self) -> u64 {
        self.exons.iter().map(|(s, e)| e - s + 1).sum()
    }

    fn coding_bounds(&self) -> Option<(u64, u64)> {
        if self.cds.is_empty() || !is_translated_biotype(&self.biotype) {
            return None;
        }
        let starts = self.cds.iter().map(|c| c.0).chain(self.stop_codons.iter().map(|c| c.0));
        let ends = self.cds.iter().map(|c| c.1).chain(self.stop_codons.iter().map(|c| c.1));
        Some((starts.min()?, ends.max()?))
    }

    ///
    /// Phase of an exon: position in its codon of the first coding base. GTF
    /// frames count the bases to skip before the next codon, so the two are
    /// complementary.
    ///
    fn exon_phase(&self, start: u64, end: u64) -> u8 {
        self.cds
            .iter()
            .find(|(cds_start, cds_end, _)| *cds_start >= start && *cds_end <= end)
            .map(|(_, _, frame)| (3 - frame % 3) % 3)
            .unwrap_or(0)
    }

    fn into_gene(self) -> GeneModelResult<Gene> {
        let coding = self.coding_bounds();
        let exons = self
            .exons
            .iter()
            .map(|&(start, end)| (start, end, self.exon_phase(start, end)))
            .collect();
        let gene = Gene::new(
            &self.gene_id,
            &self.transcript_id,
            &self.chrom,
            self.strand,
            exons,
            coding,
        )?;
        Ok(gene.with_symbol(&self.gene_name).with_biotype(&self.biotype))
    }
}

///
/// Iterate over the `key "value";` pairs of a GTF attribute column.
///
fn gtf_attributes(attrs: &str) -> impl Iterator<Item = (&str, &str)> {
    attrs.split(';').filter_map(|pair| {
        let (key, value) = pair.trim().split_once(' ')?;
        Some((key, value.trim().trim_matches('"')))
    })
}

fn parse_coordinate(value: &str, line: usize) -> GeneModelResult<u64> {
    value.parse::<u64>().map_err(|e| GeneModelError::GtfParse {
        line,
        msg: format!("bad coordinate '{}': {}", value, e),
    })
}

///
/// Rank of a transcript as the representative of its gene: Ensembl canonical
/// first, then MANE Select, then the longest CDS, then the longest transcript.
///
fn principal_rank(t: &TranscriptRecord) -> (bool, bool, u64, u64) {
    (t.ensembl_canonical, t.mane_select, t.cds_length(), t.exonic_length())
}

///
/// Load one [`Gene`] per gene from an Ensembl or GENCODE GTF (plain or
/// gzipped). Each gene is built from its principal transcript.
///
/// # Arguments
///
/// - path: path to the GTF file
///
pub fn load_gtf(path: &Path) -> GeneModelResult<Vec<Gene>> {
    let reader = get_dynamic_reader(path)?;

    let mut transcripts: Vec<TranscriptRecord> = Vec::new();
    let mut by_id: FxHashMap<String, usize> = FxHashMap::default();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_num = i + 1;
        if line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 9 {
            continue;
        }

        let feature_type = fields[2];
        if !matches!(feature_type, "transcript" | "exon" | "CDS" | "stop_codon") {
            continue;
        }

        let attrs = fields[8];
        let mut transcript_id = None;
        for (key, value) in gtf_attributes(attrs) {
            if key == "transcript_id" {
                transcript_id = Some(value);
                break;
            }
        }
        let Some(transcript_id) = transcript_id else {
            continue;
        };

        let start = parse_coordinate(fields[3], line_num)?;
        let end = parse_coordinate(fields[4], line_num)?;

        let index = match by_id.get(transcript_id) {
            Some(&index) => index,
            None => {
                let mut record = TranscriptRecord {
                    transcript_id: transcript_id.to_string(),
                    chrom: strip_chr_prefix(fields[0]).to_string(),
                    strand: Strand::from_char(fields[6].chars().next().unwrap_or('.')),
                    ..Default::default()
                };
                let mut gene_biotype = String::new();
                for (key, value) in gtf_attributes(attrs) {
                    match key {
                        "gene_id" => record.gene_id = value.to_string(),
                        "gene_name" => record.gene_name = value.to_string(),
                        "transcript_biotype" | "transcript_type" => {
                            record.biotype = value.to_string()
                        }
                        "gene_biotype" | "gene_type" => gene_biotype = value.to_string(),
                        _ => {}
                    }
                }
                if record.biotype.is_empty() {
                    record.biotype = gene_biotype;
                }
                transcripts.push(record);
                by_id.insert(transcript_id.to_string(), transcripts.len() - 1);
                transcripts.len() - 1
            }
        };

        let record = &mut transcripts[index];
        match feature_type {
            "transcript" => {
                for (key, value) in gtf_attributes(attrs) {
                    if key == "tag" {
                        match value {
                            "Ensembl_canonical" => record.ensembl_canonical = true,
                            "MANE_Select" => record.mane_select = true,
                            _ => {}
                        }
                    }
                }
            }
            "exon" => record.exons.push((start, end)),
            "CDS" => {
                let frame = fields[7].parse::<u8>().unwrap_or(0);
                record.cds.push((start, end, frame));
            }
            "stop_codon" => record.stop_codons.push((start, end)),
            _ => {}
        }
    }

    // pick the principal transcript of every gene, keeping file order
    let mut gene_order: Vec<String> = Vec::new();
    let mut best: FxHashMap<String, TranscriptRecord> = FxHashMap::default();
    for record in transcripts {
        if record.exons.is_empty() {
            tracing::debug!("transcript {} has no exons, skipped", record.transcript_id);
            continue;
        }
        let replace = match best.get(&record.gene_id) {
            Some(current) => principal_rank(current) < principal_rank(&record),
            None => {
                gene_order.push(record.gene_id.clone());
                true
            }
        };
        if replace {
            best.insert(record.gene_id.clone(), record);
        }
    }

    let mut genes = Vec::with_capacity(gene_order.len());
    for gene_id in gene_order {
        if let Some(record) = best.remove(&gene_id) {
            genes.push(record.into_gene()?);
        }
    }

    tracing::info!("loaded {} genes from {:?}", genes.len(), path);

    Ok(genes)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn test_gtf_attributes() {
        let attrs = r#"gene_id "ENSG1"; transcript_id "ENST1"; tag "basic"; tag "Ensembl_canonical";"#;
        let pairs: Vec<(&str, &str)> = gtf_attributes(attrs).collect();
        assert_eq!(
            pairs,
            vec![
                ("gene_id", "ENSG1"),
                ("transcript_id", "ENST1"),
                ("tag", "basic"),
                ("tag", "Ensembl_canonical"),
            ]
        );
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 2)]
    #[case(2, 1)]
    fn test_exon_phase_from_gtf_frame(#[case] frame: u8, #[case] expected: u8) {
        let record = TranscriptRecord {
            cds: vec![(100, 150, frame)],
            ..Default::default()
        };
        assert_eq!(record.exon_phase(90, 200), expected);
        assert_eq!(record.exon_phase(300, 400), 0);
    }

    #[rstest]
    fn test_principal_rank_order() {
        let canonical = TranscriptRecord {
            ensembl_canonical: true,
            exons: vec![(1, 10)],
            ..Default::default()
        };
        let long = TranscriptRecord {
            exons: vec![(1, 1000)],
            cds: vec![(1, 900, 0)],
            ..Default::default()
        };
        assert_eq!(principal_rank(&canonical) > principal_rank(&long), true);
    }
}
