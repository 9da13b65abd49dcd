//! Splits one call record into one working allele per alternate.

use std::fmt::{self, Display};

use tracing::debug;

use varanno_core::{Normalizer, Variant, VariantType};

use crate::config::Caller;
use crate::errors::{AnnotateError, AnnotateResult};
use crate::record::{MISSING, RecordHeader, SampleColumn, VcfRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zygosity {
    Homozygous,
    Heterozygous,
    Reference,
}

impl Zygosity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Zygosity::Homozygous => "Homozygous",
            Zygosity::Heterozygous => "Heterozygous",
            Zygosity::Reference => "Reference",
        }
    }
}

impl Display for Zygosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Allele calls of a genotype: `0/1`, `1|2` and haploid `1` alike.
fn genotype_calls(genotype: &str) -> Vec<&str> {
    if genotype.contains('/') {
        genotype.split('/').collect()
    } else if genotype.contains('|') {
        genotype.split('|').collect()
    } else {
        vec![genotype]
    }
}

///
/// Whether `genotype` carries the alternate at `alt_index` (0-based). An
/// uncalled allele (`.`) anywhere in the genotype means it does not.
///
pub fn is_alt_in_genotype(genotype: &str, alt_index: usize) -> bool {
    let calls = genotype_calls(genotype);
    if calls.iter().any(|c| *c == MISSING) {
        return false;
    }
    calls.iter().any(|call| match call.trim().parse::<usize>() {
        Ok(allele) => allele > 0 && allele == alt_index + 1,
        Err(_) => {
            debug!("unparsable genotype '{}'", genotype);
            false
        }
    })
}

///
/// Zygosity of a genotype; `None` when any allele is uncalled.
///
pub fn parse_zygosity(genotype: &str) -> Option<Zygosity> {
    let calls = genotype_calls(genotype);
    if calls.iter().any(|c| *c == MISSING) {
        return None;
    }
    let first = calls[0];
    let homozygous = calls.iter().all(|c| *c == first);
    match (homozygous, first) {
        (true, "0") => Some(Zygosity::Reference),
        (true, _) => Some(Zygosity::Homozygous),
        (false, _) => Some(Zygosity::Heterozygous),
    }
}

///
/// One alternate of a record, normalized, with its existence for the
/// selected sample.
///
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedAllele {
    /// 0-based index of the alternate in the record.
    pub alt_index: usize,
    /// Number of alleles at the site, reference included.
    pub allele_num: usize,
    pub raw_alternate: String,
    pub variant: Variant,
    pub exists: bool,
    pub sample: Option<SampleColumn>,
}

#[derive(Debug, Clone)]
pub struct AlleleExpander {
    normalizer: Normalizer,
    caller: Caller,
    sample: Option<String>,
}

impl AlleleExpander {
    pub fn new(normalizer: Normalizer, caller: Caller, sample: Option<String>) -> Self {
        AlleleExpander {
            normalizer,
            caller,
            sample,
        }
    }

    pub fn caller(&self) -> Caller {
        self.caller
    }

    pub fn select_sample<'h>(&self, header: &'h RecordHeader) -> Option<&'h SampleColumn> {
        header.select_sample(self.sample.as_deref(), self.caller)
    }

    /// Every alternate of `record`, in record order.
    pub fn expand(
        &self,
        header: &RecordHeader,
        record: &VcfRecord,
    ) -> AnnotateResult<Vec<ExpandedAllele>> {
        let count = record.alternates(header).len();
        (0..count)
            .map(|alt_index| self.expand_allele(header, record, alt_index))
            .collect()
    }

    pub fn expand_allele(
        &self,
        header: &RecordHeader,
        record: &VcfRecord,
        alt_index: usize,
    ) -> AnnotateResult<ExpandedAllele> {
        let alternates = record.alternates(header);
        let Some(raw_alternate) = alternates.get(alt_index) else {
            return Err(AnnotateError::AlleleIndexOutOfRange {
                line: record.line,
                index: alt_index,
                alternates: alternates.len(),
            });
        };

        let normalized = self
            .normalizer
            .normalize(record.pos(header), record.reference(header), raw_alternate)
            .map_err(|e| AnnotateError::MalformedRecord {
                line: record.line,
                msg: e.to_string(),
            })?;
        let mut exists = normalized.exists;
        let chrom = varanno_core::utils::strip_chr_prefix(record.chrom(header));
        let mut variant = Variant::from_normalized(chrom, normalized);
        if variant.variant_type == VariantType::Sv {
            if let Some(length) = sv_length(header, record, alt_index) {
                variant = variant.with_sv_length(length);
            }
        }

        let sample = self.select_sample(header).cloned();
        if let Some(sample) = &sample {
            exists &= sample_carries_allele(header, record, sample, alt_index);
        }

        Ok(ExpandedAllele {
            alt_index,
            allele_num: alternates.len() + 1,
            raw_alternate: raw_alternate.to_string(),
            variant,
            exists,
            sample,
        })
    }
}

///
/// Length of a symbolic structural variant: `|SVLEN|` for this alternate,
/// else `END - POS`.
///
fn sv_length(header: &RecordHeader, record: &VcfRecord, alt_index: usize) -> Option<u64> {
    if let Some(svlen) = record.info_value(header, "SVLEN") {
        let values: Vec<&str> = svlen.split(',').collect();
        let value = values.get(alt_index).unwrap_or(&values[0]);
        if let Ok(length) = value.trim().parse::<i64>() {
            return Some(length.unsigned_abs());
        }
    }
    let end: u64 = record.info_value(header, "END")?.trim().parse().ok()?;
    end.checked_sub(record.pos(header))
}

fn sample_carries_allele(
    header: &RecordHeader,
    record: &VcfRecord,
    sample: &SampleColumn,
    alt_index: usize,
) -> bool {
    record
        .sample_entries(header, sample)
        .into_iter()
        .all(|(key, value)| match key {
            "GT" => is_alt_in_genotype(value, alt_index),
            "AD" => value.split(',').next() != Some(MISSING),
            "RO" | "AO" => value != MISSING,
            _ => true,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    use varanno_core::{NormalizeLimits, StructuralSubtype};

    const HEADER: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSample";

    #[fixture]
    fn header() -> RecordHeader {
        RecordHeader::parse(1, HEADER).unwrap()
    }

    #[fixture]
    fn expander() -> AlleleExpander {
        AlleleExpander::new(Normalizer::new(NormalizeLimits::default()), Caller::Generic, None)
    }

    #[rstest]
    #[case("0/1", 0, true)]
    #[case("0/1", 1, false)]
    #[case("1|2", 1, true)]
    #[case("./1", 0, false)]
    #[case("1", 0, true)]
    #[case("0", 0, false)]
    #[case(".", 0, false)]
    #[case("2", 0, false)]
    #[case("0/0", 0, false)]
    fn test_is_alt_in_genotype(#[case] genotype: &str, #[case] alt_index: usize, #[case] expected: bool) {
        assert_eq!(is_alt_in_genotype(genotype, alt_index), expected);
    }

    #[rstest]
    #[case("0/0", Some(Zygosity::Reference))]
    #[case("1/1", Some(Zygosity::Homozygous))]
    #[case("0|1", Some(Zygosity::Heterozygous))]
    #[case("1/2", Some(Zygosity::Heterozygous))]
    #[case("0", Some(Zygosity::Reference))]
    #[case("2", Some(Zygosity::Homozygous))]
    #[case("./.", None)]
    fn test_parse_zygosity(#[case] genotype: &str, #[case] expected: Option<Zygosity>) {
        assert_eq!(parse_zygosity(genotype), expected);
    }

    #[rstest]
    fn test_three_alternates_with_genotype_1_2(header: RecordHeader, expander: AlleleExpander) {
        let line = "chr1\t1000\t.\tA\tC,G,T\t50\tPASS\t.\tGT:AD\t1/2:2,5,6,0";
        let record = VcfRecord::parse(&header, 2, line).unwrap();
        let alleles = expander.expand(&header, &record).unwrap();

        let exists: Vec<bool> = alleles.iter().map(|a| a.exists).collect();
        assert_eq!(exists, vec![true, true, false]);
        assert_eq!(alleles.iter().all(|a| a.allele_num == 4), true);
        assert_eq!(alleles[1].variant.alternate, "G");
        assert_eq!(alleles[0].variant.chrom, "1");
    }

    #[rstest]
    fn test_missing_depth_marks_allele_absent(header: RecordHeader, expander: AlleleExpander) {
        let line = "1\t1000\t.\tA\tC\t50\tPASS\t.\tGT:AD\t0/1:.";
        let record = VcfRecord::parse(&header, 2, line).unwrap();
        assert_eq!(expander.expand(&header, &record).unwrap()[0].exists, false);

        let line = "1\t1000\t.\tA\tC\t50\tPASS\t.\tGT:RO:AO\t0/1:3:.";
        let record = VcfRecord::parse(&header, 3, line).unwrap();
        assert_eq!(expander.expand(&header, &record).unwrap()[0].exists, false);
    }

    #[rstest]
    fn test_spanning_deletion_does_not_exist(header: RecordHeader, expander: AlleleExpander) {
        let line = "1\t1000\t.\tA\tC,*\t50\tPASS\t.\tGT\t1/2";
        let record = VcfRecord::parse(&header, 2, line).unwrap();
        let alleles = expander.expand(&header, &record).unwrap();
        assert_eq!(alleles[0].exists, true);
        assert_eq!(alleles[1].exists, false);
    }

    #[rstest]
    fn test_symbolic_length_from_info(header: RecordHeader, expander: AlleleExpander) {
        let line = "1\t1000\t.\tN\t<DEL>,<DUP>\t50\tPASS\tSVLEN=-250,400;END=1250\tGT\t1/2";
        let record = VcfRecord::parse(&header, 2, line).unwrap();
        let alleles = expander.expand(&header, &record).unwrap();
        assert_eq!(alleles[0].variant.length, Some(250));
        assert_eq!(alleles[1].variant.length, Some(400));
        assert_eq!(alleles[1].variant.sv_subtype, Some(StructuralSubtype::Dup));

        let line = "1\t1000\t.\tN\t<INV>\t50\tPASS\tEND=1300\tGT\t0/1";
        let record = VcfRecord::parse(&header, 3, line).unwrap();
        assert_eq!(expander.expand(&header, &record).unwrap()[0].variant.length, Some(300));
    }

    #[rstest]
    fn test_allele_index_out_of_range(header: RecordHeader, expander: AlleleExpander) {
        let line = "1\t1000\t.\tA\tC\t50\tPASS\t.\tGT\t0/1";
        let record = VcfRecord::parse(&header, 9, line).unwrap();
        let result = expander.expand_allele(&header, &record, 1);
        assert_eq!(
            matches!(result, Err(AnnotateError::AlleleIndexOutOfRange { line: 9, index: 1, alternates: 1 })),
            true
        );
    }
}
