//! Fills the record-level slots of an [`AnnotatedVariant`]: the normalized
//! allele, the fixed columns, mapped `INFO`/`FORMAT` keys and the
//! caller-specific depth and genotype fields of the selected sample.

use tracing::debug;

use crate::errors::{AnnotateError, AnnotateResult};
use crate::expander::{ExpandedAllele, parse_zygosity};
use crate::models::AnnotatedVariant;
use crate::record::{MISSING, RecordHeader, VcfRecord};
use crate::schema::{AnalysisSchema, Section};

/// INFO key holding snpEff annotations, handled by the effect resolver.
pub const ANN_KEY: &str = "ANN";
/// Lifescope reference depth.
pub const REF_DEPTH_KEY: &str = "REF-DP";
/// Lifescope alternate depth.
pub const GAP_DEPTH_KEY: &str = "GAP-DP";

///
/// Sample sub-fields with dedicated decoding, as opposed to the ones mapped
/// through the schema.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRule {
    /// `DP`, `.` read as 0.
    ReadDepth,
    /// `AD`: reference depth then one depth per alternate.
    AllelicDepth,
    /// `RO`: reference observations (Torrent).
    RefObservations,
    /// `AO`: alternate observations, one per alternate (Torrent).
    AltObservations,
    /// `GT`
    Genotype,
    /// `PL`: three likelihoods per alternate.
    Likelihoods,
}

impl SampleRule {
    pub fn for_key(key: &str) -> Option<SampleRule> {
        match key {
            "DP" => Some(SampleRule::ReadDepth),
            "AD" => Some(SampleRule::AllelicDepth),
            "RO" => Some(SampleRule::RefObservations),
            "AO" => Some(SampleRule::AltObservations),
            "GT" => Some(SampleRule::Genotype),
            "PL" => Some(SampleRule::Likelihoods),
            _ => None,
        }
    }
}

fn parse_count(raw: &str) -> Option<i64> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!("unparsable count '{}'", raw);
            None
        }
    }
}

fn ratio(numerator: i64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator as f64 / denominator
    } else {
        0.0
    }
}

///
/// Depth fields collected while reading a record, written once at the end.
///
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Depths {
    pub read_depth: Option<i64>,
    pub ref_depth: Option<i64>,
    pub alt_depth: Option<i64>,
    pub ref_proportion: Option<f64>,
    pub alt_proportion: Option<f64>,
}

impl Depths {
    /// Proportions over the sum of both depths, once both are known.
    fn proportions_over_sum(&mut self) {
        if let (Some(reference), Some(alternate)) = (self.ref_depth, self.alt_depth) {
            let sum = (reference + alternate) as f64;
            self.ref_proportion = Some(ratio(reference, sum));
            self.alt_proportion = Some(ratio(alternate, sum));
        }
    }

    fn allelic_depth(&mut self, raw: &str, alt_index: usize, alternates: usize) {
        let values: Vec<&str> = raw.split(',').collect();
        let Some(reference) = parse_count(values[0]) else {
            return;
        };
        self.ref_depth = Some(reference);

        // some callers only report the first alternate, the others are
        // deduced from the total depth
        let alternate = match values.get(alt_index + 1) {
            Some(value) => parse_count(value),
            None => {
                let first = values.get(1).and_then(|v| parse_count(v)).unwrap_or(0);
                Some(self.read_depth.unwrap_or(0) - reference - first)
            }
        };
        self.alt_depth = alternate;

        let sum = if alternates > values.len() - 1 {
            self.read_depth.unwrap_or(1) as f64
        } else {
            values.iter().filter_map(|v| parse_count(v)).sum::<i64>() as f64
        };
        self.ref_proportion = Some(ratio(reference, sum));
        self.alt_proportion = Some(ratio(alternate.unwrap_or(0), sum));
    }

    fn observation_depth(&self) -> f64 {
        self.read_depth.unwrap_or(1).max(1) as f64
    }

    fn write(&self, target: &mut AnnotatedVariant) {
        target.set_opt("read_depth", self.read_depth);
        target.set_opt("allelic_depth_ref", self.ref_depth);
        target.set_opt("allelic_depth_alt", self.alt_depth);
        target.set_opt("allelic_depth_proportion_ref", self.ref_proportion);
        target.set_opt("allelic_depth_proportion_alt", self.alt_proportion);
    }
}

///
/// Declarative mapping from record columns to schema slots. Which slots a
/// column or sub-field fills, and how multi-value sub-fields fan out over
/// alternates, comes from the schema; keys it does not map are ignored.
///
#[derive(Debug, Clone, Copy)]
pub struct FieldExtractor;

impl FieldExtractor {
    pub fn new() -> Self {
        FieldExtractor
    }

    pub fn extract(
        &self,
        header: &RecordHeader,
        record: &VcfRecord,
        allele: &ExpandedAllele,
        target: &mut AnnotatedVariant,
    ) -> AnnotateResult<()> {
        self.set_variant(allele, target);
        self.set_fixed_columns(header, record, allele, target);

        let mut depths = Depths::default();
        self.set_info(header, record, allele, &mut depths, target);
        self.set_sample(header, record, allele, &mut depths, target)?;
        depths.write(target);

        Ok(())
    }

    fn set_variant(&self, allele: &ExpandedAllele, target: &mut AnnotatedVariant) {
        let variant = &allele.variant;
        target.set("chr", variant.chrom.as_str());
        target.set("pos", variant.pos as i64);
        target.set("reference", variant.reference.as_str());
        target.set("alternative", variant.alternate.as_str());
        target.set_opt("length", variant.length.map(|l| l as i64));
        target.set("variant_type", variant.variant_type.as_str());
        target.set_opt("sv_type", variant.sv_subtype.map(|s| s.as_str()));
        target.set("allele_num", allele.allele_num as i64);
        target.set_opt("sample", allele.sample.as_ref().map(|s| s.name.as_str()));
        target.exists = allele.exists;
        target.set("exist", allele.exists);
    }

    fn set_fixed_columns(
        &self,
        header: &RecordHeader,
        record: &VcfRecord,
        allele: &ExpandedAllele,
        target: &mut AnnotatedVariant,
    ) {
        let columns = [
            (Section::Id, record.id(header)),
            (Section::Qual, record.qual(header)),
            (Section::Filter, record.filter(header)),
        ];
        for (section, value) in columns {
            if let Some(value) = value {
                set_mapped(target, section, "", value, allele.alt_index);
            }
        }
    }

    fn set_info(
        &self,
        header: &RecordHeader,
        record: &VcfRecord,
        allele: &ExpandedAllele,
        depths: &mut Depths,
        target: &mut AnnotatedVariant,
    ) {
        for (key, value) in record.info_entries(header) {
            match (key, value) {
                (ANN_KEY, _) => {}
                (REF_DEPTH_KEY, Some(value)) => {
                    depths.ref_depth = parse_count(value);
                    depths.proportions_over_sum();
                }
                (GAP_DEPTH_KEY, Some(value)) => {
                    depths.alt_depth = parse_count(value);
                    depths.proportions_over_sum();
                }
                (key, Some(value)) => set_mapped(target, Section::Info, key, value, allele.alt_index),
                (flag, None) => set_mapped(target, Section::Info, flag, "true", allele.alt_index),
            }
        }
    }

    fn set_sample(
        &self,
        header: &RecordHeader,
        record: &VcfRecord,
        allele: &ExpandedAllele,
        depths: &mut Depths,
        target: &mut AnnotatedVariant,
    ) -> AnnotateResult<()> {
        let Some(sample) = &allele.sample else {
            return Ok(());
        };
        let entries = record.sample_entries(header, sample);
        let alt_index = allele.alt_index;

        // proportions of the other rules need the depth first
        if let Some((_, dp)) = entries.iter().find(|(key, _)| *key == "DP") {
            depths.read_depth = if *dp == MISSING { Some(0) } else { parse_count(dp) };
        }

        for (key, value) in entries {
            match SampleRule::for_key(key) {
                Some(SampleRule::ReadDepth) => {}
                Some(SampleRule::AllelicDepth) => {
                    if value.split(',').next() != Some(MISSING) {
                        depths.allelic_depth(value, alt_index, allele.allele_num - 1);
                    }
                }
                Some(SampleRule::RefObservations) => {
                    if value != MISSING {
                        depths.ref_depth = parse_count(value);
                        depths.ref_proportion =
                            depths.ref_depth.map(|d| ratio(d, depths.observation_depth()));
                    }
                }
                Some(SampleRule::AltObservations) => {
                    if value != MISSING {
                        let values: Vec<&str> = value.split(',').collect();
                        let Some(observed) = values.get(alt_index) else {
                            return Err(AnnotateError::AlleleIndexOutOfRange {
                                line: record.line,
                                index: alt_index,
                                alternates: values.len(),
                            });
                        };
                        depths.alt_depth = parse_count(observed);
                        depths.alt_proportion =
                            depths.alt_depth.map(|d| ratio(d, depths.observation_depth()));
                    }
                }
                Some(SampleRule::Genotype) => {
                    target.set_opt("zygosity", parse_zygosity(value).map(|z| z.as_str()));
                }
                Some(SampleRule::Likelihoods) => {
                    let values: Vec<&str> = value.split(',').collect();
                    let mut offset = alt_index * 3;
                    if offset >= values.len() {
                        offset = 0;
                    }
                    let names = [
                        "genotype_likelihood_hom_ref",
                        "genotype_likelihood_het",
                        "genotype_likelihood_hom_alt",
                    ];
                    for (i, name) in names.iter().enumerate() {
                        if let Some(raw) = values.get(offset + i) {
                            target.set_raw(name, raw);
                        }
                    }
                }
                None => set_mapped(target, Section::Format, key, value, alt_index),
            }
        }
        Ok(())
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn set_mapped(
    target: &mut AnnotatedVariant,
    section: Section,
    key: &str,
    value: &str,
    alt_index: usize,
) {
    let schema: &AnalysisSchema = target.schema();
    let slots: Vec<(usize, String)> = schema
        .mapped(section, key)
        .iter()
        .filter_map(|index| {
            let source = schema.field(*index)?.source.as_ref()?;
            Some((*index, source.fan_out.select(value, alt_index).to_string()))
        })
        .collect();
    for (index, raw) in slots {
        target.set_raw_at(index, &raw);
    }
}
