use tracing::{debug, warn};

use varanno_core::Variant;
use varanno_genes::{Gene, LastLookupCache, Liftover};

use crate::config::PipelineConfig;
use crate::errors::AnnotateResult;
use crate::models::AnnotatedVariant;
use crate::record::MISSING;
use crate::sources::{
    AnnotationSource, CodeTables, RealignKeys, SourceDeclaration, SourceKeys, SourceRow, Strategy,
    TsvSource,
};

/// Liftover memo owned by one worker.
pub type WorkerLiftover<'l> = LastLookupCache<&'l (dyn Liftover + Send + Sync)>;

fn without_version(transcript_id: &str) -> &str {
    transcript_id.split('.').next().unwrap_or(transcript_id)
}

fn lists(values: Option<&str>, wanted: &str) -> bool {
    values.is_some_and(|values| values.split(';').any(|v| v.trim() == wanted))
}

/// A row either has no allele columns or names the same alleles.
fn matches_alleles(row: &SourceRow, keys: &SourceKeys, variant: &Variant) -> bool {
    let same = |column: &str, allele: &str| match row.get(column) {
        Some(value) => value.eq_ignore_ascii_case(allele),
        None => true,
    };
    same(&keys.reference, &variant.reference) && same(&keys.alternate, &variant.alternate)
}

fn lists_gene(row: &SourceRow, keys: &SourceKeys, gene: &Gene) -> bool {
    let by_symbol = keys
        .gene_symbol
        .as_deref()
        .is_some_and(|column| lists(row.get(column), &gene.symbol));
    let by_id = keys
        .gene_id
        .as_deref()
        .is_some_and(|column| lists(row.get(column), &gene.gene_id));
    by_symbol || by_id
}

///
/// Index, in the realigned columns, of the entry describing the same amino
/// acid change as transcript `transcript_index`. First entry when the list
/// has one entry or nothing matches.
///
fn realigned_index(realign: &RealignKeys, row: &SourceRow, transcript_index: usize) -> usize {
    let Some(list) = row.get(&realign.list) else {
        return 0;
    };
    if !list.contains(';') {
        return 0;
    }
    let expected = (|| {
        Some(format!(
            "{}{}{}",
            row.get(&realign.aaref)?,
            row.get(&realign.aapos)?.split(';').nth(transcript_index)?.trim(),
            row.get(&realign.aaalt)?
        ))
    })();
    expected
        .and_then(|expected| list.split(';').position(|entry| entry.trim() == expected))
        .unwrap_or(0)
}

///
/// Fills annotated variants from the declared annotation sources.
///
/// Sources are consulted in declaration order and a field is only written
/// while it is still empty, so the first source to provide a value wins.
/// Rows that are not found and cells that are missing leave fields empty.
///
pub struct CrossReferenceMerger {
    genome_build: String,
    codes: CodeTables,
    sources: Vec<Box<dyn AnnotationSource>>,
}

impl CrossReferenceMerger {
    pub fn new(genome_build: &str, codes: CodeTables) -> Self {
        CrossReferenceMerger {
            genome_build: genome_build.to_string(),
            codes,
            sources: Vec::new(),
        }
    }

    /// Open every source declared in `config`, in order.
    pub fn from_config(config: &PipelineConfig, codes: CodeTables) -> AnnotateResult<Self> {
        let mut merger = CrossReferenceMerger::new(&config.genome_build, codes);
        for declaration in &config.sources {
            merger
                .codes
                .check(declaration.columns.iter().filter_map(|c| c.codes.as_deref()))?;
            merger.push(Box::new(TsvSource::open(declaration.clone())?));
        }
        Ok(merger)
    }

    pub fn push(&mut self, source: Box<dyn AnnotationSource>) {
        self.sources.push(source);
    }

    pub fn sources(&self) -> impl Iterator<Item = &dyn AnnotationSource> {
        self.sources.iter().map(|s| s.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn needs_liftover(&self) -> bool {
        self.sources.iter().any(|s| {
            let declaration = s.declaration();
            declaration
                .build
                .as_deref()
                .is_some_and(|b| !b.eq_ignore_ascii_case(&self.genome_build))
        })
    }

    ///
    /// Merge every source into `target`. Returns the number of fields written.
    ///
    pub fn merge(
        &self,
        variant: &Variant,
        gene: Option<&Gene>,
        mut liftover: Option<&mut WorkerLiftover<'_>>,
        target: &mut AnnotatedVariant,
    ) -> usize {
        let mut written = 0;
        for source in &self.sources {
            written += self.merge_source(source.as_ref(), variant, gene, liftover.as_deref_mut(), target);
        }
        written
    }

    fn merge_source(
        &self,
        source: &dyn AnnotationSource,
        variant: &Variant,
        gene: Option<&Gene>,
        liftover: Option<&mut WorkerLiftover<'_>>,
        target: &mut AnnotatedVariant,
    ) -> usize {
        let declaration = source.declaration();
        if !declaration.covers(variant.variant_type.as_str()) {
            return 0;
        }

        let rows = self.find_rows(source, variant, gene, liftover);
        let Some(row) = rows.first() else {
            debug!(
                "no row in '{}' for {}:{} {}>{}",
                declaration.name, variant.chrom, variant.pos, variant.reference, variant.alternate
            );
            return 0;
        };
        if rows.len() > 1 && declaration.strategy != Strategy::Gene {
            debug!(
                "{} rows in '{}' for {}:{}, using the first",
                rows.len(),
                declaration.name,
                variant.chrom,
                variant.pos
            );
        }

        let transcript_index = match declaration.strategy {
            Strategy::TranscriptIndexed => self.transcript_index(declaration, row, variant, gene, target),
            _ => 0,
        };
        let realigned = declaration
            .realign
            .as_ref()
            .map(|realign| (realign, realigned_index(realign, row, transcript_index)));

        let mut written = 0;
        for mapping in &declaration.columns {
            if target.is_set(&mapping.field) {
                continue;
            }
            let Some(raw) = row.get(&mapping.column) else {
                continue;
            };
            let value = if mapping.per_transcript {
                let index = match realigned {
                    Some((realign, index)) if realign.columns.contains(&mapping.column) => index,
                    _ => transcript_index,
                };
                match raw.split(';').nth(index).map(str::trim) {
                    Some(value) => value,
                    None => {
                        debug!(
                            "'{}' in '{}' has no value for transcript {}",
                            mapping.column, declaration.name, index
                        );
                        continue;
                    }
                }
            } else {
                raw
            };
            if value.is_empty() || value == MISSING {
                continue;
            }
            let value = match &mapping.codes {
                Some(table) => match self.codes.translate(table, value) {
                    Some(label) => label,
                    None => continue,
                },
                None => value,
            };
            if target.set_raw(&mapping.field, value) {
                written += 1;
            }
        }

        for derived in &declaration.derived {
            if target.is_set(&derived.field) {
                continue;
            }
            let Some(score) = row.get(&derived.column).and_then(|v| v.parse::<f64>().ok()) else {
                continue;
            };
            let label = if score > derived.threshold {
                derived.above.as_str()
            } else {
                derived.otherwise.as_str()
            };
            if target.set(&derived.field, label) {
                written += 1;
            }
        }

        written
    }

    fn find_rows<'s>(
        &self,
        source: &'s dyn AnnotationSource,
        variant: &Variant,
        gene: Option<&Gene>,
        liftover: Option<&mut WorkerLiftover<'_>>,
    ) -> Vec<SourceRow<'s>> {
        let declaration = source.declaration();
        let keys = &declaration.keys;
        match declaration.strategy {
            Strategy::Gene => match gene {
                Some(gene) => source.by_gene(Some(&gene.symbol), Some(&gene.gene_id)),
                None => Vec::new(),
            },
            Strategy::Positional | Strategy::TranscriptIndexed => {
                let Some((build, chrom, pos)) = self.locate(declaration, variant, liftover) else {
                    return Vec::new();
                };
                let mut rows = source.by_position(build.as_deref(), &chrom, pos);
                rows.retain(|row| matches_alleles(row, keys, variant));
                let gene_keyed = keys.gene_symbol.is_some() || keys.gene_id.is_some();
                if let (Some(gene), true) = (gene, gene_keyed) {
                    rows.retain(|row| lists_gene(row, keys, gene));
                }
                rows
            }
        }
    }

    ///
    /// Where to look `variant` up in a positional source: the source's own
    /// columns for the analysis build when it has them, else the variant
    /// lifted to the source build, else the variant position itself.
    ///
    fn locate(
        &self,
        declaration: &SourceDeclaration,
        variant: &Variant,
        liftover: Option<&mut WorkerLiftover<'_>>,
    ) -> Option<(Option<String>, String, u64)> {
        if let Some(build) = declaration
            .keys
            .build_positions
            .keys()
            .find(|b| b.eq_ignore_ascii_case(&self.genome_build))
        {
            return Some((Some(build.clone()), variant.chrom.clone(), variant.pos));
        }

        match &declaration.build {
            Some(build) if !build.eq_ignore_ascii_case(&self.genome_build) => {
                let Some(liftover) = liftover else {
                    debug!(
                        "'{}' is on {} but no liftover is available",
                        declaration.name, build
                    );
                    return None;
                };
                match liftover.lift(&variant.chrom, variant.pos, &self.genome_build, build) {
                    Some((chrom, pos)) => Some((None, chrom, pos)),
                    None => {
                        debug!(
                            "{}:{} has no position on {}",
                            variant.chrom, variant.pos, build
                        );
                        None
                    }
                }
            }
            _ => Some((None, variant.chrom.clone(), variant.pos)),
        }
    }

    ///
    /// Position of the gene's principal transcript in the row's transcript
    /// list, else of the transcript flagged canonical, else 0.
    ///
    fn transcript_index(
        &self,
        declaration: &SourceDeclaration,
        row: &SourceRow,
        variant: &Variant,
        gene: Option<&Gene>,
        target: &AnnotatedVariant,
    ) -> usize {
        let keys = &declaration.keys;
        let wanted = gene
            .map(|g| without_version(&g.transcript_id).to_string())
            .or_else(|| target.text("transcript_ensembl").map(|t| without_version(t).to_string()));

        if let (Some(column), Some(wanted)) = (keys.transcripts.as_deref(), wanted.as_deref()) {
            if let Some(index) = row
                .get(column)
                .and_then(|list| list.split(';').position(|t| without_version(t.trim()) == wanted))
            {
                return index;
            }
            debug!(
                "transcript {} not listed by '{}' at {}:{}",
                wanted, declaration.name, variant.chrom, variant.pos
            );
        }

        if let Some(column) = keys.canonical_flag.as_deref() {
            if let Some(index) = row
                .get(column)
                .and_then(|flags| flags.split(';').position(|f| f.trim() == keys.canonical_value))
            {
                return index;
            }
        }

        warn!(
            "'{}' at {}:{}: no matching or canonical transcript{}, using the first one",
            declaration.name,
            variant.chrom,
            variant.pos,
            wanted.map(|w| format!(" for {}", w)).unwrap_or_default()
        );
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use rstest::*;

    use varanno_core::Strand;

    use crate::schema::AnalysisSchema;
    use crate::sources::{ColumnMapping, DerivedPrediction};

    const HEADER: &str = "chr\tpos\tref\talt\tgenename\tEnsembl_transcriptid\tVEP_canonical\t\
                          SIFT4G_score\tSIFT4G_pred\tCADD_phred\taaref\taaalt\taapos\t\
                          MutationTaster_AAE\tMutationTaster_pred\tada_score";

    fn mapping(column: &str, field: &str, codes: Option<&str>, per_transcript: bool) -> ColumnMapping {
        ColumnMapping {
            column: column.to_string(),
            field: field.to_string(),
            codes: codes.map(str::to_string),
            per_transcript,
        }
    }

    fn dbnsfp() -> SourceDeclaration {
        let mut keys = SourceKeys::default();
        keys.transcripts = Some("Ensembl_transcriptid".to_string());
        keys.canonical_flag = Some("VEP_canonical".to_string());
        keys.gene_symbol = Some("genename".to_string());
        SourceDeclaration {
            name: "dbnsfp".to_string(),
            path: PathBuf::from("unused"),
            strategy: Strategy::TranscriptIndexed,
            build: None,
            variant_types: vec!["SNV".to_string()],
            keys,
            columns: vec![
                mapping("SIFT4G_score", "sift4g_score", None, true),
                mapping("SIFT4G_pred", "sift4g_pred", Some("damaging_tolerated"), true),
                mapping("CADD_phred", "cadd_phred", None, false),
                mapping("MutationTaster_pred", "mutation_taster_pred", Some("mutation_taster"), true),
            ],
            derived: vec![DerivedPrediction {
                column: "ada_score".to_string(),
                field: "splicing_ada_pred".to_string(),
                threshold: 0.6,
                above: "AFFECTING_SPLICING".to_string(),
                otherwise: "SPLICING_UNAFFECTED".to_string(),
            }],
            realign: Some(RealignKeys {
                list: "MutationTaster_AAE".to_string(),
                aaref: "aaref".to_string(),
                aapos: "aapos".to_string(),
                aaalt: "aaalt".to_string(),
                columns: vec!["MutationTaster_pred".to_string()],
            }),
        }
    }

    fn source(rows: &[&str]) -> Box<dyn AnnotationSource> {
        let mut source = TsvSource::new(dbnsfp(), HEADER).unwrap();
        for (i, row) in rows.iter().enumerate() {
            source.push_row(i + 2, row);
        }
        Box::new(source)
    }

    fn gene(transcript: &str) -> Gene {
        Gene::new("G1", transcript, "1", Strand::Plus, vec![(50, 500, 0)], Some((60, 400)))
            .unwrap()
            .with_symbol("GENE1")
    }

    #[fixture]
    fn target() -> AnnotatedVariant {
        AnnotatedVariant::new(Arc::new(AnalysisSchema::embedded().unwrap()))
    }

    fn merger(sources: Vec<Box<dyn AnnotationSource>>) -> CrossReferenceMerger {
        let mut merger = CrossReferenceMerger::new("GRCh38", CodeTables::embedded().unwrap());
        for source in sources {
            merger.push(source);
        }
        merger
    }

    const ROW: &str = "1\t100\tA\tC\tGENE1\tT3;T1;T2\t.;.;YES\t0.3;0.01;0.2\tT;D;T\t25.1\t\
                       R\tS\t10;12;14\tR14S;R12S\tN;D\t0.9";

    #[rstest]
    fn test_transcript_indexed_values_follow_source_order(mut target: AnnotatedVariant) {
        let merger = merger(vec![source(&[ROW])]);
        let variant = Variant::new("1", 100, "A", "C").unwrap();

        let written = merger.merge(&variant, Some(&gene("T1.2")), None, &mut target);

        assert_eq!(written, 5);
        assert_eq!(target.double("sift4g_score"), Some(0.01));
        assert_eq!(target.text("sift4g_pred"), Some("DAMAGING"));
        assert_eq!(target.double("cadd_phred"), Some(25.1));
        // R12S is second in the MutationTaster list
        assert_eq!(target.text("mutation_taster_pred"), Some("DAMAGING"));
        assert_eq!(target.text("splicing_ada_pred"), Some("AFFECTING_SPLICING"));
    }

    #[rstest]
    fn test_canonical_flag_fallback(mut target: AnnotatedVariant) {
        let merger = merger(vec![source(&[ROW])]);
        let variant = Variant::new("1", 100, "A", "C").unwrap();

        merger.merge(&variant, Some(&gene("T9")), None, &mut target);
        assert_eq!(target.double("sift4g_score"), Some(0.2));
        // aapos 14 matches the first MutationTaster entry
        assert_eq!(target.text("mutation_taster_pred"), Some("TOLERATED"));
    }

    #[rstest]
    fn test_first_index_fallback(mut target: AnnotatedVariant) {
        let row = ROW.replace(".;.;YES", ".;.;.");
        let merger = merger(vec![source(&[row.as_str()])]);
        let variant = Variant::new("1", 100, "A", "C").unwrap();

        merger.merge(&variant, Some(&gene("T9")), None, &mut target);
        assert_eq!(target.double("sift4g_score"), Some(0.3));
    }

    #[rstest]
    fn test_rows_are_filtered(mut target: AnnotatedVariant) {
        let merger = merger(vec![source(&[ROW])]);

        // other alternate
        let other = Variant::new("1", 100, "A", "G").unwrap();
        assert_eq!(merger.merge(&other, Some(&gene("T1")), None, &mut target), 0);

        // other gene
        let variant = Variant::new("1", 100, "A", "C").unwrap();
        let mut other_gene = gene("T1");
        other_gene.symbol = "GENE2".to_string();
        other_gene.gene_id = "G2".to_string();
        assert_eq!(merger.merge(&variant, Some(&other_gene), None, &mut target), 0);

        // not covered
        let deletion = Variant::new("1", 100, "AC", "A").unwrap();
        assert_eq!(merger.merge(&deletion, Some(&gene("T1")), None, &mut target), 0);
        assert_eq!(target.is_set("cadd_phred"), false);
    }

    #[rstest]
    fn test_first_writer_wins(mut target: AnnotatedVariant) {
        let second = ROW.replace("25.1", "2.0");
        let merger = merger(vec![source(&[ROW]), source(&[second.as_str()])]);
        let variant = Variant::new("1", 100, "A", "C").unwrap();

        merger.merge(&variant, Some(&gene("T1")), None, &mut target);
        assert_eq!(target.double("cadd_phred"), Some(25.1));
    }

    struct Shift(u64);

    impl Liftover for Shift {
        fn lift(&self, chrom: &str, pos: u64, _from: &str, to: &str) -> Option<(String, u64)> {
            (to == "GRCh37").then(|| (chrom.to_string(), pos - self.0))
        }
    }

    #[rstest]
    fn test_other_build_uses_liftover(mut target: AnnotatedVariant) {
        let mut declaration = dbnsfp();
        declaration.build = Some("GRCh37".to_string());
        declaration.strategy = Strategy::Positional;
        let mut table = TsvSource::new(declaration, HEADER).unwrap();
        table.push_row(2, &ROW.replacen("100", "90", 1));
        let merger = merger(vec![Box::new(table)]);
        assert_eq!(merger.needs_liftover(), true);

        let variant = Variant::new("1", 100, "A", "C").unwrap();
        assert_eq!(merger.merge(&variant, Some(&gene("T1")), None, &mut target), 0);

        let shift = Shift(10);
        let mut liftover: WorkerLiftover = LastLookupCache::new(&shift as &(dyn Liftover + Send + Sync));
        merger.merge(&variant, Some(&gene("T1")), Some(&mut liftover), &mut target);
        assert_eq!(target.double("cadd_phred"), Some(25.1));
    }
}
