//! The annotation pipeline.
//!
//! For every record: expand and normalize its alternates, extract record
//! fields, then for every gene the allele overlaps pick the canonical
//! effect, merge the annotation sources and score the result. Records are
//! processed in parallel batches; output keeps input order.

use std::io::BufRead;
use std::sync::Arc;

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use varanno_core::{Normalizer, Strand, Variant};
use varanno_genes::codon::reverse_complement;
use varanno_genes::gene::UNTRANSLATED;
use varanno_genes::{Gene, GeneIndex, LastLookupCache, Liftover, SequenceProvider};

use crate::config::PipelineConfig;
use crate::consensus::ConsensusScorer;
use crate::effects::{EffectCatalog, EffectResolver, TranscriptEffect, attribute_to_allele, parse_ann};
use crate::errors::{AnnotateError, AnnotateResult};
use crate::expander::{AlleleExpander, ExpandedAllele};
use crate::extractor::{ANN_KEY, FieldExtractor};
use crate::models::AnnotatedVariant;
use crate::record::{RecordHeader, VcfRecord};
use crate::schema::AnalysisSchema;
use crate::session::SessionContext;
use crate::sources::{CodeTables, CrossReferenceMerger, WorkerLiftover};
use crate::writer::VariantWriter;

/// Variants produced from one record.
#[derive(Debug, Default)]
pub struct RecordOutcome {
    pub variants: Vec<AnnotatedVariant>,
    /// Alleles the selected sample does not carry, left out.
    pub absent: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    pub variants: usize,
    pub absent: usize,
    pub failed: usize,
}

fn without_version(transcript_id: &str) -> &str {
    transcript_id.split('.').next().unwrap_or(transcript_id)
}

pub struct Annotator {
    schema: Arc<AnalysisSchema>,
    catalog: Arc<EffectCatalog>,
    expander: AlleleExpander,
    extractor: FieldExtractor,
    resolver: EffectResolver,
    merger: CrossReferenceMerger,
    scorer: ConsensusScorer,
    session: SessionContext,
    genes: Option<GeneIndex>,
    sequences: Option<Box<dyn SequenceProvider>>,
    liftover: Option<Box<dyn Liftover + Send + Sync>>,
    threads: usize,
    batch_size: usize,
    write_absent: bool,
}

impl Annotator {
    ///
    /// Build an annotator from a configuration: load the schema, effect
    /// catalog and code tables (embedded ones unless the config names files)
    /// and open every declared annotation source.
    ///
    pub fn from_config(config: &PipelineConfig, session: SessionContext) -> AnnotateResult<Self> {
        let schema = match &config.schema {
            Some(path) => AnalysisSchema::try_from(path.as_path())?,
            None => AnalysisSchema::embedded()?,
        };
        let catalog = match &config.effects {
            Some(path) => EffectCatalog::try_from(path.as_path())?,
            None => EffectCatalog::embedded()?,
        };
        let codes = match &config.codes {
            Some(path) => CodeTables::try_from(path.as_path())?,
            None => CodeTables::embedded()?,
        };
        let schema = Arc::new(schema);
        let catalog = Arc::new(catalog);

        let normalizer = Normalizer::new(config.normalization.into());
        let merger = CrossReferenceMerger::from_config(config, codes)?;
        let scorer = ConsensusScorer::new(config.consensus.clone(), catalog.clone(), &schema);

        info!(
            "analysis schema '{}' with {} fields, {} effect categories, {} annotation sources",
            schema.name(),
            schema.len(),
            catalog.len(),
            config.sources.len()
        );

        Ok(Annotator {
            schema,
            catalog,
            expander: AlleleExpander::new(normalizer, config.caller, config.sample.clone()),
            extractor: FieldExtractor::new(),
            resolver: EffectResolver::new(),
            merger,
            scorer,
            session,
            genes: None,
            sequences: None,
            liftover: None,
            threads: config.threads,
            batch_size: config.batch_size,
            write_absent: config.write_absent,
        })
    }

    pub fn with_genes(mut self, genes: GeneIndex) -> Self {
        self.genes = Some(genes);
        self
    }

    pub fn with_sequences(mut self, sequences: impl SequenceProvider + 'static) -> Self {
        self.sequences = Some(Box::new(sequences));
        self
    }

    pub fn with_liftover(mut self, liftover: impl Liftover + Send + Sync + 'static) -> Self {
        self.liftover = Some(Box::new(liftover));
        self
    }

    pub fn schema(&self) -> &Arc<AnalysisSchema> {
        &self.schema
    }

    pub fn merger(&self) -> &CrossReferenceMerger {
        &self.merger
    }

    fn worker_liftover(&self) -> Option<WorkerLiftover<'_>> {
        self.liftover.as_deref().map(LastLookupCache::new)
    }

    ///
    /// Annotate one record line. Errors only concern this record.
    ///
    pub fn annotate_record(
        &self,
        header: &RecordHeader,
        line_num: usize,
        line: &str,
        mut liftover: Option<&mut WorkerLiftover<'_>>,
    ) -> AnnotateResult<RecordOutcome> {
        let record = VcfRecord::parse(header, line_num, line)?;
        let alleles = self.expander.expand(header, &record)?;
        let effects = record
            .info_value(header, ANN_KEY)
            .map(|value| parse_ann(value, &self.catalog))
            .unwrap_or_default();

        let mut outcome = RecordOutcome::default();
        for allele in &alleles {
            if !allele.exists {
                outcome.absent += 1;
                if !self.write_absent {
                    continue;
                }
            }
            let attributed: Vec<TranscriptEffect> = effects
                .iter()
                .filter(|e| attribute_to_allele(e, allele))
                .cloned()
                .collect();

            let mut base = AnnotatedVariant::new(self.schema.clone());
            self.session.stamp(&mut base);
            self.extractor.extract(header, &record, allele, &mut base)?;

            let genes = self.overlapping_genes(&allele.variant);
            base.set("num_genes", genes.len() as i32);
            if genes.is_empty() {
                outcome.variants.push(self.annotate_gene(
                    base,
                    allele,
                    &attributed,
                    None,
                    liftover.as_deref_mut(),
                ));
            } else {
                for gene in genes {
                    outcome.variants.push(self.annotate_gene(
                        base.clone(),
                        allele,
                        &attributed,
                        Some(gene),
                        liftover.as_deref_mut(),
                    ));
                }
            }
        }
        Ok(outcome)
    }

    fn overlapping_genes(&self, variant: &Variant) -> Vec<&Gene> {
        match &self.genes {
            Some(index) => index.overlapping(
                &variant.chrom,
                variant.pos,
                variant.pos + variant.affected_reference_length(),
            ),
            None => Vec::new(),
        }
    }

    fn annotate_gene(
        &self,
        mut target: AnnotatedVariant,
        allele: &ExpandedAllele,
        effects: &[TranscriptEffect],
        gene: Option<&Gene>,
        liftover: Option<&mut WorkerLiftover<'_>>,
    ) -> AnnotatedVariant {
        if let Some(gene) = gene {
            target.set("gene_symbol", gene.symbol.as_str());
            target.set("gene_ensembl", gene.gene_id.as_str());
            target.set("transcript_ensembl", without_version(&gene.transcript_id));
            target.set_opt("transcript_refseq_mrna", gene.refseq_transcript.as_deref());
            if !gene.biotype.is_empty() {
                target.set("biotype", gene.biotype.as_str());
            }
            self.set_codons(&allele.variant, gene, &mut target);
        }
        self.resolver.apply(effects, gene, &mut target);
        self.merger.merge(&allele.variant, gene, liftover, &mut target);
        self.scorer.apply(&mut target, gene);
        target
    }

    ///
    /// Reference and alternative codon and amino acid of a coding variant,
    /// in transcript orientation.
    ///
    fn set_codons(&self, variant: &Variant, gene: &Gene, target: &mut AnnotatedVariant) {
        let Some(sequences) = self.sequences.as_deref() else {
            return;
        };
        let pos = variant.alternative_position();
        if variant.is_structural() || !gene.is_in_cds(pos) {
            return;
        }
        let oriented = |codon: String| match gene.strand {
            Strand::Plus => codon,
            Strand::Minus => reverse_complement(&codon),
        };

        if let Some(codon) = gene.codon_sequence(pos, sequences) {
            target.set("reference_codon", oriented(codon));
        }
        if let Some(codon) = gene.codon_sequence_with(pos, variant, sequences) {
            target.set("alternative_codon", oriented(codon));
        }
        let reference = gene.amino_acid(pos, sequences);
        if reference != UNTRANSLATED {
            target.set("reference_amino_acid", reference);
        }
        let alternative = gene.amino_acid_with(pos, variant, sequences);
        if alternative != UNTRANSLATED {
            target.set("alternative_amino_acid", alternative);
        }
    }

    ///
    /// Annotate a whole call file. Records failing on their own are logged
    /// and counted; I/O and header problems stop the run.
    ///
    /// `progress` is called after every batch with the running totals.
    ///
    pub fn run<R: BufRead>(
        &self,
        reader: R,
        writer: &mut dyn VariantWriter,
        mut progress: impl FnMut(&RunSummary),
    ) -> AnnotateResult<RunSummary> {
        let pool = ThreadPoolBuilder::new().num_threads(self.threads).build()?;
        let mut summary = RunSummary::default();
        let mut header: Option<RecordHeader> = None;
        let mut batch: Vec<(usize, String)> = Vec::with_capacity(self.batch_size);

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line_num = i + 1;
            if line.starts_with("##") || line.trim().is_empty() {
                continue;
            }
            if RecordHeader::is_header_line(&line) {
                header = Some(RecordHeader::parse(line_num, &line)?);
                debug!("record header at line {}", line_num);
                continue;
            }
            if header.is_none() {
                return Err(AnnotateError::MissingHeader);
            }

            batch.push((line_num, line));
            if batch.len() >= self.batch_size {
                if let Some(header) = &header {
                    self.run_batch(&pool, header, &batch, writer, &mut summary)?;
                }
                batch.clear();
                progress(&summary);
            }
        }
        if let (Some(header), false) = (&header, batch.is_empty()) {
            self.run_batch(&pool, header, &batch, writer, &mut summary)?;
            progress(&summary);
        }

        writer.finish()?;
        info!(
            "{} records, {} annotated variants, {} absent alleles, {} failed records",
            summary.records, summary.variants, summary.absent, summary.failed
        );
        Ok(summary)
    }

    fn run_batch(
        &self,
        pool: &rayon::ThreadPool,
        header: &RecordHeader,
        batch: &[(usize, String)],
        writer: &mut dyn VariantWriter,
        summary: &mut RunSummary,
    ) -> AnnotateResult<()> {
        let results: Vec<AnnotateResult<RecordOutcome>> = pool.install(|| {
            batch
                .par_iter()
                .map_init(
                    || self.worker_liftover(),
                    |liftover, (line_num, line)| {
                        self.annotate_record(header, *line_num, line, liftover.as_mut())
                    },
                )
                .collect()
        });

        for result in results {
            summary.records += 1;
            match result {
                Ok(outcome) => {
                    summary.absent += outcome.absent;
                    for variant in &outcome.variants {
                        writer.write_variant(variant)?;
                    }
                    summary.variants += outcome.variants.len();
                }
                Err(e) if e.is_record_level() => {
                    warn!("skipping record: {}", e);
                    summary.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    use crate::writer::JsonLinesWriter;

    const HEADER: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1";

    #[fixture]
    fn annotator() -> Annotator {
        let genes = GeneIndex::from_genes(vec![
            Gene::new("G1", "T1.2", "1", Strand::Plus, vec![(50, 500, 0)], Some((60, 400)))
                .unwrap()
                .with_symbol("GENE1")
                .with_biotype("protein_coding"),
            Gene::new("G2", "T2", "1", Strand::Minus, vec![(90, 150, 0)], None)
                .unwrap()
                .with_symbol("GENE2")
                .with_biotype("lncRNA"),
        ]);
        Annotator::from_config(&PipelineConfig::default(), SessionContext::default())
            .unwrap()
            .with_genes(genes)
    }

    fn header() -> RecordHeader {
        RecordHeader::parse(1, HEADER).unwrap()
    }

    #[rstest]
    fn test_one_variant_per_gene(annotator: Annotator) {
        let line = "chr1\t100\trs1\tA\tC\t50\tPASS\tAF=0.5\tGT:DP\t0/1:20";
        let outcome = annotator.annotate_record(&header(), 2, line, None).unwrap();

        assert_eq!(outcome.variants.len(), 2);
        let symbols: Vec<&str> = outcome
            .variants
            .iter()
            .map(|v| v.text("gene_symbol").unwrap())
            .collect();
        assert_eq!(symbols, vec!["GENE1", "GENE2"]);
        assert_eq!(outcome.variants[0].integer("num_genes"), Some(2));
        assert_eq!(outcome.variants[0].text("transcript_ensembl"), Some("T1"));
        assert_eq!(outcome.variants[0].integer("consensus_prediction"), Some(0));
    }

    #[rstest]
    fn test_intergenic_and_absent(annotator: Annotator) {
        let line = "1\t9000\t.\tA\tC,G\t50\tPASS\t.\tGT\t0/2";
        let outcome = annotator.annotate_record(&header(), 2, line, None).unwrap();

        assert_eq!(outcome.absent, 1);
        assert_eq!(outcome.variants.len(), 1);
        assert_eq!(outcome.variants[0].text("alternative"), Some("G"));
        assert_eq!(outcome.variants[0].integer("num_genes"), Some(0));
        assert_eq!(outcome.variants[0].is_set("gene_symbol"), false);
    }

    #[rstest]
    fn test_absent_alleles_written_when_asked() {
        let config = PipelineConfig {
            write_absent: true,
            ..Default::default()
        };
        let annotator = Annotator::from_config(&config, SessionContext::default()).unwrap();
        let line = "1\t9000\t.\tA\tC,G\t50\tPASS\t.\tGT\t0/2";
        let outcome = annotator.annotate_record(&header(), 2, line, None).unwrap();

        assert_eq!(outcome.absent, 1);
        assert_eq!(outcome.variants.len(), 2);
        let flags: Vec<(&str, Option<bool>)> = outcome
            .variants
            .iter()
            .map(|v| (v.text("alternative").unwrap(), v.get("exist").and_then(|f| f.as_bool())))
            .collect();
        assert_eq!(flags, vec![("C", Some(false)), ("G", Some(true))]);

        let mut writer = JsonLinesWriter::new(Vec::new());
        writer.write_variant(&outcome.variants[0]).unwrap();
        let output = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(output.contains("\"exist\":false"), true);
    }

    #[rstest]
    fn test_run_skips_bad_records(annotator: Annotator) {
        let vcf = format!(
            "##fileformat=VCFv4.2\n{}\n1\t100\t.\tA\tC\t50\tPASS\t.\tGT\t0/1\n1\tnot_a_pos\t.\tA\tC\t.\t.\t.\tGT\t0/1\n",
            HEADER
        );
        let mut writer = JsonLinesWriter::new(Vec::new());
        let summary = annotator.run(vcf.as_bytes(), &mut writer, |_| {}).unwrap();

        assert_eq!(summary.records, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.variants, 2);
        let output = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(output.lines().count(), 2);
    }

    #[rstest]
    fn test_run_needs_header(annotator: Annotator) {
        let mut writer = JsonLinesWriter::new(Vec::new());
        let result = annotator.run("1\t100\t.\tA\tC\n".as_bytes(), &mut writer, |_| {});
        assert_eq!(matches!(result, Err(AnnotateError::MissingHeader)), true);
    }
}
