//! Composite pathogenicity ranking.
//!
//! The score starts from a band, the highest of:
//!
//! - the consensus base of the canonical effect (400 for frameshift, stop and
//!   start changes, 500 for large structural changes, 0 otherwise)
//! - 300 when a splice-region effect sits on the splice site of the gene
//! - 200 when a splicing predictor flags the variant
//!
//! and adds one point per piece of evidence: every damaging predictor, a
//! non-tolerant Aloft call, every score above its threshold and every
//! splicing predictor calling `AFFECTING_SPLICING`. Adding evidence never
//! lowers the score. It ranks variants; it is not a probability.

use std::sync::Arc;

use varanno_genes::Gene;

use crate::config::ConsensusConfig;
use crate::effects::{EffectCatalog, GeneRegion};
use crate::models::AnnotatedVariant;
use crate::schema::{AnalysisSchema, FieldTag};

pub const CONSENSUS_FIELD: &str = "consensus_prediction";
pub const SPLICING_BAND: i64 = 200;
pub const SPLICE_REGION_BAND: i64 = 300;

#[derive(Debug, Clone)]
pub struct ConsensusScorer {
    config: ConsensusConfig,
    catalog: Arc<EffectCatalog>,
    predictors: Vec<String>,
}

impl ConsensusScorer {
    pub fn new(config: ConsensusConfig, catalog: Arc<EffectCatalog>, schema: &AnalysisSchema) -> Self {
        let predictors = schema
            .tagged(FieldTag::ImpactPrediction)
            .map(|f| f.name.clone())
            .collect();
        ConsensusScorer {
            config,
            catalog,
            predictors,
        }
    }

    pub fn predictors(&self) -> &[String] {
        &self.predictors
    }

    fn is_set_to(target: &AnnotatedVariant, field: &str, label: &str) -> bool {
        target.text(field) == Some(label)
    }

    ///
    /// Whether a splice-region effect of `target` touches a splice site of
    /// `gene`, at any base the variant covers. Only bases near exon edges can
    /// be splice sites, so long structural variants are not walked base by
    /// base.
    ///
    fn on_splice_site(&self, target: &AnnotatedVariant, gene: &Gene) -> bool {
        let in_splice_region = target.text("snpeff_all_effects").is_some_and(|effects| {
            effects
                .split([',', '&'])
                .any(|term| self.catalog.lookup(term).region == GeneRegion::SpliceSiteRegion)
        });
        if !in_splice_region {
            return false;
        }
        let Some(pos) = target.integer("pos").and_then(|p| u64::try_from(p).ok()) else {
            return false;
        };
        let length = target
            .integer("length")
            .and_then(|l| u64::try_from(l).ok())
            .unwrap_or(0)
            .max(1);
        let covered = pos..pos.saturating_add(length);
        gene.exons()
            .iter()
            .flat_map(|exon| splice_candidates(exon.start, exon.end))
            .filter(|p| covered.contains(p))
            .any(|p| gene.is_splice_region(p))
    }

    fn band(&self, target: &AnnotatedVariant, gene: Option<&Gene>) -> i64 {
        let mut band = match (target.is_set("snpeff_impact"), target.text("snpeff_effect")) {
            (true, Some(effect)) => self.catalog.lookup(effect).consensus_base,
            _ => 0,
        };
        if band < SPLICE_REGION_BAND && gene.is_some_and(|g| self.on_splice_site(target, g)) {
            band = SPLICE_REGION_BAND;
        }
        let splicing = self
            .config
            .splicing_predictions
            .iter()
            .any(|f| Self::is_set_to(target, f, &self.config.affecting_splicing));
        if splicing {
            band = band.max(SPLICING_BAND);
        }
        band
    }

    fn evidence(&self, target: &AnnotatedVariant) -> i64 {
        let config = &self.config;
        let damaging = self
            .predictors
            .iter()
            .filter(|f| Self::is_set_to(target, f, &config.damaging))
            .count();
        let aloft = target
            .text(&config.aloft_field)
            .is_some_and(|v| v != config.aloft_tolerant);
        let thresholds = config
            .thresholds
            .iter()
            .filter(|t| target.double(&t.field).is_some_and(|score| score > t.above))
            .count();
        let splicing = config
            .splicing_predictions
            .iter()
            .filter(|f| Self::is_set_to(target, f, &config.affecting_splicing))
            .count();

        (damaging + usize::from(aloft) + thresholds + splicing) as i64
    }

    pub fn score(&self, target: &AnnotatedVariant, gene: Option<&Gene>) -> i64 {
        self.band(target, gene) + self.evidence(target)
    }

    /// Score `target` and store the result in its consensus field.
    pub fn apply(&self, target: &mut AnnotatedVariant, gene: Option<&Gene>) -> i64 {
        let score = self.score(target, gene);
        target.set(CONSENSUS_FIELD, score);
        score
    }
}

/// Exon edges and the intronic bases 3 to 5 away from them.
fn splice_candidates(start: u64, end: u64) -> impl Iterator<Item = u64> {
    [start, start + 1, end.saturating_sub(1), end]
        .into_iter()
        .chain(end + 3..=end + 5)
        .chain(start.saturating_sub(5)..=start.saturating_sub(3))
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    use varanno_core::Strand;

    struct Fixture {
        scorer: ConsensusScorer,
        schema: Arc<AnalysisSchema>,
    }

    #[fixture]
    fn fixture() -> Fixture {
        let schema = Arc::new(AnalysisSchema::embedded().unwrap());
        let catalog = Arc::new(EffectCatalog::embedded().unwrap());
        Fixture {
            scorer: ConsensusScorer::new(ConsensusConfig::default(), catalog, &schema),
            schema,
        }
    }

    fn variant(schema: &Arc<AnalysisSchema>, effect: &str, impact: &str) -> AnnotatedVariant {
        let mut target = AnnotatedVariant::new(schema.clone());
        target.set("pos", 120_i64);
        target.set("length", 1_i64);
        target.set("snpeff_effect", effect);
        target.set("snpeff_all_effects", effect);
        target.set("snpeff_impact", impact);
        target
    }

    #[fixture]
    fn gene() -> Gene {
        // exons 100-120 and 200-300, CDS 110-250
        Gene::new("G1", "T1", "1", Strand::Plus, vec![(100, 120, 0), (200, 300, 0)], Some((110, 250)))
            .unwrap()
    }

    #[rstest]
    fn test_evidence_points(fixture: Fixture) {
        let mut target = variant(&fixture.schema, "missense_variant", "MODERATE");
        assert_eq!(fixture.scorer.score(&target, None), 0);

        target.set("sift4g_pred", "DAMAGING");
        target.set("polyphen2_hdiv_pred", "DAMAGING");
        target.set("lrt_pred", "TOLERATED");
        target.set("aloft_pred", "RECESSIVE");
        target.set("cadd_phred", 20.0);
        target.set("revel_score", 0.8);
        assert_eq!(fixture.scorer.score(&target, None), 4);
    }

    #[rstest]
    fn test_effect_band(fixture: Fixture) {
        let mut target = variant(&fixture.schema, "frameshift_variant", "HIGH");
        target.set("cadd_phred", 35.0);
        assert_eq!(fixture.scorer.apply(&mut target, None), 401);
        assert_eq!(target.integer(CONSENSUS_FIELD), Some(401));

        // no impact, no band
        target.clear("snpeff_impact");
        assert_eq!(fixture.scorer.score(&target, None), 1);
    }

    #[rstest]
    fn test_splicing_predictions(fixture: Fixture) {
        let mut target = variant(&fixture.schema, "missense_variant", "MODERATE");
        target.set("splicing_ada_pred", "AFFECTING_SPLICING");
        target.set("splicing_rf_pred", "AFFECTING_SPLICING");
        assert_eq!(fixture.scorer.score(&target, None), 202);

        let mut frameshift = variant(&fixture.schema, "frameshift_variant", "HIGH");
        frameshift.set("splicing_rf_pred", "AFFECTING_SPLICING");
        assert_eq!(fixture.scorer.score(&frameshift, None), 401);
    }

    #[rstest]
    fn test_splice_region_band(fixture: Fixture, gene: Gene) {
        let target = variant(&fixture.schema, "splice_region_variant", "LOW");
        // 120 is the last base of the first exon
        assert_eq!(fixture.scorer.score(&target, Some(&gene)), 300);
        assert_eq!(fixture.scorer.score(&target, None), 0);

        let mut intronic = variant(&fixture.schema, "splice_region_variant", "LOW");
        intronic.set("pos", 124_i64);
        assert_eq!(fixture.scorer.score(&intronic, Some(&gene)), 300);
        intronic.set("pos", 130_i64);
        assert_eq!(fixture.scorer.score(&intronic, Some(&gene)), 0);
    }

    #[rstest]
    fn test_splice_region_band_for_long_variants(fixture: Fixture, gene: Gene) {
        let mut sv = variant(&fixture.schema, "splice_region_variant", "LOW");
        // spans the second exon's edges
        sv.set("pos", 150_i64);
        sv.set("length", 2_000_000_000_i64);
        assert_eq!(fixture.scorer.score(&sv, Some(&gene)), 300);

        // starts past the last splice site
        sv.set("pos", 400_i64);
        assert_eq!(fixture.scorer.score(&sv, Some(&gene)), 0);

        // inside the second exon, clear of its edges
        sv.set("pos", 210_i64);
        sv.set("length", 50_i64);
        assert_eq!(fixture.scorer.score(&sv, Some(&gene)), 0);
    }

    #[rstest]
    fn test_more_evidence_never_lowers_the_score(fixture: Fixture) {
        let mut target = variant(&fixture.schema, "stop_gained", "HIGH");
        let mut previous = fixture.scorer.score(&target, None);
        for predictor in fixture.scorer.predictors().to_vec() {
            target.set(&predictor, "DAMAGING");
            let score = fixture.scorer.score(&target, None);
            assert_eq!(score, previous + 1);
            previous = score;
        }
    }
}
