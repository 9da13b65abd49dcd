use tracing::debug;

use varanno_genes::Gene;

use crate::effects::ann::{TranscriptEffect, split_transcript_version};
use crate::effects::other_transcripts::OtherTranscripts;
use crate::models::AnnotatedVariant;

///
/// The canonical effect of one gene, plus the summary of the gene's other
/// transcripts.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a, 'c> {
    pub canonical: &'a TranscriptEffect<'c>,
    pub others: OtherTranscripts,
}

fn without_version(transcript_id: &str) -> &str {
    transcript_id.split('.').next().unwrap_or(transcript_id)
}

/// First effect with the lowest priority number.
fn most_severe<'a, 'c>(candidates: &[&'a TranscriptEffect<'c>]) -> Option<&'a TranscriptEffect<'c>> {
    candidates
        .iter()
        .copied()
        .reduce(|best, e| if e.effect.priority < best.effect.priority { e } else { best })
}

///
/// Picks, among the transcript effects of one allele, the one describing the
/// principal transcript of a gene.
///
#[derive(Debug, Clone, Copy, Default)]
pub struct EffectResolver;

impl EffectResolver {
    pub fn new() -> Self {
        EffectResolver
    }

    ///
    /// Canonical effect for `gene`: effects on its principal transcript,
    /// else effects on the gene, reduced to the most severe one. `None`
    /// when no effect mentions the gene.
    ///
    /// Without a gene the most severe effect overall is taken.
    ///
    pub fn resolve<'a, 'c>(
        &self,
        effects: &'a [TranscriptEffect<'c>],
        gene: Option<&Gene>,
    ) -> Option<Resolution<'a, 'c>> {
        let (candidates, same_gene): (Vec<&TranscriptEffect>, Vec<&TranscriptEffect>) = match gene {
            Some(gene) => {
                let transcript = without_version(&gene.transcript_id);
                let same_gene: Vec<&TranscriptEffect> = effects
                    .iter()
                    .filter(|e| e.gene_id == gene.gene_id)
                    .collect();
                let on_transcript: Vec<&TranscriptEffect> = effects
                    .iter()
                    .filter(|e| e.transcript_id.as_deref() == Some(transcript))
                    .collect();
                if on_transcript.is_empty() {
                    (same_gene.clone(), same_gene)
                } else {
                    (on_transcript, same_gene)
                }
            }
            None => (effects.iter().collect(), effects.iter().collect()),
        };

        let canonical = most_severe(&candidates)?;
        let mut others = OtherTranscripts::new();
        for effect in same_gene.into_iter().filter(|e| !std::ptr::eq(*e, canonical)) {
            others.push(effect.transcript_id.as_deref(), effect.effect.label());
        }

        Some(Resolution { canonical, others })
    }

    ///
    /// Resolve and copy the canonical effect into `target`. Fields already
    /// filled from the gene model are kept.
    ///
    pub fn apply(&self, effects: &[TranscriptEffect], gene: Option<&Gene>, target: &mut AnnotatedVariant) {
        let Some(resolution) = self.resolve(effects, gene) else {
            if let Some(gene) = gene {
                debug!(
                    "no effect for gene {} ({}) at {}:{}",
                    gene.symbol,
                    gene.transcript_id,
                    target.text("chr").unwrap_or_default(),
                    target.integer("pos").unwrap_or_default()
                );
            }
            return;
        };
        let effect = resolution.canonical;

        target.set("snpeff_effect", effect.effect.label());
        target.set("snpeff_all_effects", effect.all_effects_label());
        target.set("snpeff_impact", effect.impact.unwrap_or(effect.effect.impact).as_str());
        if !resolution.others.is_empty() {
            target.set("snpeff_other_transcripts", resolution.others.encode());
        }

        if let Some((rank, total)) = effect.rank {
            target.set("exon_intron_rank", rank);
            target.set("exon_intron_total", total);
        }
        if let Some((pos, length)) = effect.cdna {
            target.set("cdna_pos", pos);
            target.set("cdna_length", length);
        }
        if let Some((pos, length)) = effect.cds {
            target.set("cds_pos", pos);
            target.set("cds_length", length);
        }
        if let Some((pos, length)) = effect.protein {
            target.set("protein_pos", pos);
            target.set("protein_length", length);
        }
        if !effect.hgvs_dna.is_empty() {
            target.set("hgvs_dna", effect.hgvs_dna.as_str());
        }
        if !effect.hgvs_protein.is_empty() {
            target.set("hgvs_protein", effect.hgvs_protein.as_str());
        }

        if !effect.gene_name.is_empty() {
            target.set_if_empty("gene_symbol", effect.gene_name.as_str());
        }
        if !effect.gene_id.is_empty() {
            target.set_if_empty("gene_ensembl", effect.gene_id.as_str());
        }
        if !effect.biotype.is_empty() {
            target.set_if_empty("biotype", effect.biotype.as_str());
        }
        if let Some(transcript) = &effect.transcript_id {
            let (id, _) = split_transcript_version(transcript);
            target.set_if_empty("transcript_ensembl", id);
        }
    }
}
