//! snpEff `ANN` annotations.
//!
//! `ANN` holds one comma-separated entry per (allele, transcript) pair, each
//! entry being sixteen `|`-separated sub-fields:
//!
//! ```text
//! Allele | Annotation | Impact | Gene_Name | Gene_ID | Feature_Type | Feature_ID |
//! Biotype | Rank/Total | HGVS.c | HGVS.p | cDNA.pos/len | CDS.pos/len | AA.pos/len |
//! Distance | Warnings
//! ```

use tracing::debug;

use varanno_core::VariantType;

use crate::effects::catalog::{EffectCatalog, EffectCategory, Impact};
use crate::expander::ExpandedAllele;

/// One functional effect prediction tied to one transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEffect<'c> {
    pub allele: String,
    /// Most severe of `all_effects`.
    pub effect: &'c EffectCategory,
    pub all_effects: Vec<&'c EffectCategory>,
    pub impact: Option<Impact>,
    pub gene_name: String,
    pub gene_id: String,
    pub feature_type: String,
    /// Transcript id without its version.
    pub transcript_id: Option<String>,
    pub transcript_version: u32,
    pub biotype: String,
    pub rank: Option<(i64, i64)>,
    pub hgvs_dna: String,
    pub hgvs_protein: String,
    pub cdna: Option<(i64, i64)>,
    pub cds: Option<(i64, i64)>,
    pub protein: Option<(i64, i64)>,
    pub distance: Option<String>,
    pub warnings: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// `pos/len` pairs. Anything else is dropped.
fn position_pair(value: Option<&str>) -> Option<(i64, i64)> {
    let value = value.filter(|v| !v.is_empty())?;
    let (pos, len) = value.split_once('/')?;
    match (pos.trim().parse(), len.trim().parse()) {
        (Ok(pos), Ok(len)) => Some((pos, len)),
        _ => {
            debug!("unparsable position pair '{}'", value);
            None
        }
    }
}

/// Split `ENST00000335137.4` into its id and version (1 when absent).
pub fn split_transcript_version(feature_id: &str) -> (String, u32) {
    match feature_id.split_once('.') {
        Some((id, version)) => (id.to_string(), version.parse().unwrap_or(1)),
        None => (feature_id.to_string(), 1),
    }
}

impl<'c> TranscriptEffect<'c> {
    pub fn parse(entry: &str, catalog: &'c EffectCatalog) -> Self {
        let mut parts = entry.split('|');
        let mut next = || parts.next();

        let allele = next().unwrap_or_default().to_string();

        let all_effects: Vec<&EffectCategory> = match next() {
            Some(terms) => terms.split('&').map(|t| catalog.lookup(t)).collect(),
            None => vec![catalog.none()],
        };
        // first of the most severe
        let effect = all_effects
            .iter()
            .copied()
            .reduce(|best, e| if e.priority < best.priority { e } else { best })
            .unwrap_or_else(|| catalog.none());

        let impact = next().and_then(|i| i.parse().ok());
        let gene_name = next().unwrap_or_default().to_string();
        let gene_id = next().unwrap_or_default().to_string();
        let feature_type = next().unwrap_or_default().to_string();
        let (transcript_id, transcript_version) = match next().filter(|f| !f.is_empty()) {
            Some(feature_id) => {
                let (id, version) = split_transcript_version(feature_id);
                (Some(id), version)
            }
            None => (None, 1),
        };
        let biotype = next().unwrap_or_default().to_string();
        let rank = position_pair(next());
        let hgvs_dna = next().unwrap_or_default().to_string();
        let hgvs_protein = next().unwrap_or_default().to_string();
        let cdna = position_pair(next());
        let cds = position_pair(next());
        let protein = position_pair(next());
        let distance = non_empty(next());
        let warnings = non_empty(next());

        TranscriptEffect {
            allele,
            effect,
            all_effects,
            impact,
            gene_name,
            gene_id,
            feature_type,
            transcript_id,
            transcript_version,
            biotype,
            rank,
            hgvs_dna,
            hgvs_protein,
            cdna,
            cds,
            protein,
            distance,
            warnings,
        }
    }

    /// Labels of every effect term, comma-joined.
    pub fn all_effects_label(&self) -> String {
        self.all_effects
            .iter()
            .map(|e| e.label())
            .collect::<Vec<&str>>()
            .join(",")
    }
}

///
/// Parse the value of an `ANN` INFO entry (without the `ANN=` prefix).
///
pub fn parse_ann<'c>(value: &str, catalog: &'c EffectCatalog) -> Vec<TranscriptEffect<'c>> {
    value
        .split(',')
        .filter(|entry| !entry.is_empty())
        .map(|entry| TranscriptEffect::parse(entry, catalog))
        .collect()
}

/// `123`, `123+4`, `123-4`, `*12`, `-20`: a base coordinate and an intronic offset.
fn hgvs_position(position: &str) -> Option<(i64, i64)> {
    let position = position.trim_start_matches('*');
    let split = position
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '+' || *c == '-')
        .map(|(i, _)| i);
    match split {
        Some(i) => Some((position[..i].parse().ok()?, position[i..].parse().ok()?)),
        None => Some((position.parse().ok()?, 0)),
    }
}

///
/// Number of bases removed by an HGVS deletion: the deleted bases when they
/// are written after `del`, else the size of the `start_end` range.
///
pub fn hgvs_deleted_length(hgvs: &str) -> Option<u64> {
    let index = hgvs.find("del")?;
    let bases = &hgvs[index + 3..];
    let bases = bases.split("ins").next().unwrap_or_default();
    if !bases.is_empty() {
        return if bases.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(bases.len() as u64)
        } else {
            bases.parse().ok()
        };
    }

    let range = &hgvs[..index];
    let range = range.split_once('.').map(|(_, r)| r).unwrap_or(range);
    match range.split_once('_') {
        None => hgvs_position(range).map(|_| 1),
        Some((start, end)) => {
            let (start_base, start_offset) = hgvs_position(start)?;
            let (end_base, end_offset) = hgvs_position(end)?;
            let length = if start_base == end_base {
                end_offset - start_offset + 1
            } else if start_offset == 0 && end_offset == 0 {
                end_base - start_base + 1
            } else {
                return None;
            };
            u64::try_from(length).ok().filter(|l| *l > 0)
        }
    }
}

///
/// Whether an annotation entry describes `allele`.
///
/// With a single alternate every entry does. With several, substitutions
/// must name the same alternate; indels are matched on their size when the
/// bases cannot be compared directly, which is best-effort for complex
/// multi-allelic sites. Structural variants are never attributed.
///
pub fn attribute_to_allele(effect: &TranscriptEffect, allele: &ExpandedAllele) -> bool {
    if allele.allele_num <= 2 {
        return true;
    }

    let variant = &allele.variant;
    let hgvs = effect.hgvs_dna.as_str();
    let same_alternate = effect.allele == variant.alternate || effect.allele == allele.raw_alternate;

    match variant.variant_type {
        VariantType::Snv => hgvs.contains('>') && same_alternate,
        VariantType::Mnv => hgvs.contains("ins") && hgvs.contains("del") && same_alternate,
        VariantType::Del => {
            let deleted = variant.reference.len().saturating_sub(variant.alternate.len()) as u64;
            hgvs.contains("del") && hgvs_deleted_length(hgvs) == Some(deleted)
        }
        VariantType::Ins => {
            if !(hgvs.contains("ins") || hgvs.contains("dup")) {
                return false;
            }
            let inserted = variant
                .alternate
                .get(variant.reference.len()..)
                .unwrap_or_default();
            effect.allele == inserted || same_alternate || effect.allele.len() == inserted.len()
        }
        VariantType::Sv => false,
    }
}
