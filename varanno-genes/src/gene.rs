use serde::{Deserialize, Serialize};
use varanno_core::{Strand, Variant, VariantType};

use crate::codon::{reverse_complement, translate, translate_codon};
use crate::errors::{GeneModelError, GeneModelResult};
use crate::sequence::SequenceProvider;

/// Bases on each side of an exon that still count as its splice site.
pub const SPLICE_SITE_WINDOW: u64 = 10;

/// Returned by the amino-acid queries when the position is not translated.
pub const UNTRANSLATED: &str = "#";

///
/// Biotypes ranked by interest, most interesting first. Used to choose between
/// two genes that share a symbol (e.g. a protein coding locus and a
/// nonsense-mediated-decay copy of it).
///
pub const BIOTYPE_PRIORITIES: &[&str] = &[
    "protein_coding",
    "miRNA",
    "lincRNA",
    "misc_RNA",
    "piRNA",
    "rRNA",
    "siRNA",
    "snRNA",
    "snoRNA",
    "tRNA",
    "vaultRNA",
    "processed_transcript",
    "3prime_overlapping_ncrna",
    "antisense",
    "retained_intron",
    "sense_intronic",
    "sense_overlapping",
    "pseudogene",
    "IG_C_pseudogene",
    "IG_J_pseudogene",
    "IG_V_pseudogene",
    "TR_J_pseudogene",
    "TR_V_pseudogene",
    "polymorphic_pseudogene",
    "processed_pseudogene",
    "transcribed_processed_pseudogene",
    "translated_processed_pseudogene",
    "unitary_pseudogene",
    "unprocessed_pseudogene",
    "transcribed_unprocessed_pseudogene",
    "nonsense_mediated_decay",
    "IG_C_gene",
    "IG_D_gene",
    "IG_J_gene",
    "IG_V_gene",
    "TR_C_gene",
    "TR_D_gene",
    "TR_J_gene",
    "TR_V_gene",
];

/// Biotypes whose transcripts carry a CDS.
pub const TRANSLATED_BIOTYPES: &[&str] = &[
    "protein_coding",
    "nonsense_mediated_decay",
    "polymorphic_pseudogene",
    "IG_C_gene",
    "IG_D_gene",
    "IG_J_gene",
    "IG_V_gene",
    "TR_C_gene",
    "TR_D_gene",
    "TR_J_gene",
    "TR_V_gene",
];

/// Lower is better; biotypes outside the list get 100.
pub fn biotype_priority(biotype: &str) -> usize {
    BIOTYPE_PRIORITIES
        .iter()
        .position(|b| b.eq_ignore_ascii_case(biotype))
        .unwrap_or(100)
}

pub fn is_translated_biotype(biotype: &str) -> bool {
    TRANSLATED_BIOTYPES.contains(&biotype)
}

///
/// One exon of a transcript, 1-based inclusive.
///
/// `phase` is the position inside its codon (0, 1 or 2) of the exon's first
/// coding base, read in transcription order. Exons without a defined phase
/// store 0.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exon {
    pub start: u64,
    pub end: u64,
    pub phase: u8,
    pub rank: u32,
}

impl Exon {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    fn contains(&self, pos: u64, window: u64) -> bool {
        pos >= self.start.saturating_sub(window) && pos <= self.end + window
    }
}

///
/// Exon/intron/CDS structure of the principal transcript of one gene.
///
/// Exons are always sorted by increasing genomic coordinate, whatever the
/// strand; their ranks follow transcription order and are fixed when the
/// gene is built. A gene is read-only once constructed and is shared between
/// workers as is.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    pub gene_id: String,
    pub symbol: String,
    pub biotype: String,
    pub chrom: String,
    pub strand: Strand,
    pub transcript_id: String,
    pub refseq_transcript: Option<String>,
    exons: Vec<Exon>,
    coding: Option<(u64, u64)>,
}

impl Gene {
    ///
    /// Build a gene from its exons, given as `(start, end, phase)` in any order.
    ///
    /// # Arguments
    ///
    /// - coding: first and last coding base (inclusive, smallest first), `None`
    ///   for non-coding transcripts
    ///
    pub fn new(
        gene_id: &str,
        transcript_id: &str,
        chrom: &str,
        strand: Strand,
        mut exons: Vec<(u64, u64, u8)>,
        coding: Option<(u64, u64)>,
    ) -> GeneModelResult<Self> {
        if exons.is_empty() {
            return Err(GeneModelError::NoExons(gene_id.to_string()));
        }
        exons.sort_by_key(|(start, _, _)| *start);

        let count = exons.len() as u32;
        let exons = exons
            .into_iter()
            .enumerate()
            .map(|(i, (start, end, phase))| Exon {
                start,
                end,
                phase: phase % 3,
                rank: match strand {
                    Strand::Plus => i as u32 + 1,
                    Strand::Minus => count - i as u32,
                },
            })
            .collect();

        Ok(Gene {
            gene_id: gene_id.to_string(),
            symbol: gene_id.to_string(),
            biotype: String::new(),
            chrom: chrom.to_string(),
            strand,
            transcript_id: transcript_id.to_string(),
            refseq_transcript: None,
            exons,
            coding,
        })
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        if !symbol.is_empty() {
            self.symbol = symbol.to_string();
        }
        self
    }

    pub fn with_biotype(mut self, biotype: &str) -> Self {
        self.biotype = biotype.to_string();
        self
    }

    pub fn with_refseq_transcript(mut self, refseq: Option<String>) -> Self {
        self.refseq_transcript = refseq;
        self
    }

    pub fn exons(&self) -> &[Exon] {
        &self.exons
    }

    pub fn exon_count(&self) -> usize {
        self.exons.len()
    }

    /// Smallest transcribed position.
    pub fn start(&self) -> u64 {
        self.exons[0].start
    }

    /// Largest transcribed position.
    pub fn end(&self) -> u64 {
        self.exons[self.exons.len() - 1].end
    }

    pub fn coding_start(&self) -> Option<u64> {
        self.coding.map(|(start, _)| start)
    }

    pub fn coding_end(&self) -> Option<u64> {
        self.coding.map(|(_, end)| end)
    }

    pub fn is_translated(&self) -> bool {
        self.coding.is_some()
    }

    pub fn biotype_priority(&self) -> usize {
        biotype_priority(&self.biotype)
    }

    pub fn exon_rank(&self, exon_index: usize) -> Option<u32> {
        self.exons.get(exon_index).map(|e| e.rank)
    }

    /// Rank of the intron following exon `intron_index` (in genomic order).
    pub fn intron_rank(&self, intron_index: usize) -> Option<u32> {
        if intron_index + 1 >= self.exons.len() {
            return None;
        }
        match self.strand {
            Strand::Plus => Some(self.exons[intron_index].rank),
            Strand::Minus => Some(self.exons[intron_index + 1].rank),
        }
    }

    /// 5' UTR on `+`, 3' UTR on `-`. Always false for non-coding genes.
    pub fn is_in_left_utr(&self, pos: u64) -> bool {
        self.coding_start().is_some_and(|start| pos < start)
    }

    /// 3' UTR on `+`, 5' UTR on `-`. Always false for non-coding genes.
    pub fn is_in_right_utr(&self, pos: u64) -> bool {
        self.coding_end().is_some_and(|end| pos > end)
    }

    pub fn is_exonic(&self, pos: u64, window: u64) -> bool {
        self.exon_index(pos, window).is_some()
    }

    ///
    /// Index (genomic order) of the exon containing `pos`, optionally widened by
    /// `window` bases on both sides to include splice sites.
    ///
    pub fn exon_index(&self, pos: u64, window: u64) -> Option<usize> {
        self.exons.iter().position(|e| e.contains(pos, window))
    }

    ///
    /// Index (genomic order) of the intron containing `pos`. Intron `i` lies
    /// between exons `i` and `i + 1`; `window` widens it into both exons.
    ///
    pub fn intron_index(&self, pos: u64, window: u64) -> Option<usize> {
        self.exons.windows(2).position(|pair| {
            pos >= pair[0].end.saturating_sub(window) && pos <= pair[1].start + window
        })
    }

    /// Exonic and between the first and last coding base.
    pub fn is_in_cds(&self, pos: u64) -> bool {
        match self.coding {
            Some((start, end)) => pos >= start && pos <= end && self.is_exonic(pos, 0),
            None => false,
        }
    }

    /// Number of coding bases in an exon.
    pub fn coding_length(&self, exon_index: usize) -> u64 {
        let (Some((cds_start, cds_end)), Some(exon)) = (self.coding, self.exons.get(exon_index))
        else {
            return 0;
        };
        let start = exon.start.max(cds_start);
        let end = exon.end.min(cds_end);
        if end < start { 0 } else { end - start + 1 }
    }

    ///
    /// Position of `pos` inside its codon: 0, 1 or 2 in transcription order,
    /// so left to right it reads 0-1-2 on `+` and 2-1-0 on `-`.
    ///
    /// Returns `None` when `pos` is not translated.
    ///
    pub fn codon_position(&self, pos: u64) -> Option<u8> {
        let (cds_start, cds_end) = self.coding?;
        if pos < cds_start || pos > cds_end {
            return None;
        }
        let exon = &self.exons[self.exon_index(pos, 0)?];
        let offset = match self.strand {
            Strand::Plus => pos - exon.start.max(cds_start),
            Strand::Minus => exon.end.min(cds_end) - pos,
        };
        Some(((offset + exon.phase as u64) % 3) as u8)
    }

    ///
    /// Codon position of `pos` once `mutation` has been applied. Positions
    /// downstream of an indel (in transcription order) move by the frame
    /// shift it introduces.
    ///
    pub fn codon_position_with(&self, pos: u64, mutation: &Variant) -> Option<u8> {
        let codon_pos = self.codon_position(pos)?;
        let alt_pos = mutation.alternative_position();
        let downstream = match self.strand {
            Strand::Plus => pos >= alt_pos,
            Strand::Minus => pos <= alt_pos,
        };
        if !downstream {
            return Some(codon_pos);
        }

        let frame_shift = (base_shift(mutation).unsigned_abs() % 3) as u8;
        let shifted = match mutation.variant_type {
            VariantType::Del => codon_pos + 3 - frame_shift,
            _ => codon_pos + 3 + frame_shift,
        };
        Some(shifted % 3)
    }

    ///
    /// Genomic positions of the three bases of the codon whose `codon_pos`
    /// base sits at `pos`, jumping over introns. `None` when the codon runs
    /// off the first or last exon.
    ///
    fn codon_window(&self, pos: u64, codon_pos: u8) -> Option<[u64; 3]> {
        let exon = self.exon_index(pos, 0)?;
        let last = self.exons.len() - 1;
        let opens_codon = matches!(
            (self.strand, codon_pos),
            (Strand::Plus, 0) | (Strand::Minus, 2)
        );
        let closes_codon = matches!(
            (self.strand, codon_pos),
            (Strand::Plus, 2) | (Strand::Minus, 0)
        );

        let mut positions = [0u64; 3];
        if opens_codon {
            if !self.is_exonic(pos + 2, 0) && exon == last {
                return None;
            }
            let mut next_exon_offset = 0;
            for (i, slot) in positions.iter_mut().enumerate() {
                let candidate = pos + i as u64;
                *slot = if self.is_exonic(candidate, 0) {
                    candidate
                } else {
                    next_exon_offset += 1;
                    self.exons.get(exon + 1)?.start + next_exon_offset - 1
                };
            }
        } else if closes_codon {
            if !self.is_exonic(pos.saturating_sub(2), 0) && exon == 0 {
                return None;
            }
            let mut previous_exon_offset = 0;
            for i in (0..3).rev() {
                let candidate = pos.saturating_sub(2 - i as u64);
                positions[i] = if self.is_exonic(candidate, 0) {
                    candidate
                } else {
                    let previous = self.exons.get(exon.checked_sub(1)?)?;
                    let base = previous.end.checked_sub(previous_exon_offset)?;
                    previous_exon_offset += 1;
                    base
                };
            }
        } else {
            if !self.is_exonic(pos.saturating_sub(1), 0) && exon == 0 {
                return None;
            }
            if !self.is_exonic(pos + 1, 0) && exon == last {
                return None;
            }
            positions[0] = if self.is_exonic(pos - 1, 0) {
                pos - 1
            } else {
                self.exons.get(exon.checked_sub(1)?)?.end
            };
            positions[1] = pos;
            positions[2] = if self.is_exonic(pos + 1, 0) {
                pos + 1
            } else {
                self.exons.get(exon + 1)?.start
            };
        }
        Some(positions)
    }

    fn nucleotide(&self, pos: u64, sequences: &dyn SequenceProvider) -> char {
        if self.is_exonic(pos, 0) {
            sequences.base(&self.chrom, pos).unwrap_or('?')
        } else {
            '?'
        }
    }

    ///
    /// Reference bases (plus strand, left to right) of the codon spanning `pos`.
    ///
    pub fn codon_sequence(&self, pos: u64, sequences: &dyn SequenceProvider) -> Option<String> {
        let codon_pos = self.codon_position(pos)?;
        let window = self.codon_window(pos, codon_pos)?;
        Some(window.iter().map(|p| self.nucleotide(*p, sequences)).collect())
    }

    ///
    /// Bases (plus strand, left to right) of the codon spanning `pos` once
    /// `mutation` has been applied.
    ///
    /// When `pos` falls inside the codon(s) rewritten by an insertion, the
    /// whole rewritten stretch is returned, inserted bases included, so the
    /// result can be longer than three bases. Positions removed by a deletion
    /// and structural variants give `None`.
    ///
    pub fn codon_sequence_with(
        &self,
        pos: u64,
        mutation: &Variant,
        sequences: &dyn SequenceProvider,
    ) -> Option<String> {
        let shift = base_shift(mutation);
        let removed = shift.unsigned_abs();
        let frame_shift = removed % 3;
        let alt_pos = mutation.alternative_position();
        let changed = mutation.alternative_changed_nucleotides();

        if mutation.variant_type == VariantType::Del && pos >= alt_pos && pos < alt_pos + removed {
            return None;
        }

        let mut insertion_window = Vec::new();
        if mutation.variant_type == VariantType::Ins {
            if let Some(mut_codon_pos) = self.codon_position(alt_pos) {
                let needed = (3 - frame_shift) % 3;
                let first = match self.strand {
                    Strand::Plus => alt_pos.checked_sub(mut_codon_pos as u64),
                    Strand::Minus => {
                        alt_pos.checked_sub(needed + (2 - mut_codon_pos) as u64)
                    }
                };
                if let Some(first) = first {
                    insertion_window = (first..first + 3 + needed).collect();
                }
            }
        }
        let inside_insertion = insertion_window.contains(&pos);

        let codon_pos = self.codon_position_with(pos, mutation)?;
        let positions: Vec<u64> = if inside_insertion {
            insertion_window
        } else {
            self.codon_window(pos, codon_pos)?.to_vec()
        };

        let bases: String = match mutation.variant_type {
            VariantType::Snv | VariantType::Mnv => {
                let changed = changed.as_bytes();
                positions
                    .iter()
                    .map(|&p| {
                        if p >= alt_pos && p < alt_pos + changed.len() as u64 {
                            changed[(p - alt_pos) as usize] as char
                        } else {
                            self.nucleotide(p, sequences)
                        }
                    })
                    .collect()
            }
            VariantType::Del => positions
                .iter()
                .map(|&p| {
                    if pos < alt_pos {
                        if p < alt_pos {
                            self.nucleotide(p, sequences)
                        } else {
                            self.nucleotide(p + removed, sequences)
                        }
                    } else if p > alt_pos + removed - 1 {
                        self.nucleotide(p, sequences)
                    } else {
                        self.nucleotide(p.saturating_sub(removed), sequences)
                    }
                })
                .collect(),
            VariantType::Ins => {
                let mut bases = String::with_capacity(positions.len() + changed.len());
                for &p in &positions {
                    bases.push(self.nucleotide(p, sequences));
                    if inside_insertion && p == alt_pos {
                        bases.push_str(&changed);
                    }
                }
                bases
            }
            VariantType::Sv => return None,
        };
        Some(bases)
    }

    ///
    /// Single-letter amino acid encoded by the codon spanning `pos`, or
    /// [`UNTRANSLATED`].
    ///
    pub fn amino_acid(&self, pos: u64, sequences: &dyn SequenceProvider) -> String {
        match self.codon_sequence(pos, sequences) {
            Some(codon) => match self.strand {
                Strand::Plus => translate_codon(&codon).to_string(),
                Strand::Minus => translate_codon(&reverse_complement(&codon)).to_string(),
            },
            None => UNTRANSLATED.to_string(),
        }
    }

    ///
    /// Amino acid(s) at `pos` once `mutation` has been applied. Insertions can
    /// yield several residues; an incomplete codon gives [`UNTRANSLATED`].
    ///
    pub fn amino_acid_with(
        &self,
        pos: u64,
        mutation: &Variant,
        sequences: &dyn SequenceProvider,
    ) -> String {
        match self.codon_sequence_with(pos, mutation, sequences) {
            Some(codons) if codons.len() % 3 == 0 => match self.strand {
                Strand::Plus => translate(&codons),
                Strand::Minus => translate(&reverse_complement(&codons)),
            },
            _ => UNTRANSLATED.to_string(),
        }
    }

    ///
    /// True when `pos` is one of the two outermost bases of an exon, or 3 to 5
    /// bases into the intron downstream of an exon (`+` genes, before the CDS
    /// end) or upstream of it (`-` genes, from the CDS start on).
    ///
    pub fn is_splice_region(&self, pos: u64) -> bool {
        if let Some(index) = self.exon_index(pos, 0) {
            let exon = &self.exons[index];
            return pos == exon.start
                || pos == exon.start + 1
                || pos == exon.end
                || pos + 1 == exon.end;
        }

        let Some(nearest) = self.exon_index(pos, SPLICE_SITE_WINDOW) else {
            return false;
        };
        let exon = &self.exons[nearest];
        match self.strand {
            Strand::Plus => {
                self.coding_end().is_some_and(|end| pos < end)
                    && (exon.end + 3..=exon.end + 5).contains(&pos)
            }
            Strand::Minus => {
                self.coding_start().is_some_and(|start| pos >= start)
                    && (exon.start.saturating_sub(5)..=exon.start.saturating_sub(3)).contains(&pos)
            }
        }
    }
}

/// Bases inserted (positive) or deleted (negative) by a mutation.
fn base_shift(mutation: &Variant) -> i64 {
    let changed = mutation.alternative_changed_nucleotides().len() as i64;
    match mutation.variant_type {
        VariantType::Del => -changed,
        VariantType::Ins => changed,
        _ => 0,
    }
}
