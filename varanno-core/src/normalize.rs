//! Allele normalization.
//!
//! A call record describes every alternate of a site against one shared
//! reference, so once a multi-allelic record is split per alternate the
//! individual `(ref, alt)` pairs are usually not minimal: `CTTT/C,CTT` yields
//! `CTTT>CTT`, which really is the one-base deletion `CT>C`. Normalization
//! trims those shared bases, keeps one anchor base for indels, moves the
//! position accordingly and classifies the result.
//!
//! Indels are trimmed from the end first, so homopolymer changes end up on
//! the leftmost base of the run. Indels whose reference (deletions) or
//! alternate (insertions) exceed the configured limits are degraded to a
//! symbolic structural variant.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{StructuralSubtype, VariantType};

/// Reference marker used by symbolic and degraded structural variants.
pub const UNKNOWN_BASE: &str = "N";

/// Alternate used for an allele spanned by an upstream deletion.
pub const SPANNING_DELETION: &str = "*";

/// Limits above which indels are stored as structural variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeLimits {
    pub max_deletion_length: usize,
    pub max_insertion_length: usize,
}

impl Default for NormalizeLimits {
    fn default() -> Self {
        NormalizeLimits {
            max_deletion_length: 300,
            max_insertion_length: 500,
        }
    }
}

/// Result of normalizing one `(pos, ref, alt)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAllele {
    pub pos: u64,
    pub reference: String,
    pub alternate: String,
    pub variant_type: VariantType,
    /// `None` only for symbolic structural variants.
    pub length: Option<u64>,
    pub sv_subtype: Option<StructuralSubtype>,
    /// `false` when the alternate does not describe a real change
    /// (identical alleles, spanning deletion, missing alternate).
    pub exists: bool,
}

/// Errors that can occur during allele normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeError {
    /// Reference or alternate allele is empty.
    EmptyAllele { pos: u64 },
    /// Position 0 is not a valid 1-based coordinate.
    ZeroPosition,
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::EmptyAllele { pos } => {
                write!(f, "empty reference or alternate allele at position {}", pos)
            }
            NormalizeError::ZeroPosition => write!(f, "positions are 1-based, got 0"),
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Trim an indel pair down to one anchor base.
///
/// Trailing bases are removed first while the shorter allele keeps at least
/// one base, then the shared prefix is removed except for its last base.
///
/// Returns `(offset, reference, alternate)` where `offset` is the number of
/// leading bases dropped.
fn trim_indel<'a>(reference: &'a [u8], alternate: &'a [u8]) -> (usize, &'a [u8], &'a [u8]) {
    let mut end_ref = reference.len();
    let mut end_alt = alternate.len();
    while end_ref.min(end_alt) > 1 && reference[end_ref - 1] == alternate[end_alt - 1] {
        end_ref -= 1;
        end_alt -= 1;
    }

    let shortest = end_ref.min(end_alt);
    let mut start = 0;
    while start < shortest && reference[start] == alternate[start] {
        start += 1;
    }
    // keep one anchor base before the change
    let offset = start.saturating_sub(1);

    (offset, &reference[offset..end_ref], &alternate[offset..end_alt])
}

/// Trim a same-length pair. Returns `None` when both alleles are identical.
fn trim_substitution<'a>(
    reference: &'a [u8],
    alternate: &'a [u8],
) -> Option<(usize, &'a [u8], &'a [u8])> {
    let len = reference.len();
    let mut start = 0;
    while start < len && reference[start] == alternate[start] {
        start += 1;
    }
    let mut end = len;
    while end > start && reference[end - 1] == alternate[end - 1] {
        end -= 1;
    }
    if start < end {
        Some((start, &reference[start..end], &alternate[start..end]))
    } else {
        None
    }
}

fn to_string(bases: &[u8]) -> String {
    String::from_utf8_lossy(bases).into_owned()
}

/// Normalizes alleles with a fixed set of [`NormalizeLimits`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    limits: NormalizeLimits,
}

impl Normalizer {
    pub fn new(limits: NormalizeLimits) -> Self {
        Normalizer { limits }
    }

    pub fn limits(&self) -> &NormalizeLimits {
        &self.limits
    }

    ///
    /// Canonicalize a raw triple and classify it.
    ///
    /// # Arguments
    /// * `pos` - 1-based position of the first reference base
    /// * `reference` - reference allele as written in the record
    /// * `alternate` - one alternate allele as written in the record
    ///
    pub fn normalize(
        &self,
        pos: u64,
        reference: &str,
        alternate: &str,
    ) -> Result<NormalizedAllele, NormalizeError> {
        if pos == 0 {
            return Err(NormalizeError::ZeroPosition);
        }
        if reference.is_empty() || alternate.is_empty() {
            return Err(NormalizeError::EmptyAllele { pos });
        }

        let missing = alternate == SPANNING_DELETION || alternate == ".";

        if reference.eq_ignore_ascii_case(UNKNOWN_BASE) || alternate.contains('<') {
            return Ok(NormalizedAllele {
                pos,
                reference: reference.to_string(),
                alternate: alternate.to_string(),
                variant_type: VariantType::Sv,
                length: None,
                sv_subtype: Some(StructuralSubtype::from_symbolic(alternate)),
                exists: !missing,
            });
        }

        let ref_bytes = reference.as_bytes();
        let alt_bytes = alternate.as_bytes();
        let delta = ref_bytes.len().abs_diff(alt_bytes.len()) as u64;

        let mut allele = if ref_bytes.len() == 1 && alt_bytes.len() == 1 {
            NormalizedAllele {
                pos,
                reference: reference.to_string(),
                alternate: alternate.to_string(),
                variant_type: VariantType::Snv,
                length: Some(1),
                sv_subtype: None,
                exists: true,
            }
        } else if ref_bytes.len() > alt_bytes.len() {
            if ref_bytes.len() > self.limits.max_deletion_length {
                self.degrade(pos, StructuralSubtype::Del, delta)
            } else {
                let (offset, r, a) = trim_indel(ref_bytes, alt_bytes);
                NormalizedAllele {
                    pos: pos + offset as u64,
                    reference: to_string(r),
                    alternate: to_string(a),
                    variant_type: VariantType::Del,
                    length: Some(delta),
                    sv_subtype: None,
                    exists: true,
                }
            }
        } else if ref_bytes.len() < alt_bytes.len() {
            if alt_bytes.len() > self.limits.max_insertion_length {
                self.degrade(pos, StructuralSubtype::Ins, delta)
            } else {
                let (offset, r, a) = trim_indel(ref_bytes, alt_bytes);
                NormalizedAllele {
                    pos: pos + offset as u64,
                    reference: to_string(r),
                    alternate: to_string(a),
                    variant_type: VariantType::Ins,
                    length: Some(delta),
                    sv_subtype: None,
                    exists: true,
                }
            }
        } else {
            match trim_substitution(ref_bytes, alt_bytes) {
                Some((offset, r, a)) => NormalizedAllele {
                    pos: pos + offset as u64,
                    reference: to_string(r),
                    alternate: to_string(a),
                    variant_type: if r.len() == 1 {
                        VariantType::Snv
                    } else {
                        VariantType::Mnv
                    },
                    length: Some(r.len() as u64),
                    sv_subtype: None,
                    exists: true,
                },
                // identical alleles: not a variant
                None => NormalizedAllele {
                    pos,
                    reference: reference.to_string(),
                    alternate: alternate.to_string(),
                    variant_type: VariantType::Mnv,
                    length: Some(ref_bytes.len() as u64),
                    sv_subtype: None,
                    exists: false,
                },
            }
        };

        if missing {
            allele.exists = false;
        }

        Ok(allele)
    }

    fn degrade(&self, pos: u64, subtype: StructuralSubtype, length: u64) -> NormalizedAllele {
        NormalizedAllele {
            pos,
            reference: UNKNOWN_BASE.to_string(),
            alternate: format!("<{}>", subtype),
            variant_type: VariantType::Sv,
            length: Some(length),
            sv_subtype: Some(subtype),
            exists: true,
        }
    }
}

///
/// Normalize with the default limits (deletions over 300 reference bases and
/// insertions over 500 alternate bases become structural variants).
///
pub fn normalize(
    pos: u64,
    reference: &str,
    alternate: &str,
) -> Result<NormalizedAllele, NormalizeError> {
    Normalizer::default().normalize(pos, reference, alternate)
}
