use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{VariantError, VariantResult};
use crate::normalize::{NormalizedAllele, normalize};

///
/// Classification of a normalized allele.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantType {
    #[serde(rename = "SNV")]
    Snv,
    #[serde(rename = "MNV")]
    Mnv,
    #[serde(rename = "INS")]
    Ins,
    #[serde(rename = "DEL")]
    Del,
    #[serde(rename = "SV")]
    Sv,
}

impl VariantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantType::Snv => "SNV",
            VariantType::Mnv => "MNV",
            VariantType::Ins => "INS",
            VariantType::Del => "DEL",
            VariantType::Sv => "SV",
        }
    }
}

impl FromStr for VariantType {
    type Err = VariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SNV" => Ok(VariantType::Snv),
            "MNV" => Ok(VariantType::Mnv),
            "INS" => Ok(VariantType::Ins),
            "DEL" => Ok(VariantType::Del),
            "SV" => Ok(VariantType::Sv),
            _ => Err(VariantError::UnknownVariantType(s.to_string())),
        }
    }
}

impl Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

///
/// Subtype of a structural variant, read from the symbolic alternate tag
/// (`<DEL>`, `<DUP>`, ...).
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StructuralSubtype {
    Del,
    Ins,
    Dup,
    Inv,
    Cnv,
    Bnd,
    Alu,
    Sva,
    Line1,
}

impl StructuralSubtype {
    ///
    /// Parse the subtype out of a symbolic alternate such as `<DUP:TANDEM>`.
    /// `<CNV>`, `<CN0>` and every unrecognized tag fall back to `Cnv`.
    ///
    pub fn from_symbolic(alternate: &str) -> Self {
        let tag = alternate
            .trim_start_matches('<')
            .trim_end_matches('>')
            .split(':')
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        match tag.as_str() {
            "DEL" => StructuralSubtype::Del,
            "INS" => StructuralSubtype::Ins,
            "DUP" => StructuralSubtype::Dup,
            "INV" => StructuralSubtype::Inv,
            "BND" => StructuralSubtype::Bnd,
            "ALU" => StructuralSubtype::Alu,
            "SVA" => StructuralSubtype::Sva,
            "LINE1" => StructuralSubtype::Line1,
            _ => StructuralSubtype::Cnv,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StructuralSubtype::Del => "DEL",
            StructuralSubtype::Ins => "INS",
            StructuralSubtype::Dup => "DUP",
            StructuralSubtype::Inv => "INV",
            StructuralSubtype::Cnv => "CNV",
            StructuralSubtype::Bnd => "BND",
            StructuralSubtype::Alu => "ALU",
            StructuralSubtype::Sva => "SVA",
            StructuralSubtype::Line1 => "LINE1",
        }
    }
}

impl Display for StructuralSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

///
/// A single normalized allele on a chromosome. Positions are 1-based.
///
/// `variant_type` and `length` are never set directly: they come out of
/// [`normalize`] so they always agree with `reference`/`alternate`. The one
/// exception is the length of a symbolic structural variant, which cannot be
/// read from the strings and is supplied through [`Variant::with_sv_length`].
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    pub chrom: String,
    pub pos: u64,
    pub reference: String,
    pub alternate: String,
    pub length: Option<u64>,
    pub variant_type: VariantType,
    pub sv_subtype: Option<StructuralSubtype>,
}

impl Variant {
    ///
    /// Build a variant from a raw record triple, normalizing it on the way.
    ///
    pub fn new(chrom: &str, pos: u64, reference: &str, alternate: &str) -> VariantResult<Self> {
        let allele = normalize(pos, reference, alternate)?;
        Ok(Variant::from_normalized(chrom, allele))
    }

    pub fn from_normalized(chrom: &str, allele: NormalizedAllele) -> Self {
        Variant {
            chrom: chrom.to_string(),
            pos: allele.pos,
            reference: allele.reference,
            alternate: allele.alternate,
            length: allele.length,
            variant_type: allele.variant_type,
            sv_subtype: allele.sv_subtype,
        }
    }

    /// Set the caller-supplied length of a symbolic SV. No-op for other types.
    pub fn with_sv_length(mut self, length: u64) -> Self {
        if self.variant_type == VariantType::Sv && self.length.is_none() {
            self.length = Some(length);
        }
        self
    }

    pub fn is_structural(&self) -> bool {
        self.variant_type == VariantType::Sv
    }

    ///
    /// First position actually changed by the variant: the base after the
    /// anchor for deletions, the anchor itself otherwise.
    ///
    pub fn alternative_position(&self) -> u64 {
        match self.variant_type {
            VariantType::Del => self.pos + 1,
            VariantType::Sv if self.sv_subtype == Some(StructuralSubtype::Del) => self.pos + 1,
            _ => self.pos,
        }
    }

    ///
    /// Number of reference bases affected beyond `pos`.
    ///
    pub fn affected_reference_length(&self) -> u64 {
        let length = self.length.unwrap_or(0);
        match self.variant_type {
            VariantType::Sv => length,
            VariantType::Ins | VariantType::Snv => 0,
            VariantType::Del | VariantType::Mnv => length.saturating_sub(1),
        }
    }

    ///
    /// The changed bases: `-` per deleted base, inserted bases for insertions,
    /// the alternate for substitutions and nothing for structural variants.
    ///
    pub fn alternative_changed_nucleotides(&self) -> String {
        match self.variant_type {
            VariantType::Del => {
                "-".repeat(self.reference.len().saturating_sub(self.alternate.len()))
            }
            VariantType::Ins => self
                .alternate
                .get(self.reference.len()..)
                .unwrap_or_default()
                .to_string(),
            VariantType::Snv | VariantType::Mnv => self.alternate.clone(),
            VariantType::Sv => String::new(),
        }
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:010}-{}-{}",
            self.chrom, self.pos, self.reference, self.alternate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("<DEL>", StructuralSubtype::Del)]
    #[case("<DUP:TANDEM>", StructuralSubtype::Dup)]
    #[case("<INV>", StructuralSubtype::Inv)]
    #[case("<LINE1>", StructuralSubtype::Line1)]
    #[case("<CN0>", StructuralSubtype::Cnv)]
    #[case("<CNV>", StructuralSubtype::Cnv)]
    #[case("<WHATEVER>", StructuralSubtype::Cnv)]
    fn test_subtype_from_symbolic(#[case] tag: &str, #[case] expected: StructuralSubtype) {
        assert_eq!(StructuralSubtype::from_symbolic(tag), expected);
    }

    #[rstest]
    fn test_deletion_helpers() {
        let v = Variant::new("1", 100, "CAG", "C").unwrap();
        assert_eq!(v.variant_type, VariantType::Del);
        assert_eq!(v.alternative_position(), 101);
        assert_eq!(v.affected_reference_length(), 1);
        assert_eq!(v.alternative_changed_nucleotides(), "--");
    }

    #[rstest]
    fn test_insertion_helpers() {
        let v = Variant::new("1", 100, "A", "ATTG").unwrap();
        assert_eq!(v.variant_type, VariantType::Ins);
        assert_eq!(v.alternative_position(), 100);
        assert_eq!(v.affected_reference_length(), 0);
        assert_eq!(v.alternative_changed_nucleotides(), "TTG");
    }

    #[rstest]
    fn test_mnv_helpers() {
        let v = Variant::new("1", 100, "ACG", "TCA").unwrap();
        assert_eq!(v.variant_type, VariantType::Mnv);
        assert_eq!(v.length, Some(3));
        assert_eq!(v.affected_reference_length(), 2);
        assert_eq!(v.alternative_changed_nucleotides(), "TCA");
    }

    #[rstest]
    fn test_sv_length_is_caller_supplied() {
        let v = Variant::new("1", 100, "N", "<DEL>").unwrap();
        assert_eq!(v.length, None);
        let v = v.with_sv_length(2500);
        assert_eq!(v.length, Some(2500));
        assert_eq!(v.alternative_position(), 101);
        assert_eq!(v.affected_reference_length(), 2500);
        assert_eq!(v.alternative_changed_nucleotides(), "");
    }

    #[rstest]
    fn test_with_sv_length_ignored_for_small_variants() {
        let v = Variant::new("1", 100, "A", "T").unwrap().with_sv_length(40);
        assert_eq!(v.length, Some(1));
    }

    #[rstest]
    fn test_display_pads_position() {
        let v = Variant::new("X", 42, "A", "G").unwrap();
        assert_eq!(v.to_string(), "X-0000000042-A-G");
    }

    #[rstest]
    #[case("snv", VariantType::Snv)]
    #[case("DEL", VariantType::Del)]
    #[case("Sv", VariantType::Sv)]
    fn test_variant_type_from_str(#[case] input: &str, #[case] expected: VariantType) {
        assert_eq!(input.parse::<VariantType>().unwrap(), expected);
    }
}
