//! Properties of allele normalization over generated indel and substitution triples.

use pretty_assertions::assert_eq;
use rstest::*;

use varanno_core::{Normalizer, NormalizeLimits, VariantType, normalize};

const BASES: [char; 4] = ['A', 'C', 'G', 'T'];

/// Left-aligned deletions and insertions built from short repeat units: the
/// anchor base never occurs in the repeated unit.
#[fixture]
fn anchored_indels() -> Vec<(u64, String, String)> {
    let mut triples = Vec::new();
    for unit in ["A", "CA", "TTC", "CAC"] {
        for anchor in BASES.iter().filter(|b| !unit.contains(**b)) {
            for copies in 1..4 {
                let tail = "G";
                let reference = format!("{}{}{}", anchor, unit.repeat(copies + 1), tail);
                let alternate = format!("{}{}{}", anchor, unit.repeat(copies), tail);
                triples.push((100, reference.clone(), alternate.clone()));
                triples.push((100, alternate, reference));
            }
        }
    }
    triples
}

#[fixture]
fn substitutions() -> Vec<(u64, String, String)> {
    vec![
        (10, "A".to_string(), "C".to_string()),
        (10, "ACGT".to_string(), "ACGA".to_string()),
        (10, "ACGT".to_string(), "TCGA".to_string()),
        (10, "AAAA".to_string(), "AAAA".to_string()),
        (10, "CATG".to_string(), "CTAG".to_string()),
    ]
}

#[rstest]
fn normalization_is_idempotent(
    anchored_indels: Vec<(u64, String, String)>,
    substitutions: Vec<(u64, String, String)>,
) {
    for (pos, reference, alternate) in anchored_indels.iter().chain(substitutions.iter()) {
        let once = normalize(*pos, reference, alternate).unwrap();
        let twice = normalize(once.pos, &once.reference, &once.alternate).unwrap();
        assert_eq!(twice, once, "{} {} {}", pos, reference, alternate);
    }
}

#[rstest]
fn prepending_a_shared_base_is_positionally_invariant(anchored_indels: Vec<(u64, String, String)>) {
    for (pos, reference, alternate) in &anchored_indels {
        let direct = normalize(*pos, reference, alternate).unwrap();
        for base in BASES {
            let padded = normalize(
                pos - 1,
                &format!("{}{}", base, reference),
                &format!("{}{}", base, alternate),
            )
            .unwrap();
            assert_eq!(padded, direct, "{}{} {}{}", base, reference, base, alternate);
        }
    }
}

#[rstest]
fn indel_length_is_the_allele_length_difference(anchored_indels: Vec<(u64, String, String)>) {
    for (pos, reference, alternate) in &anchored_indels {
        let allele = normalize(*pos, reference, alternate).unwrap();
        assert_eq!(
            allele.length,
            Some(reference.len().abs_diff(alternate.len()) as u64)
        );
        assert_eq!(
            matches!(allele.variant_type, VariantType::Del | VariantType::Ins),
            true
        );
        // exactly one anchor base survives
        assert_eq!(allele.reference.len().min(allele.alternate.len()), 1);
    }
}

#[rstest]
fn homopolymer_deletion_is_leftmost() {
    let allele = normalize(10, "CTTT", "CTT").unwrap();
    assert_eq!(allele.variant_type, VariantType::Del);
    assert_eq!(allele.pos, 10);
    assert_eq!(allele.reference, "CT");
    assert_eq!(allele.alternate, "C");
    assert_eq!(allele.length, Some(1));
}

#[rstest]
fn repeated_insertion_is_leftmost() {
    let allele = normalize(1000, "ACTG", "ACTGCTG").unwrap();
    assert_eq!(allele.variant_type, VariantType::Ins);
    assert_eq!(allele.pos, 1000);
    assert_eq!(allele.reference, "A");
    assert_eq!(allele.alternate, "ACTG");
    assert_eq!(allele.length, Some(3));
}

#[rstest]
fn limits_apply_before_trimming() {
    let normalizer = Normalizer::new(NormalizeLimits {
        max_deletion_length: 5,
        max_insertion_length: 5,
    });
    // six reference bases, even though the trimmed deletion is a single base
    let allele = normalizer.normalize(1, "ATTTTT", "ATTTT").unwrap();
    assert_eq!(allele.variant_type, VariantType::Sv);
    assert_eq!(allele.length, Some(1));
}
