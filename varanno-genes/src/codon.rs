//! Standard genetic code and nucleotide helpers.
//!
//! Codons may carry IUPAC ambiguity codes. Each ambiguous base is expanded to
//! every nucleotide it stands for; when all expansions agree the amino acid is
//! returned as-is, pairs of residues that have their own ambiguity letter
//! collapse to `B` (N/D), `Z` (E/Q) or `J` (I/L) and anything else is `X`.

/// Amino acid for an unambiguous, uppercase codon.
fn translate_exact(codon: &[u8; 3]) -> char {
    match codon {
        b"TTT" | b"TTC" => 'F',
        b"TTA" | b"TTG" | b"CTT" | b"CTC" | b"CTA" | b"CTG" => 'L',
        b"ATT" | b"ATC" | b"ATA" => 'I',
        b"ATG" => 'M',
        b"GTT" | b"GTC" | b"GTA" | b"GTG" => 'V',
        b"TCT" | b"TCC" | b"TCA" | b"TCG" | b"AGT" | b"AGC" => 'S',
        b"CCT" | b"CCC" | b"CCA" | b"CCG" => 'P',
        b"ACT" | b"ACC" | b"ACA" | b"ACG" => 'T',
        b"GCT" | b"GCC" | b"GCA" | b"GCG" => 'A',
        b"TAT" | b"TAC" => 'Y',
        b"TAA" | b"TAG" | b"TGA" => '*',
        b"CAT" | b"CAC" => 'H',
        b"CAA" | b"CAG" => 'Q',
        b"AAT" | b"AAC" => 'N',
        b"AAA" | b"AAG" => 'K',
        b"GAT" | b"GAC" => 'D',
        b"GAA" | b"GAG" => 'E',
        b"TGT" | b"TGC" => 'C',
        b"TGG" => 'W',
        b"CGT" | b"CGC" | b"CGA" | b"CGG" | b"AGA" | b"AGG" => 'R',
        b"GGT" | b"GGC" | b"GGA" | b"GGG" => 'G',
        _ => 'X',
    }
}

/// Nucleotides an IUPAC code stands for. Unknown symbols behave like `N`.
fn expand_iupac(base: u8) -> &'static [u8] {
    match base {
        b'A' => b"A",
        b'C' => b"C",
        b'G' => b"G",
        b'T' => b"T",
        b'R' => b"AG",
        b'Y' => b"CT",
        b'K' => b"GT",
        b'M' => b"AC",
        b'S' => b"CG",
        b'W' => b"AT",
        b'B' => b"CGT",
        b'D' => b"AGT",
        b'H' => b"ACT",
        b'V' => b"ACG",
        _ => b"ACGT",
    }
}

///
/// Translate a three-base codon into a single-letter amino acid (`*` for stop).
///
/// Returns `X` when the input is not exactly three bases long.
///
pub fn translate_codon(codon: &str) -> char {
    let bytes = codon.as_bytes();
    if bytes.len() != 3 {
        return 'X';
    }
    let upper = [
        bytes[0].to_ascii_uppercase(),
        bytes[1].to_ascii_uppercase(),
        bytes[2].to_ascii_uppercase(),
    ];

    let mut residues: Vec<char> = Vec::with_capacity(4);
    for &first in expand_iupac(upper[0]) {
        for &second in expand_iupac(upper[1]) {
            for &third in expand_iupac(upper[2]) {
                let aa = translate_exact(&[first, second, third]);
                if !residues.contains(&aa) {
                    residues.push(aa);
                }
            }
        }
    }

    match residues.as_slice() {
        [single] => *single,
        [a, b] => match (*a.min(b), *a.max(b)) {
            ('D', 'N') => 'B',
            ('E', 'Q') => 'Z',
            ('I', 'L') => 'J',
            _ => 'X',
        },
        _ => 'X',
    }
}

///
/// Translate a nucleotide sequence codon by codon. Trailing bases that do not
/// fill a codon are ignored.
///
pub fn translate(sequence: &str) -> String {
    sequence
        .as_bytes()
        .chunks_exact(3)
        .map(|chunk| translate_codon(std::str::from_utf8(chunk).unwrap_or("NNN")))
        .collect()
}

fn complement(base: char) -> char {
    match base.to_ascii_uppercase() {
        'A' => 'T',
        'C' => 'G',
        'G' => 'C',
        'T' => 'A',
        'R' => 'Y',
        'Y' => 'R',
        'K' => 'M',
        'M' => 'K',
        'S' => 'S',
        'W' => 'W',
        'B' => 'V',
        'D' => 'H',
        'H' => 'D',
        'V' => 'B',
        _ => base,
    }
}

/// Reverse complement, IUPAC aware. Output is uppercase except for symbols
/// that have no complement, which are copied through.
pub fn reverse_complement(sequence: &str) -> String {
    sequence.chars().rev().map(complement).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("ATG", 'M')]
    #[case("atg", 'M')]
    #[case("TAA", '*')]
    #[case("TGG", 'W')]
    #[case("GCN", 'A')]
    #[case("AAY", 'N')]
    #[case("RAY", 'B')]
    #[case("SAR", 'Z')]
    #[case("MTA", 'J')]
    #[case("NNN", 'X')]
    #[case("AT", 'X')]
    fn test_translate_codon(#[case] codon: &str, #[case] expected: char) {
        assert_eq!(translate_codon(codon), expected);
    }

    #[rstest]
    fn test_translate_sequence_ignores_partial_codon() {
        assert_eq!(translate("ATGGCCTAAG"), "MA*");
    }

    #[rstest]
    #[case("ACGT", "ACGT")]
    #[case("AAC", "GTT")]
    #[case("RYKM", "KMRY")]
    #[case("BDHV", "BDHV")]
    #[case("acN", "NGT")]
    fn test_reverse_complement(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(reverse_complement(input), expected);
    }
}
