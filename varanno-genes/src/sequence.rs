use std::io::BufRead;
use std::path::Path;

use fxhash::FxHashMap;
use varanno_core::utils::{get_dynamic_reader, strip_chr_prefix};

use crate::errors::{GeneModelError, GeneModelResult};

///
/// Source of reference bases. Coordinates are 1-based and inclusive.
///
pub trait SequenceProvider: Send + Sync {
    /// Bases of `chrom` from `start` to `end`, or `None` if the range is not
    /// covered.
    fn sequence(&self, chrom: &str, start: u64, end: u64) -> Option<String>;

    /// Single base at `pos`.
    fn base(&self, chrom: &str, pos: u64) -> Option<char> {
        self.sequence(chrom, pos, pos)
            .and_then(|seq| seq.chars().next())
    }
}

///
/// A whole FASTA file held in memory, one uppercase sequence per contig.
/// Contig names are stored without a `chr` prefix so lookups work with
/// either naming convention.
///
#[derive(Debug, Default, Clone)]
pub struct FastaSequences {
    contigs: FxHashMap<String, Vec<u8>>,
}

impl FastaSequences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fasta(path: &Path) -> GeneModelResult<Self> {
        let reader = get_dynamic_reader(path)?;
        let mut sequences = FastaSequences::new();
        let mut current: Option<(String, Vec<u8>)> = None;

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }

            if let Some(header) = line.strip_prefix('>') {
                if let Some((name, seq)) = current.take() {
                    sequences.insert(&name, seq);
                }
                // name ends at the first whitespace
                let name = header.split_whitespace().next().unwrap_or_default();
                current = Some((name.to_string(), Vec::new()));
            } else {
                match current.as_mut() {
                    Some((_, seq)) => seq.extend(line.bytes().map(|b| b.to_ascii_uppercase())),
                    None => return Err(GeneModelError::FastaParse(i + 1)),
                }
            }
        }

        if let Some((name, seq)) = current {
            sequences.insert(&name, seq);
        }

        tracing::debug!("loaded {} contigs from {:?}", sequences.contigs.len(), path);

        Ok(sequences)
    }

    pub fn insert(&mut self, chrom: &str, sequence: Vec<u8>) {
        self.contigs
            .insert(strip_chr_prefix(chrom).to_string(), sequence);
    }

    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }
}

impl SequenceProvider for FastaSequences {
    fn sequence(&self, chrom: &str, start: u64, end: u64) -> Option<String> {
        if start == 0 || end < start {
            return None;
        }
        let contig = self.contigs.get(strip_chr_prefix(chrom))?;
        let bytes = contig.get((start - 1) as usize..end as usize)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;
    use tempfile::tempdir;

    #[fixture]
    fn fasta() -> FastaSequences {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ref.fa");
        std::fs::write(&path, ">chr1 test contig\nacgtAC\nGTAC\n>2\nTTTT\n").unwrap();
        FastaSequences::from_fasta(&path).unwrap()
    }

    #[rstest]
    fn test_fasta_multiline_contig(fasta: FastaSequences) {
        assert_eq!(fasta.len(), 2);
        assert_eq!(fasta.sequence("1", 1, 10), Some("ACGTACGTAC".to_string()));
        assert_eq!(fasta.sequence("chr1", 5, 7), Some("ACG".to_string()));
    }

    #[rstest]
    fn test_fasta_out_of_range(fasta: FastaSequences) {
        assert_eq!(fasta.sequence("2", 3, 5), None);
        assert_eq!(fasta.sequence("3", 1, 1), None);
        assert_eq!(fasta.base("2", 0), None);
    }

    #[rstest]
    fn test_fasta_single_base(fasta: FastaSequences) {
        assert_eq!(fasta.base("chr2", 4), Some('T'));
    }

    #[rstest]
    fn test_fasta_sequence_before_header_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.fa");
        std::fs::write(&path, "ACGT\n>1\nA\n").unwrap();
        let result = FastaSequences::from_fasta(&path);
        assert_eq!(matches!(result, Err(GeneModelError::FastaParse(1))), true);
    }
}
