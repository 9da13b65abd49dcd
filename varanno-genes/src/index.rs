use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use varanno_core::utils::strip_chr_prefix;

use crate::errors::GeneModelResult;
use crate::gene::Gene;
use crate::gtf::load_gtf;

///
/// All genes of a reference, grouped by chromosome and sorted by start.
/// Built once and shared read-only.
///
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GeneIndex {
    by_chrom: FxHashMap<String, Vec<Gene>>,
}

impl GeneIndex {
    pub fn from_genes(genes: Vec<Gene>) -> Self {
        let mut by_chrom: FxHashMap<String, Vec<Gene>> = FxHashMap::default();
        for gene in genes {
            by_chrom
                .entry(strip_chr_prefix(&gene.chrom).to_string())
                .or_default()
                .push(gene);
        }
        for genes in by_chrom.values_mut() {
            genes.sort_by_key(|g| (g.start(), g.end()));
        }
        GeneIndex { by_chrom }
    }

    pub fn from_gtf(path: &Path) -> GeneModelResult<Self> {
        Ok(Self::from_genes(load_gtf(path)?))
    }

    ///
    /// Load an index from either a bincode file written by [`GeneIndex::save_bin`]
    /// (`.bin`) or a GTF.
    ///
    pub fn load(path: &Path) -> GeneModelResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") => Self::load_bin(path),
            _ => Self::from_gtf(path),
        }
    }

    pub fn save_bin(&self, path: &Path) -> GeneModelResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load_bin(path: &Path) -> GeneModelResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }

    pub fn len(&self) -> usize {
        self.by_chrom.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn genes(&self, chrom: &str) -> &[Gene] {
        self.by_chrom
            .get(strip_chr_prefix(chrom))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn by_transcript(&self, transcript_id: &str) -> Option<&Gene> {
        self.by_chrom
            .values()
            .flatten()
            .find(|g| g.transcript_id == transcript_id)
    }

    ///
    /// Genes spanning the whole `[start, end]` interval on `chrom`.
    ///
    /// When several genes share a symbol only the one with the best biotype
    /// priority is kept. Results are in genomic order.
    ///
    pub fn overlapping(&self, chrom: &str, start: u64, end: u64) -> Vec<&Gene> {
        let candidates = self.genes(chrom);
        // sorted by start, so everything past `start` can be skipped
        let upper = candidates.partition_point(|g| g.start() <= start);

        let mut hits: Vec<&Gene> = Vec::new();
        for gene in candidates[..upper].iter().filter(|g| g.end() >= end) {
            match hits.iter().position(|kept| kept.symbol == gene.symbol) {
                Some(i) if gene.biotype_priority() < hits[i].biotype_priority() => hits[i] = gene,
                Some(_) => {}
                None => hits.push(gene),
            }
        }
        hits
    }
}
