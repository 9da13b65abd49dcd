//! Coordinate translation between genome builds.
//!
//! [`ChainLiftover`] reads UCSC chain files; [`LastLookupCache`] wraps any
//! [`Liftover`] with a two-entry memo so consecutive records at the same
//! locus do not repeat the lookup.

use std::io::BufRead;
use std::path::Path;

use fxhash::FxHashMap;
use varanno_core::Strand;
use varanno_core::utils::{get_dynamic_reader, strip_chr_prefix};

use crate::errors::{GeneModelError, GeneModelResult};

///
/// Translate a 1-based position from one build to another. `None` means the
/// position has no counterpart in the target build.
///
pub trait Liftover {
    fn lift(&self, chrom: &str, pos: u64, from: &str, to: &str) -> Option<(String, u64)>;
}

/// An ungapped aligned block followed by the gaps before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainBlock {
    pub size: u64,
    pub target_gap: u64,
    pub query_gap: u64,
}

///
/// One chain of a UCSC chain file. Positions are 0-based half-open, as in the
/// file; `target` is the source build and `query` the destination.
///
#[derive(Debug, Clone)]
pub struct Chain {
    pub score: u64,
    pub target_name: String,
    pub target_start: u64,
    pub target_end: u64,
    pub query_name: String,
    pub query_size: u64,
    pub query_strand: Strand,
    pub query_start: u64,
    pub blocks: Vec<ChainBlock>,
}

impl Chain {
    pub fn contains(&self, pos: u64) -> bool {
        pos >= self.target_start && pos < self.target_end
    }

    /// Lift a 0-based target position. `None` inside a gap.
    pub fn lift_position(&self, pos: u64) -> Option<u64> {
        if !self.contains(pos) {
            return None;
        }

        let mut target = self.target_start;
        let mut query = self.query_start;
        for block in &self.blocks {
            let block_end = target + block.size;
            if pos < block_end {
                let lifted = query + (pos - target);
                return Some(match self.query_strand {
                    Strand::Plus => lifted,
                    Strand::Minus => self.query_size - lifted - 1,
                });
            }
            target = block_end + block.target_gap;
            query += block.size + block.query_gap;
            if pos < target {
                return None;
            }
        }
        None
    }
}

///
/// Liftover backed by a UCSC chain file, for one pair of builds.
///
#[derive(Debug, Clone, Default)]
pub struct ChainLiftover {
    from_build: String,
    to_build: String,
    chains: FxHashMap<String, Vec<Chain>>,
}

fn chain_field<T: std::str::FromStr>(parts: &[&str], index: usize, line: usize) -> GeneModelResult<T> {
    parts
        .get(index)
        .and_then(|v| v.parse::<T>().ok())
        .ok_or_else(|| GeneModelError::ChainParse {
            line,
            msg: format!("invalid field {}", index + 1),
        })
}

impl ChainLiftover {
    ///
    /// Read a chain file (plain or gzipped) mapping `from_build` to `to_build`.
    ///
    pub fn from_file(path: &Path, from_build: &str, to_build: &str) -> GeneModelResult<Self> {
        let reader = get_dynamic_reader(path)?;
        let mut liftover = ChainLiftover {
            from_build: from_build.to_string(),
            to_build: to_build.to_string(),
            chains: FxHashMap::default(),
        };
        let mut current: Option<Chain> = None;

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line_num = i + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts[0] == "chain" {
                if let Some(chain) = current.take() {
                    liftover.add_chain(chain);
                }
                if parts.len() < 12 {
                    return Err(GeneModelError::ChainParse {
                        line: line_num,
                        msg: format!("expected 12+ header fields, got {}", parts.len()),
                    });
                }
                current = Some(Chain {
                    score: chain_field(&parts, 1, line_num)?,
                    target_name: strip_chr_prefix(parts[2]).to_string(),
                    target_start: chain_field(&parts, 5, line_num)?,
                    target_end: chain_field(&parts, 6, line_num)?,
                    query_name: strip_chr_prefix(parts[7]).to_string(),
                    query_size: chain_field(&parts, 8, line_num)?,
                    query_strand: parts[9].parse().map_err(|_| GeneModelError::ChainParse {
                        line: line_num,
                        msg: format!("invalid query strand '{}'", parts[9]),
                    })?,
                    query_start: chain_field(&parts, 10, line_num)?,
                    blocks: Vec::new(),
                });
            } else if let Some(chain) = current.as_mut() {
                let size = chain_field(&parts, 0, line_num)?;
                // the last block of a chain only has a size
                let (target_gap, query_gap) = if parts.len() >= 3 {
                    (chain_field(&parts, 1, line_num)?, chain_field(&parts, 2, line_num)?)
                } else {
                    (0, 0)
                };
                chain.blocks.push(ChainBlock {
                    size,
                    target_gap,
                    query_gap,
                });
            }
        }
        if let Some(chain) = current {
            liftover.add_chain(chain);
        }

        Ok(liftover)
    }

    pub fn add_chain(&mut self, chain: Chain) {
        self.chains
            .entry(chain.target_name.clone())
            .or_default()
            .push(chain);
    }

    pub fn from_build(&self) -> &str {
        &self.from_build
    }

    pub fn to_build(&self) -> &str {
        &self.to_build
    }
}

impl Liftover for ChainLiftover {
    fn lift(&self, chrom: &str, pos: u64, from: &str, to: &str) -> Option<(String, u64)> {
        if !from.eq_ignore_ascii_case(&self.from_build) || !to.eq_ignore_ascii_case(&self.to_build)
        {
            return None;
        }
        let zero_based = pos.checked_sub(1)?;
        let chain = self
            .chains
            .get(strip_chr_prefix(chrom))?
            .iter()
            .filter(|c| c.contains(zero_based))
            .max_by_key(|c| c.score)?;
        let lifted = chain.lift_position(zero_based)?;
        Some((chain.query_name.clone(), lifted + 1))
    }
}

type LookupKey = (String, u64, String, String);

///
/// Remembers the last two lookups of the wrapped liftover. Meant to be owned by
/// a single worker, hence `&mut self`.
///
#[derive(Debug)]
pub struct LastLookupCache<L> {
    inner: L,
    entries: [Option<(LookupKey, Option<(String, u64)>)>; 2],
    hits: u64,
}

impl<L: Liftover> LastLookupCache<L> {
    pub fn new(inner: L) -> Self {
        LastLookupCache {
            inner,
            entries: [None, None],
            hits: 0,
        }
    }

    pub fn lift(&mut self, chrom: &str, pos: u64, from: &str, to: &str) -> Option<(String, u64)> {
        for (key, value) in self.entries.iter().flatten() {
            if key.0 == chrom && key.1 == pos && key.2 == from && key.3 == to {
                self.hits += 1;
                return value.clone();
            }
        }

        let value = self.inner.lift(chrom, pos, from, to);
        // newest first, the oldest entry falls off
        self.entries[1] = self.entries[0].take();
        self.entries[0] = Some((
            (chrom.to_string(), pos, from.to_string(), to.to_string()),
            value.clone(),
        ));
        value
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: Liftover + ?Sized> Liftover for &L {
    fn lift(&self, chrom: &str, pos: u64, from: &str, to: &str) -> Option<(String, u64)> {
        (**self).lift(chrom, pos, from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    use pretty_assertions::assert_eq;
    use rstest::*;
    use tempfile::tempdir;

    // chr1 1-based 101..=200 maps to 1001..=1100, a 10 base gap, then
    // 211..=260 maps to 1106..=1155
    const CHAIN: &str = "chain 1000 chr1 10000 + 100 260 chr1 20000 + 1000 1155 1\n\
                         100 10 5\n\
                         50\n\
                         \n\
                         chain 10 chr2 5000 + 0 100 chr2 5000 - 0 100 2\n\
                         100\n";

    #[fixture]
    fn liftover() -> ChainLiftover {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hg19ToHg38.over.chain");
        std::fs::write(&path, CHAIN).unwrap();
        ChainLiftover::from_file(&path, "GRCh37", "GRCh38").unwrap()
    }

    #[rstest]
    #[case("1", 101, Some(("1".to_string(), 1001)))]
    #[case("chr1", 200, Some(("1".to_string(), 1100)))]
    #[case("1", 205, None)]
    #[case("1", 211, Some(("1".to_string(), 1106)))]
    #[case("1", 50, None)]
    #[case("3", 150, None)]
    #[case("2", 1, Some(("2".to_string(), 5000)))]
    fn test_chain_lift(
        liftover: ChainLiftover,
        #[case] chrom: &str,
        #[case] pos: u64,
        #[case] expected: Option<(String, u64)>,
    ) {
        assert_eq!(liftover.lift(chrom, pos, "GRCh37", "GRCh38"), expected);
    }

    #[rstest]
    fn test_chain_lift_wrong_builds(liftover: ChainLiftover) {
        assert_eq!(liftover.lift("1", 101, "GRCh38", "GRCh37"), None);
    }

    #[rstest]
    fn test_bad_chain_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.chain");
        std::fs::write(&path, "chain 1 chr1\n").unwrap();
        let result = ChainLiftover::from_file(&path, "a", "b");
        assert_eq!(matches!(result, Err(GeneModelError::ChainParse { line: 1, .. })), true);
    }

    struct CountingLiftover {
        calls: Cell<u32>,
    }

    impl Liftover for CountingLiftover {
        fn lift(&self, chrom: &str, pos: u64, _from: &str, _to: &str) -> Option<(String, u64)> {
            self.calls.set(self.calls.get() + 1);
            Some((chrom.to_string(), pos + 1))
        }
    }

    #[rstest]
    fn test_last_lookup_cache_keeps_two_entries() {
        let mut cache = LastLookupCache::new(CountingLiftover { calls: Cell::new(0) });

        assert_eq!(cache.lift("1", 10, "a", "b"), Some(("1".to_string(), 11)));
        assert_eq!(cache.lift("1", 20, "a", "b"), Some(("1".to_string(), 21)));
        assert_eq!(cache.lift("1", 10, "a", "b"), Some(("1".to_string(), 11)));
        assert_eq!(cache.inner().calls.get(), 2);
        assert_eq!(cache.hits(), 1);

        // a third locus pushes out the oldest one
        cache.lift("1", 30, "a", "b");
        cache.lift("1", 20, "a", "b");
        assert_eq!(cache.inner().calls.get(), 3);
        cache.lift("1", 10, "a", "b");
        assert_eq!(cache.inner().calls.get(), 4);
    }
}
