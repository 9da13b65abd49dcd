//! Gene coordinate model for varanno.
//!
//! A [`Gene`] holds the exon/intron/CDS layout of one principal transcript and
//! answers position queries against it: CDS membership, exon and intron
//! lookup, codon position and codon sequence (optionally after applying one
//! pending mutation) and amino-acid translation.
//!
//! Genes are loaded from a GTF into a [`GeneIndex`], which can be
//! pre-serialized to bincode for fast start-up.
//!
//! # Example
//!
//! ```
//! use varanno_core::Strand;
//! use varanno_genes::Gene;
//!
//! let gene = Gene::new("G1", "T1", "1", Strand::Plus, vec![(11, 20, 0), (31, 40, 2)], Some((13, 37)))
//!     .unwrap();
//! assert!(gene.is_in_cds(20));
//! assert_eq!(gene.codon_position(31), Some(2));
//! ```

pub mod codon;
pub mod errors;
pub mod gene;
pub mod gtf;
pub mod index;
pub mod liftover;
pub mod sequence;

// re-exports
pub use errors::{GeneModelError, GeneModelResult};
pub use gene::{Exon, Gene, SPLICE_SITE_WINDOW, biotype_priority};
pub use index::GeneIndex;
pub use liftover::{ChainLiftover, LastLookupCache, Liftover};
pub use sequence::{FastaSequences, SequenceProvider};
