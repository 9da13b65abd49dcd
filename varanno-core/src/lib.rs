//! Core types for varanno.
//!
//! This crate holds the pieces every other varanno crate builds on:
//!
//! - [`Variant`] and its classification ([`VariantType`], [`StructuralSubtype`])
//! - allele normalization ([`normalize()`]), which turns a raw
//!   `(pos, ref, alt)` triple from a call record into its canonical form
//! - strand handling and gzip-aware file readers
//!
//! # Example
//!
//! ```
//! use varanno_core::{normalize, VariantType};
//!
//! let allele = normalize(10, "CTTT", "CTT").unwrap();
//! assert_eq!(allele.variant_type, VariantType::Del);
//! assert_eq!(allele.reference, "CT");
//! assert_eq!(allele.alternate, "C");
//! assert_eq!(allele.length, Some(1));
//! ```

pub mod errors;
pub mod models;
pub mod normalize;
pub mod utils;

// re-exports
pub use errors::{VariantError, VariantResult};
pub use models::{Strand, StructuralSubtype, Variant, VariantType};
pub use normalize::{NormalizeError, NormalizeLimits, NormalizedAllele, Normalizer, normalize};
