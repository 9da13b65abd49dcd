pub mod ann;
pub mod catalog;
pub mod other_transcripts;
pub mod resolver;

// re-exports
pub use ann::{TranscriptEffect, attribute_to_allele, parse_ann};
pub use catalog::{EffectCatalog, EffectCategory, GeneRegion, Impact};
pub use other_transcripts::OtherTranscripts;
pub use resolver::{EffectResolver, Resolution};
