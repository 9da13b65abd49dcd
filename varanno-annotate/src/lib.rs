//! Call-record annotation for varanno.
//!
//! An [`Annotator`] turns each record of a call file into one
//! [`AnnotatedVariant`] per alternate allele and overlapping gene:
//!
//! - [`AlleleExpander`] splits and normalizes the alternates and decides
//!   whether the selected sample carries them,
//! - [`FieldExtractor`] copies record columns into the slots declared by the
//!   [`AnalysisSchema`],
//! - [`EffectResolver`] picks the canonical functional effect from the `ANN`
//!   annotations of the allele,
//! - [`CrossReferenceMerger`] joins external annotation tables by position,
//!   transcript or gene,
//! - [`ConsensusScorer`] rolls predictor evidence into one pathogenicity score.
//!
//! # Example
//!
//! ```no_run
//! use std::io::BufReader;
//! use std::fs::File;
//!
//! use varanno_annotate::{Annotator, OutputFormat, PipelineConfig, SessionContext, open_writer};
//!
//! let config = PipelineConfig::default();
//! let annotator = Annotator::from_config(&config, SessionContext::default()).unwrap();
//! let mut writer = open_writer(None, OutputFormat::Tsv, annotator.schema()).unwrap();
//! let reader = BufReader::new(File::open("calls.vcf").unwrap());
//! let summary = annotator.run(reader, writer.as_mut(), |_| {}).unwrap();
//! println!("{} variants", summary.variants);
//! ```

pub mod config;
pub mod consensus;
pub mod effects;
pub mod errors;
pub mod expander;
pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod session;
pub mod sources;
pub mod writer;

// re-exports
pub use config::{Caller, ConsensusConfig, NormalizationConfig, PipelineConfig};
pub use consensus::ConsensusScorer;
pub use effects::{EffectCatalog, EffectResolver, Impact};
pub use errors::{AnnotateError, AnnotateResult};
pub use expander::{AlleleExpander, ExpandedAllele};
pub use extractor::FieldExtractor;
pub use models::{AnnotatedVariant, FieldType, FieldValue};
pub use pipeline::{Annotator, RecordOutcome, RunSummary};
pub use record::{RecordHeader, VcfRecord};
pub use schema::AnalysisSchema;
pub use session::SessionContext;
pub use sources::{CodeTables, CrossReferenceMerger, SourceDeclaration};
pub use writer::{OutputFormat, VariantWriter, open_writer};
