use thiserror::Error;

use varanno_core::VariantError;
use varanno_genes::GeneModelError;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Record at line {line}: allele index {index} is out of range ({alternates} alternate(s))")]
    AlleleIndexOutOfRange {
        line: usize,
        index: usize,
        alternates: usize,
    },

    #[error("Record at line {line}: {msg}")]
    MalformedRecord { line: usize, msg: String },

    #[error("No #CHROM header line found before the first record")]
    MissingHeader,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid analysis schema: {0}")]
    Schema(String),

    #[error("Invalid effect catalog: {0}")]
    Catalog(String),

    #[error("Annotation source '{name}': {msg}")]
    Source { name: String, msg: String },

    #[error(transparent)]
    Variant(#[from] VariantError),

    #[error(transparent)]
    GeneModel(#[from] GeneModelError),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSerialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AnnotateError {
    /// Errors that only concern one record. A batch logs them and moves on.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            AnnotateError::AlleleIndexOutOfRange { .. } | AnnotateError::MalformedRecord { .. }
        )
    }
}

pub type AnnotateResult<T> = std::result::Result<T, AnnotateError>;
