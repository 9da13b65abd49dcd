use thiserror::Error;

#[derive(Error, Debug)]
pub enum VariantError {
    #[error("Unknown variant type: {0}")]
    UnknownVariantType(String),

    #[error("Unknown strand: {0}")]
    UnknownStrand(String),

    #[error(transparent)]
    Normalize(#[from] crate::normalize::NormalizeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type VariantResult<T> = std::result::Result<T, VariantError>;
