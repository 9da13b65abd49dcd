use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeneModelError {
    #[error("Parsing GTF line {line}: {msg}")]
    GtfParse { line: usize, msg: String },

    #[error("Parsing chain file line {line}: {msg}")]
    ChainParse { line: usize, msg: String },

    #[error("FASTA record without a header at line {0}")]
    FastaParse(usize),

    #[error("Gene {0} has no exons")]
    NoExons(String),

    #[error("Failed to (de)serialize gene index: {0}")]
    Serialization(#[from] bincode::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type GeneModelResult<T> = std::result::Result<T, GeneModelError>;
