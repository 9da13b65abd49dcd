//! External annotation sources and their merging into annotated variants.
//!
//! A source is a tab-separated table with a header line, declared in the
//! pipeline configuration. How its rows are found for a variant depends on
//! its [`Strategy`]; which columns fill which schema fields, and through
//! which code table, is declared per column.

pub mod codes;
pub mod merger;
pub mod table;

use std::collections::BTreeMap;
use std::path::PathBuf;

use fxhash::FxHashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::{AnnotateError, AnnotateResult};
use crate::record::MISSING;

// re-exports
pub use codes::{CodeTable, CodeTables};
pub use merger::{CrossReferenceMerger, WorkerLiftover};
pub use table::TsvSource;

pub const DEFAULT_CANONICAL_VALUE: &str = "YES";
pub const DEFAULT_SPLICING_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One row per (position, reference, alternate).
    Positional,
    /// Positional rows listing one value per transcript, `;`-separated.
    TranscriptIndexed,
    /// Rows keyed by gene symbol or gene id.
    Gene,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BuildColumns {
    pub chrom: String,
    pub pos: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SourceKeys {
    pub chrom: String,
    pub pos: String,
    /// Position columns of other genome builds, by build name.
    pub build_positions: BTreeMap<String, BuildColumns>,
    /// Rows are filtered on these when the table has them.
    pub reference: String,
    pub alternate: String,
    /// `;`-separated transcript ids of a row.
    pub transcripts: Option<String>,
    /// `;`-separated flags marking the canonical transcript of a row.
    pub canonical_flag: Option<String>,
    pub canonical_value: String,
    pub gene_symbol: Option<String>,
    pub gene_id: Option<String>,
}

impl Default for SourceKeys {
    fn default() -> Self {
        SourceKeys {
            chrom: "chr".to_string(),
            pos: "pos".to_string(),
            build_positions: BTreeMap::new(),
            reference: "ref".to_string(),
            alternate: "alt".to_string(),
            transcripts: None,
            canonical_flag: None,
            canonical_value: DEFAULT_CANONICAL_VALUE.to_string(),
            gene_symbol: None,
            gene_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnMapping {
    pub column: String,
    pub field: String,
    /// Code table the raw value goes through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codes: Option<String>,
    /// The column lists one value per transcript.
    #[serde(default)]
    pub per_transcript: bool,
}

///
/// A categorical prediction derived from a score column:
/// `above` when the score is strictly greater than `threshold`, else `otherwise`.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DerivedPrediction {
    pub column: String,
    pub field: String,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    pub above: String,
    pub otherwise: String,
}

fn default_threshold() -> f64 {
    DEFAULT_SPLICING_THRESHOLD
}

///
/// Columns whose per-transcript values follow their own order. Their index
/// is found by matching `aaref + aapos[transcript index] + aaalt` in `list`.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RealignKeys {
    pub list: String,
    pub aaref: String,
    pub aapos: String,
    pub aaalt: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceDeclaration {
    pub name: String,
    pub path: PathBuf,
    pub strategy: Strategy,
    /// Genome build of the table, when it differs from the analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    /// Variant types the table covers. Empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variant_types: Vec<String>,
    #[serde(default)]
    pub keys: SourceKeys,
    #[serde(default)]
    pub columns: Vec<ColumnMapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<DerivedPrediction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realign: Option<RealignKeys>,
}

impl SourceDeclaration {
    fn error(&self, msg: String) -> AnnotateError {
        AnnotateError::Source {
            name: self.name.clone(),
            msg,
        }
    }

    pub fn validate(&mut self) -> AnnotateResult<()> {
        if self.name.trim().is_empty() {
            return Err(AnnotateError::Config("annotation sources need a name".to_string()));
        }
        if self.strategy == Strategy::Gene
            && self.keys.gene_symbol.is_none()
            && self.keys.gene_id.is_none()
        {
            return Err(self.error("gene sources need a gene_symbol or gene_id key".to_string()));
        }
        for mapping in &self.columns {
            if mapping.column.is_empty() || mapping.field.is_empty() {
                return Err(self.error("column mappings need a column and a field".to_string()));
            }
        }
        for derived in &self.derived {
            if !derived.threshold.is_finite() {
                return Err(self.error(format!("threshold of '{}' is not a number", derived.column)));
            }
        }
        for variant_type in self.variant_types.iter_mut() {
            *variant_type = variant_type.to_ascii_uppercase();
        }
        Ok(())
    }

    /// Every column the declaration reads values from.
    pub fn value_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(|m| m.column.as_str())
            .chain(self.derived.iter().map(|d| d.column.as_str()))
    }

    pub fn covers(&self, variant_type: &str) -> bool {
        self.variant_types.is_empty() || self.variant_types.iter().any(|t| t == variant_type)
    }
}

///
/// One row of a source, addressed by column name. Missing (`.`) and empty
/// cells read as `None`, the same as absent columns.
///
#[derive(Debug, Clone, Copy)]
pub struct SourceRow<'a> {
    columns: &'a FxHashMap<String, usize>,
    values: &'a [String],
}

impl<'a> SourceRow<'a> {
    pub fn new(columns: &'a FxHashMap<String, usize>, values: &'a [String]) -> Self {
        SourceRow { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = *self.columns.get(column)?;
        self.values
            .get(index)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && *v != MISSING)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }
}

///
/// A table of external annotations, shared read-only between workers.
///
pub trait AnnotationSource: Send + Sync {
    fn declaration(&self) -> &SourceDeclaration;

    ///
    /// Rows at `chrom:pos`. `build` selects the position columns of another
    /// genome build; `None` uses the main ones.
    ///
    fn by_position(&self, build: Option<&str>, chrom: &str, pos: u64) -> Vec<SourceRow<'_>>;

    /// Rows whose gene symbol or gene id column lists the given value.
    fn by_gene(&self, symbol: Option<&str>, gene_id: Option<&str>) -> Vec<SourceRow<'_>>;

    fn name(&self) -> &str {
        &self.declaration().name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn declaration(strategy: Strategy) -> SourceDeclaration {
        SourceDeclaration {
            name: "scores".to_string(),
            path: PathBuf::from("scores.tsv"),
            strategy,
            build: None,
            variant_types: vec!["snv".to_string()],
            keys: SourceKeys::default(),
            columns: vec![],
            derived: vec![],
            realign: None,
        }
    }

    #[rstest]
    fn test_validate_normalizes_variant_types() {
        let mut declaration = declaration(Strategy::Positional);
        declaration.validate().unwrap();
        assert_eq!(declaration.covers("SNV"), true);
        assert_eq!(declaration.covers("DEL"), false);
    }

    #[rstest]
    fn test_gene_source_needs_gene_key() {
        let mut declaration = declaration(Strategy::Gene);
        assert_eq!(declaration.validate().is_err(), true);
        declaration.keys.gene_symbol = Some("Gene_name".to_string());
        assert_eq!(declaration.validate().is_ok(), true);
    }

    #[rstest]
    fn test_row_reads_missing_as_none() {
        let columns: FxHashMap<String, usize> =
            [("a".to_string(), 0), ("b".to_string(), 1)].into_iter().collect();
        let values = vec![".".to_string(), " 4 ".to_string()];
        let row = SourceRow::new(&columns, &values);
        assert_eq!(row.get("a"), None);
        assert_eq!(row.get("b"), Some("4"));
        assert_eq!(row.get("c"), None);
    }
}
