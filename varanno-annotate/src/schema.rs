//! The analysis schema: the fixed, ordered set of annotation slots an
//! analysis declares, with their types and where the call record fills them
//! from.

use std::fmt::{self, Display};
use std::fs::read_to_string;
use std::path::Path;

use fxhash::FxHashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::{AnnotateError, AnnotateResult};
use crate::models::{FieldType, FieldValue};

const EMBEDDED_SCHEMA: &str = include_str!("data/schema.toml");

///
/// Column (or column family) of a call record.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Section {
    Chrom,
    Pos,
    Id,
    Ref,
    Alt,
    Qual,
    Filter,
    Info,
    Format,
}

impl Section {
    /// Sections with sub-keys (`INFO`, `FORMAT`).
    pub fn is_keyed(&self) -> bool {
        matches!(self, Section::Info | Section::Format)
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Chrom => "CHROM",
            Section::Pos => "POS",
            Section::Id => "ID",
            Section::Ref => "REF",
            Section::Alt => "ALT",
            Section::Qual => "QUAL",
            Section::Filter => "FILTER",
            Section::Info => "INFO",
            Section::Format => "FORMAT",
        };
        write!(f, "{}", name)
    }
}

///
/// How a comma-separated multi-value sub-field is reduced to the value of
/// one alternate allele.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FanOut {
    /// The whole value, untouched.
    #[default]
    Whole,
    /// First value only (reference-scoped annotations).
    Reference,
    /// Values list the reference first: take `values[alt + 1]`, else the last.
    WithReference,
    /// Values list alternates only: take `values[alt]`, else the first.
    Alternate,
}

impl FanOut {
    pub fn select<'a>(&self, value: &'a str, alt_index: usize) -> &'a str {
        if *self == FanOut::Whole {
            return value;
        }
        let values: Vec<&str> = value.split(',').collect();
        match self {
            FanOut::Whole => value,
            FanOut::Reference => values[0],
            FanOut::WithReference => values
                .get(alt_index + 1)
                .copied()
                .unwrap_or(values[values.len() - 1]),
            FanOut::Alternate => values.get(alt_index).copied().unwrap_or(values[0]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldSource {
    pub section: Section,
    /// Sub-field key, for `INFO` and `FORMAT` only.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub fan_out: FanOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldTag {
    /// Binary damaging/tolerated predictor counted by the consensus score.
    ImpactPrediction,
    ImpactRankscore,
    ConservationRankscore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Allowed labels of an enum field. Empty accepts any label.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<FieldTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<FieldSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDefinition {
    pub fn parse_value(&self, raw: &str) -> Option<FieldValue> {
        FieldValue::parse(self.field_type, raw, &self.values)
    }

    pub fn coerce(&self, value: FieldValue) -> Option<FieldValue> {
        value.coerce(self.field_type, &self.values)
    }

    pub fn has_tag(&self, tag: FieldTag) -> bool {
        self.tags.contains(&tag)
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct SchemaFile {
    #[serde(default = "default_schema_name")]
    name: String,
    #[serde(rename = "field", default)]
    fields: Vec<FieldDefinition>,
}

fn default_schema_name() -> String {
    "default".to_string()
}

///
/// Ordered set of annotation slots of one analysis. Built once at start-up
/// and shared read-only.
///
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSchema {
    name: String,
    fields: Vec<FieldDefinition>,
    by_name: FxHashMap<String, usize>,
    by_source: FxHashMap<(Section, String), Vec<usize>>,
}

impl AnalysisSchema {
    pub fn new(name: &str, fields: Vec<FieldDefinition>) -> AnnotateResult<Self> {
        let mut by_name = FxHashMap::default();
        let mut by_source: FxHashMap<(Section, String), Vec<usize>> = FxHashMap::default();

        for (i, field) in fields.iter().enumerate() {
            if by_name.insert(field.name.clone(), i).is_some() {
                return Err(AnnotateError::Schema(format!(
                    "field '{}' is declared twice",
                    field.name
                )));
            }
            if let Some(source) = &field.source {
                let key = match (source.section.is_keyed(), &source.key) {
                    (true, Some(key)) => key.clone(),
                    (true, None) => {
                        return Err(AnnotateError::Schema(format!(
                            "field '{}' reads {} but names no key",
                            field.name, source.section
                        )));
                    }
                    (false, _) => String::new(),
                };
                by_source.entry((source.section, key)).or_default().push(i);
            }
        }

        Ok(AnalysisSchema {
            name: name.to_string(),
            fields,
            by_name,
            by_source,
        })
    }

    pub fn from_toml_str(contents: &str) -> AnnotateResult<Self> {
        let file: SchemaFile = toml::from_str(contents)?;
        Self::new(&file.name, file.fields)
    }

    /// The default analysis schema shipped with the crate.
    pub fn embedded() -> AnnotateResult<Self> {
        Self::from_toml_str(EMBEDDED_SCHEMA)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldDefinition> {
        self.fields.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    ///
    /// Slots filled from `section` (and `key` for `INFO`/`FORMAT`). Unmapped
    /// keys give an empty slice.
    ///
    pub fn mapped(&self, section: Section, key: &str) -> &[usize] {
        let key = if section.is_keyed() { key } else { "" };
        self.by_source
            .get(&(section, key.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn tagged(&self, tag: FieldTag) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(move |f| f.has_tag(tag))
    }

    pub fn to_toml_string(&self) -> AnnotateResult<String> {
        let file = SchemaFile {
            name: self.name.clone(),
            fields: self.fields.clone(),
        };
        Ok(toml::to_string_pretty(&file)?)
    }
}

impl TryFrom<&Path> for AnalysisSchema {
    type Error = AnnotateError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let contents = read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn schema() -> AnalysisSchema {
        AnalysisSchema::embedded().unwrap()
    }

    #[rstest]
    #[case(FanOut::Whole, "1,2,3", 1, "1,2,3")]
    #[case(FanOut::Reference, "10,4,6", 1, "10")]
    #[case(FanOut::WithReference, "10,4,6", 1, "6")]
    #[case(FanOut::WithReference, "10,4", 1, "4")]
    #[case(FanOut::Alternate, "0.5,0.25", 1, "0.25")]
    #[case(FanOut::Alternate, "0.5", 2, "0.5")]
    fn test_fan_out(
        #[case] fan_out: FanOut,
        #[case] value: &str,
        #[case] alt_index: usize,
        #[case] expected: &str,
    ) {
        assert_eq!(fan_out.select(value, alt_index), expected);
    }

    #[rstest]
    fn test_embedded_schema_loads(schema: AnalysisSchema) {
        assert_eq!(schema.name(), "default");
        assert_eq!(schema.contains("consensus_prediction"), true);
        assert_eq!(schema.index_of("chr"), Some(schema.names().position(|n| n == "chr").unwrap()));
    }

    #[rstest]
    fn test_mapped_lookup(schema: AnalysisSchema) {
        let af = schema.mapped(Section::Info, "AF");
        assert_eq!(af.len(), 1);
        assert_eq!(schema.fields()[af[0]].name, "allele_frequency");
        assert_eq!(schema.mapped(Section::Info, "NOT_A_KEY").is_empty(), true);

        let qual = schema.mapped(Section::Qual, "ignored");
        assert_eq!(schema.fields()[qual[0]].name, "confidence");
    }

    #[rstest]
    fn test_impact_predictors_are_tagged(schema: AnalysisSchema) {
        let tagged: Vec<&str> = schema
            .tagged(FieldTag::ImpactPrediction)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(tagged.len(), 15);
        assert_eq!(tagged.contains(&"sift4g_pred"), true);
    }

    #[rstest]
    fn test_duplicate_field_rejected() {
        let toml = r#"
[[field]]
name = "chr"
type = "text"

[[field]]
name = "chr"
type = "text"
"#;
        let result = AnalysisSchema::from_toml_str(toml);
        assert_eq!(matches!(result, Err(AnnotateError::Schema(_))), true);
    }

    #[rstest]
    fn test_keyed_source_requires_key() {
        let toml = r#"
[[field]]
name = "depth"
type = "int"
source = { section = "INFO" }
"#;
        assert_eq!(AnalysisSchema::from_toml_str(toml).is_err(), true);
    }

    #[rstest]
    fn test_schema_round_trips_through_toml(schema: AnalysisSchema) {
        let text = schema.to_toml_string().unwrap();
        let reloaded = AnalysisSchema::from_toml_str(&text).unwrap();
        assert_eq!(reloaded.fields(), schema.fields());
    }
}
