//! Pipeline configuration, read from TOML (or YAML) with defaults for every
//! key, so an empty file is a valid configuration.

use std::ffi::OsStr;
use std::fmt::{self, Display};
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};

use varanno_core::NormalizeLimits;

use crate::errors::{AnnotateError, AnnotateResult};
use crate::sources::SourceDeclaration;

pub const DEFAULT_GENOME_BUILD: &str = "GRCh38";
pub const DEFAULT_BATCH_SIZE: usize = 1024;

///
/// Variant caller that produced the records. Only changes how a few
/// sample-level fields are decoded.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Caller {
    #[default]
    Generic,
    Gatk,
    Mutect,
    Torrent,
    Lifescope,
}

impl FromStr for Caller {
    type Err = AnnotateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(Caller::Generic),
            "gatk" => Ok(Caller::Gatk),
            "mutect" => Ok(Caller::Mutect),
            "torrent" => Ok(Caller::Torrent),
            "lifescope" => Ok(Caller::Lifescope),
            _ => Err(AnnotateError::Config(format!("unknown caller '{}'", s))),
        }
    }
}

impl Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Caller::Generic => "generic",
            Caller::Gatk => "gatk",
            Caller::Mutect => "mutect",
            Caller::Torrent => "torrent",
            Caller::Lifescope => "lifescope",
        };
        write!(f, "{}", name)
    }
}

/// Indel sizes above which alleles are stored as structural variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct NormalizationConfig {
    pub max_deletion_length: usize,
    pub max_insertion_length: usize,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        let limits = NormalizeLimits::default();
        NormalizationConfig {
            max_deletion_length: limits.max_deletion_length,
            max_insertion_length: limits.max_insertion_length,
        }
    }
}

impl From<NormalizationConfig> for NormalizeLimits {
    fn from(config: NormalizationConfig) -> Self {
        NormalizeLimits {
            max_deletion_length: config.max_deletion_length,
            max_insertion_length: config.max_insertion_length,
        }
    }
}

/// A continuous predictor that counts when its score is strictly above `above`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreThreshold {
    pub field: String,
    pub above: f64,
}

impl ScoreThreshold {
    pub fn new(field: &str, above: f64) -> Self {
        ScoreThreshold {
            field: field.to_string(),
            above,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ConsensusConfig {
    pub thresholds: Vec<ScoreThreshold>,
    /// Enum fields holding a splicing prediction.
    pub splicing_predictions: Vec<String>,
    pub affecting_splicing: String,
    /// Label counted for every field tagged `impact_prediction`.
    pub damaging: String,
    pub aloft_field: String,
    pub aloft_tolerant: String,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        ConsensusConfig {
            thresholds: vec![
                ScoreThreshold::new("cadd_phred", 20.0),
                ScoreThreshold::new("vest_score", 0.5),
                ScoreThreshold::new("revel_score", 0.5),
                ScoreThreshold::new("mvp_score", 0.75),
                ScoreThreshold::new("mutpred_score", 0.75),
            ],
            splicing_predictions: vec![
                "splicing_ada_pred".to_string(),
                "splicing_rf_pred".to_string(),
            ],
            affecting_splicing: "AFFECTING_SPLICING".to_string(),
            damaging: "DAMAGING".to_string(),
            aloft_field: "aloft_pred".to_string(),
            aloft_tolerant: "TOLERANT".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PipelineConfig {
    pub genome_build: String,
    pub caller: Caller,
    /// Sample column to read genotype fields from.
    pub sample: Option<String>,
    /// Analysis name stamped on every output row.
    pub analysis: Option<String>,
    pub normalization: NormalizationConfig,
    pub consensus: ConsensusConfig,
    pub sources: Vec<SourceDeclaration>,
    /// Analysis schema; the embedded default schema when unset.
    pub schema: Option<PathBuf>,
    /// Effect catalog; the embedded catalog when unset.
    pub effects: Option<PathBuf>,
    /// Code tables; the embedded tables when unset.
    pub codes: Option<PathBuf>,
    /// Worker threads, 0 for one per core.
    pub threads: usize,
    pub batch_size: usize,
    /// Also write alleles the selected sample does not carry.
    pub write_absent: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            genome_build: DEFAULT_GENOME_BUILD.to_string(),
            caller: Caller::default(),
            sample: None,
            analysis: None,
            normalization: NormalizationConfig::default(),
            consensus: ConsensusConfig::default(),
            sources: Vec::new(),
            schema: None,
            effects: None,
            codes: None,
            threads: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            write_absent: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(contents: &str) -> AnnotateResult<Self> {
        let config: PipelineConfig = toml::from_str(contents)?;
        config.validate()
    }

    pub fn from_yaml_str(contents: &str) -> AnnotateResult<Self> {
        let config: PipelineConfig = serde_yaml::from_str(contents)?;
        config.validate()
    }

    fn validate(mut self) -> AnnotateResult<Self> {
        if self.batch_size == 0 {
            return Err(AnnotateError::Config("batch_size must be positive".to_string()));
        }
        for source in self.sources.iter_mut() {
            source.validate()?;
        }
        Ok(self)
    }

    ///
    /// Resolve relative paths (schema, catalogs, sources) against `base`,
    /// the directory of the configuration file.
    ///
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        let catalogs = [self.schema.as_mut(), self.effects.as_mut(), self.codes.as_mut()];
        for path in catalogs.into_iter().flatten() {
            resolve(path);
        }
        for source in self.sources.iter_mut() {
            resolve(&mut source.path);
        }
    }

    pub fn to_toml_string(&self) -> AnnotateResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// JSON schema of the configuration file.
    pub fn json_schema() -> AnnotateResult<String> {
        Ok(serde_json::to_string_pretty(&schema_for!(PipelineConfig))?)
    }
}

impl TryFrom<&Path> for PipelineConfig {
    type Error = AnnotateError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let contents = read_to_string(path)?;
        let mut config = match path.extension().and_then(OsStr::to_str) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents)?,
            _ => Self::from_toml_str(&contents)?,
        };
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::tempdir;

    use crate::sources::Strategy;

    #[rstest]
    fn test_empty_config_is_valid() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.normalization.max_deletion_length, 300);
        assert_eq!(config.consensus.thresholds.len(), 5);
    }

    #[rstest]
    fn test_try_from_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("varanno.toml");
        std::fs::write(
            &path,
            r#"
genome_build = "GRCh37"
caller = "mutect"
sample = "S1"

[normalization]
max_deletion_length = 50

[[sources]]
name = "dbnsfp"
path = "dbnsfp.tsv"
strategy = "transcript_indexed"
"#,
        )
        .unwrap();

        let config = PipelineConfig::try_from(path.as_path()).unwrap();
        assert_eq!(config.genome_build, "GRCh37");
        assert_eq!(config.caller, Caller::Mutect);
        assert_eq!(config.normalization.max_deletion_length, 50);
        assert_eq!(config.normalization.max_insertion_length, 500);
        assert_eq!(config.sources[0].strategy, Strategy::TranscriptIndexed);
        assert_eq!(config.sources[0].path, dir.path().join("dbnsfp.tsv"));
    }

    #[rstest]
    fn test_try_from_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("varanno.yaml");
        std::fs::write(&path, "caller: torrent\nthreads: 4\n").unwrap();

        let config = PipelineConfig::try_from(path.as_path()).unwrap();
        assert_eq!(config.caller, Caller::Torrent);
        assert_eq!(config.threads, 4);
    }

    #[rstest]
    fn test_unknown_caller_rejected() {
        assert_eq!(PipelineConfig::from_toml_str("caller = \"bwa\"").is_err(), true);
        assert_eq!("Lifescope".parse::<Caller>().unwrap(), Caller::Lifescope);
    }

    #[rstest]
    fn test_default_config_round_trips() {
        let config = PipelineConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
        assert_eq!(PipelineConfig::json_schema().unwrap().contains("genome_build"), true);
    }
}
