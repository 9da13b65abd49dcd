//! The effect catalog: every functional effect category snpEff can report,
//! with its severity rank, impact bucket, consensus band and gene region.

use std::fmt::{self, Display};
use std::fs::read_to_string;
use std::path::Path;
use std::str::FromStr;

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::{AnnotateError, AnnotateResult};

const EMBEDDED_EFFECTS: &str = include_str!("../data/effects.toml");

/// Name of the category unknown terms resolve to.
pub const NONE_EFFECT: &str = "NONE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Impact {
    High,
    Moderate,
    Low,
    Modifier,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::High => "HIGH",
            Impact::Moderate => "MODERATE",
            Impact::Low => "LOW",
            Impact::Modifier => "MODIFIER",
        }
    }
}

impl FromStr for Impact {
    type Err = AnnotateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HIGH" => Ok(Impact::High),
            "MODERATE" => Ok(Impact::Moderate),
            "LOW" => Ok(Impact::Low),
            "MODIFIER" => Ok(Impact::Modifier),
            _ => Err(AnnotateError::Catalog(format!("unknown impact '{}'", s))),
        }
    }
}

impl Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Gene region an effect category falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneRegion {
    Chromosome,
    Intergenic,
    Upstream,
    #[serde(rename = "utr_5_prime")]
    Utr5Prime,
    SpliceSiteAcceptor,
    SpliceSiteBranch,
    SpliceSiteDonor,
    SpliceSiteRegion,
    Transcript,
    Gene,
    Exon,
    Intron,
    #[serde(rename = "utr_3_prime")]
    Utr3Prime,
    Downstream,
    Regulation,
    Motif,
    MicroRna,
    Genome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectCategory {
    pub name: String,
    /// Sequence Ontology term, empty for categories snpEff no longer emits.
    pub so_term: String,
    /// Older terms still accepted for this category.
    #[serde(default)]
    pub alternative_terms: Vec<String>,
    pub impact: Impact,
    pub priority: u32,
    #[serde(default)]
    pub consensus_base: i64,
    pub region: GeneRegion,
    #[serde(default)]
    pub description: Option<String>,
}

impl EffectCategory {
    /// Label written to output: the ontology term, or the name without one.
    pub fn label(&self) -> &str {
        if self.so_term.is_empty() {
            &self.name
        } else {
            &self.so_term
        }
    }

    fn matches(&self, term: &str) -> bool {
        self.so_term.eq_ignore_ascii_case(term)
            || self
                .alternative_terms
                .iter()
                .any(|alt| alt.eq_ignore_ascii_case(term))
    }
}

impl Display for EffectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(rename = "effect")]
    effects: Vec<EffectCategory>,
}

///
/// Lookup table from effect terms to categories. Loaded once at start-up;
/// matching is data-driven, so new terms only need a catalog entry.
///
#[derive(Debug, Clone)]
pub struct EffectCatalog {
    effects: Vec<EffectCategory>,
    by_name: FxHashMap<String, usize>,
    none: usize,
}

impl EffectCatalog {
    pub fn new(effects: Vec<EffectCategory>) -> AnnotateResult<Self> {
        let mut by_name = FxHashMap::default();
        for (i, effect) in effects.iter().enumerate() {
            if by_name.insert(effect.name.clone(), i).is_some() {
                return Err(AnnotateError::Catalog(format!(
                    "effect '{}' is declared twice",
                    effect.name
                )));
            }
        }
        let none = *by_name.get(NONE_EFFECT).ok_or_else(|| {
            AnnotateError::Catalog(format!("the catalog needs a '{}' effect", NONE_EFFECT))
        })?;

        Ok(EffectCatalog {
            effects,
            by_name,
            none,
        })
    }

    pub fn from_toml_str(contents: &str) -> AnnotateResult<Self> {
        let file: CatalogFile = toml::from_str(contents)?;
        Self::new(file.effects)
    }

    /// The catalog shipped with the crate.
    pub fn embedded() -> AnnotateResult<Self> {
        Self::from_toml_str(EMBEDDED_EFFECTS)
    }

    ///
    /// Category of an effect term: the first category whose ontology term, or
    /// else one of whose older terms, matches case-insensitively. Unknown and
    /// empty terms give the `NONE` category.
    ///
    pub fn lookup(&self, term: &str) -> &EffectCategory {
        let term = term.trim();
        if term.is_empty() {
            return self.none();
        }
        self.effects
            .iter()
            .find(|e| e.so_term.eq_ignore_ascii_case(term))
            .or_else(|| self.effects.iter().find(|e| e.matches(term)))
            .unwrap_or_else(|| self.none())
    }

    pub fn by_name(&self, name: &str) -> Option<&EffectCategory> {
        self.by_name.get(name).map(|i| &self.effects[*i])
    }

    pub fn none(&self) -> &EffectCategory {
        &self.effects[self.none]
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectCategory> {
        self.effects.iter()
    }
}

impl TryFrom<&Path> for EffectCatalog {
    type Error = AnnotateError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let contents = read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
