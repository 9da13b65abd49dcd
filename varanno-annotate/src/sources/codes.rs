//! Per-column translation tables from source codes to shared labels.

use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{AnnotateError, AnnotateResult};

const EMBEDDED_CODES: &str = include_str!("../data/codes.toml");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeTable {
    #[serde(default)]
    pub case_insensitive: bool,
    pub codes: BTreeMap<String, String>,
}

impl CodeTable {
    pub fn translate(&self, code: &str) -> Option<&str> {
        let code = code.trim();
        let found = if self.case_insensitive {
            self.codes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(code))
                .map(|(_, v)| v)
        } else {
            self.codes.get(code)
        };
        found.map(String::as_str)
    }
}

///
/// Named code tables, referenced by column mappings of annotation sources.
///
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeTables {
    tables: BTreeMap<String, CodeTable>,
}

impl CodeTables {
    pub fn from_toml_str(contents: &str) -> AnnotateResult<Self> {
        let tables: BTreeMap<String, CodeTable> = toml::from_str(contents)?;
        Ok(CodeTables { tables })
    }

    pub fn embedded() -> AnnotateResult<Self> {
        Self::from_toml_str(EMBEDDED_CODES)
    }

    pub fn get(&self, table: &str) -> Option<&CodeTable> {
        self.tables.get(table)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    ///
    /// Translate `code` through `table`. Unknown tables and unknown codes
    /// both give `None`.
    ///
    pub fn translate(&self, table: &str, code: &str) -> Option<&str> {
        self.tables.get(table)?.translate(code)
    }

    /// Fail on the first table name in `names` that is not declared.
    pub fn check<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> AnnotateResult<()> {
        for name in names {
            if !self.contains(name) {
                return Err(AnnotateError::Config(format!("unknown code table '{}'", name)));
            }
        }
        Ok(())
    }
}

impl TryFrom<&Path> for CodeTables {
    type Error = AnnotateError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let contents = read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
