//! Source-to-target column mapping.

use std::collections::HashSet;

use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Target name that drops a source column instead of mapping it.
pub const IGNORE_TARGET: &str = "ignore";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub source: String,
    pub target: String,
}

/// Ordered `source -> target` pairs. Source names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MappingEntry>", into = "Vec<MappingEntry>")]
pub struct ColumnMapping {
    entries: Vec<MappingEntry>,
}

impl ColumnMapping {
    pub fn new<I, S, T>(pairs: I) -> Result<Self, SyncError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for (source, target) in pairs {
            let source = source.into().trim().to_string();
            let target = target.into().trim().to_string();
            if source.is_empty() {
                return Err(SyncError::Mapping(
                    "source column name cannot be empty".to_string(),
                ));
            }
            if !seen.insert(source.clone()) {
                return Err(SyncError::Mapping(format!(
                    "source column '{source}' is mapped more than once"
                )));
            }
            if target.is_empty() || target.eq_ignore_ascii_case(IGNORE_TARGET) {
                continue;
            }
            entries.push(MappingEntry { source, target });
        }
        Ok(Self { entries })
    }

    /// Maps every header to itself, or to its snake_case form.
    pub fn identity(headers: &[String], snake_case: bool) -> Self {
        let entries = headers
            .iter()
            .map(|header| MappingEntry {
                source: header.clone(),
                target: if snake_case {
                    header.to_snake_case()
                } else {
                    header.clone()
                },
            })
            .collect();
        Self { entries }
    }

    /// Parses `source=target` directives; the last `=` splits the pair.
    pub fn parse_directives<S: AsRef<str>>(directives: &[S]) -> Result<Self, SyncError> {
        let pairs = directives
            .iter()
            .map(|directive| {
                let directive = directive.as_ref();
                directive
                    .rsplit_once('=')
                    .map(|(source, target)| (source.to_string(), target.to_string()))
                    .ok_or_else(|| {
                        SyncError::Mapping(format!(
                            "mapping '{directive}' must look like source=target"
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(pairs)
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn target_for(&self, source: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.source == source)
            .map(|entry| entry.target.as_str())
    }

    /// Resolves entries against dataset headers as `(column index, target)`,
    /// skipping sources the dataset does not have.
    pub fn resolve<'a>(&'a self, headers: &[String]) -> Vec<(usize, &'a str)> {
        self.entries
            .iter()
            .filter_map(|entry| {
                headers
                    .iter()
                    .position(|header| header == &entry.source)
                    .map(|idx| (idx, entry.target.as_str()))
            })
            .collect()
    }

    pub fn missing_sources<'a>(&'a self, headers: &[String]) -> Vec<&'a str> {
        self.entries
            .iter()
            .filter(|entry| !headers.contains(&entry.source))
            .map(|entry| entry.source.as_str())
            .collect()
    }
}

impl TryFrom<Vec<MappingEntry>> for ColumnMapping {
    type Error = SyncError;

    fn try_from(entries: Vec<MappingEntry>) -> Result<Self, Self::Error> {
        Self::new(entries.into_iter().map(|entry| (entry.source, entry.target)))
    }
}

impl From<ColumnMapping> for Vec<MappingEntry> {
    fn from(mapping: ColumnMapping) -> Self {
        mapping.entries
    }
}
