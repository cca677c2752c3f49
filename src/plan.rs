//! YAML sync plans: the table, mapping, key, limit and column types of a sync
//! saved to disk so a run can be repeated.

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::{catalog::ColumnDefinition, inference::InferredColumn, mapping::ColumnMapping};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub create: bool,
    #[serde(default, skip_serializing_if = "ColumnMapping::is_empty")]
    pub mapping: ColumnMapping,
    /// SQL types keyed by target column, used when the table is created.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub column_types: BTreeMap<String, String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl SyncPlan {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening sync plan {path:?}"))?;
        let plan: SyncPlan = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing sync plan {path:?}"))?;
        Ok(plan)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating sync plan {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing sync plan YAML")
    }

    /// Records inferred types, keeping any type already present.
    pub fn record_types(&mut self, inferred: &[InferredColumn]) {
        for column in inferred {
            self.column_types
                .entry(column.name.clone())
                .or_insert_with(|| column.storage.to_string());
        }
    }

    /// Folds `column=SQL` directives into `column_types`, replacing earlier
    /// entries for the same column.
    pub fn apply_type_directives<S: AsRef<str>>(&mut self, directives: &[S]) -> Result<()> {
        for directive in directives {
            let (column, sql_type) = parse_type_directive(directive.as_ref())?;
            self.column_types.insert(column, sql_type);
        }
        Ok(())
    }

    /// Column definitions for table creation: inferred order, with types from
    /// the plan winning over inferred ones.
    pub fn column_definitions(&self, inferred: &[InferredColumn]) -> Result<Vec<ColumnDefinition>> {
        if let Some(unknown) = self
            .column_types
            .keys()
            .find(|name| !inferred.iter().any(|column| &column.name == *name))
        {
            bail!("Column type given for '{unknown}', which is not a mapped column");
        }
        let mut definitions: Vec<ColumnDefinition> = Vec::with_capacity(inferred.len());
        for column in inferred {
            if definitions.iter().any(|existing| existing.name == column.name) {
                continue;
            }
            definitions.push(match self.column_types.get(&column.name) {
                Some(sql_type) => ColumnDefinition::new(column.name.clone(), sql_type.clone()),
                None => ColumnDefinition::from(column),
            });
        }
        Ok(definitions)
    }
}

fn parse_type_directive(directive: &str) -> Result<(String, String)> {
    let (column, sql_type) = directive
        .split_once('=')
        .ok_or_else(|| anyhow!("Type override '{directive}' must look like column=SQL_TYPE"))?;
    let column = column.trim();
    let sql_type = sql_type.trim();
    if column.is_empty() || sql_type.is_empty() {
        bail!("Type override '{directive}' needs both a column and a type");
    }
    Ok((column.to_string(), sql_type.to_string()))
}
