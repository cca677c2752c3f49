//! Table listing, description and creation on a destination store.

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    error::SyncError,
    inference::InferredColumn,
    store::{ColumnInfo, Statement, Store, quote_identifier},
};

/// A column to create: a name plus a SQL type accepted by the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: String,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

impl From<&InferredColumn> for ColumnDefinition {
    fn from(column: &InferredColumn) -> Self {
        Self::new(column.name.clone(), column.storage.to_string())
    }
}

pub fn list_tables<S: Store + ?Sized>(store: &mut S) -> Result<Vec<String>, SyncError> {
    Ok(store.list_tables()?)
}

pub fn describe_table<S: Store + ?Sized>(
    store: &mut S,
    table: &str,
) -> Result<Vec<ColumnInfo>, SyncError> {
    let columns = store.describe_table(table)?;
    if columns.is_empty() {
        return Err(SyncError::Schema(format!(
            "table '{table}' does not exist or has no columns"
        )));
    }
    Ok(columns)
}

/// First primary key column of `table`, if the table declares one.
pub fn primary_key<S: Store + ?Sized>(
    store: &mut S,
    table: &str,
) -> Result<Option<String>, SyncError> {
    Ok(store.primary_key_columns(table)?.into_iter().next())
}

pub fn create_table_statement(
    table: &str,
    columns: &[ColumnDefinition],
    primary_key: Option<&str>,
) -> Result<String, SyncError> {
    if table.trim().is_empty() {
        return Err(SyncError::Schema("table name cannot be empty".to_string()));
    }
    if columns.is_empty() {
        return Err(SyncError::Schema(format!(
            "table '{table}' needs at least one column"
        )));
    }
    let mut parts = columns
        .iter()
        .map(|column| format!("{} {}", quote_identifier(&column.name), column.sql_type))
        .collect::<Vec<_>>();
    if let Some(key) = primary_key {
        if !columns.iter().any(|column| column.name == key) {
            return Err(SyncError::Schema(format!(
                "primary key '{key}' is not one of the columns of '{table}'"
            )));
        }
        parts.push(format!("PRIMARY KEY ({})", quote_identifier(key)));
    }
    Ok(format!(
        "CREATE TABLE {} ({})",
        quote_identifier(table),
        parts.iter().join(", ")
    ))
}

/// Creates `table` with a single DDL statement.
///
/// Fails with [`SyncError::TableExists`] when the table is already listed.
pub fn create_table<S: Store + ?Sized>(
    store: &mut S,
    table: &str,
    columns: &[ColumnDefinition],
    primary_key: Option<&str>,
) -> Result<(), SyncError> {
    let sql = create_table_statement(table, columns, primary_key)?;
    if store.list_tables()?.iter().any(|existing| existing == table) {
        return Err(SyncError::TableExists(table.to_string()));
    }
    debug!("Creating table with SQL: {sql}");
    store
        .execute(&Statement::new(sql, Vec::new()))
        .map_err(SyncError::CreateTable)?;
    info!("Created table '{table}' with {} column(s)", columns.len());
    Ok(())
}
