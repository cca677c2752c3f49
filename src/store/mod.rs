//! Destination stores.
//!
//! The sync engine and the schema service talk to the destination only
//! through [`Store`]. Statements use `?` placeholders and backtick-quoted
//! identifiers, which both MySQL and SQLite accept; only the introspection
//! queries differ per backend.

pub mod mysql;
pub mod sqlite;

use std::{fmt, path::PathBuf};

use serde::Serialize;

use crate::{error::StoreError, normalize::SqlValue};

pub use self::{mysql::MySqlStore, sqlite::SqliteStore};

pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// One column of a destination table as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub primary_key: bool,
    pub nullable: bool,
}

/// A parameterised SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

pub trait Store {
    /// Verifies the connection is usable.
    fn ping(&mut self) -> Result<(), StoreError>;

    fn list_tables(&mut self) -> Result<Vec<String>, StoreError>;

    /// Columns in ordinal order; empty when the table does not exist.
    fn describe_table(&mut self, table: &str) -> Result<Vec<ColumnInfo>, StoreError>;

    /// Primary key columns ordered by their position in the key.
    fn primary_key_columns(&mut self, table: &str) -> Result<Vec<String>, StoreError>;

    /// Runs a statement and returns the number of affected rows.
    fn execute(&mut self, statement: &Statement) -> Result<u64, StoreError>;

    /// Runs a query and reports whether it produced at least one row.
    fn exists(&mut self, statement: &Statement) -> Result<bool, StoreError>;

    fn begin(&mut self) -> Result<(), StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
}

impl fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum ConnectionConfig {
    MySql(MySqlConfig),
    Sqlite(PathBuf),
}

impl ConnectionConfig {
    pub fn describe(&self) -> String {
        match self {
            ConnectionConfig::MySql(config) => format!(
                "mysql://{}@{}:{}/{}",
                config.user, config.host, config.port, config.database
            ),
            ConnectionConfig::Sqlite(path) => format!("sqlite:{}", path.display()),
        }
    }
}

pub fn connect(config: &ConnectionConfig) -> Result<Box<dyn Store>, StoreError> {
    match config {
        ConnectionConfig::MySql(mysql) => Ok(Box::new(MySqlStore::connect(mysql)?)),
        ConnectionConfig::Sqlite(path) => Ok(Box::new(SqliteStore::open(path)?)),
    }
}

/// Quotes an identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
