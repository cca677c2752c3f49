//! Embedded SQLite backend on `rusqlite`.

use std::path::Path;

use rusqlite::{Connection, params_from_iter, types::Value as SqliteValue};

use super::{ColumnInfo, Statement, Store};
use crate::{error::StoreError, normalize::SqlValue};

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Direct access for fixtures and assertions.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn table_info(&self, table: &str) -> Result<Vec<(String, String, bool, i64)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let rows = stmt
            .query_map([table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)? != 0,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl Store for SqliteStore {
    fn ping(&mut self) -> Result<(), StoreError> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn list_tables(&mut self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn describe_table(&mut self, table: &str) -> Result<Vec<ColumnInfo>, StoreError> {
        Ok(self
            .table_info(table)?
            .into_iter()
            .map(|(name, data_type, not_null, pk)| ColumnInfo {
                name,
                data_type,
                primary_key: pk > 0,
                nullable: !not_null && pk == 0,
            })
            .collect())
    }

    fn primary_key_columns(&mut self, table: &str) -> Result<Vec<String>, StoreError> {
        let mut keyed = self
            .table_info(table)?
            .into_iter()
            .filter(|(_, _, _, pk)| *pk > 0)
            .map(|(name, _, _, pk)| (pk, name))
            .collect::<Vec<_>>();
        keyed.sort();
        Ok(keyed.into_iter().map(|(_, name)| name).collect())
    }

    fn execute(&mut self, statement: &Statement) -> Result<u64, StoreError> {
        let affected = self.conn.execute(
            &statement.sql,
            params_from_iter(statement.params.iter().map(to_sqlite_value)),
        )?;
        Ok(affected as u64)
    }

    fn exists(&mut self, statement: &Statement) -> Result<bool, StoreError> {
        let mut prepared = self.conn.prepare(&statement.sql)?;
        let found =
            prepared.exists(params_from_iter(statement.params.iter().map(to_sqlite_value)))?;
        Ok(found)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

fn to_sqlite_value(value: &SqlValue) -> SqliteValue {
    match value {
        SqlValue::Null => SqliteValue::Null,
        SqlValue::Integer(i) => SqliteValue::Integer(*i),
        SqlValue::Float(f) => SqliteValue::Real(*f),
        SqlValue::Text(s) => SqliteValue::Text(s.clone()),
    }
}
