//! MySQL backend on `mysql_async`.
//!
//! The store owns a current-thread tokio runtime and blocks on every call,
//! so callers see a plain synchronous connection.

use log::debug;
use mysql_async::{Conn, OptsBuilder, Params, Row, prelude::*};
use tokio::runtime::{Builder, Runtime};

use super::{ColumnInfo, MySqlConfig, Statement, Store, quote_identifier};
use crate::{error::StoreError, normalize::SqlValue};

const ER_ACCESS_DENIED: u16 = 1045;
const ER_BAD_DB: u16 = 1049;

pub struct MySqlStore {
    runtime: Runtime,
    conn: Option<Conn>,
}

impl MySqlStore {
    pub fn connect(config: &MySqlConfig) -> Result<Self, StoreError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(config.password.clone())
            .db_name(Some(config.database.clone()));
        let conn = runtime
            .block_on(Conn::new(opts))
            .map_err(|err| classify_connect_error(err, &config.database))?;
        debug!("Connected to MySQL at {}:{}", config.host, config.port);
        Ok(Self {
            runtime,
            conn: Some(conn),
        })
    }

    fn parts(&mut self) -> Result<(&Runtime, &mut Conn), StoreError> {
        match self.conn.as_mut() {
            Some(conn) => Ok((&self.runtime, conn)),
            None => Err(StoreError::Closed),
        }
    }
}

impl Drop for MySqlStore {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(err) = self.runtime.block_on(conn.disconnect()) {
                debug!("Ignoring MySQL disconnect failure: {err}");
            }
        }
    }
}

impl Store for MySqlStore {
    fn ping(&mut self) -> Result<(), StoreError> {
        let (runtime, conn) = self.parts()?;
        runtime.block_on(conn.ping())?;
        Ok(())
    }

    fn list_tables(&mut self) -> Result<Vec<String>, StoreError> {
        let (runtime, conn) = self.parts()?;
        let mut tables: Vec<String> = runtime.block_on(conn.query("SHOW TABLES"))?;
        tables.sort();
        Ok(tables)
    }

    fn describe_table(&mut self, table: &str) -> Result<Vec<ColumnInfo>, StoreError> {
        let (runtime, conn) = self.parts()?;
        let query = format!("DESCRIBE {}", quote_identifier(table));
        type DescribeRow = (String, String, String, String, Option<String>, String);
        let rows: Vec<DescribeRow> = runtime.block_on(conn.query(query))?;
        Ok(rows
            .into_iter()
            .map(|(field, data_type, null, key, _default, _extra)| ColumnInfo {
                name: field,
                data_type,
                primary_key: key == "PRI",
                nullable: null == "YES",
            })
            .collect())
    }

    fn primary_key_columns(&mut self, table: &str) -> Result<Vec<String>, StoreError> {
        let (runtime, conn) = self.parts()?;
        let query = "
            SELECT COLUMN_NAME
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = DATABASE()
            AND TABLE_NAME = ?
            AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION
        ";
        let columns: Vec<String> = runtime.block_on(conn.exec(query, (table,)))?;
        Ok(columns)
    }

    fn execute(&mut self, statement: &Statement) -> Result<u64, StoreError> {
        let (runtime, conn) = self.parts()?;
        runtime.block_on(conn.exec_drop(statement.sql.as_str(), to_params(&statement.params)))?;
        Ok(conn.affected_rows())
    }

    fn exists(&mut self, statement: &Statement) -> Result<bool, StoreError> {
        let (runtime, conn) = self.parts()?;
        let row: Option<Row> = runtime.block_on(
            conn.exec_first(statement.sql.as_str(), to_params(&statement.params)),
        )?;
        Ok(row.is_some())
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        let (runtime, conn) = self.parts()?;
        runtime.block_on(conn.query_drop("START TRANSACTION"))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let (runtime, conn) = self.parts()?;
        runtime.block_on(conn.query_drop("COMMIT"))?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        let (runtime, conn) = self.parts()?;
        runtime.block_on(conn.query_drop("ROLLBACK"))?;
        Ok(())
    }
}

fn to_params(values: &[SqlValue]) -> Params {
    if values.is_empty() {
        return Params::Empty;
    }
    Params::Positional(values.iter().map(to_mysql_value).collect())
}

fn to_mysql_value(value: &SqlValue) -> mysql_async::Value {
    match value {
        SqlValue::Null => mysql_async::Value::NULL,
        SqlValue::Integer(i) => mysql_async::Value::Int(*i),
        SqlValue::Float(f) => mysql_async::Value::Double(*f),
        SqlValue::Text(s) => mysql_async::Value::Bytes(s.as_bytes().to_vec()),
    }
}

fn classify_connect_error(err: mysql_async::Error, database: &str) -> StoreError {
    match &err {
        mysql_async::Error::Server(server) if server.code == ER_ACCESS_DENIED => {
            StoreError::AccessDenied
        }
        mysql_async::Error::Server(server) if server.code == ER_BAD_DB => {
            StoreError::UnknownDatabase(database.to_string())
        }
        _ => StoreError::MySql(err),
    }
}
