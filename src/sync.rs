//! The reconciliation engine: upserts normalized spreadsheet rows into a table.
//!
//! Rows are processed strictly in order over one store connection. Each row
//! runs in its own transaction: an existence check on the primary key picks
//! `UPDATE` or `INSERT`, success commits, and a failure rolls back that row
//! only, is counted, and the run moves on to the next row. A lost connection
//! or a failed rollback ends the run instead; rows committed before it stay.
//!
//! The existence check and the write are two statements. Another writer can
//! insert or delete the same key in between; the engine does not lock
//! against that, and the losing statement shows up as a row error.

use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    catalog,
    error::{StoreError, SyncError},
    mapping::ColumnMapping,
    normalize::{DEFAULT_MAX_TEXT_LEN, NormalizedRecord, Normalizer, SqlValue},
    source::Dataset,
    store::{Statement, Store, quote_identifier},
};

pub const DEFAULT_ROW_CAP: usize = 20;

/// Engine tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Rows processed when the caller gives no limit and the source is larger.
    pub default_row_cap: usize,
    /// Character bound for text values.
    pub max_text_len: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            default_row_cap: DEFAULT_ROW_CAP,
            max_text_len: DEFAULT_MAX_TEXT_LEN,
        }
    }
}

/// Everything one sync needs to know about its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub table: String,
    pub mapping: ColumnMapping,
    pub primary_key: Option<String>,
    pub row_limit: Option<usize>,
}

impl SyncRequest {
    pub fn new(table: impl Into<String>, mapping: ColumnMapping) -> Self {
        Self {
            table: table.into(),
            mapping,
            primary_key: None,
            row_limit: None,
        }
    }

    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = Some(key.into());
        self
    }

    pub fn with_row_limit(mut self, limit: usize) -> Self {
        self.row_limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Rows selected for processing, after any row cap.
    pub total_rows: usize,
    pub inserted: usize,
    pub updated: usize,
    pub errors: usize,
    pub error_messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SyncResult {
    pub fn attempted(&self) -> usize {
        self.inserted + self.updated + self.errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCap {
    Unlimited,
    Explicit(usize),
    Default(usize),
}

impl RowCap {
    /// A positive `row_limit` wins; `Some(0)` disables capping; `None` falls
    /// back to `default_cap` only when the source is larger than it.
    pub fn resolve(row_limit: Option<usize>, default_cap: usize, available: usize) -> Self {
        match row_limit {
            Some(limit) if limit > 0 => RowCap::Explicit(limit),
            Some(_) => RowCap::Unlimited,
            None if default_cap > 0 && available > default_cap => RowCap::Default(default_cap),
            None => RowCap::Unlimited,
        }
    }

    pub fn selected(&self, available: usize) -> usize {
        match self {
            RowCap::Unlimited => available,
            RowCap::Explicit(limit) | RowCap::Default(limit) => available.min(*limit),
        }
    }

    pub fn note(&self, processed: usize, original: usize) -> Option<String> {
        if processed >= original {
            return None;
        }
        match self {
            RowCap::Unlimited => None,
            RowCap::Explicit(limit) => Some(format!(
                "Processed {processed} of {original} rows: limited by the requested row limit of {limit}."
            )),
            RowCap::Default(cap) => Some(format!(
                "Processed only the first {processed} of {original} rows: the default safety cap of \
                 {cap} rows applies when no row limit is given."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Inserted,
    Updated,
}

#[derive(Debug)]
enum RowFailure {
    /// The row was rolled back; the connection is still usable.
    Row(StoreError),
    Connection(StoreError),
}

/// Synchronizes `source` into `request.table`.
///
/// Connectivity, a missing target table, and a mapping that matches no
/// source column are fatal and return before any row is written. Losing the
/// connection mid-run aborts with [`SyncError::Connectivity`]. Every other
/// failure is recorded per row in the returned [`SyncResult`].
pub fn sync<S: Store + ?Sized>(
    store: &mut S,
    source: &Dataset,
    request: &SyncRequest,
    options: &SyncOptions,
) -> Result<SyncResult, SyncError> {
    store.ping().map_err(SyncError::Connectivity)?;
    if !store.list_tables()?.contains(&request.table) {
        return Err(SyncError::Schema(format!(
            "target table '{}' does not exist",
            request.table
        )));
    }

    let columns = request.mapping.resolve(source.headers());
    if columns.is_empty() {
        return Err(SyncError::Mapping(
            "none of the mapped source columns exist in the source file".to_string(),
        ));
    }
    let missing = request.mapping.missing_sources(source.headers());
    if !missing.is_empty() {
        warn!(
            "Skipping mapped column(s) absent from the source: {}",
            missing.iter().join(", ")
        );
    }

    let mut result = SyncResult {
        total_rows: source.len(),
        ..SyncResult::default()
    };
    let original = result.total_rows;
    let cap = RowCap::resolve(request.row_limit, options.default_row_cap, original);
    let selected = cap.selected(original);
    result.total_rows = selected;
    if selected < original {
        warn!("Processing only the first {selected} of {original} row(s)");
    }

    let normalizer = Normalizer::new(options.max_text_len);
    let records = source.rows()[..selected]
        .iter()
        .map(|row| normalizer.normalize_resolved(row, &columns))
        .collect::<Vec<_>>();

    let primary_key = resolve_primary_key(store, request);
    info!(
        "Syncing {} row(s) into '{}' ({})",
        records.len(),
        request.table,
        match &primary_key {
            Some(key) => format!("upsert on '{key}'"),
            None => "insert only".to_string(),
        }
    );

    for (idx, record) in records.iter().enumerate() {
        match apply_record(store, &request.table, primary_key.as_deref(), record) {
            Ok(RowOutcome::Inserted) => result.inserted += 1,
            Ok(RowOutcome::Updated) => result.updated += 1,
            Err(RowFailure::Row(err)) => {
                let message = format!("row {}: {err}", idx + 1);
                warn!("Error processing {message}");
                result.errors += 1;
                result.error_messages.push(message);
            }
            Err(RowFailure::Connection(err)) => {
                warn!(
                    "Aborting sync into '{}' at row {} after {} inserted, {} updated: {err}",
                    request.table,
                    idx + 1,
                    result.inserted,
                    result.updated
                );
                return Err(SyncError::Connectivity(err));
            }
        }
    }

    result.note = cap.note(selected, original);
    info!(
        "Sync into '{}' finished: {} inserted, {} updated, {} error(s)",
        request.table, result.inserted, result.updated, result.errors
    );
    Ok(result)
}

fn resolve_primary_key<S: Store + ?Sized>(store: &mut S, request: &SyncRequest) -> Option<String> {
    match request.primary_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Some(key.to_string()),
        _ => match catalog::primary_key(store, &request.table) {
            Ok(found) => {
                if let Some(key) = &found {
                    debug!("Discovered primary key '{key}' on '{}'", request.table);
                }
                found
            }
            Err(err) => {
                debug!("Primary key discovery failed, continuing without one: {err}");
                None
            }
        },
    }
}

fn apply_record<S: Store + ?Sized>(
    store: &mut S,
    table: &str,
    primary_key: Option<&str>,
    record: &NormalizedRecord,
) -> Result<RowOutcome, RowFailure> {
    let err = match store
        .begin()
        .and_then(|()| write_record(store, table, primary_key, record))
        .and_then(|outcome| store.commit().map(|()| outcome))
    {
        Ok(outcome) => return Ok(outcome),
        Err(err) => err,
    };
    if err.is_connection_lost() {
        return Err(RowFailure::Connection(err));
    }
    match store.rollback() {
        Ok(()) => Err(RowFailure::Row(err)),
        Err(rollback_err) => {
            warn!("Rollback failed after '{err}'");
            Err(RowFailure::Connection(rollback_err))
        }
    }
}

fn write_record<S: Store + ?Sized>(
    store: &mut S,
    table: &str,
    primary_key: Option<&str>,
    record: &NormalizedRecord,
) -> Result<RowOutcome, StoreError> {
    let key = primary_key.and_then(|key| {
        record
            .get(key)
            .filter(|value| !value.is_null())
            .map(|value| (key, value))
    });

    if let Some((key, value)) = key {
        if store.exists(&exists_statement(table, key, value))? {
            if let Some(update) = update_statement(table, key, record) {
                debug!("{}", update.sql);
                store.execute(&update)?;
            }
            return Ok(RowOutcome::Updated);
        }
    }

    let insert = insert_statement(table, record);
    debug!("{}", insert.sql);
    store.execute(&insert)?;
    Ok(RowOutcome::Inserted)
}

pub fn exists_statement(table: &str, key: &str, value: &SqlValue) -> Statement {
    Statement::new(
        format!(
            "SELECT 1 FROM {} WHERE {} = ? LIMIT 1",
            quote_identifier(table),
            quote_identifier(key)
        ),
        vec![value.clone()],
    )
}

pub fn insert_statement(table: &str, record: &NormalizedRecord) -> Statement {
    let fields = record.fields();
    Statement::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            fields.iter().map(|(name, _)| quote_identifier(name)).join(", "),
            fields.iter().map(|_| "?").join(", ")
        ),
        fields.iter().map(|(_, value)| value.clone()).collect(),
    )
}

/// `None` when the record has no column besides the key.
pub fn update_statement(table: &str, key: &str, record: &NormalizedRecord) -> Option<Statement> {
    let (assignments, mut params): (Vec<String>, Vec<SqlValue>) = record
        .fields()
        .iter()
        .filter(|(name, _)| name != key)
        .map(|(name, value)| (format!("{} = ?", quote_identifier(name)), value.clone()))
        .unzip();
    if assignments.is_empty() {
        return None;
    }
    params.push(record.get(key).cloned().unwrap_or(SqlValue::Null));
    Some(Statement::new(
        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_identifier(table),
            assignments.join(", "),
            quote_identifier(key)
        ),
        params,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, SqlValue)]) -> NormalizedRecord {
        let mut record = NormalizedRecord::default();
        for (name, value) in fields {
            record.set(name, value.clone());
        }
        record
    }

    #[test]
    fn row_cap_prefers_explicit_limits() {
        assert_eq!(RowCap::resolve(Some(5), 20, 25), RowCap::Explicit(5));
        assert_eq!(RowCap::resolve(None, 20, 25), RowCap::Default(20));
        assert_eq!(RowCap::resolve(None, 20, 20), RowCap::Unlimited);
        assert_eq!(RowCap::resolve(Some(0), 20, 25), RowCap::Unlimited);
        assert_eq!(RowCap::Explicit(50).selected(10), 10);
    }

    #[test]
    fn notes_name_counts_and_cap_kind() {
        let explicit = RowCap::Explicit(5).note(5, 25).unwrap();
        assert!(explicit.contains("5 of 25"));
        assert!(explicit.contains("row limit"));
        let default = RowCap::Default(20).note(20, 25).unwrap();
        assert!(default.contains("20 of 25"));
        assert!(default.contains("default safety cap"));
        assert_eq!(RowCap::Explicit(50).note(10, 10), None);
    }

    #[test]
    fn insert_statement_covers_every_column() {
        let statement = insert_statement(
            "people",
            &record(&[
                ("id", SqlValue::Integer(1)),
                ("name", SqlValue::Text("Ada".into())),
            ]),
        );
        assert_eq!(
            statement.sql,
            "INSERT INTO `people` (`id`, `name`) VALUES (?, ?)"
        );
        assert_eq!(statement.params.len(), 2);
    }

    #[test]
    fn update_statement_sets_non_key_columns_and_filters_by_key() {
        let statement = update_statement(
            "people",
            "id",
            &record(&[
                ("id", SqlValue::Integer(7)),
                ("name", SqlValue::Text("Ada".into())),
                ("age", SqlValue::Null),
            ]),
        )
        .unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE `people` SET `name` = ?, `age` = ? WHERE `id` = ?"
        );
        assert_eq!(
            statement.params,
            vec![
                SqlValue::Text("Ada".into()),
                SqlValue::Null,
                SqlValue::Integer(7)
            ]
        );
    }

    #[test]
    fn update_statement_is_skipped_for_key_only_records() {
        assert!(update_statement("t", "id", &record(&[("id", SqlValue::Integer(1))])).is_none());
    }

    #[test]
    fn result_serializes_without_empty_note() {
        let result = SyncResult {
            total_rows: 2,
            inserted: 2,
            ..SyncResult::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["total_rows"], 2);
        assert!(json.get("note").is_none());
        assert_eq!(json["error_messages"], serde_json::json!([]));
    }
}
