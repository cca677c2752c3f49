#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use sheet_sync::{data::Value, source::Dataset, store::SqliteStore};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a small customer workbook: integer ids, names, balances, a
    /// date column and a boolean column.
    pub fn write_customer_workbook(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut workbook = Workbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let sheet = workbook.add_worksheet();
        sheet.set_name("Customers").expect("sheet name");
        for (col, header) in ["Customer ID", "Name", "Balance", "Joined", "Active"]
            .iter()
            .enumerate()
        {
            sheet
                .write_string(0, col as u16, *header)
                .expect("write header");
        }
        let rows = [
            (1.0, "Ada", 10.5, (2024, 1, 15), true),
            (2.0, "Grace", 20.0, (2024, 2, 1), false),
            (3.0, "Linus", 0.25, (2024, 3, 9), true),
        ];
        for (idx, (id, name, balance, (y, m, d), active)) in rows.iter().enumerate() {
            let row = idx as u32 + 1;
            sheet.write_number(row, 0, *id).expect("write id");
            sheet.write_string(row, 1, *name).expect("write name");
            sheet.write_number(row, 2, *balance).expect("write balance");
            let date = ExcelDateTime::from_ymd(*y, *m, *d).expect("valid date");
            sheet
                .write_datetime_with_format(row, 3, &date, &date_format)
                .expect("write date");
            sheet.write_boolean(row, 4, *active).expect("write flag");
        }
        workbook.save(&path).expect("save workbook");
        path
    }
}

pub fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

pub fn text(value: &str) -> Option<Value> {
    Some(Value::String(value.to_string()))
}

pub fn int(value: i64) -> Option<Value> {
    Some(Value::Integer(value))
}

/// A dataset of `(id, name)` rows under the headers `ID` and `Name`.
pub fn people(rows: &[(Option<i64>, &str)]) -> Dataset {
    Dataset::new(
        headers(&["ID", "Name"]),
        rows.iter()
            .map(|(id, name)| vec![id.and_then(int), text(name)])
            .collect(),
    )
}

/// An in-memory store holding the `people` table keyed on `id`.
pub fn people_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().expect("open sqlite");
    store
        .connection()
        .execute_batch(
            "CREATE TABLE people (`id` INTEGER, `name` VARCHAR(250), PRIMARY KEY (`id`))",
        )
        .expect("create people");
    store
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM `{table}`"), [], |row| {
        row.get(0)
    })
    .expect("count rows")
}

pub fn name_for(conn: &Connection, id: i64) -> Option<String> {
    conn.query_row("SELECT name FROM people WHERE id = ?1", [id], |row| {
        row.get(0)
    })
    .ok()
}
