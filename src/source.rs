//! Loading spreadsheets and delimited files into an in-memory [`Dataset`].
//!
//! The first row of the sheet (or file) is the header row. Blank headers are
//! named `Unnamed: <index>` and repeated headers receive `.1`, `.2`, ...
//! suffixes so every column can be addressed by name. Fully blank rows are
//! skipped.

use std::{collections::HashSet, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, Reader, open_workbook_auto};
use log::debug;

use crate::{
    data::{Value, is_missing_marker, parse_naive_date, parse_naive_datetime, sniff_value},
    io_utils::{self, SourceFormat},
};

/// Largest magnitude at which an `f64` still represents every integer exactly.
const MAX_EXACT_FLOAT_INTEGER: f64 = 9_007_199_254_740_992.0;

pub const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    pub sheet: Option<String>,
    pub delimiter: Option<u8>,
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<Option<Value>>>,
}

impl Dataset {
    /// Builds a dataset, cleaning headers and padding short rows with empty cells.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<Value>>>) -> Self {
        let headers = clean_headers(headers);
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Option<Value>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_values(&self, index: usize) -> Vec<Option<&Value>> {
        self.rows
            .iter()
            .map(|row| row.get(index).and_then(|cell| cell.as_ref()))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.headers.is_empty() {
            bail!("Source file contains no columns");
        }
        if self.rows.is_empty() {
            bail!("Source file contains no data");
        }
        Ok(())
    }

    /// Renders the first `rows` rows as display strings, empty cells as "".
    pub fn preview(&self, rows: usize) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .take(rows)
            .map(|row| {
                row.iter()
                    .map(|cell| cell.as_ref().map(Value::as_display).unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}

pub fn load_dataset(path: &Path, options: &SourceOptions) -> Result<Dataset> {
    let dataset = match io_utils::detect_format(path)? {
        SourceFormat::Workbook => load_workbook(path, options.sheet.as_deref())?,
        SourceFormat::Delimited => load_delimited(path, options)?,
    };
    debug!(
        "Loaded {} row(s) across {} column(s) from {path:?}",
        dataset.len(),
        dataset.headers().len()
    );
    Ok(dataset)
}

fn load_workbook(path: &Path, sheet: Option<&str>) -> Result<Dataset> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Opening workbook {path:?}"))?;
    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("Workbook {path:?} has no worksheets"))?,
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Reading worksheet '{sheet_name}' from {path:?}"))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(row) => row.iter().map(header_text).collect(),
        None => Vec::new(),
    };
    let rows = rows
        .map(|row| row.iter().map(workbook_cell).collect::<Vec<_>>())
        .filter(|row| row.iter().any(Option::is_some))
        .collect();
    Ok(Dataset::new(headers, rows))
}

fn load_delimited(path: &Path, options: &SourceOptions) -> Result<Dataset> {
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let encoding = io_utils::resolve_encoding(options.encoding.as_deref())?;
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let header_record = reader
        .byte_headers()
        .with_context(|| format!("Reading headers from {path:?}"))?
        .clone();
    let headers = io_utils::decode_record(&header_record, encoding)?;

    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        let decoded = io_utils::decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", idx + 2))?;
        let row = decoded.iter().map(|field| sniff_value(field)).collect::<Vec<_>>();
        if row.iter().any(Option::is_some) {
            rows.push(row);
        }
    }
    Ok(Dataset::new(headers, rows))
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT_INTEGER => {
            format!("{}", *f as i64)
        }
        other => other.to_string(),
    }
}

fn workbook_cell(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::Int(i) => Some(Value::Integer(*i)),
        Data::Float(f) if f.is_nan() => None,
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT_INTEGER => {
            Some(Value::Integer(*f as i64))
        }
        Data::Float(f) => Some(Value::Float(*f)),
        Data::Bool(b) => Some(Value::Boolean(*b)),
        Data::String(s) if is_missing_marker(s) => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::DateTime(dt) if dt.is_duration() => Some(Value::Float(dt.as_f64())),
        Data::DateTime(dt) => dt.as_datetime().map(Value::from_datetime),
        Data::DateTimeIso(s) => Some(
            parse_naive_datetime(s)
                .map(Value::from_datetime)
                .or_else(|_| parse_naive_date(s).map(Value::Date))
                .unwrap_or_else(|_| Value::String(s.clone())),
        ),
        Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}

fn clean_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(idx, header)| {
            let base = if header.trim().is_empty() {
                format!("Unnamed: {idx}")
            } else {
                header
            };
            let mut candidate = base.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}.{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}
