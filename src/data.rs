//! Scalar cell values as they come out of a spreadsheet.
//!
//! A cell is an `Option<Value>`: `None` stands for an empty cell, an error
//! cell, or anything a spreadsheet would display as missing.

use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Tokens spreadsheets and dataframe tools treat as "no value".
pub const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_) | Value::Boolean(_))
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Value::Date(_) | Value::DateTime(_))
    }

    /// True when the value should be stored as SQL `NULL`.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::String(s) => is_missing_marker(s),
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Splits a spreadsheet date-time into a plain date when it has no time part.
    pub fn from_datetime(value: NaiveDateTime) -> Self {
        if value.time() == NaiveTime::MIN {
            Value::Date(value.date())
        } else {
            Value::DateTime(value)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Exact-token match: padded markers and whitespace-only text are values.
pub fn is_missing_marker(value: &str) -> bool {
    value.is_empty() || MISSING_MARKERS.contains(&value)
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Types a text field the way a spreadsheet application would display it.
pub fn sniff_value(raw: &str) -> Option<Value> {
    if is_missing_marker(raw) {
        return None;
    }
    let trimmed = raw.trim();
    if let Ok(parsed) = trimmed.parse::<i64>() {
        // keep zero-padded codes such as "00123" as text
        if !(trimmed.len() > 1 && trimmed.starts_with('0')) {
            return Some(Value::Integer(parsed));
        }
    }
    if trimmed.contains(['.', 'e', 'E']) && !trimmed.starts_with('.') {
        match trimmed.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => return Some(Value::Float(parsed)),
            _ => {}
        }
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => return Some(Value::Boolean(true)),
        "false" => return Some(Value::Boolean(false)),
        _ => {}
    }
    if let Ok(parsed) = parse_naive_datetime(trimmed) {
        return Some(Value::DateTime(parsed));
    }
    if let Ok(parsed) = parse_naive_date(trimmed) {
        return Some(Value::Date(parsed));
    }
    Some(Value::String(raw.to_string()))
}
