//! Conversion of raw spreadsheet rows into storage-ready records.
//!
//! Missing cells and missing-value markers become `NULL`, numbers pass
//! through, booleans become `1`/`0`, and everything else is rendered as text
//! and cut to the configured character bound. Nothing here fails.

use crate::{data::Value, mapping::ColumnMapping};

/// Leaves headroom under a `VARCHAR(255)` column.
pub const DEFAULT_MAX_TEXT_LEN: usize = 250;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

/// Target column names paired with their values, in mapping order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    fields: Vec<(String, SqlValue)>,
}

impl NormalizedRecord {
    /// Sets `column`, replacing an earlier value for the same column in place.
    pub fn set(&mut self, column: &str, value: SqlValue) {
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> &[(String, SqlValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    max_text_len: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TEXT_LEN)
    }
}

impl Normalizer {
    pub fn new(max_text_len: usize) -> Self {
        Self { max_text_len }
    }

    pub fn normalize_value(&self, value: Option<&Value>) -> SqlValue {
        match value {
            None => SqlValue::Null,
            Some(v) if v.is_missing() => SqlValue::Null,
            Some(Value::Integer(i)) => SqlValue::Integer(*i),
            Some(Value::Float(f)) => SqlValue::Float(*f),
            Some(Value::Boolean(b)) => SqlValue::Integer(i64::from(*b)),
            Some(other) => SqlValue::Text(truncate_chars(&other.as_display(), self.max_text_len)),
        }
    }

    /// Normalizes one row using the mapping; unmapped columns are dropped.
    pub fn normalize(
        &self,
        headers: &[String],
        row: &[Option<Value>],
        mapping: &ColumnMapping,
    ) -> NormalizedRecord {
        self.normalize_resolved(row, &mapping.resolve(headers))
    }

    /// Normalizes a row against columns already resolved to `(index, target)`.
    pub fn normalize_resolved(
        &self,
        row: &[Option<Value>],
        columns: &[(usize, &str)],
    ) -> NormalizedRecord {
        let mut record = NormalizedRecord::default();
        for (idx, target) in columns {
            let value = row.get(*idx).and_then(Option::as_ref);
            record.set(target, self.normalize_value(value));
        }
        record
    }
}

/// Keeps at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => value[..byte_idx].to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn numbers_pass_through_and_booleans_become_integers() {
        let normalizer = Normalizer::default();
        assert_eq!(
            normalizer.normalize_value(Some(&Value::Integer(7))),
            SqlValue::Integer(7)
        );
        assert_eq!(
            normalizer.normalize_value(Some(&Value::Float(2.5))),
            SqlValue::Float(2.5)
        );
        assert_eq!(
            normalizer.normalize_value(Some(&Value::Boolean(true))),
            SqlValue::Integer(1)
        );
    }

    #[test]
    fn missing_values_become_null() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize_value(None), SqlValue::Null);
        assert_eq!(
            normalizer.normalize_value(Some(&Value::Float(f64::NAN))),
            SqlValue::Null
        );
        assert_eq!(
            normalizer.normalize_value(Some(&Value::String(String::new()))),
            SqlValue::Null
        );
        assert_eq!(
            normalizer.normalize_value(Some(&Value::String("N/A".into()))),
            SqlValue::Null
        );
    }

    #[test]
    fn padded_markers_are_stored_as_text() {
        let normalizer = Normalizer::default();
        assert_eq!(
            normalizer.normalize_value(Some(&Value::String(" NA ".into()))),
            SqlValue::Text(" NA ".into())
        );
        assert_eq!(
            normalizer.normalize_value(Some(&Value::String("  ".into()))),
            SqlValue::Text("  ".into())
        );
    }

    #[test]
    fn dates_are_rendered_as_text() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(
            Normalizer::default().normalize_value(Some(&Value::Date(date))),
            SqlValue::Text("2023-12-31".into())
        );
    }

    #[test]
    fn long_strings_are_truncated_to_the_bound() {
        let normalizer = Normalizer::default();
        let long = "x".repeat(300);
        match normalizer.normalize_value(Some(&Value::String(long))) {
            SqlValue::Text(text) => assert_eq!(text.len(), 250),
            other => panic!("expected text, got {other:?}"),
        }
        let exact = "y".repeat(250);
        assert_eq!(
            normalizer.normalize_value(Some(&Value::String(exact.clone()))),
            SqlValue::Text(exact)
        );
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("日本語", 5), "日本語");
    }

    #[test]
    fn normalize_drops_unmapped_columns_and_renames() {
        let headers = vec!["ID".to_string(), "Name".to_string(), "Notes".to_string()];
        let row = vec![
            Some(Value::Integer(1)),
            Some(Value::String("Ada".into())),
            Some(Value::String("skip me".into())),
        ];
        let mapping = ColumnMapping::new([("ID", "id"), ("Name", "name")]).unwrap();
        let record = Normalizer::default().normalize(&headers, &row, &mapping);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("id"), Some(&SqlValue::Integer(1)));
        assert_eq!(record.get("name"), Some(&SqlValue::Text("Ada".into())));
        assert_eq!(record.get("Notes"), None);
    }

    #[test]
    fn repeated_targets_keep_the_last_value() {
        let headers = vec!["a".to_string(), "b".to_string()];
        let row = vec![Some(Value::Integer(1)), Some(Value::Integer(2))];
        let mapping = ColumnMapping::new([("a", "x"), ("b", "x")]).unwrap();
        let record = Normalizer::default().normalize(&headers, &row, &mapping);
        assert_eq!(record.fields(), &[("x".to_string(), SqlValue::Integer(2))]);
    }
}
