//! Storage type inference for new tables.
//!
//! Each column is classified in priority order: numeric (integer tiers by
//! observed range, otherwise `DOUBLE`), temporal (`DATETIME`/`DATE`), then
//! text sized by the longest stringified value. Inference never fails from
//! the caller's point of view: if any column cannot be classified, every
//! column falls back to `VARCHAR(255)`.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{data::Value, mapping::ColumnMapping, source::Dataset};

pub const FALLBACK_VARCHAR_LEN: usize = 255;

const TEXT_MAX: usize = 65_535;
const MEDIUMTEXT_MAX: usize = 16_777_215;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegerWidth {
    Tiny,
    Small,
    Medium,
    Regular,
    Big,
}

impl IntegerWidth {
    fn keyword(self) -> &'static str {
        match self {
            IntegerWidth::Tiny => "TINYINT",
            IntegerWidth::Small => "SMALLINT",
            IntegerWidth::Medium => "MEDIUMINT",
            IntegerWidth::Regular => "INT",
            IntegerWidth::Big => "BIGINT",
        }
    }

    fn unsigned_for(max: i128) -> Self {
        match max {
            m if m <= 255 => IntegerWidth::Tiny,
            m if m <= 65_535 => IntegerWidth::Small,
            m if m <= 16_777_215 => IntegerWidth::Medium,
            m if m <= 4_294_967_295 => IntegerWidth::Regular,
            _ => IntegerWidth::Big,
        }
    }

    fn signed_for(min: i128, max: i128) -> Self {
        if min >= -128 && max <= 127 {
            IntegerWidth::Tiny
        } else if min >= -32_768 && max <= 32_767 {
            IntegerWidth::Small
        } else if min >= -8_388_608 && max <= 8_388_607 {
            IntegerWidth::Medium
        } else if min >= -2_147_483_648 && max <= 2_147_483_647 {
            IntegerWidth::Regular
        } else {
            IntegerWidth::Big
        }
    }
}

/// A column type for `CREATE TABLE`, rendered in MySQL syntax by `Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageType {
    Integer { width: IntegerWidth, unsigned: bool },
    Double,
    DateTime,
    Date,
    VarChar(usize),
    Text,
    MediumText,
    LongText,
}

impl StorageType {
    pub fn fallback() -> Self {
        StorageType::VarChar(FALLBACK_VARCHAR_LEN)
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Integer { width, unsigned } => {
                write!(f, "{}", width.keyword())?;
                if *unsigned {
                    write!(f, " UNSIGNED")?;
                }
                Ok(())
            }
            StorageType::Double => write!(f, "DOUBLE"),
            StorageType::DateTime => write!(f, "DATETIME"),
            StorageType::Date => write!(f, "DATE"),
            StorageType::VarChar(len) => write!(f, "VARCHAR({len})"),
            StorageType::Text => write!(f, "TEXT"),
            StorageType::MediumText => write!(f, "MEDIUMTEXT"),
            StorageType::LongText => write!(f, "LONGTEXT"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum InferenceError {
    #[error("column '{column}' holds a non-finite number ({value})")]
    NonFinite { column: String, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredColumn {
    pub name: String,
    pub storage: StorageType,
}

/// Infers the storage type of a single column of values.
pub fn infer_column<'a, I>(values: I) -> Result<StorageType, InferenceError>
where
    I: IntoIterator<Item = Option<&'a Value>>,
{
    infer_named_column("<column>", values)
}

fn infer_named_column<'a, I>(name: &str, values: I) -> Result<StorageType, InferenceError>
where
    I: IntoIterator<Item = Option<&'a Value>>,
{
    let present = values
        .into_iter()
        .flatten()
        .filter(|value| !value.is_missing())
        .collect::<Vec<_>>();

    if present.iter().all(|value| value.is_numeric()) {
        return infer_numeric(name, &present);
    }
    if present.iter().all(|value| value.is_temporal()) {
        if present.iter().any(|value| matches!(value, Value::DateTime(_))) {
            return Ok(StorageType::DateTime);
        }
        return Ok(StorageType::Date);
    }
    Ok(infer_text(&present))
}

fn infer_numeric(name: &str, values: &[&Value]) -> Result<StorageType, InferenceError> {
    let mut range: Option<(i128, i128)> = None;
    let mut fractional = false;
    for value in values {
        let observed = match value {
            Value::Integer(i) => *i as i128,
            Value::Boolean(b) => *b as i128,
            Value::Float(f) if !f.is_finite() => {
                return Err(InferenceError::NonFinite {
                    column: name.to_string(),
                    value: *f,
                });
            }
            Value::Float(f) if f.fract() != 0.0 || f.abs() >= i64::MAX as f64 => {
                fractional = true;
                continue;
            }
            Value::Float(f) => *f as i128,
            _ => continue,
        };
        range = Some(match range {
            Some((min, max)) => (min.min(observed), max.max(observed)),
            None => (observed, observed),
        });
    }

    if fractional {
        return Ok(StorageType::Double);
    }
    let storage = match range {
        None => StorageType::Integer {
            width: IntegerWidth::Tiny,
            unsigned: false,
        },
        Some((min, max)) if min >= 0 => StorageType::Integer {
            width: IntegerWidth::unsigned_for(max),
            unsigned: true,
        },
        Some((min, max)) => StorageType::Integer {
            width: IntegerWidth::signed_for(min, max),
            unsigned: false,
        },
    };
    Ok(storage)
}

fn infer_text(values: &[&Value]) -> StorageType {
    let max_len = values
        .iter()
        .map(|value| value.as_display().chars().count())
        .max()
        .unwrap_or(0);
    match max_len {
        0 => StorageType::VarChar(FALLBACK_VARCHAR_LEN),
        len if len <= FALLBACK_VARCHAR_LEN => StorageType::VarChar(len),
        len if len <= TEXT_MAX => StorageType::Text,
        len if len <= MEDIUMTEXT_MAX => StorageType::MediumText,
        _ => StorageType::LongText,
    }
}

/// Infers a storage type for every mapped column, named by target column.
///
/// Without a mapping every header is inferred under its own name. Mapped
/// sources missing from the dataset are skipped.
pub fn infer_schema(dataset: &Dataset, mapping: Option<&ColumnMapping>) -> Vec<InferredColumn> {
    let targets = match mapping {
        Some(mapping) => mapping
            .resolve(dataset.headers())
            .into_iter()
            .map(|(idx, target)| (idx, target.to_string()))
            .collect::<Vec<_>>(),
        None => dataset.headers().iter().cloned().enumerate().collect(),
    };

    let inferred = targets
        .iter()
        .map(|(idx, name)| {
            infer_named_column(name, dataset.column_values(*idx)).map(|storage| InferredColumn {
                name: name.clone(),
                storage,
            })
        })
        .collect::<Result<Vec<_>, _>>();

    match inferred {
        Ok(columns) => columns,
        Err(err) => {
            warn!("Type inference failed ({err}); falling back to VARCHAR(255) for every column");
            targets
                .into_iter()
                .map(|(_, name)| InferredColumn {
                    name,
                    storage: StorageType::fallback(),
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn infer(values: &[Option<Value>]) -> StorageType {
        infer_column(values.iter().map(Option::as_ref)).unwrap()
    }

    fn ints(values: &[i64]) -> Vec<Option<Value>> {
        values.iter().map(|v| Some(Value::Integer(*v))).collect()
    }

    #[test]
    fn small_positive_integers_are_tinyint_unsigned() {
        assert_eq!(infer(&ints(&[1, 2, 3])).to_string(), "TINYINT UNSIGNED");
    }

    #[test]
    fn unsigned_tiers_follow_observed_maximum() {
        assert_eq!(infer(&ints(&[0, 255])).to_string(), "TINYINT UNSIGNED");
        assert_eq!(infer(&ints(&[0, 256])).to_string(), "SMALLINT UNSIGNED");
        assert_eq!(infer(&ints(&[65_536])).to_string(), "MEDIUMINT UNSIGNED");
        assert_eq!(infer(&ints(&[16_777_216])).to_string(), "INT UNSIGNED");
        assert_eq!(infer(&ints(&[4_294_967_296])).to_string(), "BIGINT UNSIGNED");
    }

    #[test]
    fn signed_tiers_follow_observed_range() {
        assert_eq!(infer(&ints(&[-128, 127])).to_string(), "TINYINT");
        assert_eq!(infer(&ints(&[-129, 5])).to_string(), "SMALLINT");
        assert_eq!(infer(&ints(&[-1, 40_000])).to_string(), "MEDIUMINT");
        assert_eq!(infer(&ints(&[-1, 8_388_608])).to_string(), "INT");
        assert_eq!(infer(&ints(&[i64::MIN, 0])).to_string(), "BIGINT");
    }

    #[test]
    fn fractional_values_make_the_column_double() {
        let values = vec![
            Some(Value::Float(1.5)),
            Some(Value::Integer(2)),
            Some(Value::Integer(3)),
        ];
        assert_eq!(infer(&values), StorageType::Double);
    }

    #[test]
    fn integral_floats_stay_integers() {
        let values = vec![Some(Value::Float(2.0)), Some(Value::Float(-4.0))];
        assert_eq!(infer(&values).to_string(), "TINYINT");
    }

    #[test]
    fn all_null_column_defaults_to_smallest_signed_integer() {
        assert_eq!(infer(&[None, None]).to_string(), "TINYINT");
        assert_eq!(
            infer(&[Some(Value::String("NA".into())), None]).to_string(),
            "TINYINT"
        );
    }

    #[test]
    fn booleans_count_as_small_integers() {
        let values = vec![Some(Value::Boolean(true)), Some(Value::Boolean(false))];
        assert_eq!(infer(&values).to_string(), "TINYINT UNSIGNED");
    }

    #[test]
    fn temporal_columns_pick_date_or_datetime() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let dates = vec![Some(Value::Date(date)), None];
        assert_eq!(infer(&dates), StorageType::Date);

        let mixed = vec![
            Some(Value::Date(date)),
            Some(Value::DateTime(date.and_hms_opt(8, 0, 0).unwrap())),
        ];
        assert_eq!(infer(&mixed), StorageType::DateTime);
    }

    #[test]
    fn text_columns_are_sized_by_longest_value() {
        let values = vec![
            Some(Value::String("a".into())),
            Some(Value::String("bb".into())),
            Some(Value::String("ccc".into())),
        ];
        assert_eq!(infer(&values), StorageType::VarChar(3));
    }

    #[test]
    fn mixed_numbers_and_text_are_text() {
        let values = vec![Some(Value::Integer(12345)), Some(Value::String("x".into()))];
        assert_eq!(infer(&values), StorageType::VarChar(5));
    }

    #[test]
    fn long_text_moves_through_text_tiers() {
        let long = |len: usize| vec![Some(Value::String("x".repeat(len)))];
        assert_eq!(infer(&long(255)), StorageType::VarChar(255));
        assert_eq!(infer(&long(256)), StorageType::Text);
        assert_eq!(infer(&long(65_536)), StorageType::MediumText);
    }

    #[test]
    fn non_finite_numbers_are_reported() {
        let values = [Some(Value::Float(f64::INFINITY))];
        assert!(matches!(
            infer_column(values.iter().map(Option::as_ref)),
            Err(InferenceError::NonFinite { .. })
        ));
    }

    #[test]
    fn infer_schema_falls_back_to_varchar_for_every_column() {
        let dataset = Dataset::new(
            vec!["id".into(), "score".into()],
            vec![vec![
                Some(Value::Integer(1)),
                Some(Value::Float(f64::INFINITY)),
            ]],
        );
        let columns = infer_schema(&dataset, None);
        assert_eq!(columns.len(), 2);
        assert!(
            columns
                .iter()
                .all(|column| column.storage == StorageType::VarChar(255))
        );
    }
}
