use std::{collections::BTreeSet, sync::Arc};

use arrow::{
    array::{ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::{RecordBatch, RecordBatchOptions},
};

use crate::envelope::{Row, Value};

/// Converts schemaless rows into one record batch.
///
/// The columns are the union of all row keys, sorted by name. A column is
/// typed from its non-null values: booleans, integers and floats keep a
/// native type (integers mixed with floats widen to float), anything else
/// becomes a nullable string column holding the value text.
pub fn rows_to_record_batch(rows: &[Row]) -> Result<RecordBatch, ArrowError> {
    let columns = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect::<BTreeSet<_>>();

    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays = Vec::with_capacity(columns.len());

    for column in columns {
        let kind = ColumnKind::infer(rows.iter().filter_map(|row| row.get(column)));
        fields.push(Field::new(column, kind.data_type(), true));
        arrays.push(kind.build(rows, column));
    }

    let schema = Arc::new(Schema::new(fields));
    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    RecordBatch::try_new_with_options(schema, arrays, &options)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Boolean,
    Int64,
    Float64,
    Utf8,
}

impl ColumnKind {
    fn infer<'a>(values: impl Iterator<Item = &'a Value>) -> Self {
        let mut kind = None;

        for value in values {
            let value_kind = match value {
                Value::Null => continue,
                Value::Bool(_) => ColumnKind::Boolean,
                Value::Int(_) => ColumnKind::Int64,
                Value::Float(_) => ColumnKind::Float64,
                Value::String(_) | Value::Json(_) => ColumnKind::Utf8,
            };

            kind = Some(match (kind, value_kind) {
                (None, value_kind) => value_kind,
                (Some(current), value_kind) if current == value_kind => current,
                (Some(ColumnKind::Int64), ColumnKind::Float64)
                | (Some(ColumnKind::Float64), ColumnKind::Int64) => ColumnKind::Float64,
                _ => ColumnKind::Utf8,
            });
        }

        // An all-null column has nothing to go by.
        kind.unwrap_or(ColumnKind::Utf8)
    }

    fn data_type(&self) -> DataType {
        match self {
            ColumnKind::Boolean => DataType::Boolean,
            ColumnKind::Int64 => DataType::Int64,
            ColumnKind::Float64 => DataType::Float64,
            ColumnKind::Utf8 => DataType::Utf8,
        }
    }

    fn build(&self, rows: &[Row], column: &str) -> ArrayRef {
        let values = rows.iter().map(|row| row.get(column));

        match self {
            ColumnKind::Boolean => {
                let mut builder = BooleanBuilder::with_capacity(rows.len());
                for value in values {
                    match value {
                        Some(Value::Bool(b)) => builder.append_value(*b),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            ColumnKind::Int64 => {
                let mut builder = Int64Builder::with_capacity(rows.len());
                for value in values {
                    match value {
                        Some(Value::Int(i)) => builder.append_value(*i),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            ColumnKind::Float64 => {
                let mut builder = Float64Builder::with_capacity(rows.len());
                for value in values {
                    match value {
                        Some(Value::Float(f)) => builder.append_value(*f),
                        Some(Value::Int(i)) => builder.append_value(*i as f64),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            ColumnKind::Utf8 => {
                let mut builder = StringBuilder::with_capacity(rows.len(), rows.len() * 16);
                for value in values {
                    builder.append_option(value.and_then(Value::to_text));
                }
                Arc::new(builder.finish())
            }
        }
    }
}
