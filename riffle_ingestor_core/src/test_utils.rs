use serde_json::{Value as JsonValue, json};

use crate::envelope::{Row, Value};

/// Builds a schemaless change event with the given operation code and row image.
pub fn change_event(op: &str, after: JsonValue) -> JsonValue {
    json!({
        "before": null,
        "after": after,
        "source": {
            "connector": "postgresql",
            "db": "banking",
            "schema": "public",
        },
        "op": op,
        "ts_ms": 1_717_171_717_000_i64,
    })
}

pub fn delete_event(before: JsonValue) -> JsonValue {
    json!({
        "before": before,
        "after": null,
        "op": "d",
        "ts_ms": 1_717_171_717_000_i64,
    })
}

pub fn row<const N: usize>(columns: [(&str, Value); N]) -> Row {
    columns
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
