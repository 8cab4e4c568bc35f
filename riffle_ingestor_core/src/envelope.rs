//! Debezium change event envelopes.
//!
//! An envelope carries the operation code under `op` and the row image after
//! the change under `after`. With the JSON converter's schemas enabled the
//! whole block is nested under a top-level `payload` key; both shapes decode
//! to the same [`Envelope`].

use std::collections::BTreeMap;

use serde_json::{Map, Value as JsonValue};
use snafu::{OptionExt, ResultExt, Snafu};

/// A column value as found in a change event.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Nested object or array, kept verbatim.
    Json(JsonValue),
}

/// Column name to value. Column order carries no meaning.
pub type Row = BTreeMap<String, Value>;

/// Operation kind of a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Read,
    Truncate,
    Unknown,
}

/// What a change event contributes to a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// The event carries a post-change row image.
    HasRow(Row),
    /// Pure delete, nothing to append.
    Delete,
    /// No usable row image.
    Empty,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MalformedEnvelope {
    #[snafu(display("Record has no payload"))]
    Tombstone,
    #[snafu(display("Record payload is not valid JSON"))]
    InvalidJson { source: serde_json::Error },
}

/// A decoded change event.
#[derive(Debug, Clone)]
pub struct Envelope {
    body: JsonValue,
}

impl Envelope {
    /// Decodes a record payload.
    ///
    /// A record without payload is a tombstone and is rejected.
    pub fn decode(payload: Option<&[u8]>) -> Result<Self, MalformedEnvelope> {
        let payload = payload.context(TombstoneSnafu)?;
        let body = serde_json::from_slice(payload).context(InvalidJsonSnafu)?;
        Ok(Self { body })
    }

    pub fn from_json(body: JsonValue) -> Self {
        Self { body }
    }

    pub fn operation(&self) -> Operation {
        self.metadata()
            .and_then(|metadata| metadata.get("op"))
            .and_then(JsonValue::as_str)
            .map(Operation::from_code)
            .unwrap_or(Operation::Unknown)
    }

    fn metadata(&self) -> Option<&Map<String, JsonValue>> {
        match self.body.get("payload") {
            Some(JsonValue::Object(payload)) => Some(payload),
            _ => self.body.as_object(),
        }
    }

    fn after(&self) -> Option<&Map<String, JsonValue>> {
        self.metadata()?.get("after")?.as_object()
    }
}

/// Extracts the row an envelope contributes.
///
/// A non-empty `after` image always wins, whatever the operation code says.
pub fn extract(envelope: &Envelope) -> RowOutcome {
    if let Some(after) = envelope.after().filter(|after| !after.is_empty()) {
        let row = after
            .iter()
            .map(|(column, value)| (column.clone(), Value::from(value.clone())))
            .collect();
        return RowOutcome::HasRow(row);
    }

    if envelope.operation() == Operation::Delete {
        return RowOutcome::Delete;
    }

    RowOutcome::Empty
}

impl Operation {
    pub fn from_code(code: &str) -> Self {
        match code {
            "c" => Operation::Create,
            "u" => Operation::Update,
            "d" => Operation::Delete,
            "r" => Operation::Read,
            "t" => Operation::Truncate,
            _ => Operation::Unknown,
        }
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::String(n.to_string())
                }
            }
            JsonValue::String(s) => Value::String(s),
            nested @ (JsonValue::Array(_) | JsonValue::Object(_)) => Value::Json(nested),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text form used when the column ends up as a string column.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Json(json) => Some(json.to_string()),
        }
    }
}
