//! Cacheable payload shapes.
//!
//! The store accepts a closed set of payload variants, each with its own
//! tagged serial form, plus an opaque-bytes fallback for anything that has
//! no structured representation. Tagged documents are what the compression
//! engine walks; opaque bytes bypass it entirely.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Tag field identifying the payload shape inside a serialized document.
const TYPE_TAG: &str = "_type";

/// One named column of a [`Table`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// A column-major table: an index plus named columns.
///
/// Column-major because that is the shape the codec compresses well: each
/// numeric column is one contiguous sequence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    pub index: Vec<Value>,
    pub columns: Vec<Column>,
}

impl Table {
    /// Number of rows, taken from the index.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// A value the cache can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Arbitrary structured document.
    Document(Value),

    /// Flat numeric sequence.
    NumericArray(Vec<f64>),

    /// Column-major table.
    Table(Table),

    /// Fallback: bytes the store persists verbatim and never inspects.
    Opaque(Vec<u8>),
}

impl Payload {
    /// The tagged JSON document for this payload, or `None` for opaque
    /// bytes, which have no structured form.
    pub fn to_tagged(&self) -> Option<Value> {
        match self {
            Payload::Document(value) => {
                let mut map = Map::with_capacity(2);
                map.insert(TYPE_TAG.to_string(), Value::String("json".to_string()));
                map.insert("data".to_string(), value.clone());
                Some(Value::Object(map))
            }
            Payload::NumericArray(values) => {
                let items: Vec<Value> = values.iter().map(|&v| number_or_null(v)).collect();
                let mut map = Map::with_capacity(2);
                map.insert(TYPE_TAG.to_string(), Value::String("array".to_string()));
                map.insert("data".to_string(), Value::Array(items));
                Some(Value::Object(map))
            }
            Payload::Table(table) => {
                let mut map = Map::with_capacity(3);
                map.insert(TYPE_TAG.to_string(), Value::String("table".to_string()));
                map.insert("index".to_string(), Value::Array(table.index.clone()));
                let columns: Vec<Value> = table
                    .columns
                    .iter()
                    .map(|c| serde_json::to_value(c).unwrap_or(Value::Null))
                    .collect();
                map.insert("columns".to_string(), Value::Array(columns));
                Some(Value::Object(map))
            }
            Payload::Opaque(_) => None,
        }
    }

    /// Rebuild a payload from its tagged document.
    ///
    /// Unknown or missing tags come back as a plain [`Payload::Document`]
    /// holding the raw tree, so newer writers stay readable.
    pub fn from_tagged(value: Value) -> Payload {
        let Some(tag) = value.get(TYPE_TAG).and_then(Value::as_str) else {
            return Payload::Document(value);
        };

        match tag {
            "json" => match value.get("data") {
                Some(data) => Payload::Document(data.clone()),
                None => Payload::Document(value),
            },
            "array" => match value.get("data").and_then(Value::as_array) {
                Some(items) => {
                    let values = items
                        .iter()
                        .map(|item| item.as_f64().unwrap_or(f64::NAN))
                        .collect();
                    Payload::NumericArray(values)
                }
                None => Payload::Document(value),
            },
            "table" => {
                let index = value
                    .get("index")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let columns = value
                    .get("columns")
                    .and_then(Value::as_array)
                    .map(|cols| {
                        cols.iter()
                            .filter_map(|c| serde_json::from_value(c.clone()).ok())
                            .collect()
                    })
                    .unwrap_or_default();
                Payload::Table(Table { index, columns })
            }
            _ => Payload::Document(value),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Document(value)
    }
}

impl From<Vec<f64>> for Payload {
    fn from(values: Vec<f64>) -> Self {
        Payload::NumericArray(values)
    }
}

impl From<Table> for Payload {
    fn from(table: Table) -> Self {
        Payload::Table(table)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Opaque(bytes)
    }
}

/// JSON numbers cannot hold NaN or infinity; such elements serialize as
/// null and deserialize back as NaN.
fn number_or_null(v: f64) -> Value {
    match Number::from_f64(v) {
        Some(n) => Value::Number(n),
        None => Value::Null,
    }
}
