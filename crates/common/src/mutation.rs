//! Table-driven body transformations
//!
//! A row is `(path, value, operation)`. `SET` takes the type of the value
//! already stored at the path, so a cell of `"42"` stays an integer when it
//! replaces an integer.

use serde_json::{Map, Number, Value};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::json::JsonDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonPathOperation {
    Set,
    Remove,
    AddArrayItem,
}

impl FromStr for JsonPathOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "SET" => Ok(JsonPathOperation::Set),
            "REMOVE" => Ok(JsonPathOperation::Remove),
            "ADD_ARRAY_ITEM" => Ok(JsonPathOperation::AddArrayItem),
            other => Err(Error::Configuration(format!(
                "Unknown JsonPath Operation {}",
                other
            ))),
        }
    }
}

/// One transformation row from a step table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRow {
    pub path: String,
    pub value: String,
    pub operation: JsonPathOperation,
}

impl MutationRow {
    pub fn new(path: impl Into<String>, value: impl Into<String>, operation: JsonPathOperation) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
            operation,
        }
    }

    /// Build from a `[field, value, operation]` table row.
    pub fn from_cells(cells: &[String]) -> Result<Self> {
        match cells {
            [path, value, operation] => Ok(Self::new(path.as_str(), value.as_str(), operation.parse()?)),
            _ => Err(Error::Configuration(
                "Datatable must have 3 columns field,value,operation".to_string(),
            )),
        }
    }

    /// Apply this row to `document`.
    pub fn apply(&self, document: &mut JsonDocument) -> Result<()> {
        match self.operation {
            JsonPathOperation::Set => {
                let value = coerce(&self.path, document.read(&self.path), &self.value)?;
                document.set_value(&self.path, value)
            }
            JsonPathOperation::Remove => document.remove(&self.path).map(|_| ()),
            JsonPathOperation::AddArrayItem => {
                document.append_array_item(&self.path, array_item(&self.value))
            }
        }
    }
}

/// Apply every row in order.
pub fn transform(document: &mut JsonDocument, rows: &[MutationRow]) -> Result<()> {
    for row in rows {
        tracing::trace!(path = %row.path, operation = ?row.operation, "Applying JSON path transformation");
        row.apply(document)?;
    }
    Ok(())
}

/// Convert `raw` to the type of `existing`. Strings, objects, arrays and
/// absent values take the raw string.
pub fn coerce(path: &str, existing: Option<&Value>, raw: &str) -> Result<Value> {
    let mismatch = |expected: &str| Error::InvalidType {
        path: path.to_string(),
        expected: format!("{} but `{}` is not", expected, raw),
    };

    match existing {
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| mismatch("an integer")),
        Some(Value::Number(_)) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| mismatch("a number")),
        Some(Value::Bool(_)) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch("a boolean")),
        },
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn array_item(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> JsonDocument {
        JsonDocument::from(json!({
            "id": 1,
            "ratio": 0.5,
            "enabled": false,
            "label": "old",
            "items": [{"n": 1}]
        }))
    }

    #[test]
    fn test_operation_parsing() {
        assert_eq!("set".parse::<JsonPathOperation>().unwrap(), JsonPathOperation::Set);
        assert_eq!(
            "Add_Array_Item".parse::<JsonPathOperation>().unwrap(),
            JsonPathOperation::AddArrayItem
        );
        assert!("upsert".parse::<JsonPathOperation>().is_err());
    }

    #[test]
    fn test_set_coerces_to_existing_type() {
        let mut doc = doc();
        transform(
            &mut doc,
            &[
                MutationRow::new("$.id", "42", JsonPathOperation::Set),
                MutationRow::new("$.ratio", "1.25", JsonPathOperation::Set),
                MutationRow::new("$.enabled", "TRUE", JsonPathOperation::Set),
                MutationRow::new("$.label", "7", JsonPathOperation::Set),
                MutationRow::new("$.fresh.value", "10", JsonPathOperation::Set),
            ],
        )
        .unwrap();

        assert_eq!(doc.read("$.id"), Some(&json!(42)));
        assert_eq!(doc.read("$.ratio"), Some(&json!(1.25)));
        assert_eq!(doc.read("$.enabled"), Some(&json!(true)));
        assert_eq!(doc.read("$.label"), Some(&json!("7")));
        assert_eq!(doc.read("$.fresh.value"), Some(&json!("10")));
    }

    #[test]
    fn test_set_rejects_uncoercible_cell() {
        let mut doc = doc();
        let row = MutationRow::new("$.id", "forty", JsonPathOperation::Set);
        assert!(matches!(row.apply(&mut doc), Err(Error::InvalidType { .. })));
        assert_eq!(doc.read("$.id"), Some(&json!(1)));
    }

    #[test]
    fn test_remove_is_strict() {
        let mut doc = doc();
        MutationRow::new("$.label", "", JsonPathOperation::Remove)
            .apply(&mut doc)
            .unwrap();
        assert!(!doc.exists("$.label"));

        let err = MutationRow::new("$.label", "", JsonPathOperation::Remove)
            .apply(&mut doc)
            .unwrap_err();
        assert!(matches!(err, Error::PathNotFound(_)));
    }

    #[test]
    fn test_add_array_item() {
        let mut doc = doc();
        transform(
            &mut doc,
            &[
                MutationRow::new("$.items", "", JsonPathOperation::AddArrayItem),
                MutationRow::new("$.items", r#"{"n": 3}"#, JsonPathOperation::AddArrayItem),
                MutationRow::new("$.names", "bob", JsonPathOperation::AddArrayItem),
            ],
        )
        .unwrap();

        assert_eq!(doc.read("$.items"), Some(&json!([{"n": 1}, {}, {"n": 3}])));
        assert_eq!(doc.read("$.names"), Some(&json!(["bob"])));
    }

    #[test]
    fn test_row_from_cells() {
        let cells = vec!["$.a".to_string(), "1".to_string(), "set".to_string()];
        let row = MutationRow::from_cells(&cells).unwrap();
        assert_eq!(row.operation, JsonPathOperation::Set);
        assert!(MutationRow::from_cells(&cells[..2]).is_err());
    }
}
