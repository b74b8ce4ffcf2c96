use serde_json::{Map, Value};

/// One decoded input row: column name to scalar (string, number, boolean or
/// null). Column order follows the source file.
pub type RawRow = Map<String, Value>;

/// Renders a cell the way it would appear in a spreadsheet.
///
/// Strings are returned verbatim, numbers and booleans in their canonical
/// text form, and anything structured as compact JSON.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A cell counts as empty when it is null or a string of only whitespace.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Looks up `column` and returns it only when it holds a non-empty value.
pub fn present<'a>(row: &'a RawRow, column: &str) -> Option<&'a Value> {
    row.get(column).filter(|value| !is_blank(value))
}
