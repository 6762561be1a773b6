//! Cell values and Redshift-style coercions

use serde::{Deserialize, Serialize};
use sparkify_core::ColumnType;
use std::hash::{Hash, Hasher};

/// Byte limit Redshift applies to VARCHAR and TEXT without an explicit length
pub const DEFAULT_VARCHAR_BYTES: usize = 256;

/// A single cell
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

/// A table row in column declaration order
pub type Row = Vec<Value>;

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// SQL `=`: `None` when either side is NULL
    pub fn sql_eq(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Int(a), Value::Int(b)) => Some(a == b),
            (Value::Float(a), Value::Float(b)) => Some(a == b),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                Some((*a as f64) == *b)
            }
            (Value::Text(a), Value::Text(b)) => Some(a == b),
            // text is cast to the numeric side; an unparseable string is unknown
            (Value::Text(t), Value::Int(i)) | (Value::Int(i), Value::Text(t)) => {
                t.trim().parse::<i64>().ok().map(|a| a == *i)
            }
            (Value::Text(t), Value::Float(f)) | (Value::Float(f), Value::Text(t)) => {
                t.trim().parse::<f64>().ok().map(|a| a == *f)
            }
        }
    }

    /// `value::integer`
    pub fn cast_integer(&self) -> Result<Value, String> {
        match self {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Float(f) => Ok(Value::Int(f.round() as i64)),
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("invalid input syntax for integer: \"{}\"", s)),
        }
    }

    /// Convert to the storage representation of a column type
    pub fn coerce(self, column_type: &ColumnType) -> Result<Value, String> {
        match (self, column_type) {
            (Value::Null, _) => Ok(Value::Null),

            (value, ColumnType::SmallInt) => check_range(value.cast_integer()?, i16::MIN as i64, i16::MAX as i64),
            (value, ColumnType::Int) => check_range(value.cast_integer()?, i32::MIN as i64, i32::MAX as i64),
            (value, ColumnType::BigInt) => value.cast_integer(),

            (Value::Int(i), ColumnType::Float) => Ok(Value::Float(i as f64)),
            (Value::Float(f), ColumnType::Float) => Ok(Value::Float(f)),
            (Value::Text(s), ColumnType::Float) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("invalid input syntax for float: \"{}\"", s)),

            (value, ColumnType::Varchar { length }) => {
                check_length(value.to_string(), length.map(usize::from).unwrap_or(DEFAULT_VARCHAR_BYTES))
            }
            (value, ColumnType::Text) => check_length(value.to_string(), DEFAULT_VARCHAR_BYTES),
        }
    }

    /// Convert a JSON scalar into an untyped cell
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Text(b.to_string()),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

fn check_range(value: Value, min: i64, max: i64) -> Result<Value, String> {
    match value {
        Value::Int(i) if i < min || i > max => Err(format!("value {} out of range", i)),
        other => Ok(other),
    }
}

fn check_length(text: String, limit: usize) -> Result<Value, String> {
    if text.len() > limit {
        Err(format!(
            "string length {} exceeds column length {}",
            text.len(),
            limit
        ))
    } else {
        Ok(Value::Text(text))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

// Identity semantics used by DISTINCT: NULLs group together and floats
// compare bitwise.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

/// `value NOT IN (set)` with three-valued logic, true only when SQL yields TRUE
pub fn not_in(value: &Value, set: &[Value]) -> bool {
    if set.is_empty() {
        return true;
    }

    let mut unknown = value.is_null();
    for candidate in set {
        match value.sql_eq(candidate) {
            Some(true) => return false,
            Some(false) => {}
            None => unknown = true,
        }
    }
    !unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_equality_with_nulls() {
        assert_eq!(Value::Null.sql_eq(&Value::Null), None);
        assert_eq!(Value::from("a").sql_eq(&Value::from("a")), Some(true));
        assert_eq!(Value::Int(3).sql_eq(&Value::Float(3.0)), Some(true));
        assert_eq!(Value::from("39").sql_eq(&Value::Int(39)), Some(true));
    }

    #[test]
    fn text_compares_numerically_against_numbers() {
        assert_eq!(Value::from("039").sql_eq(&Value::Int(39)), Some(true));
        assert_eq!(Value::Int(39).sql_eq(&Value::from(" 39 ")), Some(true));
        assert_eq!(Value::from("2.50").sql_eq(&Value::Float(2.5)), Some(true));
        assert_eq!(Value::from("40").sql_eq(&Value::Int(39)), Some(false));
        assert_eq!(Value::from("abc").sql_eq(&Value::Int(39)), None);

        // a padded key is already present
        assert!(!not_in(&Value::from("039"), &[Value::Int(39)]));
    }

    #[test]
    fn not_in_follows_sql() {
        let set = vec![Value::Int(1), Value::Int(2)];
        assert!(not_in(&Value::Int(3), &set));
        assert!(!not_in(&Value::Int(2), &set));
        assert!(!not_in(&Value::Null, &set));

        // NULL NOT IN () is TRUE
        assert!(not_in(&Value::Null, &[]));

        // x NOT IN (.., NULL) is never TRUE
        assert!(!not_in(&Value::Int(3), &[Value::Int(1), Value::Null]));
    }

    #[test]
    fn integer_cast() {
        assert_eq!(Value::from(" 39 ").cast_integer().unwrap(), Value::Int(39));
        assert!(Value::from("").cast_integer().is_err());
        assert_eq!(Value::Null.cast_integer().unwrap(), Value::Null);
    }

    #[test]
    fn coercion_to_column_types() {
        assert_eq!(Value::Int(1).coerce(&ColumnType::Float).unwrap(), Value::Float(1.0));
        assert_eq!(Value::Int(7).coerce(&ColumnType::VARCHAR).unwrap(), Value::from("7"));
        assert!(Value::Int(70_000).coerce(&ColumnType::SmallInt).is_err());
        assert!(Value::from("a".repeat(26).as_str()).coerce(&ColumnType::varchar(25)).is_err());
        assert!(Value::from("a".repeat(257).as_str()).coerce(&ColumnType::Text).is_err());
    }

    #[test]
    fn distinct_identity() {
        use std::collections::HashSet;
        let set: HashSet<Value> = [Value::Null, Value::Null, Value::Float(1.5), Value::Float(1.5)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn json_scalars() {
        assert_eq!(Value::from_json(&serde_json::json!(1541990400000i64)), Value::Int(1541990400000));
        assert_eq!(Value::from_json(&serde_json::json!(2.5)), Value::Float(2.5));
        assert_eq!(Value::from_json(&serde_json::json!("x")), Value::from("x"));
        assert_eq!(Value::from_json(&serde_json::Value::Null), Value::Null);
    }
}
