use std::fmt;

/// A runtime value flowing through compiled queries.
///
/// Rows and projection results are [`Record`]s (ordered named fields, so
/// output is deterministic); queryable sources and intermediate collections
/// are [`Value::Sequence`]s. Integers and floats stay distinct, mirroring
/// the static type system.
///
/// # Examples
///
/// ```
/// use webql::Value;
///
/// let row = Value::record("row", vec![
///     ("age".to_string(), Value::Int(42)),
/// ]);
/// assert_eq!(row.field("age"), Some(&Value::Int(42)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Record(Record),
}

/// An instance of a record-like type: ordered named fields plus the name of
/// the (possibly synthesized) type that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(type_name: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Record {
            type_name: type_name.into(),
            fields,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

impl Value {
    pub fn record(type_name: impl Into<String>, fields: Vec<(String, Value)>) -> Value {
        Value::Record(Record::new(type_name, fields))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(record) => record.get(name),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts a JSON value into a runtime value. Objects become records
    /// of the generic `row` type; numbers keep the integer/float split.
    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => {
                Value::Sequence(items.iter().map(Value::from_json).collect())
            }
            Json::Object(map) => Value::Record(Record::new(
                "row",
                map.iter()
                    .map(|(key, value)| (key.clone(), Value::from_json(value)))
                    .collect(),
            )),
        }
    }

    /// Converts back to JSON. Record field order is preserved; non-finite
    /// floats become null, as JSON cannot carry them.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(n) => Json::from(*n),
            Value::Float(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Sequence(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Record(record) => {
                let mut map = serde_json::Map::new();
                for (name, value) in record.fields() {
                    map.insert(name.clone(), value.to_json());
                }
                Json::Object(map)
            }
        }
    }
}

/// Human-readable shape name, for runtime type errors.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Record(_) => "record",
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_preserves_integers() {
        let json = serde_json::json!({ "age": 42, "score": 1.5 });
        let value = Value::from_json(&json);
        assert_eq!(value.field("age"), Some(&Value::Int(42)));
        assert_eq!(value.field("score"), Some(&Value::Float(1.5)));
        assert_eq!(value.to_json(), json);
    }
}
