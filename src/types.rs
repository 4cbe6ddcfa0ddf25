//! Static types flowing through semantic analysis and the expression IR.
//!
//! Element shapes are structural: an [`ObjectType`] is a named list of typed
//! properties. Projections (`$new`) synthesize fresh record types on demand;
//! their names are derived from the property layout, so compiling the same
//! query twice yields identical types.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum WebqlType {
    Bool,
    Int,
    Float,
    String,
    Object(Arc<ObjectType>),
    /// A queryable sequence of elements (filterable, projectable, ...).
    Queryable(Box<WebqlType>),
}

impl WebqlType {
    pub fn queryable(element: WebqlType) -> WebqlType {
        WebqlType::Queryable(Box::new(element))
    }

    pub fn object(object_type: ObjectType) -> WebqlType {
        WebqlType::Object(Arc::new(object_type))
    }

    pub fn is_queryable(&self) -> bool {
        matches!(self, WebqlType::Queryable(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, WebqlType::Int | WebqlType::Float)
    }

    /// Element type of a queryable, if this is one.
    pub fn element_type(&self) -> Option<&WebqlType> {
        match self {
            WebqlType::Queryable(element) => Some(element),
            _ => None,
        }
    }

    /// Property lookup on object types; `None` for every other shape.
    pub fn property(&self, name: &str) -> Option<&WebqlType> {
        match self {
            WebqlType::Object(object_type) => object_type.property(name),
            _ => None,
        }
    }

    /// Infers a structural type from a JSON value, used by hosts that feed
    /// raw JSON rows into the compiler. Arrays become queryables typed by
    /// their first element; nulls default to string.
    pub fn of_json(value: &serde_json::Value) -> WebqlType {
        use serde_json::Value as Json;
        match value {
            Json::Null => WebqlType::String,
            Json::Bool(_) => WebqlType::Bool,
            Json::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    WebqlType::Int
                } else {
                    WebqlType::Float
                }
            }
            Json::String(_) => WebqlType::String,
            Json::Array(items) => {
                let element = items
                    .first()
                    .map(WebqlType::of_json)
                    .unwrap_or_else(|| WebqlType::object(ObjectType::named("row", Vec::new())));
                WebqlType::queryable(element)
            }
            Json::Object(map) => {
                let properties: Vec<(String, WebqlType)> = map
                    .iter()
                    .map(|(key, val)| (key.clone(), WebqlType::of_json(val)))
                    .collect();
                WebqlType::object(ObjectType::anonymous(properties))
            }
        }
    }
}

impl fmt::Display for WebqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebqlType::Bool => write!(f, "bool"),
            WebqlType::Int => write!(f, "int"),
            WebqlType::Float => write!(f, "float"),
            WebqlType::String => write!(f, "string"),
            WebqlType::Object(object_type) => write!(f, "{}", object_type.name()),
            WebqlType::Queryable(element) => write!(f, "queryable<{}>", element),
        }
    }
}

/// A record-like type: ordered named, typed properties.
///
/// Equality is structural (name and property layout), which keeps
/// synthesized projection types deterministic across compilations while
/// still letting two same-shaped projections exist independently.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    name: String,
    properties: Vec<(String, WebqlType)>,
}

impl ObjectType {
    pub fn named(name: impl Into<String>, properties: Vec<(String, WebqlType)>) -> Self {
        ObjectType {
            name: name.into(),
            properties,
        }
    }

    /// A synthesized record type whose name is derived from its layout.
    pub fn anonymous(properties: Vec<(String, WebqlType)>) -> Self {
        let fields: Vec<String> = properties
            .iter()
            .map(|(name, ty)| format!("{}: {}", name, ty))
            .collect();
        ObjectType {
            name: format!("{{ {} }}", fields.join(", ")),
            properties,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[(String, WebqlType)] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&WebqlType> {
        self.properties
            .iter()
            .find(|(property, _)| property == name)
            .map(|(_, ty)| ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_names_are_structural() {
        let a = ObjectType::anonymous(vec![("name".to_string(), WebqlType::Int)]);
        let b = ObjectType::anonymous(vec![("name".to_string(), WebqlType::Int)]);
        assert_eq!(a, b);
        assert_eq!(a.name(), "{ name: int }");
    }

    #[test]
    fn json_inference_types_rows() {
        let rows: serde_json::Value = serde_json::json!([{ "age": 17, "name": "ada" }]);
        let ty = WebqlType::of_json(&rows);
        let element = ty.element_type().unwrap();
        assert_eq!(element.property("age"), Some(&WebqlType::Int));
        assert_eq!(element.property("name"), Some(&WebqlType::String));
    }
}
