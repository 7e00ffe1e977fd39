//! Declared input schemas and their JSON Schema export.
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON value types a parameter can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl Primitive {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
            Primitive::Array => "array",
            Primitive::Object => "object",
        }
    }

    /// `true` when `value` is an instance of this primitive.
    ///
    /// Integers are also valid numbers; `null` never matches.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Primitive::String => value.is_string(),
            Primitive::Integer => value.is_i64() || value.is_u64(),
            Primitive::Number => value.is_number(),
            Primitive::Boolean => value.is_boolean(),
            Primitive::Array => value.is_array(),
            Primitive::Object => value.is_object(),
        }
    }

    /// JSON type name of an arbitrary value, for diagnostics.
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(number) if number.is_f64() => "number",
            Value::Number(_) => "integer",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub primitive: Primitive,
    pub required: bool,
    pub description: String,
    /// Value substituted when an optional parameter is absent.
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(primitive: Primitive, description: impl Into<String>) -> Self {
        Self {
            primitive,
            required: true,
            description: description.into(),
            default: None,
        }
    }

    pub fn optional(primitive: Primitive, description: impl Into<String>) -> Self {
        Self {
            primitive,
            required: false,
            description: description.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Ordered parameter declarations of a capability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    params: Vec<(String, ParamSpec)>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: String, spec: ParamSpec) {
        self.params.push((name, spec));
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, spec)| spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.params.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Export as a JSON Schema object.
    pub fn to_json_schema(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, spec) in &self.params {
            let mut property = Map::new();
            property.insert("type".into(), json!(spec.primitive.as_str()));
            if !spec.description.is_empty() {
                property.insert("description".into(), json!(spec.description));
            }
            if let Some(default) = &spec.default {
                property.insert("default".into(), default.clone());
            }
            properties.insert(name.clone(), Value::Object(property));
            if spec.required {
                required.push(Value::String(name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), Value::Array(required));
        }
        schema.insert("additionalProperties".into(), Value::Bool(false));
        schema
    }
}
