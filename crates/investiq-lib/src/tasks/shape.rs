use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declarative JSON shape a task answer must match.
///
/// Objects require every declared field and tolerate extra keys. Leaves
/// accept strings and numbers so that values such as market sizes may come
/// back either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Text {
        #[serde(default)]
        hint: String,
    },
    Object {
        fields: Vec<Field>,
    },
    List {
        items: Box<Shape>,
    },
    /// An object with arbitrary keys whose values share one shape.
    Map {
        #[serde(default)]
        key_hint: String,
        values: Box<Shape>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub shape: Shape,
}

impl Shape {
    pub fn text(hint: &str) -> Self {
        Self::Text {
            hint: hint.to_string(),
        }
    }

    pub fn object(fields: Vec<(&str, Shape)>) -> Self {
        Self::Object {
            fields: fields
                .into_iter()
                .map(|(name, shape)| Field {
                    name: name.to_string(),
                    shape,
                })
                .collect(),
        }
    }

    pub fn list(items: Shape) -> Self {
        Self::List {
            items: Box::new(items),
        }
    }

    pub fn map(key_hint: &str, values: Shape) -> Self {
        Self::Map {
            key_hint: key_hint.to_string(),
            values: Box::new(values),
        }
    }

    /// Check `value` against the shape. Violations carry a `$.a[0].b` path.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let mut violations = Vec::new();
        self.check("$", value, &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations.join("; "))
        }
    }

    fn check(&self, path: &str, value: &Value, violations: &mut Vec<String>) {
        match (self, value) {
            (Self::Text { .. }, Value::String(_) | Value::Number(_)) => {}
            (Self::Text { .. }, other) => {
                violations.push(format!("{path}: expected text, found {}", kind(other)));
            }
            (Self::Object { fields }, Value::Object(map)) => {
                for field in fields {
                    let child = format!("{path}.{}", field.name);
                    match map.get(&field.name) {
                        Some(v) => field.shape.check(&child, v, violations),
                        None => violations.push(format!("{child}: missing")),
                    }
                }
            }
            (Self::List { items }, Value::Array(values)) => {
                for (i, v) in values.iter().enumerate() {
                    items.check(&format!("{path}[{i}]"), v, violations);
                }
            }
            (Self::Map { values, .. }, Value::Object(map)) => {
                for (key, v) in map {
                    values.check(&format!("{path}.{key}"), v, violations);
                }
            }
            (Self::Object { .. } | Self::Map { .. }, other) => {
                violations.push(format!("{path}: expected object, found {}", kind(other)));
            }
            (Self::List { .. }, other) => {
                violations.push(format!("{path}: expected list, found {}", kind(other)));
            }
        }
    }

    /// Example document shown to the model in the task prompt.
    pub fn example(&self) -> Value {
        match self {
            Self::Text { hint } if hint.is_empty() => Value::String("text".to_string()),
            Self::Text { hint } => Value::String(hint.clone()),
            Self::Object { fields } => Value::Object(
                fields
                    .iter()
                    .map(|field| (field.name.clone(), field.shape.example()))
                    .collect(),
            ),
            Self::List { items } => Value::Array(vec![items.example()]),
            Self::Map { key_hint, values } => {
                let key = if key_hint.is_empty() { "key" } else { key_hint };
                let mut map = Map::new();
                map.insert(format!("{key}1"), values.example());
                map.insert(format!("{key}2"), values.example());
                Value::Object(map)
            }
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
