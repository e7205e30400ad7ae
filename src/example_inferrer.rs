use crate::error::{Error, Result};
use crate::schema_generator::{Schema, ScalarSchema, SchemaType};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// `local@domain.tld` shaped strings
fn looks_like_email(text: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"([a-zA-Z0-9]+)@([a-zA-Z0-9]+)\.([a-z]+)").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(text))
}

/// Infers a schema from one decoded example value.
///
/// Arrays are assumed homogeneous: only the first element is inspected.
pub fn infer_schema(value: &Value) -> Result<Schema> {
    infer_at(value, &mut Vec::new())
}

fn infer_at(value: &Value, path: &mut Vec<String>) -> Result<Schema> {
    match value {
        Value::Null => Ok(Schema::null()),
        Value::Object(map) => {
            let mut properties = IndexMap::with_capacity(map.len());
            for (key, child) in map {
                path.push(key.clone());
                let schema = infer_at(child, path)?;
                path.pop();
                properties.insert(key.clone(), schema);
            }
            Ok(Schema::object(properties))
        }
        Value::Array(elements) => {
            let items = match elements.first() {
                Some(first) => {
                    path.push("0".to_string());
                    let schema = infer_at(first, path)?;
                    path.pop();
                    schema
                }
                None => Schema::null(),
            };
            Ok(Schema::array(items))
        }
        Value::Number(number) if number.is_i64() || number.is_u64() => {
            Ok(Schema::typed(SchemaType::Integer))
        }
        Value::Number(_) => Ok(Schema::typed(SchemaType::Number)),
        Value::String(text) if looks_like_email(text) => Ok(Schema::Scalar(ScalarSchema {
            schema_type: Some(SchemaType::String),
            format: Some("email".to_string()),
            ..Default::default()
        })),
        Value::String(_) => Ok(Schema::typed(SchemaType::String)),
        Value::Bool(_) => Err(Error::UnsupportedExampleValue {
            path: path.join("."),
            kind: "boolean",
        }),
    }
}
