//! CloudFormation-flavoured YAML.
//!
//! Templates written in YAML use short-form intrinsic function tags
//! (`!Ref`, `!GetAtt`, `!Sub`, ...). This module parses such documents into
//! plain `serde_json::Value`s, expanding every tag into the equivalent
//! long-form JSON function so the result can be submitted as a JSON template.

use serde_json::{Map, Number, Value};
use serde_yaml::value::TaggedValue;

/// Parse a YAML document, expanding CloudFormation short-form tags.
pub fn from_str(text: &str) -> Result<Value, serde_yaml::Error> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
    Ok(to_json(yaml))
}

fn to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => number_to_json(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                map.insert(key_to_string(key), to_json(value));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => expand_tag(*tagged),
    }
}

/// `!Name value` → `{"Fn::Name": value}`, with the irregular cases handled.
fn expand_tag(tagged: TaggedValue) -> Value {
    let tag = tagged.tag.to_string();
    let name = tag.trim_start_matches('!');
    let value = to_json(tagged.value);

    let (key, value) = match name {
        "Ref" | "Condition" => (name.to_string(), value),
        "GetAtt" => {
            let value = match value {
                Value::String(path) => match path.split_once('.') {
                    Some((resource, attribute)) => Value::Array(vec![
                        Value::String(resource.to_string()),
                        Value::String(attribute.to_string()),
                    ]),
                    None => Value::String(path),
                },
                other => other,
            };
            ("Fn::GetAtt".to_string(), value)
        }
        "GetAZs" if value.is_null() => ("Fn::GetAZs".to_string(), Value::String(String::new())),
        _ => (format!("Fn::{}", name), value),
    };

    let mut map = Map::new();
    map.insert(key, value);
    Value::Object(map)
}

fn number_to_json(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Value::Number(u.into())
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(n.to_string()))
    }
}

fn key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_json::to_string(&to_json(other)).unwrap_or_default(),
    }
}
