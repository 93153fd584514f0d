//! Parameter, tag and template normalisation.
//!
//! Callers hand over parameters and tags in whatever shape is convenient: a
//! keyed mapping (`{"Ami": "ami-123"}`) or the record form CloudFormation
//! itself uses (`[{"ParameterKey": "Ami", "ParameterValue": "ami-123"}]`,
//! with either `PascalCase` or `snake_case` field names). Both collapse into
//! [`Parameters`] / [`Tags`], which render the record form the API expects.

use super::errors::{Result, StackError};
use serde_json::Value;
use std::collections::BTreeMap;

/// Value of a single stack parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterValue {
    /// A literal value, already stringified.
    Value(String),
    /// Keep whatever value the stack currently has.
    UsePrevious,
    /// Explicit null in the source document; sent without a value.
    Null,
}

impl ParameterValue {
    /// Coerce a JSON value: scalars become strings, arrays are joined with commas.
    pub fn from_json(value: &Value) -> Self {
        match value_to_string(value) {
            Some(text) => ParameterValue::Value(text),
            None => ParameterValue::Null,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::Value(text) => Some(text),
            ParameterValue::UsePrevious | ParameterValue::Null => None,
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Value(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Value(value)
    }
}

/// Wire form of one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRecord {
    pub key: String,
    pub value: Option<String>,
    pub use_previous_value: bool,
}

/// Stack parameters keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    values: BTreeMap<String, ParameterValue>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a keyed mapping or an array of parameter records.
    ///
    /// `null` and `false` (an empty parameter file) produce no parameters.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null | Value::Bool(false) => Ok(Self::new()),
            Value::Object(map) => Ok(map
                .iter()
                .map(|(key, value)| (key.clone(), ParameterValue::from_json(value)))
                .collect()),
            Value::Array(records) => records.iter().map(parse_parameter_record).collect(),
            other => Err(StackError::InvalidArgument(format!(
                "parameters must be a mapping or a list of records, got: {}",
                other
            ))),
        }
    }

    /// Rebuild from wire records, e.g. the parameters of a deployed stack.
    pub fn from_records(records: &[ParameterRecord]) -> Self {
        records
            .iter()
            .map(|record| {
                let value = if record.use_previous_value {
                    ParameterValue::UsePrevious
                } else {
                    match &record.value {
                        Some(text) => ParameterValue::Value(text.clone()),
                        None => ParameterValue::Null,
                    }
                };
                (record.key.clone(), value)
            })
            .collect()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParameterValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Mark `key` to keep its current value on update.
    pub fn use_previous(&mut self, key: impl Into<String>) {
        self.values.insert(key.into(), ParameterValue::UsePrevious);
    }

    /// Overlay `other` on top of these parameters; `other` wins on conflicts.
    pub fn merge(&mut self, other: Parameters) {
        self.values.extend(other.values);
    }

    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.values.iter()
    }

    /// Keyed mapping form.
    pub fn to_map(&self) -> BTreeMap<String, ParameterValue> {
        self.values.clone()
    }

    /// Record form, as sent to CloudFormation.
    pub fn to_records(&self) -> Vec<ParameterRecord> {
        self.values
            .iter()
            .map(|(key, value)| match value {
                ParameterValue::UsePrevious => ParameterRecord {
                    key: key.clone(),
                    value: None,
                    use_previous_value: true,
                },
                ParameterValue::Value(text) => ParameterRecord {
                    key: key.clone(),
                    value: Some(text.clone()),
                    use_previous_value: false,
                },
                ParameterValue::Null => ParameterRecord {
                    key: key.clone(),
                    value: None,
                    use_previous_value: false,
                },
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<ParameterValue>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

fn parse_parameter_record(record: &Value) -> Result<(String, ParameterValue)> {
    let invalid = || StackError::InvalidArgument(format!("invalid parameter record: {}", record));
    let fields = record.as_object().ok_or_else(invalid)?;

    let mut key = None;
    let mut value = None;
    let mut use_previous = false;
    for (name, field) in fields {
        match snake_case(name).as_str() {
            "parameter_key" => key = Some(field.as_str().ok_or_else(invalid)?.to_string()),
            "parameter_value" => value = Some(field),
            "use_previous_value" => use_previous = field.as_bool().unwrap_or(false),
            _ => return Err(invalid()),
        }
    }

    let key = key.ok_or_else(invalid)?;
    let value = if use_previous {
        ParameterValue::UsePrevious
    } else {
        value.map_or(ParameterValue::Null, ParameterValue::from_json)
    };
    Ok((key, value))
}

/// One stack tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Stack tags keyed by tag name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    values: BTreeMap<String, String>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a keyed mapping or an array of `{Key, Value}` records.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null | Value::Bool(false) => Ok(Self::new()),
            Value::Object(map) => Ok(map
                .iter()
                .map(|(key, value)| (key.clone(), value_to_string(value).unwrap_or_default()))
                .collect()),
            Value::Array(records) => records.iter().map(parse_tag_record).collect(),
            other => Err(StackError::InvalidArgument(format!(
                "tags must be a mapping or a list of records, got: {}",
                other
            ))),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Overlay `other` on top of these tags; `other` wins on conflicts.
    pub fn merge(&mut self, other: Tags) {
        self.values.extend(other.values);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values.clone()
    }

    pub fn to_records(&self) -> Vec<Tag> {
        self.values
            .iter()
            .map(|(key, value)| Tag {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

fn parse_tag_record(record: &Value) -> Result<(String, String)> {
    let invalid = || StackError::InvalidArgument(format!("invalid tag record: {}", record));
    let fields = record.as_object().ok_or_else(invalid)?;

    let mut key = None;
    let mut value = None;
    for (name, field) in fields {
        match snake_case(name).as_str() {
            "key" => key = Some(field.as_str().ok_or_else(invalid)?.to_string()),
            "value" => value = value_to_string(field),
            _ => return Err(invalid()),
        }
    }
    Ok((key.ok_or_else(invalid)?, value.unwrap_or_default()))
}

/// Stack template, either as data or as text.
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    /// Structured template, serialised to JSON on submission.
    Data(Value),
    /// Template text passed through verbatim, keeping formatting and comments.
    Body(String),
    /// Location of a template already uploaded to S3.
    Url(String),
}

impl Template {
    /// The `TemplateBody` to submit, if this template is sent inline.
    pub fn body(&self) -> Result<Option<String>> {
        match self {
            Template::Data(data) => serde_json::to_string(data).map(Some).map_err(|e| {
                StackError::InvalidArgument(format!("cannot serialise template: {}", e))
            }),
            Template::Body(body) => Ok(Some(body.clone())),
            Template::Url(_) => Ok(None),
        }
    }

    /// The `TemplateURL` to submit, if this template lives in S3.
    pub fn url(&self) -> Option<&str> {
        match self {
            Template::Url(url) => Some(url),
            Template::Data(_) | Template::Body(_) => None,
        }
    }
}

/// Stringify a scalar the way CloudFormation expects parameter values.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| value_to_string(item).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

/// `ParameterKey` → `parameter_key`; already snake-cased names pass through.
fn snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    let mut previous_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() && previous_lower {
            result.push('_');
        }
        previous_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        result.push(c.to_ascii_lowercase());
    }
    result
}
