//! Unified diffs between deployed and pending stack data.

use crate::app::settings::OutputFormat;
use anyhow::Result;
use serde_json::{Map, Value};
use similar::TextDiff;

/// Copy of `data` with every object's keys in sorted order, at any depth.
pub fn normalize_data(data: &Value) -> Value {
    match data {
        Value::Object(object) => {
            let mut entries: Vec<(&String, &Value)> = object.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(key, value)| (key.clone(), normalize_data(value)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_data).collect()),
        other => other.clone(),
    }
}

/// Renders both sides in one format and diffs the text.
#[derive(Debug, Clone, Copy)]
pub struct Differ {
    format: OutputFormat,
}

impl Differ {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Unified diff from `existing` to `pending`, or `None` when they render identically.
    pub fn diff(&self, existing: &Value, pending: &Value) -> Result<Option<String>> {
        let existing = self.format.render(&normalize_data(existing))?;
        let pending = self.format.render(&normalize_data(pending))?;
        if existing == pending {
            return Ok(None);
        }

        let diff = TextDiff::from_lines(&existing, &pending)
            .unified_diff()
            .context_radius(3)
            .header("existing", "pending")
            .to_string();
        Ok(Some(diff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_normalize_sorts_nested_keys() {
        let data = json!({
            "b": 1,
            "a": [{"z": true, "y": null}],
            "c": {"k2": "v", "k1": {"q": 1, "p": 2}}
        });

        let normalized = normalize_data(&data);

        let keys: Vec<&String> = normalized.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        let nested: Vec<&String> = normalized["a"][0].as_object().unwrap().keys().collect();
        assert_eq!(nested, vec!["y", "z"]);
        let deep: Vec<&String> = normalized["c"]["k1"].as_object().unwrap().keys().collect();
        assert_eq!(deep, vec!["p", "q"]);
        assert_eq!(normalized, data);
    }

    #[test]
    fn test_normalize_keeps_array_order_and_scalars() {
        assert_eq!(normalize_data(&json!([3, 1, 2])), json!([3, 1, 2]));
        assert_eq!(normalize_data(&json!("text")), json!("text"));
    }

    #[test]
    fn test_identical_data_has_no_diff() {
        let existing = json!({"Parameters": {"Ami": "ami-1"}, "Tags": {}});
        let pending = json!({"Tags": {}, "Parameters": {"Ami": "ami-1"}});

        assert_eq!(Differ::new(OutputFormat::Yaml).diff(&existing, &pending).unwrap(), None);
        assert_eq!(Differ::new(OutputFormat::Json).diff(&existing, &pending).unwrap(), None);
    }

    #[test]
    fn test_changed_value_is_reported() {
        let existing = json!({"Parameters": {"Ami": "ami-1", "Count": "2"}});
        let pending = json!({"Parameters": {"Count": "2", "Ami": "ami-2"}});

        let diff = Differ::new(OutputFormat::Yaml)
            .diff(&existing, &pending)
            .unwrap()
            .unwrap();

        assert!(diff.starts_with("--- existing\n+++ pending\n"));
        assert!(diff.contains("-  Ami: ami-1\n"));
        assert!(diff.contains("+  Ami: ami-2\n"));
        assert!(diff.contains("   Count: '2'\n"));
    }
}
