//! Signs read off the board next to a plate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// What a sign asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Tool,
    Callback,
}

/// One detected sign.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignDetection {
    #[serde(rename = "type")]
    pub kind: Action,
    /// First line inside the shape
    pub name: String,
    /// `Key: value` lines below the name
    pub parameters: BTreeMap<String, String>,
}

impl SignDetection {
    fn from_value(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let kind: Action = serde_json::from_value(object.get("type")?.clone()).ok()?;
        let name = object.get("name")?.as_str()?.trim().to_string();
        if name.is_empty() {
            return None;
        }

        let parameters = object
            .get("parameters")
            .and_then(|p| p.as_object())
            .map(|params| {
                params
                    .iter()
                    .filter_map(|(key, value)| scalar_text(value).map(|v| (key.clone(), v)))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            kind,
            name,
            parameters,
        })
    }
}

/// Parameter values are read as text; numbers and booleans are kept in
/// their written form, anything nested is dropped.
fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read `{"signs": [...]}`. Entries that are not a well-formed sign are
/// skipped with a warning; a missing `signs` list means no signs.
pub fn parse_signs(value: &serde_json::Value) -> Vec<SignDetection> {
    let Some(entries) = value.get("signs").and_then(|s| s.as_array()) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let sign = SignDetection::from_value(entry);
            if sign.is_none() {
                warn!(entry = %entry, "Skipping malformed sign");
            }
            sign
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_callback_and_tool_signs() {
        let signs = parse_signs(&json!({
            "signs": [
                {"type": "callback", "name": "review", "parameters": {"Name": "Marie", "Priority": 2}},
                {"type": "tool", "name": "count", "parameters": {}}
            ]
        }));
        assert_eq!(signs.len(), 2);
        assert_eq!(signs[0].kind, Action::Callback);
        assert_eq!(signs[0].parameters["Name"], "Marie");
        assert_eq!(signs[0].parameters["Priority"], "2");
        assert_eq!(signs[1].kind, Action::Tool);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let signs = parse_signs(&json!({
            "signs": [
                "review",
                {"type": "shape", "name": "review"},
                {"type": "callback"},
                {"type": "callback", "name": "  "},
                {"type": "callback", "name": "review", "parameters": {"nested": {"a": 1}}}
            ]
        }));
        assert_eq!(signs.len(), 1);
        assert!(signs[0].parameters.is_empty());
    }

    #[test]
    fn missing_list_means_no_signs() {
        assert!(parse_signs(&json!({})).is_empty());
        assert!(parse_signs(&json!({"signs": null})).is_empty());
    }

    #[test]
    fn serializes_kind_as_type() {
        let sign = SignDetection {
            kind: Action::Callback,
            name: "review".into(),
            parameters: BTreeMap::new(),
        };
        let value = serde_json::to_value(&sign).unwrap();
        assert_eq!(value["type"], "callback");
    }
}
