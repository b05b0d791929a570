use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single option value inside a section.
///
/// The store keeps scalar options and multi-valued lists distinct, the way
/// the underlying format does. A field that holds exactly one value may come
/// back as a bare scalar, so consumers that need set semantics must go
/// through [`FieldValue::to_list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn single(value: impl Into<String>) -> Self {
        FieldValue::Single(value.into())
    }

    pub fn list(values: Vec<String>) -> Self {
        FieldValue::List(values)
    }

    /// Scalar view of the value. Lists are not flattened.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Single(v) => Some(v),
            FieldValue::List(_) => None,
        }
    }

    /// Normalized list view: a scalar becomes a singleton list.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            FieldValue::Single(v) => vec![v.clone()],
            FieldValue::List(vs) => vs.clone(),
        }
    }
}

/// One named section of the configuration: an id, a section kind and a flat
/// field map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Store-assigned section identifier
    pub id: String,

    /// Section kind (e.g. `geo_filter`, `global`)
    #[serde(rename = "type")]
    pub kind: String,

    /// Option fields of this section
    #[serde(default)]
    pub options: BTreeMap<String, FieldValue>,
}

impl Section {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.options.get(field)
    }

    /// Scalar field value, if the field exists and is a scalar
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.options.get(field).and_then(|v| v.as_str())
    }

    /// Normalized list view of a field; absent fields yield an empty list
    pub fn get_list(&self, field: &str) -> Vec<String> {
        self.options.get(field).map(|v| v.to_list()).unwrap_or_default()
    }

    /// Boolean flag field: set and equal to "1"
    pub fn flag(&self, field: &str) -> bool {
        self.get_str(field) == Some("1")
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.options.insert(field.into(), value);
    }

    pub fn unset(&mut self, field: &str) {
        self.options.remove(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scalar_normalizes_to_singleton_list() {
        let value = FieldValue::single("r1:poly1");
        assert_eq!(value.to_list(), vec!["r1:poly1".to_string()]);
    }

    #[test]
    fn list_round_trips_through_json() {
        let value = FieldValue::list(vec!["a".into(), "b".into()]);
        let json = serde_json::to_string(&value).expect("serialize");
        assert_eq!(json, r#"["a","b"]"#);
        let back: FieldValue = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, value);
    }

    #[test]
    fn bare_scalar_deserializes_as_single() {
        let value: FieldValue = serde_json::from_str(r#""udp""#).expect("deserialize");
        assert_eq!(value, FieldValue::single("udp"));
        assert_eq!(value.as_str(), Some("udp"));
    }

    #[test]
    fn flag_requires_exact_one() {
        let mut section = Section::new("cfg000001", "geo_filter");
        section.set("enabled", FieldValue::single("1"));
        assert!(section.flag("enabled"));
        section.set("enabled", FieldValue::single("0"));
        assert!(!section.flag("enabled"));
        section.unset("enabled");
        assert!(!section.flag("enabled"));
    }
}
