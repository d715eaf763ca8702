//! Typed attribute values and stored items
//!
//! Items use the single-table layout: every row carries a `PK` partition key
//! and an `SK` sort key, both strings. Values serialize in the tagged wire
//! shape (`{"S": "text"}`, `{"L": [...]}`) used by stream records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

/// Partition key attribute name
pub const PK: &str = "PK";
/// Sort key attribute name
pub const SK: &str = "SK";

/// A stored row: attribute name to typed value
pub type Item = BTreeMap<String, AttributeValue>;

/// Typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String
    S(String),
    /// Number, kept as its decimal text
    N(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// List of values
    L(Vec<AttributeValue>),
    /// Nested map
    M(BTreeMap<String, AttributeValue>),
    #[serde(rename = "NULL")]
    Null(bool),
}

impl AttributeValue {
    /// Shorthand for a string value
    pub fn s(value: impl Into<String>) -> Self {
        Self::S(value.into())
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_l(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::L(values) => Some(values),
            _ => None,
        }
    }

    /// Convert a plain JSON value (`"x"`, `1`, `[..]`) into a typed value
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null(true),
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => Self::N(n.to_string()),
            JsonValue::String(s) => Self::S(s.clone()),
            JsonValue::Array(values) => Self::L(values.iter().map(Self::from_json).collect()),
            JsonValue::Object(map) => Self::M(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Primary key of a stored row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub pk: String,
    pub sk: String,
}

impl PrimaryKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Extract the key from an item, failing when `PK`/`SK` are absent or not strings
    pub fn of(item: &Item) -> Result<Self> {
        let pk = string_attr(item, PK)
            .ok_or_else(|| CoreError::InvalidItem("item has no string PK".to_string()))?;
        let sk = string_attr(item, SK)
            .ok_or_else(|| CoreError::InvalidItem("item has no string SK".to_string()))?;
        Ok(Self::new(pk, sk))
    }

    /// Key attributes as an item (the `Keys` section of a stream record)
    pub fn to_item(&self) -> Item {
        let mut keys = Item::new();
        keys.insert(PK.to_string(), AttributeValue::s(&self.pk));
        keys.insert(SK.to_string(), AttributeValue::s(&self.sk));
        keys
    }
}

/// String attribute lookup
pub fn string_attr<'a>(item: &'a Item, name: &str) -> Option<&'a str> {
    item.get(name).and_then(AttributeValue::as_s)
}

/// String attribute lookup that fails on absence
pub fn require_string_attr<'a>(item: &'a Item, name: &str) -> Result<&'a str> {
    string_attr(item, name).ok_or_else(|| CoreError::MissingAttribute(name.to_string()))
}

/// Build an item from a plain JSON object (`{"PK": "...", "todo_details": "..."}`)
pub fn item_from_json(value: &JsonValue) -> Result<Item> {
    let object = value
        .as_object()
        .ok_or_else(|| CoreError::InvalidItem("expected a JSON object".to_string()))?;

    let item: Item = object
        .iter()
        .map(|(k, v)| (k.clone(), AttributeValue::from_json(v)))
        .collect();

    PrimaryKey::of(&item)?;
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let value = AttributeValue::s("hello");
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({"S": "hello"}));

        let list = AttributeValue::L(vec![AttributeValue::s("a"), AttributeValue::Bool(true)]);
        assert_eq!(
            serde_json::to_value(&list).unwrap(),
            json!({"L": [{"S": "a"}, {"BOOL": true}]})
        );
    }

    #[test]
    fn test_item_from_json() {
        let item = item_from_json(&json!({
            "PK": "USER#someone@example.com",
            "SK": "DATE#2024-12-24",
            "events": ["Dinner", "Gifts"],
            "priority": 2
        }))
        .unwrap();

        assert_eq!(string_attr(&item, PK), Some("USER#someone@example.com"));
        assert_eq!(item.get("priority"), Some(&AttributeValue::N("2".to_string())));
        assert_eq!(item.get("events").and_then(AttributeValue::as_l).map(|l| l.len()), Some(2));
    }

    #[test]
    fn test_item_from_json_requires_keys() {
        let result = item_from_json(&json!({"PK": "USER#x"}));
        assert!(matches!(result, Err(CoreError::InvalidItem(_))));
    }

    #[test]
    fn test_primary_key_to_item() {
        let key = PrimaryKey::new("NUMBER#12345678987", "MESSAGE#2024");
        let item = key.to_item();
        assert_eq!(PrimaryKey::of(&item).unwrap(), key);
    }
}
