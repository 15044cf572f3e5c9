use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Sentinel for a string-valued key that was never set.
pub const NONE_STRING: &str = "NONE";

/// A value stored under a key of the player state, or expected by a requirement.
///
/// Every variant has a default (`false`, `0`, `0.0`, `"NONE"`, empty table) which
/// is what a key that was never set reads as.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Table(BTreeMap<String, Value>),
}

impl Value {
    /// The default value of the same variant as `self`.
    pub fn default_like(&self) -> Value {
        match self {
            Value::Bool(_) => Value::Bool(false),
            Value::Int(_) => Value::Int(0),
            Value::Float(_) => Value::Float(0.0),
            Value::Str(_) => Value::Str(NONE_STRING.to_string()),
            Value::Table(_) => Value::Table(BTreeMap::new()),
        }
    }

    pub fn is_default(&self) -> bool {
        match self {
            Value::Bool(b) => !b,
            Value::Int(x) => *x == 0,
            Value::Float(x) => *x == 0.0,
            Value::Str(s) => s == NONE_STRING,
            Value::Table(t) => t.values().all(|v| v.is_default()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(x) => Some(*x as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Equality used by requirements: Int and Float compare numerically.
    pub fn matches(&self, expected: &Value) -> bool {
        match (self.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == expected,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

/// Inclusive numeric bounds; a missing bound is unbounded on that side.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Range {
    #[serde(rename = "Minimum", default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(rename = "Maximum", default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

impl Range {
    pub fn contains(&self, x: f64) -> bool {
        self.minimum.map_or(true, |m| x >= m) && self.maximum.map_or(true, |m| x <= m)
    }
}

// Variant order matters for untagged deserialization: a map with only
// Minimum/Maximum keys is a range, any other map is a nested scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Requirement {
    Range(Range),
    Nested(RequirementSet),
    Exact(Value),
}

/// One alternative: every key must hold (AND).
pub type RequirementSet = BTreeMap<String, Requirement>;

/// Named alternatives: any one set must hold (OR).
pub type Requirements = BTreeMap<String, RequirementSet>;

pub type Outcomes = BTreeMap<String, Value>;

pub type Goals = BTreeMap<String, Requirements>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandDefinition {
    #[serde(rename = "Requirements", default)]
    pub requirements: Requirements,
    #[serde(rename = "Outcomes", default)]
    pub outcomes: Outcomes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requirements() {
        let json = r#"{
            "Requirements": {
                "Bat form": {"Relic - Soul of Bat": true, "Room": "Castle Entrance, After Drawbridge"},
                "Hearts": {"Hearts": {"Minimum": 5}},
                "Nested": {"Rooms Visited": {"Alchemy Laboratory, Entryway": true}}
            },
            "Outcomes": {"Hearts": 3, "Section": "Upper"}
        }"#;
        let cmd: CommandDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(
            cmd.requirements["Bat form"]["Relic - Soul of Bat"],
            Requirement::Exact(Value::Bool(true))
        );
        assert_eq!(
            cmd.requirements["Hearts"]["Hearts"],
            Requirement::Range(Range {
                minimum: Some(5.0),
                maximum: None
            })
        );
        match &cmd.requirements["Nested"]["Rooms Visited"] {
            Requirement::Nested(set) => {
                assert_eq!(
                    set["Alchemy Laboratory, Entryway"],
                    Requirement::Exact(Value::Bool(true))
                );
            }
            r => panic!("expected nested requirement, got {r:?}"),
        }
        assert_eq!(cmd.outcomes["Hearts"], Value::Int(3));
        assert_eq!(cmd.outcomes["Section"], Value::Str("Upper".to_string()));
    }

    #[test]
    fn test_defaults() {
        assert!(Value::Bool(false).is_default());
        assert!(Value::Str("NONE".to_string()).is_default());
        assert!(Value::Int(0).is_default());
        assert!(!Value::Float(0.5).is_default());
        assert_eq!(
            Value::Str("Keep".to_string()).default_like(),
            Value::Str(NONE_STRING.to_string())
        );
        assert!(Value::Int(3).matches(&Value::Float(3.0)));
        assert!(!Value::Bool(true).matches(&Value::Int(1)));
    }

    #[test]
    fn test_range() {
        let r = Range {
            minimum: Some(5.0),
            maximum: None,
        };
        assert!(r.contains(5.0));
        assert!(r.contains(999.0));
        assert!(!r.contains(4.0));
        let r = Range {
            minimum: None,
            maximum: Some(2.0),
        };
        assert!(r.contains(-10.0));
        assert!(!r.contains(2.5));
    }
}
