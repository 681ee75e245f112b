//! Boolean filter trees over key/operator/value tag constraints.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Operator used when a leaf or property leaves it out.
pub const DEFAULT_OPERATOR: &str = "=";

/// Right-hand side of a tag constraint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FilterValue {
    Number(serde_json::Number),
    Text(String),
}

impl FilterValue {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for FilterValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

// Model output regularly carries `yes`/`true` style flags; booleans are kept as text.
impl<'de> Deserialize<'de> for FilterValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawValue {
            Number(serde_json::Number),
            Flag(bool),
            Text(String),
        }

        Ok(match RawValue::deserialize(deserializer)? {
            RawValue::Number(number) => Self::Number(number),
            RawValue::Flag(flag) => Self::Text(flag.to_string()),
            RawValue::Text(text) => Self::Text(text),
        })
    }
}

/// An atomic tag constraint such as `amenity=restaurant`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterLeaf {
    pub key: String,
    #[serde(default = "default_operator", deserialize_with = "operator_or_default")]
    pub operator: String,
    pub value: FilterValue,
}

impl FilterLeaf {
    #[must_use]
    pub fn new(key: impl Into<String>, operator: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        let operator = operator.into();
        Self {
            key: key.into(),
            operator: if operator.is_empty() {
                default_operator()
            } else {
                operator
            },
            value: value.into(),
        }
    }

    /// Copy of this leaf with operator and value replaced.
    #[must_use]
    pub fn with_constraint(&self, operator: &str, value: FilterValue) -> Self {
        Self::new(self.key.clone(), operator, value)
    }
}

impl fmt::Display for FilterLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.key, self.operator, self.value)
    }
}

fn default_operator() -> String {
    DEFAULT_OPERATOR.to_string()
}

fn operator_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let operator = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    if operator.trim().is_empty() {
        Ok(default_operator())
    } else {
        Ok(operator)
    }
}

/// A node of a filter tree: a leaf, or an `and`/`or` group of nodes.
///
/// The wire shape is the bare leaf object, `{"and": [...]}` or `{"or": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FilterNode {
    And { and: Vec<FilterNode> },
    Or { or: Vec<FilterNode> },
    Leaf(FilterLeaf),
}

impl FilterNode {
    #[must_use]
    pub fn leaf(key: impl Into<String>, operator: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Leaf(FilterLeaf::new(key, operator, value))
    }

    #[must_use]
    pub fn and(members: Vec<FilterNode>) -> Self {
        Self::And { and: members }
    }

    #[must_use]
    pub fn or(members: Vec<FilterNode>) -> Self {
        Self::Or { or: members }
    }

    #[must_use]
    pub const fn is_group(&self) -> bool {
        matches!(self, Self::And { .. } | Self::Or { .. })
    }

    #[must_use]
    pub const fn as_leaf(&self) -> Option<&FilterLeaf> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            Self::And { .. } | Self::Or { .. } => None,
        }
    }

    /// Members of a group, `None` for a leaf.
    #[must_use]
    pub fn members(&self) -> Option<&[FilterNode]> {
        match self {
            Self::And { and } => Some(and),
            Self::Or { or } => Some(or),
            Self::Leaf(_) => None,
        }
    }

    /// Number of leaves in this subtree.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::And { and: members } | Self::Or { or: members } => {
                members.iter().map(Self::leaf_count).sum()
            }
        }
    }

    /// Depth-first iterator over every leaf in this subtree.
    pub fn leaves(&self) -> Box<dyn Iterator<Item = &FilterLeaf> + '_> {
        match self {
            Self::Leaf(leaf) => Box::new(std::iter::once(leaf)),
            Self::And { and: members } | Self::Or { or: members } => {
                Box::new(members.iter().flat_map(Self::leaves))
            }
        }
    }

    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::And { .. } => "and",
            Self::Or { .. } => "or",
            Self::Leaf(_) => "leaf",
        }
    }
}

impl From<FilterLeaf> for FilterNode {
    fn from(leaf: FilterLeaf) -> Self {
        Self::Leaf(leaf)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{FilterLeaf, FilterNode, FilterValue};

    #[test]
    fn group_wire_shape_uses_bare_keys() {
        let node = FilterNode::or(vec![
            FilterNode::leaf("amenity", "=", "restaurant"),
            FilterNode::leaf("amenity", "=", "fast_food"),
        ]);
        let encoded = serde_json::to_value(&node).expect("serialize filter node");
        assert_eq!(
            encoded,
            json!({"or": [
                {"key": "amenity", "operator": "=", "value": "restaurant"},
                {"key": "amenity", "operator": "=", "value": "fast_food"},
            ]})
        );
    }

    #[test]
    fn leaf_operator_defaults_to_equality() {
        let missing: FilterLeaf =
            serde_json::from_value(json!({"key": "shop", "value": "bakery"})).expect("leaf");
        let empty: FilterLeaf =
            serde_json::from_value(json!({"key": "shop", "operator": "", "value": "bakery"}))
                .expect("leaf");
        assert_eq!(missing.operator, "=");
        assert_eq!(empty.operator, "=");
    }

    #[test]
    fn nested_groups_deserialize_to_variants() {
        let node: FilterNode = serde_json::from_value(json!({
            "and": [
                {"key": "amenity", "operator": "=", "value": "restaurant"},
                {"or": [{"key": "height", "operator": ">", "value": 10}]}
            ]
        }))
        .expect("filter tree");

        let FilterNode::And { and } = &node else {
            panic!("expected an and group, got {}", node.kind_str());
        };
        assert!(matches!(and[0], FilterNode::Leaf(_)));
        assert!(matches!(and[1], FilterNode::Or { .. }));
        assert_eq!(node.leaf_count(), 2);
    }

    #[test]
    fn numeric_and_boolean_values_are_preserved() {
        let number: FilterValue = serde_json::from_value(json!(10)).expect("number");
        let flag: FilterValue = serde_json::from_value(json!(true)).expect("flag");
        assert_eq!(number, FilterValue::from(10));
        assert_eq!(number.to_string(), "10");
        assert_eq!(flag, FilterValue::text("true"));
    }

    #[test]
    fn leaves_iterates_depth_first() {
        let node = FilterNode::and(vec![
            FilterNode::leaf("a", "=", "1"),
            FilterNode::or(vec![FilterNode::leaf("b", "=", "2"), FilterNode::leaf("c", "=", "3")]),
        ]);
        let keys: Vec<_> = node.leaves().map(|leaf| leaf.key.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }
}
