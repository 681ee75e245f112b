//! Answer shapes of the tag knowledge base.

use serde::{Deserialize, Serialize};

use crate::FilterNode;

/// The `imr` field of a knowledge-base answer.
///
/// Some vocabulary entries wrap their alternatives in one extra list; both
/// shapes are accepted and [`TagAlternatives::flatten_once`] yields the flat list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TagAlternatives {
    Nested(Vec<Vec<FilterNode>>),
    Flat(Vec<FilterNode>),
}

impl TagAlternatives {
    #[must_use]
    pub fn flatten_once(&self) -> &[FilterNode] {
        match self {
            Self::Flat(nodes) => nodes,
            Self::Nested(lists) => lists.first().map_or(&[], Vec::as_slice),
        }
    }

    #[must_use]
    pub const fn is_nested(&self) -> bool {
        matches!(self, Self::Nested(_))
    }
}

impl Default for TagAlternatives {
    fn default() -> Self {
        Self::Flat(Vec::new())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TagAlternativeGroup {
    pub imr: TagAlternatives,
}

impl TagAlternativeGroup {
    #[must_use]
    pub fn flat(nodes: Vec<FilterNode>) -> Self {
        Self {
            imr: TagAlternatives::Flat(nodes),
        }
    }
}

/// Colour names the knowledge base considers equivalent to a requested colour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ColorBundle {
    #[serde(default)]
    pub color_values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{TagAlternativeGroup, TagAlternatives};

    #[test]
    fn nested_answer_flattens_once() {
        let group: TagAlternativeGroup = serde_json::from_value(json!({
            "imr": [[{"or": [{"key": "shop", "operator": "=", "value": "supermarket"}]}]]
        }))
        .expect("nested group");

        assert!(group.imr.is_nested());
        assert_eq!(group.imr.flatten_once().len(), 1);
        assert!(group.imr.flatten_once()[0].is_group());
    }

    #[test]
    fn flat_answer_is_used_as_is() {
        let group: TagAlternativeGroup = serde_json::from_value(json!({
            "imr": [
                {"or": [{"key": "amenity", "operator": "=", "value": "bar"}]},
                {"key": "amenity", "operator": "=", "value": "pub"}
            ]
        }))
        .expect("flat group");

        assert!(!group.imr.is_nested());
        assert_eq!(group.imr.flatten_once().len(), 2);
    }

    #[test]
    fn empty_imr_flattens_to_nothing() {
        let alternatives: TagAlternatives = serde_json::from_value(json!([])).expect("empty");
        assert!(alternatives.flatten_once().is_empty());
    }
}
