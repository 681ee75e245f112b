//! In-memory knowledge base backed by a fixed vocabulary.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use imr_core::{ColorBundle, ImrError, TagAlternativeGroup};
use serde::{Deserialize, Serialize};

use crate::{TagKnowledgeBase, TermAnswer};

/// Serialized vocabulary: `{"terms": {term: [group, ...]}, "colors": {name: bundle}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Vocabulary {
    pub terms: BTreeMap<String, Vec<TagAlternativeGroup>>,
    pub colors: BTreeMap<String, ColorBundle>,
}

#[derive(Debug, Default)]
pub struct StaticTagKnowledgeBase {
    terms: BTreeMap<String, TermAnswer>,
    colors: BTreeMap<String, Arc<ColorBundle>>,
}

impl StaticTagKnowledgeBase {
    #[must_use]
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            terms: vocabulary
                .terms
                .into_iter()
                .map(|(term, groups)| (term, Arc::from(groups)))
                .collect(),
            colors: vocabulary
                .colors
                .into_iter()
                .map(|(color, bundle)| (color, Arc::new(bundle)))
                .collect(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ImrError> {
        let vocabulary: Vocabulary = serde_json::from_str(json)?;
        Ok(Self::new(vocabulary))
    }

    pub fn from_path(path: &Path) -> Result<Self, ImrError> {
        let json = std::fs::read_to_string(path).map_err(|e| ImrError::InvalidDocument {
            message: format!("failed to read vocabulary {}: {e}", path.display()),
        })?;
        Self::from_json_str(&json)
    }

    #[must_use]
    pub fn with_term(mut self, term: impl Into<String>, groups: Vec<TagAlternativeGroup>) -> Self {
        self.terms.insert(term.into(), Arc::from(groups));
        self
    }

    #[must_use]
    pub fn with_colors<I, S>(mut self, color: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let bundle = ColorBundle {
            color_values: values.into_iter().map(Into::into).collect(),
        };
        self.colors.insert(color.into(), Arc::new(bundle));
        self
    }

    #[must_use]
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }
}

impl TagKnowledgeBase for StaticTagKnowledgeBase {
    fn lookup_term(&self, term: &str) -> Result<TermAnswer, ImrError> {
        Ok(self
            .terms
            .get(term)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new())))
    }

    fn lookup_color(&self, color: &str) -> Result<Arc<ColorBundle>, ImrError> {
        Ok(self.colors.get(color).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use imr_core::{FilterNode, ImrErrorCode, TagAlternativeGroup};

    use super::StaticTagKnowledgeBase;
    use crate::TagKnowledgeBase;

    const VOCABULARY: &str = r#"{
        "terms": {
            "supermarket": [{"imr": [[{"or": [{"key": "shop", "operator": "=", "value": "supermarket"}]}]]}]
        },
        "colors": {
            "red": {"color_values": ["red", "darkred"]}
        }
    }"#;

    #[test]
    fn loads_terms_and_colors_from_json() {
        let kb = StaticTagKnowledgeBase::from_json_str(VOCABULARY).expect("vocabulary");
        let answer = kb.lookup_term("supermarket").expect("lookup");
        assert_eq!(answer.len(), 1);
        assert!(answer[0].imr.is_nested());
        assert_eq!(
            kb.lookup_color("red").expect("color").color_values,
            ["red", "darkred"]
        );
    }

    #[test]
    fn unknown_entries_are_empty_not_errors() {
        let kb = StaticTagKnowledgeBase::default();
        assert!(kb.lookup_term("spaceport").expect("lookup").is_empty());
        assert!(kb.lookup_color("octarine").expect("lookup").color_values.is_empty());
    }

    #[test]
    fn builder_entries_are_exact_match() {
        let kb = StaticTagKnowledgeBase::default().with_term(
            "bakery",
            vec![TagAlternativeGroup::flat(vec![FilterNode::leaf("shop", "=", "bakery")])],
        );
        assert_eq!(kb.lookup_term("bakery").expect("lookup").len(), 1);
        assert!(kb.lookup_term("Bakery").expect("lookup").is_empty());
        assert_eq!(kb.term_count(), 1);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(VOCABULARY.as_bytes()).expect("write vocabulary");
        let kb = StaticTagKnowledgeBase::from_path(file.path()).expect("vocabulary");
        assert_eq!(kb.term_count(), 1);
    }

    #[test]
    fn malformed_vocabulary_is_rejected() {
        let error = StaticTagKnowledgeBase::from_json_str("{\"terms\": 3}").expect_err("bad json");
        assert_eq!(error.code(), ImrErrorCode::InvalidDocument);
    }
}
