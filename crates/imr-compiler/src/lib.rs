#![forbid(unsafe_code)]

//! Compiles model output into an Intermediate Map Representation.
//!
//! [`Compiler`] ties the pieces together: the tolerant parser repairs the raw
//! text, then every entity is normalized and synthesized into a filter tree
//! against a [`TagKnowledgeBase`].

pub mod assemble;
pub mod normalize;
pub mod synthesize;

use imr_core::{ImrDocument, ImrError, ImrResponse, ResponseStatus};
use imr_parser::{ParseResult, RepairOptions, parse_tolerant_with};
use imr_tags::TagKnowledgeBase;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

pub use assemble::{Compilation, assemble};
pub use normalize::{classify, display_name, is_plural, pluralize};
pub use synthesize::{canonicalize, synthesize};

/// Result of compiling raw text: the parse, and the IMR when parsing succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextCompilation {
    pub parse: ParseResult,
    /// `None` when the text could not be repaired into a document.
    pub compilation: Option<Compilation>,
}

pub struct Compiler<K> {
    knowledge_base: K,
    repair: RepairOptions,
}

impl<K: TagKnowledgeBase> Compiler<K> {
    pub fn new(knowledge_base: K) -> Self {
        Self {
            knowledge_base,
            repair: RepairOptions::default(),
        }
    }

    #[must_use]
    pub fn with_repair_options(mut self, repair: RepairOptions) -> Self {
        self.repair = repair;
        self
    }

    pub fn knowledge_base(&self) -> &K {
        &self.knowledge_base
    }

    pub fn compile_document(&self, document: ImrDocument) -> Result<Compilation, ImrError> {
        assemble(&self.knowledge_base, document)
    }

    pub fn compile_value(&self, document: Value) -> Result<Compilation, ImrError> {
        let document: ImrDocument = serde_json::from_value(document)?;
        self.compile_document(document)
    }

    /// Repair and parse `raw`, then assemble it. Parse warnings come first in
    /// the compilation's warning list.
    pub fn compile_text(&self, raw: &str) -> Result<TextCompilation, ImrError> {
        let parse = parse_tolerant_with(raw, self.repair);
        let Some(document) = parse.document.clone() else {
            return Ok(TextCompilation {
                parse,
                compilation: None,
            });
        };

        let mut compilation = self.compile_value(document)?;
        let mut warnings = parse.warnings.clone();
        warnings.append(&mut compilation.warnings);
        compilation.warnings = warnings;
        info!(
            nodes = compilation.imr.nodes.len(),
            repairs = parse.repairs.len(),
            "compiled model output"
        );
        Ok(TextCompilation {
            parse,
            compilation: Some(compilation),
        })
    }

    /// Compile `raw_output` for `sentence` into a response envelope. Failures
    /// are reported in the envelope instead of being returned.
    pub fn respond(
        &self,
        sentence: &str,
        raw_output: &str,
        model_version: Option<&str>,
    ) -> ImrResponse {
        let (imr, error) = match self.compile_text(raw_output) {
            Ok(TextCompilation {
                compilation: Some(compilation),
                ..
            }) => (Some(compilation.imr), None),
            Ok(TextCompilation { parse, .. }) => {
                let reason = parse
                    .failure()
                    .map_or_else(|| "model output could not be parsed".to_string(), ToString::to_string);
                (None, Some(reason))
            }
            Err(error) => (None, Some(error.to_string())),
        };

        ImrResponse {
            status: if error.is_none() {
                ResponseStatus::Success
            } else {
                ResponseStatus::Error
            },
            imr,
            input_sentence: sentence.to_string(),
            raw_output: raw_output.to_string(),
            model_version: model_version.map(str::to_string),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use imr_core::{FilterNode, ImrWarningCode, ResponseStatus, TagAlternativeGroup};
    use imr_parser::RepairOptions;
    use imr_tags::StaticTagKnowledgeBase;
    use serde_json::json;

    use super::Compiler;

    fn compiler() -> Compiler<StaticTagKnowledgeBase> {
        Compiler::new(StaticTagKnowledgeBase::default().with_term(
            "kiosk",
            vec![TagAlternativeGroup::flat(vec![FilterNode::or(vec![
                FilterNode::leaf("shop", "=", "kiosk"),
            ])])],
        ))
    }

    const RAW: &str = "area:\n  type: bbox\nentities:\n- name: kiosk id: 0</s>";

    #[test]
    fn compile_text_repairs_and_assembles() {
        let compiled = compiler().compile_text(RAW).expect("compiled");
        assert_eq!(compiled.parse.repairs.len(), 1);

        let compilation = compiled.compilation.expect("document");
        assert_eq!(compilation.imr.nodes.len(), 1);
        assert_eq!(compilation.imr.nodes[0].display_name, "kiosks");
        assert_eq!(compilation.warnings[0].code, ImrWarningCode::ParseRepair);
    }

    #[test]
    fn unrepairable_text_has_no_compilation() {
        let compiled = compiler()
            .with_repair_options(RepairOptions { max_attempts: 0 })
            .compile_text(RAW)
            .expect("compiled");
        assert!(compiled.compilation.is_none());
        assert!(!compiled.parse.is_done());
    }

    #[test]
    fn non_mapping_document_is_invalid() {
        let error = compiler().compile_text("- just\n- a list").expect_err("invalid");
        assert_eq!(error.code(), imr_core::ImrErrorCode::InvalidDocument);
    }

    #[test]
    fn respond_wraps_success() {
        let response = compiler().respond("kiosks in Bonn", RAW, Some("t5-base"));
        assert_eq!(response.status, ResponseStatus::Success);
        let encoded = serde_json::to_value(&response).expect("response");
        assert_eq!(encoded["inputSentence"], json!("kiosks in Bonn"));
        assert_eq!(encoded["modelVersion"], json!("t5-base"));
        assert_eq!(encoded["imr"]["nodes"][0]["name"], json!("kiosk"));
        assert!(encoded.get("error").is_none());
    }

    #[test]
    fn respond_reports_parse_failure() {
        let response = compiler().respond("?", "area: [unclosed\nentities: {", None);
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.imr.is_none());
        assert!(response.error.is_some());
    }
}
