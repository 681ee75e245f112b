#![forbid(unsafe_code)]

//! Tolerant parsing of model-generated YAML.
//!
//! Parsing runs as a small state machine: `Parsing` attempts a structural
//! parse; a failure that carries a location moves to `Repairing`, which
//! classifies the offending line against the known corruptions in
//! [`repair`] and rewrites it before parsing again. The machine ends in
//! `Done` with a document or `Failed` with the reason repairs stopped.

pub mod repair;

use std::fmt;

use imr_core::{CORRUPT_EOS_TOKEN, ImrWarning, ImrWarningCode};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

pub use repair::{Fault, classify_line};

/// Repairs attempted before giving up on a document.
pub const DEFAULT_MAX_REPAIR_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepairOptions {
    pub max_attempts: usize,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_REPAIR_ATTEMPTS,
        }
    }
}

/// A fix applied to one line of the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedRepair {
    pub fault: Fault,
    /// One-based line number the parser reported.
    pub line: usize,
    pub before: String,
    pub after: String,
}

/// Why the parser stopped repairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RepairFailure {
    /// The offending line matches none of the known corruptions.
    Unclassified {
        line: usize,
        column: usize,
        message: String,
    },
    /// The parser reported no location to repair.
    Unlocated { message: String },
    /// A fix left the text unchanged.
    NoProgress { fault: Fault, line: usize },
    AttemptsExhausted { attempts: usize, message: String },
}

impl fmt::Display for RepairFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclassified {
                line,
                column,
                message,
            } => write!(f, "unrepairable fault at line {line}, column {column}: {message}"),
            Self::Unlocated { message } => write!(f, "unrepairable fault: {message}"),
            Self::NoProgress { fault, line } => write!(
                f,
                "repair '{}' at line {line} made no progress",
                fault.as_str()
            ),
            Self::AttemptsExhausted { attempts, message } => {
                write!(f, "gave up after {attempts} repairs: {message}")
            }
        }
    }
}

/// Terminal state of a parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParseOutcome {
    Done,
    Failed(RepairFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseResult {
    /// The parsed document; `None` when repairs were exhausted.
    pub document: Option<Value>,
    pub outcome: ParseOutcome,
    pub repairs: Vec<AppliedRepair>,
    pub warnings: Vec<ImrWarning>,
    /// The text that was finally parsed (or last attempted).
    pub text: String,
}

impl ParseResult {
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.outcome == ParseOutcome::Done
    }

    #[must_use]
    pub fn failure(&self) -> Option<&RepairFailure> {
        match &self.outcome {
            ParseOutcome::Done => None,
            ParseOutcome::Failed(failure) => Some(failure),
        }
    }
}

/// Location and message of a structural parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParseFault {
    line: usize,
    column: usize,
    message: String,
}

enum State {
    Parsing,
    Repairing(ParseFault),
    Done(Value),
    Failed(RepairFailure),
}

/// Remove tokens that are never part of a document.
#[must_use]
pub fn strip_corrupt_tokens(input: &str) -> String {
    let mut text = input.replace(CORRUPT_EOS_TOKEN, "");
    while text.contains(CORRUPT_EOS_TOKEN) {
        text = text.replace(CORRUPT_EOS_TOKEN, "");
    }
    text
}

/// Parse with the default repair budget.
#[must_use]
pub fn parse_tolerant(input: &str) -> ParseResult {
    parse_tolerant_with(input, RepairOptions::default())
}

#[must_use]
pub fn parse_tolerant_with(input: &str, options: RepairOptions) -> ParseResult {
    let mut text = strip_corrupt_tokens(input);
    let mut repairs = Vec::new();
    let mut warnings = Vec::new();
    let mut state = State::Parsing;

    loop {
        state = match state {
            State::Parsing => match serde_yaml::from_str::<Value>(&text) {
                Ok(value) => State::Done(value),
                Err(error) => {
                    let message = error.to_string();
                    match error.location() {
                        Some(location) => State::Repairing(ParseFault {
                            line: location.line(),
                            column: location.column(),
                            message,
                        }),
                        None => State::Failed(RepairFailure::Unlocated { message }),
                    }
                }
            },
            State::Repairing(fault) => {
                if repairs.len() >= options.max_attempts {
                    State::Failed(RepairFailure::AttemptsExhausted {
                        attempts: repairs.len(),
                        message: fault.message,
                    })
                } else {
                    match repair_text(&text, &fault, &repairs) {
                        Ok((repaired, applied)) => {
                            debug!(
                                line = applied.line,
                                fault = applied.fault.as_str(),
                                "repaired model output"
                            );
                            warnings.push(ImrWarning::new(
                                ImrWarningCode::ParseRepair,
                                format!(
                                    "Line {}: applied {} repair ({})",
                                    applied.line,
                                    applied.fault.as_str(),
                                    fault.message
                                ),
                            ));
                            text = repaired;
                            repairs.push(applied);
                            State::Parsing
                        }
                        Err(failure) => State::Failed(failure),
                    }
                }
            }
            State::Done(value) => {
                return ParseResult {
                    document: Some(value),
                    outcome: ParseOutcome::Done,
                    repairs,
                    warnings,
                    text,
                };
            }
            State::Failed(failure) => {
                warn!(%failure, "model output could not be repaired");
                warnings.push(ImrWarning::new(
                    ImrWarningCode::ParseFailed,
                    failure.to_string(),
                ));
                return ParseResult {
                    document: None,
                    outcome: ParseOutcome::Failed(failure),
                    repairs,
                    warnings,
                    text,
                };
            }
        };
    }
}

fn repair_text(
    text: &str,
    fault: &ParseFault,
    applied: &[AppliedRepair],
) -> Result<(String, AppliedRepair), RepairFailure> {
    let unclassified = || RepairFailure::Unclassified {
        line: fault.line,
        column: fault.column,
        message: fault.message.clone(),
    };

    let index = fault.line.checked_sub(1).ok_or_else(unclassified)?;
    let offending = text.split('\n').nth(index).ok_or_else(unclassified)?;
    let kind = classify_line(offending).ok_or_else(unclassified)?;

    let replacement = kind.repair_line(offending);
    let repaired = text
        .split('\n')
        .enumerate()
        .map(|(position, line)| {
            if position == index {
                replacement.as_str()
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    ensure_progress(applied, kind, fault.line, text, &repaired)?;

    Ok((
        repaired,
        AppliedRepair {
            fault: kind,
            line: fault.line,
            before: offending.to_string(),
            after: replacement,
        },
    ))
}

/// A fix must change the text, and a line is fixed for a given fault at most
/// once: the parser reporting the same fault on the same line again means the
/// earlier fix did not take.
fn ensure_progress(
    applied: &[AppliedRepair],
    fault: Fault,
    line: usize,
    before: &str,
    after: &str,
) -> Result<(), RepairFailure> {
    let repeated = applied
        .iter()
        .any(|repair| repair.line == line && repair.fault.as_str() == fault.as_str());
    if repeated || before == after {
        return Err(RepairFailure::NoProgress { fault, line });
    }
    Ok(())
}

#[must_use]
pub fn parse_evidence_json(parsed: &ParseResult) -> String {
    json!({
        "parsed": parsed.is_done(),
        "repair_count": parsed.repairs.len(),
        "repairs": parsed.repairs.iter().map(|repair| json!({
            "line": repair.line,
            "fault": repair.fault.as_str(),
        })).collect::<Vec<_>>(),
        "failure": parsed.failure().map(ToString::to_string),
        "warning_count": parsed.warnings.len(),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::{
        AppliedRepair, DEFAULT_MAX_REPAIR_ATTEMPTS, Fault, ParseOutcome, RepairFailure,
        RepairOptions, ensure_progress, parse_evidence_json, parse_tolerant, parse_tolerant_with,
    };

    #[test]
    fn well_formed_document_parses_without_repairs() {
        let result = parse_tolerant("area:\n  name: Bonn\n  type: city");
        assert!(result.is_done());
        assert!(result.repairs.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(
            result.document,
            Some(json!({"area": {"name": "Bonn", "type": "city"}}))
        );
    }

    #[test]
    fn end_of_sequence_token_is_stripped() {
        let result = parse_tolerant("area:\n  type: bbox</s>\n</s>");
        assert!(result.is_done());
        assert_eq!(result.document, Some(json!({"area": {"type": "bbox"}})));
        assert!(!result.text.contains("</s>"));
    }

    #[test]
    fn undefined_alias_value_is_quoted() {
        let input = "entities:\n  - id: 0\n    name: car\n    properties:\n      - name: colour\n        value: *red";
        let result = parse_tolerant(input);

        assert!(result.is_done(), "{:?}", result.outcome);
        assert_eq!(result.repairs.len(), 1);
        assert!(matches!(result.repairs[0].fault, Fault::UnquotedValue { .. }));
        assert_eq!(result.repairs[0].line, 6);
        let document = result.document.expect("document");
        assert_eq!(
            document["entities"][0]["properties"][0]["value"],
            json!("*red")
        );
    }

    #[test]
    fn glued_id_key_is_split_onto_its_own_line() {
        let input = "entities:\n- name: kiosk id: 2\n- id: 3\n  name: park";
        let result = parse_tolerant(input);

        assert!(result.is_done(), "{:?}", result.outcome);
        assert!(matches!(result.repairs[0].fault, Fault::CollapsedKeys { .. }));
        assert_eq!(
            result.document,
            Some(json!({"entities": [
                {"name": "kiosk", "id": 2},
                {"id": 3, "name": "park"},
            ]}))
        );
    }

    #[test]
    fn misindented_section_key_is_dedented() {
        let input = "area:\n  type: city\n  name: bonn\n entities:\n  - id: 0\n    name: kiosk";
        let result = parse_tolerant(input);

        assert!(result.is_done(), "{:?}", result.outcome);
        assert_eq!(result.repairs[0].fault, Fault::MisindentedSectionKey);
        assert_eq!(result.repairs[0].after, "entities:");
        let document = result.document.expect("document");
        assert_eq!(document["entities"][0]["name"], json!("kiosk"));
        assert_eq!(document["area"]["name"], json!("bonn"));
    }

    #[test]
    fn unknown_corruption_fails_without_document() {
        let result = parse_tolerant("area: [unclosed\nentities: {");
        assert!(result.document.is_none());
        assert!(matches!(
            result.outcome,
            ParseOutcome::Failed(RepairFailure::Unclassified { .. })
        ));
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn zero_budget_fails_on_first_fault() {
        let input = "entities:\n- name: kiosk id: 2";
        let result = parse_tolerant_with(input, RepairOptions { max_attempts: 0 });
        assert!(matches!(
            result.outcome,
            ParseOutcome::Failed(RepairFailure::AttemptsExhausted { attempts: 0, .. })
        ));
        assert!(result.repairs.is_empty());
    }

    #[test]
    fn budget_runs_out_after_real_repairs() {
        let mut input = String::from("entities:\n");
        for id in 0..12 {
            input.push_str(&format!("- name: kiosk id: {id}\n"));
        }
        let result = parse_tolerant(&input);

        assert_eq!(result.repairs.len(), DEFAULT_MAX_REPAIR_ATTEMPTS);
        assert!(result.document.is_none());
        assert!(matches!(
            result.outcome,
            ParseOutcome::Failed(RepairFailure::AttemptsExhausted { attempts, .. })
                if attempts == DEFAULT_MAX_REPAIR_ATTEMPTS
        ));
        // Each glued line is fixed once; the split pushes the next one down a line.
        let lines: Vec<_> = result.repairs.iter().map(|repair| repair.line).collect();
        assert_eq!(lines, [2, 4, 6, 8, 10, 12, 14, 16]);
        assert_eq!(result.warnings.len(), DEFAULT_MAX_REPAIR_ATTEMPTS + 1);
    }

    #[test]
    fn same_fault_on_a_repaired_line_makes_no_progress() {
        let earlier = AppliedRepair {
            fault: Fault::CollapsedKeys { split_at: 14 },
            line: 2,
            before: "- name: kiosk id: 2".to_string(),
            after: "- name: kiosk\n  id: 2".to_string(),
        };
        let fault = Fault::CollapsedKeys { split_at: 9 };

        assert_eq!(
            ensure_progress(std::slice::from_ref(&earlier), fault, 2, "a", "b"),
            Err(RepairFailure::NoProgress { fault, line: 2 })
        );
        assert_eq!(ensure_progress(std::slice::from_ref(&earlier), fault, 3, "a", "b"), Ok(()));
        assert_eq!(
            ensure_progress(
                std::slice::from_ref(&earlier),
                Fault::UnquotedValue { value_start: 8 },
                2,
                "a",
                "b"
            ),
            Ok(())
        );
    }

    #[test]
    fn unchanged_text_makes_no_progress() {
        let fault = Fault::MisindentedSectionKey;
        assert_eq!(
            ensure_progress(&[], fault, 4, "entities:", "entities:"),
            Err(RepairFailure::NoProgress { fault, line: 4 })
        );
    }

    #[test]
    fn evidence_reports_repairs() {
        let result = parse_tolerant("entities:\n- name: kiosk id: 2");
        let evidence = parse_evidence_json(&result);
        assert!(evidence.contains("\"parsed\":true"));
        assert!(evidence.contains("\"repair_count\":1"));
        assert!(evidence.contains("collapsed-keys"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_parse_is_total_and_bounded(input in ".{0,256}", budget in 0_usize..6) {
            let result = parse_tolerant_with(&input, RepairOptions { max_attempts: budget });
            prop_assert!(result.repairs.len() <= budget);
            prop_assert_eq!(result.document.is_some(), result.is_done());
            prop_assert!(!result.text.contains("</s>"));
        }

        #[test]
        fn prop_repairs_always_change_the_line(input in "([ -~]{0,24}\n){0,8}") {
            let result = parse_tolerant(&input);
            for repair in &result.repairs {
                prop_assert_ne!(&repair.before, &repair.after);
            }
        }
    }
}
