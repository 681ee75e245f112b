#![forbid(unsafe_code)]

mod document;
mod filter;
mod knowledge;

pub use document::{
    Area, EntityDescriptor, EntityId, Imr, ImrDocument, ImrResponse, NodeKind, OutputNode,
    PropertyDescriptor, RelationDescriptor, ResponseStatus,
};
pub use filter::{DEFAULT_OPERATOR, FilterLeaf, FilterNode, FilterValue};
pub use knowledge::{ColorBundle, TagAlternativeGroup, TagAlternatives};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix marking an entity name as a specific brand (`brand:h&m`).
pub const BRAND_PREFIX: &str = "brand:";
/// Knowledge-base value marking a leaf whose value is supplied by the caller.
pub const PLACEHOLDER_VALUE: &str = "***example***";
/// Knowledge-base value marking a leaf awaiting a caller-supplied number.
pub const NUMERIC_PLACEHOLDER: &str = "***numeric***";
/// End-of-sequence marker some model backends leak into their output.
pub const CORRUPT_EOS_TOKEN: &str = "</s>";
/// Tag keys that identify a feature by its own name rather than its category.
pub const IDENTITY_KEYS: &[&str] = &["name", "brand"];
/// Substrings of tag keys that hold colours.
pub const COLOR_KEY_MARKERS: &[&str] = &["colour", "color"];
pub const BBOX_AREA_TYPE: &str = "bbox";
pub const DISTANCE_RELATION: &str = "distance";
pub const DISTANCE_RELATION_ALIAS: &str = "dist";

/// Remove every brand qualifier from a name. Applying it twice is a no-op.
#[must_use]
pub fn strip_brand_prefix(name: &str) -> String {
    let mut stripped = name.replace(BRAND_PREFIX, "");
    // Removal can splice a new qualifier together ("brbrand:and:").
    while stripped.contains(BRAND_PREFIX) {
        stripped = stripped.replace(BRAND_PREFIX, "");
    }
    stripped
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ImrErrorCode {
    Transport,
    UnmappedProperty,
    UnrecognizedShape,
    MissingField,
    #[default]
    InvalidDocument,
}

impl ImrErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "imr/error/transport",
            Self::UnmappedProperty => "imr/error/unmapped-property",
            Self::UnrecognizedShape => "imr/error/unrecognized-shape",
            Self::MissingField => "imr/error/missing-field",
            Self::InvalidDocument => "imr/error/invalid-document",
        }
    }
}

/// Failure while compiling a document into an IMR.
///
/// Absence (unknown entity terms, unrepairable text) is reported through
/// `Option`s and warnings, never through this type.
#[derive(Debug, Clone, Serialize, Deserialize, Error, PartialEq, Eq)]
pub enum ImrError {
    #[error("knowledge base lookup for '{term}' failed: {message}")]
    Transport { term: String, message: String },
    #[error("property '{property}' of entity '{entity}' has no knowledge base mapping")]
    UnmappedProperty { entity: String, property: String },
    #[error("unrecognized knowledge base answer for '{term}': {detail}")]
    UnrecognizedShape { term: String, detail: String },
    #[error("{context}: missing required field '{field}'")]
    MissingField { context: String, field: String },
    #[error("invalid document: {message}")]
    InvalidDocument { message: String },
}

impl ImrError {
    #[must_use]
    pub fn code(&self) -> ImrErrorCode {
        match self {
            Self::Transport { .. } => ImrErrorCode::Transport,
            Self::UnmappedProperty { .. } => ImrErrorCode::UnmappedProperty,
            Self::UnrecognizedShape { .. } => ImrErrorCode::UnrecognizedShape,
            Self::MissingField { .. } => ImrErrorCode::MissingField,
            Self::InvalidDocument { .. } => ImrErrorCode::InvalidDocument,
        }
    }

    pub fn transport(term: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            term: term.into(),
            message: message.to_string(),
        }
    }

    pub fn missing_field(context: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            context: context.into(),
            field: field.into(),
        }
    }

    pub fn unrecognized_shape(term: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnrecognizedShape {
            term: term.into(),
            detail: detail.into(),
        }
    }
}

impl From<serde_json::Error> for ImrError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidDocument {
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ImrWarningCode {
    #[default]
    ParseRepair,
    ParseFailed,
    MissingName,
    UnmappedEntity,
}

impl ImrWarningCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParseRepair => "imr/warn/parse-repair",
            Self::ParseFailed => "imr/warn/parse-failed",
            Self::MissingName => "imr/warn/missing-name",
            Self::UnmappedEntity => "imr/warn/unmapped-entity",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ImrWarning {
    pub code: ImrWarningCode,
    pub message: String,
}

impl ImrWarning {
    pub fn new(code: ImrWarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
