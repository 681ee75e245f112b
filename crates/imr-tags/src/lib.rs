#![forbid(unsafe_code)]

//! Clients for the tag knowledge base that maps natural-language terms to
//! filter alternatives.

mod cache;
#[cfg(feature = "http")]
mod http;
mod vocabulary;

use std::sync::Arc;

use imr_core::{ColorBundle, ImrError, TagAlternativeGroup};
use serde::{Deserialize, Serialize};

pub use cache::{CacheStats, CachedTagKnowledgeBase};
#[cfg(feature = "http")]
pub use http::HttpTagKnowledgeBase;
pub use vocabulary::{StaticTagKnowledgeBase, Vocabulary};

/// Answer to a term lookup. Empty when the term is unknown.
pub type TermAnswer = Arc<[TagAlternativeGroup]>;

/// Read-only lookups against a tag knowledge base.
///
/// Answers are shared snapshots: implementations may hand the same `Arc` to
/// many callers, so callers clone before transforming them. An unknown term
/// is an empty answer, never an error; errors are reserved for transport and
/// decoding failures.
pub trait TagKnowledgeBase: Send + Sync {
    fn lookup_term(&self, term: &str) -> Result<TermAnswer, ImrError>;

    fn lookup_color(&self, color: &str) -> Result<Arc<ColorBundle>, ImrError>;
}

impl<K: TagKnowledgeBase + ?Sized> TagKnowledgeBase for Arc<K> {
    fn lookup_term(&self, term: &str) -> Result<TermAnswer, ImrError> {
        (**self).lookup_term(term)
    }

    fn lookup_color(&self, color: &str) -> Result<Arc<ColorBundle>, ImrError> {
        (**self).lookup_color(color)
    }
}

impl<K: TagKnowledgeBase + ?Sized> TagKnowledgeBase for &K {
    fn lookup_term(&self, term: &str) -> Result<TermAnswer, ImrError> {
        (**self).lookup_term(term)
    }

    fn lookup_color(&self, color: &str) -> Result<Arc<ColorBundle>, ImrError> {
        (**self).lookup_color(color)
    }
}

/// Connection settings for the remote knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Term search endpoint, queried with `word`, `limit` and `detail`.
    pub search_endpoint: Option<String>,
    /// Colour bundle endpoint, queried with `color`, `limit` and `detail`.
    pub color_endpoint: Option<String>,
    /// Request timeout in seconds; `0` waits forever.
    pub timeout_secs: u64,
    pub result_limit: u32,
    pub accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            search_endpoint: None,
            color_endpoint: None,
            timeout_secs: 30,
            result_limit: 1,
            accept_invalid_certs: false,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_endpoints(search: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            search_endpoint: Some(search.into()),
            color_endpoint: Some(color.into()),
            ..Self::default()
        }
    }
}
