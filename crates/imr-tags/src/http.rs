use std::sync::Arc;
use std::time::Duration;

use imr_core::{ColorBundle, ImrError, TagAlternativeGroup};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{ClientConfig, TagKnowledgeBase, TermAnswer};

/// Knowledge base served over HTTP.
///
/// Requests block the calling thread; the timeout in [`ClientConfig`] is the
/// only retry/cancellation policy applied.
pub struct HttpTagKnowledgeBase {
    client: Client,
    config: ClientConfig,
}

impl HttpTagKnowledgeBase {
    pub fn new(config: ClientConfig) -> Result<Self, ImrError> {
        let mut builder = Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        if config.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| ImrError::transport("<client>", format!("failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn get<T: DeserializeOwned>(
        &self,
        endpoint: Option<&str>,
        endpoint_name: &str,
        param: &str,
        term: &str,
    ) -> Result<T, ImrError> {
        let Some(url) = endpoint else {
            return Err(ImrError::transport(
                term,
                format!("no {endpoint_name} endpoint configured"),
            ));
        };
        let limit = self.config.result_limit.to_string();
        debug!(url, term, "querying knowledge base");

        let response = self
            .client
            .get(url)
            .query(&[(param, term), ("limit", limit.as_str()), ("detail", "false")])
            .send()
            .map_err(|e| ImrError::transport(term, format!("failed to reach {url}: {e}")))?;
        decode(term, response)
    }
}

fn decode<T: DeserializeOwned>(term: &str, response: Response) -> Result<T, ImrError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ImrError::transport(term, format!("http error {status}: {body}")));
    }
    response
        .json::<T>()
        .map_err(|e| ImrError::transport(term, format!("undecodable answer: {e}")))
}

impl TagKnowledgeBase for HttpTagKnowledgeBase {
    fn lookup_term(&self, term: &str) -> Result<TermAnswer, ImrError> {
        let groups: Vec<TagAlternativeGroup> =
            self.get(self.config.search_endpoint.as_deref(), "search", "word", term)?;
        Ok(Arc::from(groups))
    }

    fn lookup_color(&self, color: &str) -> Result<Arc<ColorBundle>, ImrError> {
        let bundle: ColorBundle =
            self.get(self.config.color_endpoint.as_deref(), "color", "color", color)?;
        Ok(Arc::new(bundle))
    }
}

#[cfg(test)]
mod tests {
    use imr_core::ImrErrorCode;

    use super::HttpTagKnowledgeBase;
    use crate::{ClientConfig, TagKnowledgeBase};

    #[test]
    fn missing_endpoint_is_a_transport_error() {
        let kb = HttpTagKnowledgeBase::new(ClientConfig::default()).expect("client");
        let error = kb.lookup_term("bakery").expect_err("no endpoint");
        assert_eq!(error.code(), ImrErrorCode::Transport);
        assert!(error.to_string().contains("no search endpoint configured"));

        let error = kb.lookup_color("red").expect_err("no endpoint");
        assert!(error.to_string().contains("no color endpoint configured"));
    }

    #[test]
    fn unreachable_endpoint_is_a_transport_error() {
        let config = ClientConfig {
            timeout_secs: 2,
            ..ClientConfig::with_endpoints("http://127.0.0.1:9/search", "http://127.0.0.1:9/color")
        };
        let kb = HttpTagKnowledgeBase::new(config).expect("client");
        let error = kb.lookup_term("bakery").expect_err("closed port");
        assert_eq!(error.code(), ImrErrorCode::Transport);
    }
}
