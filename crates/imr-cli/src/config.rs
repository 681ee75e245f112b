//! `imr.toml` loading and environment overrides.

use std::path::Path;

use anyhow::{Context, Result};
use imr_parser::{DEFAULT_MAX_REPAIR_ATTEMPTS, RepairOptions};
use imr_tags::ClientConfig;
use serde::Deserialize;
use tracing::debug;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "imr.toml";

/// (primary, fallback) environment variables for each endpoint.
const SEARCH_ENDPOINT_VARS: [&str; 2] = ["IMR_SEARCH_ENDPOINT", "SEARCH_ENDPOINT"];
const COLOR_ENDPOINT_VARS: [&str; 2] = ["IMR_COLOR_ENDPOINT", "COLOR_ENDPOINT"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub knowledge_base: ClientConfig,
    pub parser: ParserConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    pub max_attempts: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_REPAIR_ATTEMPTS,
        }
    }
}

impl ParserConfig {
    pub fn repair_options(self) -> RepairOptions {
        RepairOptions {
            max_attempts: self.max_attempts,
        }
    }
}

impl Config {
    /// Load `path`, or `imr.toml` in the working directory if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Fill endpoints from the environment. Variables take precedence over
    /// the config file; command-line flags are applied afterwards.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first_set = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(*name).filter(|value| !value.trim().is_empty()))
        };
        if let Some(endpoint) = first_set(&SEARCH_ENDPOINT_VARS[..]) {
            self.knowledge_base.search_endpoint = Some(endpoint);
        }
        if let Some(endpoint) = first_set(&COLOR_ENDPOINT_VARS[..]) {
            self.knowledge_base.color_endpoint = Some(endpoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::Config;

    #[test]
    fn parses_both_tables() {
        let config: Config = toml::from_str(
            r#"
            [knowledge_base]
            search_endpoint = "https://tags.example.org/search"
            timeout_secs = 5

            [parser]
            max_attempts = 3
            "#,
        )
        .expect("config");
        assert_eq!(
            config.knowledge_base.search_endpoint.as_deref(),
            Some("https://tags.example.org/search")
        );
        assert_eq!(config.knowledge_base.timeout_secs, 5);
        assert_eq!(config.knowledge_base.result_limit, 1);
        assert_eq!(config.parser.repair_options().max_attempts, 3);
    }

    #[test]
    fn unknown_tables_are_rejected() {
        assert!(toml::from_str::<Config>("[server]\nport = 80").is_err());
    }

    #[test]
    fn prefixed_variables_win_over_legacy_names() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("IMR_SEARCH_ENDPOINT", "http://a/search"),
            ("SEARCH_ENDPOINT", "http://b/search"),
            ("COLOR_ENDPOINT", "http://b/color"),
            ("IMR_COLOR_ENDPOINT", "  "),
        ]);
        let mut config = Config::default();
        config.apply_env(|name| env.get(name).map(ToString::to_string));

        assert_eq!(config.knowledge_base.search_endpoint.as_deref(), Some("http://a/search"));
        assert_eq!(config.knowledge_base.color_endpoint.as_deref(), Some("http://b/color"));
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let missing = std::path::Path::new("/nonexistent/imr.toml");
        assert!(Config::load(Some(missing)).is_err());

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[parser]\nmax_attempts = 2").expect("write config");
        let config = Config::load(Some(file.path())).expect("config");
        assert_eq!(config.parser.max_attempts, 2);
    }
}
