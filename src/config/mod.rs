//! Configuration management.
//!
//! Every credential and endpoint is carried explicitly in [`Config`] and
//! handed to the components that need it; nothing reads global state after
//! loading.
//!
//! ```toml
//! [search_api]
//! endpoint = "https://search.example.org/api"
//! api_key = "your-key"
//! timeout_secs = 30
//!
//! [dispatch]
//! max_concurrent = 8
//! limit = 100
//!
//! [crossref]
//! mailto = "you@example.org"
//!
//! [biorxiv]
//! dois = ["10.1101/2020.01.01.000001"]
//!
//! [pmc]
//! ids = ["PMC7000001"]
//!
//! [logging]
//! level = "debug"
//! json = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::models::record::DEFAULT_ATTRS;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search_api: SearchApiConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub crossref: CrossrefConfig,

    #[serde(default)]
    pub biorxiv: BiorxivConfig,

    #[serde(default)]
    pub pmc: PmcConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote search API endpoint and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchApiConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Sent as `x-api-key`; defaults to `PAPERWEAVE_API_KEY`
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SearchApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SearchApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: default_api_key(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8080".to_string()
}

fn default_api_key() -> Option<String> {
    std::env::var("PAPERWEAVE_API_KEY").ok()
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Fan-out dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum number of query specs in flight at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Page size requested per spec
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default)]
    pub offset: usize,

    /// Attributes requested from the API
    #[serde(default = "default_attrs")]
    pub attrs: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            limit: default_limit(),
            offset: 0,
            attrs: default_attrs(),
        }
    }
}

fn default_max_concurrent() -> usize {
    8
}

fn default_limit() -> usize {
    100
}

fn default_attrs() -> Vec<String> {
    DEFAULT_ATTRS.iter().map(|s| s.to_string()).collect()
}

/// CrossRef scraper settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossrefConfig {
    #[serde(default = "default_crossref_base")]
    pub base_url: String,

    /// Contact address for CrossRef's polite pool
    #[serde(default)]
    pub mailto: Option<String>,

    /// Title searched during a full acquisition run
    #[serde(default)]
    pub title: Option<String>,
}

impl Default for CrossrefConfig {
    fn default() -> Self {
        Self {
            base_url: default_crossref_base(),
            mailto: None,
            title: None,
        }
    }
}

fn default_crossref_base() -> String {
    "https://api.crossref.org".to_string()
}

/// bioRxiv scraper settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiorxivConfig {
    #[serde(default = "default_biorxiv_base")]
    pub base_url: String,

    /// DOIs fetched during a full acquisition run
    #[serde(default)]
    pub dois: Vec<String>,
}

impl Default for BiorxivConfig {
    fn default() -> Self {
        Self {
            base_url: default_biorxiv_base(),
            dois: Vec::new(),
        }
    }
}

fn default_biorxiv_base() -> String {
    "https://api.biorxiv.org".to_string()
}

/// PubMed Central scraper settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmcConfig {
    /// OAI-PMH endpoint
    #[serde(default = "default_pmc_base")]
    pub base_url: String,

    /// PMC identifiers fetched during a full acquisition run, with or
    /// without the `PMC` prefix
    #[serde(default)]
    pub ids: Vec<String>,
}

impl Default for PmcConfig {
    fn default() -> Self {
        Self {
            base_url: default_pmc_base(),
            ids: Vec::new(),
        }
    }
}

fn default_pmc_base() -> String {
    "https://www.ncbi.nlm.nih.gov/pmc/oai/oai.cgi".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from a file, with `PAPERWEAVE_<SECTION>__<KEY>`
/// environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix("PAPERWEAVE").separator("__"))
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.dispatch.max_concurrent, 8);
        assert_eq!(config.dispatch.limit, 100);
        assert_eq!(config.dispatch.offset, 0);
        assert!(config.dispatch.attrs.iter().any(|a| a == "citation_count"));
        assert_eq!(config.crossref.base_url, "https://api.crossref.org");
        assert_eq!(
            config.pmc.base_url,
            "https://www.ncbi.nlm.nih.gov/pmc/oai/oai.cgi"
        );
        assert!(config.pmc.ids.is_empty());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.search_api.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[search_api]
endpoint = "https://search.example.org"
api_key = "secret"

[dispatch]
max_concurrent = 2
attrs = ["id", "title"]

[crossref]
mailto = "me@example.org"

[biorxiv]
dois = ["10.1101/1"]

[pmc]
ids = ["PMC42", "7"]

[logging]
level = "debug"
json = true
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.search_api.endpoint, "https://search.example.org");
        assert_eq!(config.search_api.api_key.as_deref(), Some("secret"));
        assert_eq!(config.dispatch.max_concurrent, 2);
        assert_eq!(config.dispatch.limit, 100);
        assert_eq!(config.dispatch.attrs, vec!["id", "title"]);
        assert_eq!(config.crossref.mailto.as_deref(), Some("me@example.org"));
        assert_eq!(config.biorxiv.dois, vec!["10.1101/1"]);
        assert_eq!(config.pmc.ids, vec!["PMC42", "7"]);
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config(Path::new("/nonexistent/paperweave.toml")).is_err());
    }
}
