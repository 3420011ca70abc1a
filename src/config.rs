use crate::rates::RateTable;
use crate::socketio::DEFAULT_SOCKET_URL;
use crate::watch::DEFAULT_DEBOUNCE;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default exchange rate endpoint.
pub const DEFAULT_RATES_URL: &str = "https://api.exchangeratesapi.io/latest";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// One output file and the template that produces it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateFile {
    /// File name under the output directory.
    pub name: String,
    /// Template source.
    pub content: String,
}

/// Relay configuration, usually read from `config.toml`.
///
/// # Examples
///
/// ```
/// use alertfold::Config;
///
/// let config = Config::from_toml_str(r#"
///     token = "abc"
///     currency = "eur"
///
///     [[templates]]
///     name = "total.txt"
///     content = "{{ total | fixed(2) }}"
/// "#).unwrap();
///
/// assert_eq!(config.currency.as_deref(), Some("EUR"));
/// assert_eq!(config.state_path.to_str(), Some("data/state.json"));
/// assert_eq!(config.templates.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Streamlabs socket API token.
    #[serde(default)]
    pub token: Option<String>,
    /// Currency the total is kept in; amounts are left as-is when unset.
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub include_test_alerts: bool,
    #[serde(default)]
    pub include_repeat_alerts: bool,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Quiet period before an external edit of the state file is picked up.
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
    #[serde(default = "default_socket_url")]
    pub socket_url: String,
    #[serde(default = "default_rates_url")]
    pub rates_url: String,
    /// Static rates; when absent they are fetched from `rates_url`.
    #[serde(default)]
    pub exchange: Option<RateTable>,
    #[serde(default)]
    pub templates: Vec<TemplateFile>,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("data/state.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/files")
}

fn default_watch_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

fn default_socket_url() -> String {
    DEFAULT_SOCKET_URL.to_string()
}

fn default_rates_url() -> String {
    DEFAULT_RATES_URL.to_string()
}

impl Config {
    /// Read and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text.
    ///
    /// Currency codes are upper-cased.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(text)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        self.currency = self
            .currency
            .take()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        if let Some(exchange) = &mut self.exchange {
            exchange.base = exchange.base.trim().to_uppercase();
            exchange.rates = std::mem::take(&mut exchange.rates)
                .into_iter()
                .map(|(code, rate)| (code.trim().to_uppercase(), rate))
                .collect();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for template in &self.templates {
            if template.name.trim().is_empty() {
                return Err(ConfigError::Invalid("template with an empty name".into()));
            }
            if !names.insert(template.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "template `{}` is defined twice",
                    template.name
                )));
            }
        }

        if let (Some(currency), Some(exchange)) = (&self.currency, &self.exchange)
            && &exchange.base != currency
        {
            return Err(ConfigError::Invalid(format!(
                "exchange rates are based on {} but the currency is {currency}",
                exchange.base
            )));
        }

        Ok(())
    }

    /// Debounce window for the state file watcher.
    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}
