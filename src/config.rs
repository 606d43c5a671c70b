//! Connector configuration: the declarative list of data source types that can be tested.
//!
//! The document holds one top-level `connectors` array; every entry binds a JDBC URL
//! scheme to a driver identifier, a display name and a probe query:
//!
//! ```json
//! { "connectors": [
//!     {"url_scheme": "mysql", "display_name": "MySQL", "driver": "mysql", "query": "SELECT current_date"}
//! ]}
//! ```
//!
//! Keys are matched case-insensitively.

use crate::registry::Registry;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::{fmt, io, path::PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "rdbms_config.json";

const INLINE_ORIGIN: &str = "<inline>";

/// Binds a URL scheme to the driver and query used to test it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorDescriptor {
    url_scheme: String,
    display_name: String,
    driver_id: String,
    probe_query: String,
}

impl ConnectorDescriptor {
    /// Build a descriptor, `display_name` falls back to `url_scheme` when absent or empty
    ///
    /// # Errors
    ///
    /// Returns the names of the mandatory fields that are empty
    pub fn new(
        url_scheme: impl Into<String>,
        display_name: Option<String>,
        driver_id: impl Into<String>,
        probe_query: impl Into<String>,
    ) -> Result<Self, Vec<&'static str>> {
        let url_scheme = url_scheme.into();
        let driver_id = driver_id.into();
        let probe_query = probe_query.into();

        let missing: Vec<&'static str> = [
            ("url_scheme", url_scheme.is_empty()),
            ("driver", driver_id.is_empty()),
            ("query", probe_query.is_empty()),
        ]
        .into_iter()
        .filter_map(|(field, empty)| empty.then_some(field))
        .collect();

        if !missing.is_empty() {
            return Err(missing);
        }

        let display_name = display_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| url_scheme.clone());

        Ok(Self {
            url_scheme,
            display_name,
            driver_id,
            probe_query,
        })
    }

    #[must_use]
    pub fn url_scheme(&self) -> &str {
        &self.url_scheme
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn driver_id(&self) -> &str {
        &self.driver_id
    }

    #[must_use]
    pub fn probe_query(&self) -> &str {
        &self.probe_query
    }
}

/// Where the connector configuration comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Inline(String),
}

impl ConfigSource {
    #[must_use]
    pub fn origin(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Inline(_) => INLINE_ORIGIN.to_string(),
        }
    }
}

impl Default for ConfigSource {
    fn default() -> Self {
        Self::File(PathBuf::from(DEFAULT_CONFIG_FILE))
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.origin())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the configuration file {origin} could not be located")]
    NotFound { origin: String },

    #[error("the configuration file {origin} could not be read: {source}")]
    Io {
        origin: String,
        #[source]
        source: io::Error,
    },

    #[error("the configuration file {origin} could not be processed: {reason}")]
    Malformed { origin: String, reason: String },

    #[error("the configuration file {origin} contains {count} invalid connector definition(s)")]
    InvalidConnectors { origin: String, count: usize },
}

#[derive(Deserialize)]
struct RawConfig {
    connectors: Vec<RawConnector>,
}

#[derive(Deserialize)]
struct RawConnector {
    url_scheme: Option<String>,
    display_name: Option<String>,
    driver: Option<String>,
    query: Option<String>,
}

/// Read and validate the configuration
///
/// # Errors
///
/// Returns [`ConfigError`] if the source can't be located or read, is not well-formed
/// or holds invalid connector definitions
pub async fn load(source: &ConfigSource) -> Result<Registry, ConfigError> {
    match source {
        ConfigSource::Inline(text) => parse(text, INLINE_ORIGIN),
        ConfigSource::File(path) => {
            let origin = path.display().to_string();
            let text = match tokio::fs::read_to_string(path).await {
                Ok(text) => text,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    return Err(ConfigError::NotFound { origin });
                }
                Err(source) => return Err(ConfigError::Io { origin, source }),
            };
            parse(&text, &origin)
        }
    }
}

/// Build a [`Registry`] from the configuration text, `origin` only labels errors
///
/// Every invalid entry is reported in the log, the error carries the total count.
///
/// # Errors
///
/// Returns [`ConfigError::Malformed`] or [`ConfigError::InvalidConnectors`]
pub fn parse(text: &str, origin: &str) -> Result<Registry, ConfigError> {
    let malformed = |reason: String| ConfigError::Malformed {
        origin: origin.to_string(),
        reason,
    };

    let document: Value = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
    let config: RawConfig =
        serde_json::from_value(normalize_keys(document)).map_err(|e| malformed(e.to_string()))?;

    let mut connectors = Vec::with_capacity(config.connectors.len());
    let mut invalid = 0;

    for (index, entry) in config.connectors.into_iter().enumerate() {
        match ConnectorDescriptor::new(
            entry.url_scheme.unwrap_or_default(),
            entry.display_name,
            entry.driver.unwrap_or_default(),
            entry.query.unwrap_or_default(),
        ) {
            Ok(descriptor) => connectors.push(descriptor),
            Err(missing) => {
                invalid += 1;
                warn!(
                    origin,
                    entry = index + 1,
                    missing = %missing.join(", "),
                    "connector definition is missing mandatory properties"
                );
            }
        }
    }

    if invalid > 0 {
        return Err(ConfigError::InvalidConnectors {
            origin: origin.to_string(),
            count: invalid,
        });
    }

    let registry = Registry::from_connectors(connectors);
    debug!(origin, schemes = ?registry.display_names(), "connector configuration parsed");

    Ok(registry)
}

/// Lower-case every object key, recursively
pub(crate) fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key.to_lowercase(), normalize_keys(value)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}
