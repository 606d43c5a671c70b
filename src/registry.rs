use crate::{
    config::{self, ConfigError, ConfigSource, ConnectorDescriptor},
    metrics::CONFIG_LOAD_ERRORS,
};
use std::collections::BTreeMap;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

/// Configured data source types keyed by lower-case URL scheme
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    connectors: BTreeMap<String, ConnectorDescriptor>,
}

impl Registry {
    /// A repeated scheme replaces the earlier descriptor
    pub fn from_connectors<I>(connectors: I) -> Self
    where
        I: IntoIterator<Item = ConnectorDescriptor>,
    {
        let mut map = BTreeMap::new();
        for descriptor in connectors {
            let key = descriptor.url_scheme().to_lowercase();
            if let Some(previous) = map.insert(key, descriptor) {
                warn!(
                    scheme = previous.url_scheme(),
                    "duplicate connector definition, keeping the last one"
                );
            }
        }
        Self { connectors: map }
    }

    /// Case-insensitive lookup
    #[must_use]
    pub fn lookup(&self, scheme: &str) -> Option<&ConnectorDescriptor> {
        self.connectors.get(&scheme.to_lowercase())
    }

    /// Display names ordered by scheme
    #[must_use]
    pub fn display_names(&self) -> Vec<String> {
        self.connectors
            .values()
            .map(|descriptor| descriptor.display_name().to_string())
            .collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ConnectorDescriptor> {
        self.connectors.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

/// Process-wide registry, loaded on first use
///
/// Concurrent first callers share a single load. A failed load is not remembered:
/// the next call tries again, so fixing the configuration file does not require a
/// restart. Once loaded the registry never changes.
#[derive(Debug)]
pub struct SharedRegistry {
    source: ConfigSource,
    cell: OnceCell<Registry>,
}

impl SharedRegistry {
    #[must_use]
    pub fn new(source: ConfigSource) -> Self {
        Self {
            source,
            cell: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Get the registry, loading it if needed
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration can't be loaded
    pub async fn get(&self) -> Result<&Registry, ConfigError> {
        self.cell
            .get_or_try_init(|| async {
                match config::load(&self.source).await {
                    Ok(registry) => {
                        info!(
                            source = %self.source,
                            connectors = registry.len(),
                            "data source registry loaded"
                        );
                        Ok(registry)
                    }
                    Err(err) => {
                        CONFIG_LOAD_ERRORS.inc();
                        error!(source = %self.source, "{err}");
                        Err(err)
                    }
                }
            })
            .await
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration can't be loaded
    pub async fn lookup(&self, scheme: &str) -> Result<Option<&ConnectorDescriptor>, ConfigError> {
        Ok(self.get().await?.lookup(scheme))
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration can't be loaded
    pub async fn display_names(&self) -> Result<Vec<String>, ConfigError> {
        Ok(self.get().await?.display_names())
    }
}
