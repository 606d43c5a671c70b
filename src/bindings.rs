//! Service bindings: the credentials of the data sources to test.
//!
//! Accepted shapes are a bare array of bindings or a Cloud Foundry `VCAP_SERVICES`
//! document, in which case the `user-provided` array is used:
//!
//! ```json
//! {"user-provided": [
//!     {"name": "orders-db", "credentials": {"jdbcurl": "jdbc:db2://host:50000/orders", "user": "u", "password": "p"}}
//! ]}
//! ```

use crate::config::normalize_keys;
use serde_json::Value;
use std::{env, fmt, io, path::PathBuf};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_BINDINGS_VAR: &str = "VCAP_SERVICES";

const USER_PROVIDED: &str = "user-provided";

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub jdbcurl: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("jdbcurl", &self.jdbcurl.as_deref().map(crate::drivers::redact_url))
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceBinding {
    pub name: String,
    pub credentials: Option<Credentials>,
}

impl ServiceBinding {
    /// Extract a binding from one array entry
    ///
    /// Fields of the wrong type are treated as absent: a non-string `name` becomes
    /// empty, non-object `credentials` or a non-string `jdbcurl` become `None`, so the
    /// binding is reported as skipped instead of failing the whole list.
    #[must_use]
    pub fn from_value(entry: &Value) -> Self {
        let text = |value: Option<&Value>| value.and_then(Value::as_str).map(str::to_string);

        let credentials = entry
            .get("credentials")
            .and_then(Value::as_object)
            .map(|credentials| Credentials {
                jdbcurl: text(credentials.get("jdbcurl")),
                user: text(credentials.get("user")),
                password: text(credentials.get("password")),
            });

        Self {
            name: text(entry.get("name")).unwrap_or_default(),
            credentials,
        }
    }

    #[must_use]
    pub fn jdbc_url(&self) -> Option<&str> {
        self.credentials.as_ref()?.jdbcurl.as_deref()
    }
}

#[derive(Debug, Error)]
pub enum BindingsError {
    #[error("service bindings could not be read from {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: io::Error,
    },

    #[error("service bindings from {origin} could not be processed: {reason}")]
    Malformed { origin: String, reason: String },
}

/// Where the bindings are read from on every test run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingSource {
    Env(String),
    File(PathBuf),
}

impl Default for BindingSource {
    fn default() -> Self {
        Self::Env(DEFAULT_BINDINGS_VAR.to_string())
    }
}

impl fmt::Display for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env(var) => write!(f, "${var}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl BindingSource {
    /// An unset environment variable yields no bindings
    ///
    /// # Errors
    ///
    /// Returns [`BindingsError`] if the source can't be read or parsed
    pub async fn read(&self) -> Result<Vec<ServiceBinding>, BindingsError> {
        let origin = self.to_string();
        match self {
            Self::Env(var) => match env::var(var) {
                Ok(text) => parse_bindings(&text, &origin),
                Err(env::VarError::NotPresent) => Ok(Vec::new()),
                Err(err @ env::VarError::NotUnicode(_)) => Err(BindingsError::Malformed {
                    origin,
                    reason: err.to_string(),
                }),
            },
            Self::File(path) => match tokio::fs::read_to_string(path).await {
                Ok(text) => parse_bindings(&text, &origin),
                Err(source) => Err(BindingsError::Io { origin, source }),
            },
        }
    }
}

/// Parse bindings, keys are matched case-insensitively
///
/// Only the document shape can fail; a malformed entry still yields a binding.
///
/// # Errors
///
/// Returns [`BindingsError::Malformed`] if `text` is not one of the accepted shapes
pub fn parse_bindings(text: &str, origin: &str) -> Result<Vec<ServiceBinding>, BindingsError> {
    let malformed = |reason: &str| BindingsError::Malformed {
        origin: origin.to_string(),
        reason: reason.to_string(),
    };

    let document: Value =
        serde_json::from_str(text).map_err(|e| malformed(&e.to_string()))?;

    let entries = match normalize_keys(document) {
        Value::Array(entries) => entries,
        Value::Object(mut services) => match services.remove(USER_PROVIDED) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(malformed("\"user-provided\" is not an array")),
        },
        _ => {
            return Err(malformed(
                "expected an array of bindings or a VCAP_SERVICES object",
            ));
        }
    };

    Ok(entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            if !entry.is_object() {
                warn!(origin, entry = index + 1, "service binding is not an object");
            }
            ServiceBinding::from_value(entry)
        })
        .collect())
}
