//! Database client capability used by the connectivity probe.
//!
//! A [`DriverCatalog`] resolves the `driver` identifier of a connector definition to a
//! [`Driver`], which opens a [`Connection`] able to run a single query and close.

pub mod mysql;
pub mod postgres;

use async_trait::async_trait;
use std::{future::Future, sync::Arc, time::Duration};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub const JDBC_PREFIX: &str = "jdbc:";

#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a connection, `user` and `password` override credentials embedded in `url`
    async fn open(
        &self,
        url: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<Box<dyn Connection>, BoxError>;
}

#[async_trait]
pub trait Connection: Send {
    /// Run `query` and return the first column of the first row as text,
    /// `None` when there is no row or the value is NULL
    async fn fetch_first_value(&mut self, query: &str) -> Result<Option<String>, BoxError>;

    async fn close(self: Box<Self>) -> Result<(), BoxError>;
}

pub trait DriverCatalog: Send + Sync {
    fn resolve(&self, driver_id: &str) -> Option<Arc<dyn Driver>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub query: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            query: Duration::from_secs(10),
        }
    }
}

/// Drivers backed by sqlx
///
/// | driver id              | client     |
/// |------------------------|------------|
/// | `mysql`, `mariadb`     | MySQL      |
/// | `postgres`, `postgresql` | PostgreSQL |
pub struct SqlxDrivers {
    mysql: Arc<dyn Driver>,
    postgres: Arc<dyn Driver>,
}

impl SqlxDrivers {
    #[must_use]
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            mysql: Arc::new(mysql::MySqlDriver::new(timeouts)),
            postgres: Arc::new(postgres::PgDriver::new(timeouts)),
        }
    }
}

impl Default for SqlxDrivers {
    fn default() -> Self {
        Self::new(Timeouts::default())
    }
}

impl DriverCatalog for SqlxDrivers {
    fn resolve(&self, driver_id: &str) -> Option<Arc<dyn Driver>> {
        match driver_id.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Arc::clone(&self.mysql)),
            "postgres" | "postgresql" => Some(Arc::clone(&self.postgres)),
            _ => None,
        }
    }
}

/// Drop a leading `jdbc:` (any case)
#[must_use]
pub fn native_url(url: &str) -> &str {
    match (url.get(..JDBC_PREFIX.len()), url.get(JDBC_PREFIX.len()..)) {
        (Some(prefix), Some(rest)) if prefix.eq_ignore_ascii_case(JDBC_PREFIX) => rest,
        _ => url,
    }
}

/// Replace the scheme of `url` so sqlx accepts JDBC-style variants (`mariadb:`, `postgresql:`)
pub(crate) fn with_scheme(url: &str, scheme: &str) -> String {
    url.split_once("://").map_or_else(
        || url.to_string(),
        |(_, rest)| format!("{scheme}://{rest}"),
    )
}

/// Mask the password of a URL for logging
#[must_use]
pub fn redact_url(url: &str) -> String {
    match url::Url::parse(native_url(url)) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("****"));
            }
            parsed.to_string()
        }
        Err(_) => "<redacted>".to_string(),
    }
}

pub(crate) async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T, BoxError>
where
    F: Future<Output = Result<T, sqlx::Error>> + Send,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(format!("{what} timed out after {}ms", limit.as_millis()).into()),
    }
}
