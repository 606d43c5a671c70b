//! Connect, query, disconnect.
//!
//! A [`Session`] owns the open connection for a single test. [`Session::disconnect`]
//! never fails; a session dropped while still connected releases the connection
//! and logs a warning.

use crate::{
    config::ConnectorDescriptor,
    drivers::{BoxError, Connection, DriverCatalog, redact_url},
};
use std::error::Error as _;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("unsupported data source type: {scheme}")]
    Unsupported { scheme: String },

    #[error("{message}")]
    Connection {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("{message}")]
    Query {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl ProbeError {
    /// Message of the innermost error in the source chain
    #[must_use]
    pub fn root_cause(&self) -> Option<String> {
        let mut cause = self.source()?;
        while let Some(next) = cause.source() {
            cause = next;
        }
        Some(cause.to_string())
    }
}

pub struct Session<'a> {
    descriptor: &'a ConnectorDescriptor,
    connection: Option<Box<dyn Connection>>,
}

impl<'a> Session<'a> {
    /// Resolve the driver named by the descriptor and open a connection
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Connection`] if the driver is unavailable or the
    /// connection can't be established
    pub async fn connect(
        descriptor: &'a ConnectorDescriptor,
        catalog: &dyn DriverCatalog,
        url: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, ProbeError> {
        let failed = |source: BoxError| ProbeError::Connection {
            message: format!(
                "failed to connect to on-premises {} database",
                descriptor.display_name()
            ),
            source,
        };

        let driver = catalog.resolve(descriptor.driver_id()).ok_or_else(|| {
            failed(format!("driver {} is not available", descriptor.driver_id()).into())
        })?;

        debug!(
            data_source = descriptor.display_name(),
            url = %redact_url(url),
            "connecting"
        );

        let connection = driver.open(url, user, password).await.map_err(failed)?;

        Ok(Self {
            descriptor,
            connection: Some(connection),
        })
    }

    #[must_use]
    pub const fn descriptor(&self) -> &ConnectorDescriptor {
        self.descriptor
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Execute the probe query, `Ok(None)` means it ran but returned nothing
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Query`] if the session is disconnected or the query fails
    pub async fn run_query(&mut self) -> Result<Option<String>, ProbeError> {
        let descriptor = self.descriptor;
        let connection = self.connection.as_mut().ok_or_else(|| ProbeError::Query {
            message: "cannot execute test query because no database connection exists"
                .to_string(),
            source: None,
        })?;

        connection
            .fetch_first_value(descriptor.probe_query())
            .await
            .map_err(|source| ProbeError::Query {
                message: format!(
                    "failed to execute test query on on-premises {} database",
                    descriptor.display_name()
                ),
                source: Some(source),
            })
    }

    /// Release the connection, close errors are only logged
    pub async fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take()
            && let Err(err) = connection.close().await
        {
            warn!(
                data_source = self.descriptor.display_name(),
                "failed to close database connection: {err}"
            );
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.connection.take().is_some() {
            warn!(
                data_source = self.descriptor.display_name(),
                "session dropped while connected, connection released"
            );
        }
    }
}
