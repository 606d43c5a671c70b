use crate::{
    bindings::{Credentials, ServiceBinding},
    config::{ConfigError, ConnectorDescriptor},
    drivers::{DriverCatalog, JDBC_PREFIX},
    metrics::{LAST_RUN, PROBE_DURATION, PROBES_TOTAL},
    probe::{ProbeError, Session},
    registry::{Registry, SharedRegistry},
};
use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, info, warn};

pub const SKIPPED_OUTPUT: &str = "skipped: invalid/missing URL";
pub const EMPTY_OUTPUT: &str = "probe returned no result";

/// Metric label for bindings whose scheme is not configured
pub const UNLISTED_LABEL: &str = "unlisted";

/// Result of testing one service binding
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub svc_name: String,
    #[serde(
        rename = "on_prem_resource_type",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub resource_type: Option<String>,
    pub success: bool,
    pub output: String,
}

impl TestOutcome {
    fn failed(svc_name: &str, resource_type: Option<&str>, output: String) -> Self {
        Self {
            svc_name: svc_name.to_string(),
            resource_type: resource_type.map(str::to_string),
            success: false,
            output,
        }
    }
}

/// Scheme of a `jdbc:<scheme>:...` URL, lower-cased
///
/// Returns `None` if the prefix is missing or the scheme is not a valid URI scheme.
#[must_use]
pub fn derive_scheme(url: &str) -> Option<String> {
    let prefix = url.get(..JDBC_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(JDBC_PREFIX) {
        return None;
    }

    let (scheme, _) = url.get(JDBC_PREFIX.len()..)?.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    valid.then(|| scheme.to_ascii_lowercase())
}

/// Test every binding in order
///
/// The registry is resolved before the first binding is processed.
///
/// # Errors
///
/// Returns [`ConfigError`] if the connector configuration can't be loaded, no binding
/// is tested in that case
pub async fn run_all(
    registry: &SharedRegistry,
    catalog: &dyn DriverCatalog,
    bindings: &[ServiceBinding],
) -> Result<Vec<TestOutcome>, ConfigError> {
    let registry = registry.get().await?;
    let mut outcomes = Vec::with_capacity(bindings.len());

    for binding in bindings {
        let outcome = AssertUnwindSafe(test_binding(registry, catalog, binding))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic_info| {
                error!(service = %binding.name, "panic while testing service: {panic_info:?}");
                let scheme = binding.jdbc_url().and_then(derive_scheme);
                let resource_type = scheme.as_deref().map(str::to_uppercase);
                PROBES_TOTAL
                    .with_label_values(&[
                        metric_label(registry, scheme.as_deref()).as_str(),
                        "panicked",
                    ])
                    .inc();
                TestOutcome::failed(
                    &binding.name,
                    resource_type.as_deref(),
                    "test failed: unexpected internal error".to_string(),
                )
            });

        if outcome.success {
            info!(
                service = %outcome.svc_name,
                resource_type = outcome.resource_type.as_deref().unwrap_or_default(),
                "{}",
                outcome.output
            );
        } else {
            warn!(
                service = %outcome.svc_name,
                resource_type = outcome.resource_type.as_deref().unwrap_or_default(),
                "{}",
                outcome.output
            );
        }

        outcomes.push(outcome);
    }

    LAST_RUN.set(Utc::now().timestamp());

    Ok(outcomes)
}

async fn test_binding(
    registry: &Registry,
    catalog: &dyn DriverCatalog,
    binding: &ServiceBinding,
) -> TestOutcome {
    let credentials = binding.credentials.clone().unwrap_or_default();
    let Some((url, scheme)) = credentials
        .jdbcurl
        .as_deref()
        .and_then(|url| derive_scheme(url).map(|scheme| (url, scheme)))
    else {
        PROBES_TOTAL
            .with_label_values(&[metric_label(registry, None).as_str(), "skipped"])
            .inc();
        return TestOutcome::failed(&binding.name, None, SKIPPED_OUTPUT.to_string());
    };

    let resource_type = scheme.to_uppercase();

    let Some(descriptor) = registry.lookup(&scheme) else {
        PROBES_TOTAL
            .with_label_values(&[metric_label(registry, None).as_str(), "unsupported"])
            .inc();
        return TestOutcome::failed(
            &binding.name,
            Some(&resource_type),
            ProbeError::Unsupported { scheme }.to_string(),
        );
    };

    let timer = PROBE_DURATION
        .with_label_values(&[resource_type.as_str()])
        .start_timer();
    let result = probe(descriptor, catalog, url, &credentials).await;
    timer.observe_duration();

    let (success, label, output) = match result {
        Ok(Some(value)) => (true, "success", format!("probe succeeded: {value}")),
        Ok(None) => (false, "empty", EMPTY_OUTPUT.to_string()),
        Err(err) => (false, "failed", failure_output(&err)),
    };

    PROBES_TOTAL
        .with_label_values(&[resource_type.as_str(), label])
        .inc();

    TestOutcome {
        svc_name: binding.name.clone(),
        resource_type: Some(resource_type),
        success,
        output,
    }
}

/// Connect, run the probe query, always disconnect when connected
async fn probe(
    descriptor: &ConnectorDescriptor,
    catalog: &dyn DriverCatalog,
    url: &str,
    credentials: &Credentials,
) -> Result<Option<String>, ProbeError> {
    let mut session = Session::connect(
        descriptor,
        catalog,
        url,
        credentials.user.as_deref(),
        credentials.password.as_deref(),
    )
    .await?;

    // close the connection even when the driver panics
    let result = AssertUnwindSafe(session.run_query()).catch_unwind().await;
    session.disconnect().await;

    result.unwrap_or_else(|payload| panic::resume_unwind(payload))
}

/// `resource_type` metric label, only configured schemes get their own series
fn metric_label(registry: &Registry, scheme: Option<&str>) -> String {
    scheme
        .filter(|scheme| registry.lookup(scheme).is_some())
        .map_or_else(|| UNLISTED_LABEL.to_string(), str::to_uppercase)
}

fn failure_output(err: &ProbeError) -> String {
    match err.root_cause() {
        Some(cause) => format!("test failed: {err} (cause: {cause})"),
        None => format!("test failed: {err}"),
    }
}
