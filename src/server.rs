use crate::{
    bindings::BindingSource,
    drivers::DriverCatalog,
    metrics::encode_metrics,
    orchestrator::{self, TestOutcome},
    registry::SharedRegistry,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::{net::IpAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

pub struct AppState {
    pub registry: SharedRegistry,
    pub drivers: Box<dyn DriverCatalog>,
    pub bindings: BindingSource,
}

/// Troubleshooting page returned along with configuration errors
pub const TROUBLESHOOTING_LINK: &str = concat!(env!("CARGO_PKG_HOMEPAGE"), "#troubleshooting");

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub link: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub version: String,
    pub supported_on_prem_resource_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ErrorInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestReport {
    pub services: Vec<TestOutcome>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/meta", get(meta_handler))
        .route("/test", get(test_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Start the HTTP service
///
/// # Errors
///
/// Returns an error if the service fails to bind to the port
pub async fn start(state: AppState, listen: Option<IpAddr>, port: u16) -> anyhow::Result<()> {
    let app = router(Arc::new(state));

    // Bind to socket with smart fallback
    let (listener, bind_addr) = match listen {
        Some(addr) => {
            let socket_addr = format!("{addr}:{port}");
            let listener = TcpListener::bind(&socket_addr).await?;
            (listener, socket_addr)
        }
        None => {
            // Auto mode: try IPv6 first, fallback to IPv4
            if let Ok(l) = TcpListener::bind(format!("::0:{port}")).await {
                (l, format!("[::]:{port}"))
            } else {
                let socket_addr = format!("0.0.0.0:{port}");
                (TcpListener::bind(&socket_addr).await?, socket_addr)
            }
        }
    };

    info!("Listening on {bind_addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {e}");
            }
            info!("shutting down");
        })
        .await?;

    Ok(())
}

/// Report the service version and the configured data source types
pub async fn metadata(state: &AppState) -> Meta {
    let (supported_on_prem_resource_types, error) = match state.registry.display_names().await {
        Ok(names) => (names, None),
        Err(e) => (
            Vec::new(),
            Some(ErrorInfo {
                message: e.to_string(),
                link: Some(TROUBLESHOOTING_LINK.to_string()),
            }),
        ),
    };

    Meta {
        version: env!("CARGO_PKG_VERSION").to_string(),
        supported_on_prem_resource_types,
        error,
    }
}

/// Test every bound service, a configuration or bindings failure is reported as
/// a top-level error with no services
pub async fn run_tests(state: &AppState) -> TestReport {
    let bindings = match state.bindings.read().await {
        Ok(bindings) => bindings,
        Err(e) => {
            error!("{e}");
            return TestReport {
                services: Vec::new(),
                error: Some(e.to_string()),
            };
        }
    };

    match orchestrator::run_all(&state.registry, state.drivers.as_ref(), &bindings).await {
        Ok(services) => TestReport {
            services,
            error: None,
        },
        Err(e) => TestReport {
            services: Vec::new(),
            error: Some(e.to_string()),
        },
    }
}

async fn meta_handler(State(state): State<Arc<AppState>>) -> Json<Meta> {
    Json(metadata(&state).await)
}

async fn test_handler(State(state): State<Arc<AppState>>) -> Json<TestReport> {
    Json(run_tests(&state).await)
}

async fn metrics_handler() -> impl IntoResponse {
    match encode_metrics() {
        Ok(buffer) => (StatusCode::OK, buffer),
        Err(e) => {
            error!("{e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
        }
    }
}
