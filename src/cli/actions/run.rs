use super::Action;
use crate::{
    drivers::SqlxDrivers,
    registry::SharedRegistry,
    server::{self, AppState},
};
use tracing::info;

/// Execute the action's business logic by delegating to the appropriate module
pub async fn execute(action: Action) -> anyhow::Result<()> {
    match action {
        Action::Serve {
            config,
            bindings,
            listen,
            port,
            timeouts,
        } => {
            info!(
                config = %config,
                bindings = %bindings,
                connect_timeout = ?timeouts.connect,
                query_timeout = ?timeouts.query,
                "starting {} {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            );

            let state = AppState {
                registry: SharedRegistry::new(config),
                drivers: Box::new(SqlxDrivers::new(timeouts)),
                bindings,
            };

            server::start(state, listen, port).await
        }
    }
}
