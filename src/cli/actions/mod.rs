mod run;

use crate::{bindings::BindingSource, config::ConfigSource, drivers::Timeouts};
use std::net::IpAddr;

/// Action enum representing each possible command
#[derive(Debug)]
pub enum Action {
    Serve {
        config: ConfigSource,
        bindings: BindingSource,
        listen: Option<IpAddr>,
        port: u16,
        timeouts: Timeouts,
    },
}

impl Action {
    /// Execute the action
    ///
    /// # Errors
    ///
    /// Returns an error if the action fails to execute
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
