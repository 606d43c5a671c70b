pub mod bindings;
pub mod cli;
pub mod config;
pub mod drivers;
pub mod metrics;
pub mod orchestrator;
pub mod probe;
pub mod registry;
pub mod server;
