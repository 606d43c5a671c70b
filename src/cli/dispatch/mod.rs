use crate::{
    bindings::{BindingSource, DEFAULT_BINDINGS_VAR},
    cli::actions::Action,
    config::{ConfigSource, DEFAULT_CONFIG_FILE},
    drivers::Timeouts,
};
use anyhow::{Context, Result};
use clap::ArgMatches;
use std::{net::IpAddr, path::PathBuf, time::Duration};

/// Convert `ArgMatches` into typed Action enum with validation
///
/// # Errors
///
/// Returns an error if the listen address is invalid
pub fn dispatch(matches: &ArgMatches) -> Result<Action> {
    let config = ConfigSource::File(PathBuf::from(
        matches
            .get_one::<String>("config")
            .map_or(DEFAULT_CONFIG_FILE, String::as_str),
    ));

    // A bindings file wins over the environment variable
    let bindings = match matches.get_one::<String>("bindings-file") {
        Some(path) => BindingSource::File(PathBuf::from(path)),
        None => BindingSource::Env(
            matches
                .get_one::<String>("bindings-var")
                .map_or(DEFAULT_BINDINGS_VAR, String::as_str)
                .to_string(),
        ),
    };

    let listen = matches
        .get_one::<String>("listen")
        .map(|addr| {
            addr.parse::<IpAddr>()
                .with_context(|| format!("Invalid IP address: {addr}"))
        })
        .transpose()?;

    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let defaults = Timeouts::default();
    let timeouts = Timeouts {
        connect: matches
            .get_one::<u64>("connect-timeout")
            .map_or(defaults.connect, |secs| Duration::from_secs(*secs)),
        query: matches
            .get_one::<u64>("query-timeout")
            .map_or(defaults.query, |secs| Duration::from_secs(*secs)),
    };

    Ok(Action::Serve {
        config,
        bindings,
        listen,
        port,
        timeouts,
    })
}
