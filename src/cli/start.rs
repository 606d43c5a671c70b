use super::{commands, dispatch, telemetry};
use anyhow::Result;

/// Entry point of the binary
///
/// Parses the command line, sets up logging from `-v`/`--log-format`, turns the
/// matches into an [`Action`](super::actions::Action) and runs it.
///
/// # Errors
///
/// Returns an error if logging can't be initialized, the arguments are invalid or
/// the service fails
pub async fn start() -> Result<()> {
    let matches = commands::new().get_matches();

    let verbosity = matches.get_count("verbose");
    let json = matches
        .get_one::<String>("log-format")
        .is_some_and(|format| format == "json");
    telemetry::init(verbosity, json)?;

    let action = dispatch::dispatch(&matches)?;
    action.execute().await
}
