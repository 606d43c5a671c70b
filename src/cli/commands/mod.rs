use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

/// Pure clap command definitions with zero business logic
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new(env!("CARGO_PKG_NAME"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("config")
                .default_value("rdbms_config.json")
                .env("DBREACH_CONFIG")
                .help("Path to the connector configuration (JSON)")
                .long("config")
                .long_help(
                    "Path to the connector configuration file.\n\
                    The file holds a top-level \"connectors\" array, each entry with:\n\
                    - url_scheme: JDBC URL scheme, e.g. db2, mysql\n\
                    - display_name: name reported by /meta (optional)\n\
                    - driver: driver identifier (mysql, mariadb, postgres, postgresql)\n\
                    - query: side-effect free probe query\n\n\
                    The file is read on first use; a failed load is retried on the next request."
                )
                .short('c')
                .value_name("PATH"),
        )
        .arg(
            Arg::new("bindings-var")
                .default_value("VCAP_SERVICES")
                .env("DBREACH_BINDINGS_VAR")
                .help("Environment variable holding the service bindings")
                .long("bindings-var")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("bindings-file")
                .env("DBREACH_BINDINGS_FILE")
                .help("Read service bindings from a file instead of the environment")
                .long("bindings-file")
                .long_help(
                    "Path to a JSON file with the service bindings.\n\
                    Either an array of {name, credentials: {jdbcurl, user, password}}\n\
                    or a VCAP_SERVICES document with a \"user-provided\" array.\n\
                    Takes precedence over --bindings-var."
                )
                .short('b')
                .value_name("PATH"),
        )
        .arg(
            Arg::new("listen")
                .env("DBREACH_LISTEN")
                .help("IP address to bind to (default: [::]:port, accepts both IPv6 and IPv4)")
                .long("listen")
                .short('l')
                .value_name("IP"),
        )
        .arg(
            Arg::new("port")
                .default_value("8080")
                .env("DBREACH_PORT")
                .help("listening port for /meta, /test and /metrics")
                .long("port")
                .short('p')
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("connect-timeout")
                .default_value("10")
                .env("DBREACH_CONNECT_TIMEOUT")
                .help("seconds to wait for a database connection")
                .long("connect-timeout")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("query-timeout")
                .default_value("10")
                .env("DBREACH_QUERY_TIMEOUT")
                .help("seconds to wait for the probe query")
                .long("query-timeout")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("log-format")
                .default_value("text")
                .env("DBREACH_LOG_FORMAT")
                .help("log output format")
                .long("log-format")
                .value_parser(["text", "json"]),
        )
        .arg(
            Arg::new("verbose")
                .help("increase log verbosity (-v debug, -vv trace)")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count),
        )
}
