//! Command-line interface for live-serve.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

/// Command-line arguments.
///
/// Unset options are `None` so lower-priority sources (env, config file)
/// are not clobbered by CLI defaults.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Directory to serve.
    pub root: Option<PathBuf>,
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Extra ignore globs, appended to the configured ones.
    pub ignore: Vec<String>,
    /// Debounce window in milliseconds.
    pub debounce_ms: Option<u64>,
    /// Walk forward to a free port when the requested one is taken.
    pub port_fallback: bool,
    /// Do not inject the reload client into HTML.
    pub no_inject: bool,
    /// Do not add CORS headers.
    pub no_cors: bool,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('i') | Long("ignore") => {
                result.ignore.push(parser.value()?.parse()?);
            }
            Short('d') | Long("debounce") => {
                let value: String = parser.value()?.parse()?;
                result.debounce_ms = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("debounce", value))?,
                );
            }
            Long("port-fallback") => {
                result.port_fallback = true;
            }
            Long("no-inject") => {
                result.no_inject = true;
            }
            Long("no-cors") => {
                result.no_cors = true;
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) if result.root.is_none() => {
                result.root = Some(PathBuf::from(val));
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"live-serve {version}
Local development server with live reload

USAGE:
    live-serve [OPTIONS] [ROOT]

ARGS:
    <ROOT>                  Directory to serve [default: current directory]

OPTIONS:
    -H, --host <ADDR>       Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>       Port to listen on [default: 5500]
    -c, --config <FILE>     Path to configuration file (JSON)
    -i, --ignore <GLOB>     Ignore changes matching GLOB (repeatable)
    -d, --debounce <MS>     Debounce window in milliseconds [default: 100]
        --port-fallback     Try the next ports if PORT is taken
        --no-inject         Do not inject the reload client into HTML
        --no-cors           Do not send CORS headers
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    LIVE_SERVE_HOST         Host address (overrides config)
    LIVE_SERVE_PORT         Port number (overrides config)
    LIVE_SERVE_ROOT         Directory to serve (overrides config)
    LIVE_SERVE_LOG_LEVEL    Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Serve the current directory on localhost:5500
    live-serve

    # Serve ./public on port 8080, reachable from the LAN
    live-serve -H 0.0.0.0 -p 8080 ./public

    # Ignore build output and pick any free port near 5500
    live-serve -i "dist/**" --port-fallback
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("live-serve {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
