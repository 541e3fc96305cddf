//! Log verbosity and subscriber setup

use std::fmt;
use tracing_subscriber::EnvFilter;

/// Log verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Warnings and errors only (default)
    #[default]
    Normal,
    /// Pool and session lifecycle
    Verbose,
    /// Per-request detail from the connector crates
    Debug,
    /// Everything, including the LDAP protocol layer
    Trace,
}

impl LogLevel {
    /// Create a LogLevel from the CLI flags. The most verbose flag wins.
    pub fn from_flags(verbose: bool, debug: bool, trace: bool) -> Self {
        if trace {
            LogLevel::Trace
        } else if debug {
            LogLevel::Debug
        } else if verbose {
            LogLevel::Verbose
        } else {
            LogLevel::Normal
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, LogLevel::Normal)
    }

    /// Returns true if debug or more verbose
    pub fn is_debug(&self) -> bool {
        matches!(self, LogLevel::Debug | LogLevel::Trace)
    }

    /// Filter directive used when RUST_LOG does not override it.
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Normal => "warn",
            LogLevel::Verbose => "warn,diradmin_cli=info,diradmin_connector=info,diradmin_connector_ldap=info",
            LogLevel::Debug => "info,diradmin_cli=debug,diradmin_connector=debug,diradmin_connector_ldap=debug",
            LogLevel::Trace => "trace",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Normal => "normal",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` is honoured at the normal level; an explicit verbosity flag
/// takes precedence over it.
pub fn init(level: LogLevel) {
    let filter = match (level, EnvFilter::try_from_default_env()) {
        (LogLevel::Normal, Ok(from_env)) => from_env,
        _ => EnvFilter::new(level.directive()),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(level.is_debug())
        .try_init();
}
