//! CLI error types and exit codes

use thiserror::Error;

use diradmin_connector::error::ConnectorError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Authentication failed
/// - 3: Server unreachable or busy
/// - 4: Validation error
/// - 5: Search rejected by the server
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Connection failed: {0}\n\nTroubleshooting:\n  - Verify the server address and port\n  - Check whether the server expects LDAPS (--ssl) or STARTTLS (--starttls)\n  - Try again in a few moments")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::AuthenticationFailed(_) => 2,
            CliError::ConnectionFailed(_) | CliError::Timeout(_) => 3,
            CliError::Validation(_) => 4,
            CliError::Search(_) => 5,
            CliError::Config(_) | CliError::Io(_) | CliError::Internal(_) => 1,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    /// Get a suggested action for this error
    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::AuthenticationFailed(_) => {
                Some("Check the bind DN (--username) and password (DIRADMIN_PASSWORD).")
            }
            CliError::Timeout(_) => Some("Raise --timeout or lower the number of parallel jobs."),
            CliError::Config(_) => {
                Some("Pass --server or write a profile with 'server' to the config file.")
            }
            _ => None,
        }
    }
}

/// Render an error with every `source()` below it.
fn with_causes(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

impl From<ConnectorError> for CliError {
    fn from(e: ConnectorError) -> Self {
        let message = with_causes(&e);
        match e {
            ConnectorError::ConnectionFailed { .. } | ConnectorError::ConnectionTimeout { .. } => {
                CliError::ConnectionFailed(message)
            }
            ConnectorError::AuthenticationFailed { .. } | ConnectorError::BindFailed { .. } => {
                CliError::AuthenticationFailed(message)
            }
            ConnectorError::PoolTimeout { .. } => CliError::Timeout(message),
            ConnectorError::SearchFailed { .. } => CliError::Search(message),
            ConnectorError::InvalidConfiguration { .. } => CliError::Config(message),
            ConnectorError::InvalidFilter { .. } => CliError::Validation(message),
            _ => CliError::Internal(message),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Config(format!("JSON error: {}", e))
    }
}
