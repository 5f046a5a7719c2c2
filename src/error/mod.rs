//! Error handling for the token timing harness

use thiserror::Error;

/// Custom error types for the token timing harness
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed token parameters, empty sample sets and similar caller mistakes
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Connection refused, DNS failure, host unreachable
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP protocol errors after a connection was established
    #[error("HTTP request error: {0}")]
    HttpRequest(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// A platform tuning call was refused by the OS
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A platform tuning call is not available on this system
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Sample store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (URLs, JSON, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Statistics calculation errors
    #[error("Statistics error: {0}")]
    Statistics(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    /// Create a new HTTP request error
    pub fn http_request<S: Into<String>>(message: S) -> Self {
        Self::HttpRequest(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new permission denied error
    pub fn permission_denied<S: Into<String>>(message: S) -> Self {
        Self::PermissionDenied(message.into())
    }

    /// Create a new unsupported platform error
    pub fn unsupported_platform<S: Into<String>>(message: S) -> Self {
        Self::UnsupportedPlatform(message.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new statistics error
    pub fn statistics<S: Into<String>>(message: S) -> Self {
        Self::Statistics(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::InvalidInput(_) => "INPUT",
            Self::Network(_) => "NETWORK",
            Self::HttpRequest(_) => "HTTP",
            Self::Timeout(_) => "TIMEOUT",
            Self::PermissionDenied(_) => "PERMISSION",
            Self::UnsupportedPlatform(_) => "PLATFORM",
            Self::Storage(_) => "STORAGE",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Statistics(_) => "STATS",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Whether this error came from the HTTP transport
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::HttpRequest(_) | Self::Timeout(_))
    }

    /// Whether the transport may transparently retry this error.
    ///
    /// Only connection-level failures qualify: the request never reached the
    /// server, so a retry cannot double-count server work.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Whether a tuning step failed in a way that only skips that step
    pub fn is_tuning_skip(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::UnsupportedPlatform(_))
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidInput(_) | Self::Parse(_) => 1,
            Self::Network(_) | Self::HttpRequest(_) => 2,
            Self::Timeout(_) => 3,
            Self::PermissionDenied(_) | Self::UnsupportedPlatform(_) => 4,
            Self::Storage(_) | Self::Io(_) => 5,
            Self::Statistics(_) => 6,
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::InvalidInput(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Network(_) | Self::HttpRequest(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Timeout(_) => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::PermissionDenied(_) | Self::UnsupportedPlatform(_) => {
                    format!("[{}] {}", category.magenta().bold(), message.magenta())
                }
                Self::Storage(_) | Self::Io(_) | Self::Statistics(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(error.to_string()),
            std::io::ErrorKind::Unsupported => Self::unsupported_platform(error.to_string()),
            _ => Self::io(error.to_string()),
        }
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else if error.is_connect() {
            Self::network(error.to_string())
        } else {
            Self::http_request(error.to_string())
        }
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Error reporter for operator-facing error output
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Report an error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", error.format_for_console(self.use_color));

        if let Some(hint) = self.hint_for(error) {
            eprintln!();
            if self.use_color {
                use colored::Colorize;
                eprintln!("{}", hint.dimmed());
            } else {
                eprintln!("{}", hint);
            }
        }
    }

    /// Suggestion text for common errors
    pub fn hint_for(&self, error: &AppError) -> Option<&'static str> {
        match error {
            AppError::Config(_) => Some("Check your .env file: TARGET_URL, VALID_PREFIX, SUCCESS_CHAR, FAIL_CHAR, MISSING_LENGTH."),
            AppError::Network(_) => Some("The target endpoint is unreachable. Is the server under test running?"),
            AppError::PermissionDenied(_) if self.verbose => Some("Platform tuning needs root; set ENABLE_TUNING=false to skip it."),
            AppError::Storage(_) => Some("Check the STORE_PATH file: it must be writable and contain one JSON record per line."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(AppError::config("x").category(), "CONFIG");
        assert_eq!(AppError::invalid_input("x").category(), "INPUT");
        assert_eq!(AppError::network("x").category(), "NETWORK");
        assert_eq!(AppError::permission_denied("x").category(), "PERMISSION");
        assert_eq!(AppError::storage("x").category(), "STORAGE");
    }

    #[test]
    fn test_transport_classification() {
        assert!(AppError::network("refused").is_transport());
        assert!(AppError::http_request("bad frame").is_transport());
        assert!(AppError::timeout("slow").is_transport());
        assert!(!AppError::invalid_input("x").is_transport());

        assert!(AppError::network("refused").is_retryable());
        assert!(!AppError::http_request("bad frame").is_retryable());
        assert!(!AppError::timeout("slow").is_retryable());
    }

    #[test]
    fn test_tuning_skip_classification() {
        assert!(AppError::permission_denied("governor").is_tuning_skip());
        assert!(AppError::unsupported_platform("affinity").is_tuning_skip());
        assert!(!AppError::io("disk").is_tuning_skip());
    }

    #[test]
    fn test_io_error_kind_mapping() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(AppError::from(denied), AppError::PermissionDenied(_)));

        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(AppError::from(missing), AppError::Io(_)));
    }

    #[test]
    fn test_exit_codes() {
        let cases = [
            (AppError::config("x"), 1),
            (AppError::invalid_input("x"), 1),
            (AppError::parse("x"), 1),
            (AppError::network("x"), 2),
            (AppError::http_request("x"), 2),
            (AppError::timeout("x"), 3),
            (AppError::permission_denied("x"), 4),
            (AppError::unsupported_platform("x"), 4),
            (AppError::storage("x"), 5),
            (AppError::io("x"), 5),
            (AppError::statistics("x"), 6),
            (AppError::internal("x"), 99),
        ];
        for (error, code) in cases {
            assert_eq!(error.exit_code(), code, "{}", error);
        }
    }

    #[test]
    fn test_url_parse_conversion() {
        let err: AppError = url::Url::parse("not a url").unwrap_err().into();
        assert_eq!(err.category(), "PARSE");
        assert!(err.to_string().contains("URL parse error"));
    }

    #[test]
    fn test_plain_console_format() {
        let err = AppError::timeout("request took too long");
        assert_eq!(
            err.format_for_console(false),
            "[TIMEOUT] Timeout error: request took too long"
        );
    }
}
