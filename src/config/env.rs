//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load `.env` from the current directory if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists. Variables already set in the
    /// process environment win over the file.
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and environment", path.display());
        }

        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "TARGET_URL" => {
                url::Url::parse(value)
                    .map_err(|e| AppError::config(format!("Invalid TARGET_URL '{}': {}", value, e)))?;
            }
            "VALID_PREFIX" | "RUNTIME_HEADER" | "STORE_PATH" => {
                if value.is_empty() {
                    return Err(AppError::config(format!("{} cannot be empty", key)));
                }
            }
            "SUCCESS_CHAR" | "FAIL_CHAR" => {
                if value.chars().count() != 1 {
                    return Err(AppError::config(format!("{} must be exactly one character, got '{}'", key, value)));
                }
            }
            "MISSING_LENGTH" | "SAMPLE_COUNT" => {
                let n: u64 = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if n == 0 {
                    return Err(AppError::config(format!("{} must be at least 1", key)));
                }
            }
            "WARMUP_COUNT" | "TIMEOUT_SECONDS" => {
                value.parse::<u64>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "PIN_CPU" => {
                if !value.is_empty() && !value.eq_ignore_ascii_case("last") {
                    value.parse::<usize>()
                        .map_err(|e| AppError::config(format!("Invalid PIN_CPU value '{}': {}", value, e)))?;
                }
            }
            "TCP_LOW_LATENCY" => {
                if !value.eq_ignore_ascii_case("keep") {
                    value.parse::<bool>()
                        .map_err(|e| AppError::config(format!("Invalid TCP_LOW_LATENCY value '{}': {}", value, e)))?;
                }
            }
            "ENABLE_TUNING" | "ENABLE_COLOR" => {
                value.parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("TARGET_URL", "Endpoint whose token check is measured", "http://127.0.0.1:8000/users/"),
            ("VALID_PREFIX", "Known-valid leading characters of the token", "224a93060c0dd4fb931d05083b4cb7b6a"),
            ("SUCCESS_CHAR", "Candidate stored in slot 0", "8"),
            ("FAIL_CHAR", "Candidate stored in slot 1", "7"),
            ("MISSING_LENGTH", "Characters after the prefix, test character included", "7"),
            ("SAMPLE_COUNT", "Paired records to collect", "10000"),
            ("WARMUP_COUNT", "Warm-up requests per candidate (0 to skip)", "100"),
            ("STORE_PATH", "Sample store file", "token-timing.jsonl"),
            ("RUNTIME_HEADER", "Response header with the server's processing time", "X-Runtime"),
            ("TIMEOUT_SECONDS", "Request timeout in seconds (0 = none)", "0"),
            ("ENABLE_TUNING", "Apply CPU and TCP tuning while collecting", "true"),
            ("PIN_CPU", "Core to pin to (\"last\" = highest core)", "last"),
            ("TCP_LOW_LATENCY", "tcp_low_latency value while collecting (\"keep\" = untouched)", "true"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<18} {}\n", var, description));
            help.push_str(&format!("  {:<18} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(var_name, _, _)| {
                let value = std::env::var(var_name).ok()?;
                Self::validate_env_var(var_name, &value).err()
            })
            .map(|e| format!("Warning: {}", e))
            .collect()
    }
}
