//! Configuration data model and validation

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint whose token check is measured
    #[serde(default = "default_target_url")]
    pub target_url: String,

    /// Known-valid token prefix
    #[serde(default = "default_valid_prefix")]
    pub valid_prefix: String,

    /// Candidate character expected to be correct (slot 0)
    #[serde(default = "default_success_char")]
    pub success_char: char,

    /// Candidate character expected to be wrong (slot 1)
    #[serde(default = "default_fail_char")]
    pub fail_char: char,

    /// Characters after the prefix, test character included
    #[serde(default = "default_missing_length")]
    pub missing_length: usize,

    /// Paired records to collect
    #[serde(default = "default_sample_count")]
    pub sample_count: u64,

    /// Warm-up requests per token variant
    #[serde(default = "default_warmup_count")]
    pub warmup_count: u32,

    /// Sample store file
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Header carrying the server-side processing time
    #[serde(default = "default_runtime_header")]
    pub runtime_header: String,

    /// Transport timeout in seconds, 0 for none
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,

    /// Apply platform tuning before collection
    #[serde(default = "default_enable_tuning")]
    pub enable_tuning: bool,

    /// Core to pin to; `None` selects the last core
    #[serde(default)]
    pub pin_cpu: Option<usize>,

    /// Value for the kernel TCP low-latency flag; `None` leaves it alone
    #[serde(default = "default_tcp_low_latency")]
    pub tcp_low_latency: Option<bool>,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_url: default_target_url(),
            valid_prefix: default_valid_prefix(),
            success_char: default_success_char(),
            fail_char: default_fail_char(),
            missing_length: default_missing_length(),
            sample_count: default_sample_count(),
            warmup_count: default_warmup_count(),
            store_path: default_store_path(),
            runtime_header: default_runtime_header(),
            timeout_seconds: default_timeout_secs(),
            enable_tuning: default_enable_tuning(),
            pin_cpu: None,
            tcp_low_latency: default_tcp_low_latency(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    /// Total token length implied by prefix and missing length
    pub fn token_length(&self) -> usize {
        self.valid_prefix.chars().count() + self.missing_length
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.target_url.is_empty() {
            return Err(AppError::config("Target URL cannot be empty"));
        }

        match url::Url::parse(&self.target_url) {
            Ok(parsed) => {
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(AppError::config(format!(
                        "Target URL must use http or https: {}",
                        self.target_url
                    )));
                }
                if parsed.host().is_none() {
                    return Err(AppError::config(format!("Target URL has no host: {}", self.target_url)));
                }
            }
            Err(e) => {
                return Err(AppError::config(format!("Invalid target URL '{}': {}", self.target_url, e)));
            }
        }

        if self.valid_prefix.is_empty() {
            return Err(AppError::config("Valid token prefix cannot be empty"));
        }

        if self.success_char == self.fail_char {
            return Err(AppError::config(format!(
                "Success and fail characters must differ (both '{}')",
                self.success_char
            )));
        }

        if self.missing_length == 0 {
            return Err(AppError::config("Missing length must be at least 1"));
        }

        if self.sample_count == 0 {
            return Err(AppError::config("Sample count must be greater than 0"));
        }

        if self.runtime_header.trim().is_empty() {
            return Err(AppError::config("Runtime header name cannot be empty"));
        }

        if let Some(cpu) = self.pin_cpu {
            let cpus = num_cpus::get();
            if cpu >= cpus {
                return Err(AppError::config(format!(
                    "PIN_CPU {} is out of range, this machine has {} cores",
                    cpu, cpus
                )));
            }
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("TARGET_URL") {
            self.target_url = url.trim().to_string();
        }

        if let Ok(prefix) = std::env::var("VALID_PREFIX") {
            self.valid_prefix = prefix.trim().to_string();
        }

        if let Ok(c) = std::env::var("SUCCESS_CHAR") {
            self.success_char = parse_single_char("SUCCESS_CHAR", &c)?;
        }

        if let Ok(c) = std::env::var("FAIL_CHAR") {
            self.fail_char = parse_single_char("FAIL_CHAR", &c)?;
        }

        if let Ok(length) = std::env::var("MISSING_LENGTH") {
            self.missing_length = length.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid MISSING_LENGTH value '{}': {}", length, e)))?;
        }

        if let Ok(count) = std::env::var("SAMPLE_COUNT") {
            self.sample_count = count.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid SAMPLE_COUNT value '{}': {}", count, e)))?;
        }

        if let Ok(count) = std::env::var("WARMUP_COUNT") {
            self.warmup_count = count.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid WARMUP_COUNT value '{}': {}", count, e)))?;
        }

        if let Ok(path) = std::env::var("STORE_PATH") {
            self.store_path = PathBuf::from(path.trim());
        }

        if let Ok(header) = std::env::var("RUNTIME_HEADER") {
            self.runtime_header = header.trim().to_string();
        }

        if let Ok(timeout) = std::env::var("TIMEOUT_SECONDS") {
            self.timeout_seconds = timeout.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid TIMEOUT_SECONDS value '{}': {}", timeout, e)))?;
        }

        if let Ok(enabled) = std::env::var("ENABLE_TUNING") {
            self.enable_tuning = enabled.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_TUNING value '{}': {}", enabled, e)))?;
        }

        if let Ok(cpu) = std::env::var("PIN_CPU") {
            let cpu = cpu.trim();
            self.pin_cpu = if cpu.is_empty() || cpu.eq_ignore_ascii_case("last") {
                None
            } else {
                Some(cpu.parse()
                    .map_err(|e| AppError::config(format!("Invalid PIN_CPU value '{}': {}", cpu, e)))?)
            };
        }

        if let Ok(flag) = std::env::var("TCP_LOW_LATENCY") {
            let flag = flag.trim();
            self.tcp_low_latency = if flag.eq_ignore_ascii_case("keep") {
                None
            } else {
                Some(flag.parse()
                    .map_err(|e| AppError::config(format!("Invalid TCP_LOW_LATENCY value '{}': {}", flag, e)))?)
            };
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

fn parse_single_char(key: &str, value: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(AppError::config(format!(
            "{} must be exactly one character, got '{}'",
            key, value
        ))),
    }
}

// Default value functions for serde
fn default_target_url() -> String {
    crate::defaults::DEFAULT_TARGET_URL.to_string()
}

fn default_valid_prefix() -> String {
    crate::defaults::DEFAULT_VALID_PREFIX.to_string()
}

fn default_success_char() -> char {
    crate::defaults::DEFAULT_SUCCESS_CHAR
}

fn default_fail_char() -> char {
    crate::defaults::DEFAULT_FAIL_CHAR
}

fn default_missing_length() -> usize {
    crate::defaults::DEFAULT_MISSING_LENGTH
}

fn default_sample_count() -> u64 {
    crate::defaults::DEFAULT_SAMPLE_COUNT
}

fn default_warmup_count() -> u32 {
    crate::defaults::DEFAULT_WARMUP_COUNT
}

fn default_store_path() -> PathBuf {
    PathBuf::from(crate::defaults::DEFAULT_STORE_PATH)
}

fn default_runtime_header() -> String {
    crate::defaults::DEFAULT_RUNTIME_HEADER.to_string()
}

fn default_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_TIMEOUT_SECS
}

fn default_enable_tuning() -> bool {
    crate::defaults::DEFAULT_ENABLE_TUNING
}

fn default_tcp_low_latency() -> Option<bool> {
    Some(crate::defaults::DEFAULT_TCP_LOW_LATENCY)
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}
