//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::Config,
};

/// Configuration parser that layers defaults, `.env`, environment and CLI
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        EnvManager::load_env_file(self.cli.debug)?;
        self.parse_environment()
    }

    /// Same as `parse` without reading `.env`
    pub fn parse_environment(&self) -> Result<Config> {
        let mut config = Config::default();

        if self.cli.debug {
            for warning in EnvManager::validate_current_env() {
                eprintln!("{}", warning);
            }
        }

        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        if self.cli.no_color {
            config.enable_color = false;
        }

        // CLI-only switches
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;

        if let Some(ref store) = self.cli.store {
            config.store_path = store.clone();
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let pin = config
        .pin_cpu
        .map_or_else(|| "last".to_string(), |cpu| cpu.to_string());
    let low_latency = config
        .tcp_low_latency
        .map_or_else(|| "keep".to_string(), |v| v.to_string());
    let timeout = match config.timeout() {
        Some(t) => format!("{}s", t.as_secs()),
        None => "none".to_string(),
    };

    [
        format!("Target URL: {}", config.target_url),
        format!("Valid prefix: {}", config.valid_prefix),
        format!("Candidates: '{}' (slot 0) vs '{}' (slot 1)", config.success_char, config.fail_char),
        format!("Missing length: {}", config.missing_length),
        format!("Samples: {}", config.sample_count),
        format!("Warm-up: {}", config.warmup_count),
        format!("Store: {}", config.store_path.display()),
        format!("Runtime header: {}", config.runtime_header),
        format!("Timeout: {}", timeout),
        format!("Tuning: {} (cpu {}, tcp_low_latency {})", config.enable_tuning, pin, low_latency),
        format!("Color Output: {}", config.enable_color),
        format!("Verbose: {}", config.verbose),
        format!("Debug: {}", config.debug),
    ]
    .join("\n")
}
