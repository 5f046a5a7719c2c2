//! Token Timing
//!
//! A timing side-channel harness: sends paired, randomly ordered HTTP
//! requests carrying two candidate authentication tokens, stores the
//! observed latencies under an experiment label, and decides with a
//! Wilcoxon rank-sum test whether the two tokens are processed in
//! measurably different time.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod platform;
pub mod stats;
pub mod store;
pub mod token;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, PairedRecord, Slot, TimingSample};
pub use token::{Token, TokenForge};
pub use client::{HttpTransport, ProbeRequest, ProbeResponse, Transport};
pub use executor::{CollectionSummary, PairedSampler, ProbeTarget, WarmupDriver, WarmupReport};
pub use platform::{PlatformTuner, PriorState, TuningGuard};
pub use stats::{Metric, RankSumAnalyzer, SampleSummary, Verdict};
pub use store::{JsonLinesStore, MemoryStore, SampleStore};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");

/// Deploy-time experiment constants
pub mod defaults {
    /// Endpoint whose token check is under test
    pub const DEFAULT_TARGET_URL: &str = "http://127.0.0.1:8000/users/";
    /// Known-valid leading characters of the token
    pub const DEFAULT_VALID_PREFIX: &str = "224a93060c0dd4fb931d05083b4cb7b6a";
    /// Candidate believed to be the correct next character
    pub const DEFAULT_SUCCESS_CHAR: char = '8';
    /// Candidate believed to be wrong
    pub const DEFAULT_FAIL_CHAR: char = '7';
    /// Characters still unknown after the prefix (test char included)
    pub const DEFAULT_MISSING_LENGTH: usize = 7;
    pub const DEFAULT_SAMPLE_COUNT: u64 = 10_000;
    pub const DEFAULT_WARMUP_COUNT: u32 = 100;
    pub const DEFAULT_STORE_PATH: &str = "token-timing.jsonl";
    pub const DEFAULT_RUNTIME_HEADER: &str = "X-Runtime";
    /// 0 disables the transport timeout
    pub const DEFAULT_TIMEOUT_SECS: u64 = 0;
    pub const DEFAULT_ENABLE_TUNING: bool = true;
    pub const DEFAULT_TCP_LOW_LATENCY: bool = true;
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    pub const PADDING_CHAR: char = '0';
    pub const TRANSPORT_MAX_ATTEMPTS: u32 = 3;
    pub const PERFORMANCE_GOVERNOR: &str = "performance";
    /// Significance threshold used by the printed legend
    pub const SIGNIFICANCE_LEVEL: f64 = 0.05;
}
