//! Data models and structures for the token timing harness

pub mod config;
pub mod record;

// Re-export main model types
pub use config::Config;
pub use record::{PairedRecord, Slot, TimingSample};
