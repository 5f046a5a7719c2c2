//! Timing sample and paired record data models

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Which member of a pair a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Slot {
    Zero,
    One,
}

impl Slot {
    pub const BOTH: [Slot; 2] = [Slot::Zero, Slot::One];

    pub fn index(self) -> usize {
        match self {
            Slot::Zero => 0,
            Slot::One => 1,
        }
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> u8 {
        slot.index() as u8
    }
}

impl TryFrom<u8> for Slot {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Slot::Zero),
            1 => Ok(Slot::One),
            other => Err(format!("slot must be 0 or 1, got {}", other)),
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// One side of a paired measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSample {
    /// Token sent in the `Authorization` header
    pub token: String,

    /// Client-observed round trip, request dispatch to response headers
    pub elapsed_microseconds: u64,

    /// Server-reported processing time header, when the server sends one
    #[serde(default)]
    pub server_runtime: Option<String>,

    /// Member of the pair this sample belongs to
    pub slot: Slot,

    /// HTTP status of the response
    #[serde(default)]
    pub status: u16,
}

impl TimingSample {
    /// Server runtime header parsed as a number
    pub fn server_runtime_value(&self) -> Option<f64> {
        self.server_runtime
            .as_deref()
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }
}

/// One sampling iteration: both slots, measured back to back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedRecord {
    /// Experiment label grouping all records of one run
    pub test_label: String,

    /// Seconds since the Unix epoch
    pub capture_timestamp: f64,

    pub sample_0: TimingSample,
    pub sample_1: TimingSample,

    /// Slot that went on the wire first in this iteration
    pub first_slot: Slot,
}

impl PairedRecord {
    pub fn new(
        test_label: impl Into<String>,
        sample_0: TimingSample,
        sample_1: TimingSample,
        first_slot: Slot,
    ) -> Self {
        Self {
            test_label: test_label.into(),
            capture_timestamp: now_epoch_seconds(),
            sample_0,
            sample_1,
            first_slot,
        }
    }

    /// Sample for a slot
    pub fn sample(&self, slot: Slot) -> &TimingSample {
        match slot {
            Slot::Zero => &self.sample_0,
            Slot::One => &self.sample_1,
        }
    }

    /// Find the sample that carried a given token
    pub fn sample_for_token(&self, token: &str) -> Option<&TimingSample> {
        Slot::BOTH
            .iter()
            .map(|&slot| self.sample(slot))
            .find(|sample| sample.token == token)
    }
}

/// Current wall-clock time as float seconds since the epoch
pub fn now_epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
