//! Console output for collection runs and analysis results
//!
//! Formatting returns strings; printing is left to the caller so that the
//! same text can be asserted on in tests.

mod progress;
mod report;

pub use progress::{ConsoleProgress, NoProgress, ProgressReporter};
pub use report::ReportFormatter;

/// Fixed reading aid printed under every verdict
pub const VERDICT_LEGEND: [&str; 2] = [
    "== 0.00  means totally different",
    "<= 0.05  highly confident that the distributions significantly differ",
];
