//! Progress display for long collection runs

use colored::Colorize;
use std::io::{self, Write};

/// Receives progress updates from the sampler
pub trait ProgressReporter: Send {
    /// A phase of `total` steps begins
    fn start(&mut self, phase: &str, total: u64);

    /// `done` of `total` steps are complete
    fn update(&mut self, done: u64, total: u64);

    /// The phase ended
    fn finish(&mut self, message: &str);
}

/// Overwrites a single stderr line
#[derive(Debug, Clone)]
pub struct ConsoleProgress {
    use_color: bool,
    phase: String,
}

impl ConsoleProgress {
    pub fn new(use_color: bool) -> Self {
        Self {
            use_color,
            phase: String::new(),
        }
    }

    /// Text of one progress line
    pub fn render(&self, done: u64, total: u64) -> String {
        let percent = if total == 0 {
            100.0
        } else {
            done as f64 * 100.0 / total as f64
        };
        let tag = if self.use_color {
            "[PROGRESS]".cyan().bold().to_string()
        } else {
            "[PROGRESS]".to_string()
        };
        format!("{} {} {}/{} ({:.1}%)", tag, self.phase, done, total, percent)
    }
}

impl ProgressReporter for ConsoleProgress {
    fn start(&mut self, phase: &str, total: u64) {
        self.phase = phase.to_string();
        self.update(0, total);
    }

    fn update(&mut self, done: u64, total: u64) {
        eprint!("\r{}", self.render(done, total));
        io::stderr().flush().unwrap_or(());
    }

    fn finish(&mut self, message: &str) {
        if self.use_color {
            eprintln!("\r{} {}", "[COMPLETE]".green().bold(), message);
        } else {
            eprintln!("\r[COMPLETE] {}", message);
        }
    }
}

/// Discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn start(&mut self, _phase: &str, _total: u64) {}

    fn update(&mut self, _done: u64, _total: u64) {}

    fn finish(&mut self, _message: &str) {}
}
