//! Rank-sum significance testing and descriptive statistics
//!
//! `RankSumAnalyzer::compare` implements the Wilcoxon rank-sum test with the
//! large-sample normal approximation: both groups are pooled and ranked
//! (ties share their average rank), the rank sum of the first group is
//! standardized and turned into a two-sided p-value.


use crate::{
    error::{AppError, Result},
    models::{PairedRecord, Slot, TimingSample},
};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Outcome of a rank-sum comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Standardized rank sum (z) of the first group
    pub statistic: f64,
    /// Two-sided p-value
    pub p_value: f64,
}

impl Verdict {
    /// Whether the distributions differ at significance level `alpha`
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value <= alpha
    }

    /// Short reading of the p-value
    pub fn interpretation(&self) -> &'static str {
        if self.p_value == 0.0 {
            "totally different"
        } else if self.is_significant(crate::defaults::SIGNIFICANCE_LEVEL) {
            "distributions significantly differ"
        } else {
            "no significant difference detected"
        }
    }
}

/// Wilcoxon rank-sum test
#[derive(Debug, Clone, Copy, Default)]
pub struct RankSumAnalyzer {
    tie_correction: bool,
}

impl RankSumAnalyzer {
    /// Midranks with the uncorrected variance
    pub fn new() -> Self {
        Self::default()
    }

    /// Shrink the variance by the standard tie term
    pub fn with_tie_correction(mut self) -> Self {
        self.tie_correction = true;
        self
    }

    pub fn tie_correction(&self) -> bool {
        self.tie_correction
    }

    /// Compare two independent groups
    pub fn compare(&self, a: &[f64], b: &[f64]) -> Result<Verdict> {
        if a.is_empty() || b.is_empty() {
            return Err(AppError::invalid_input(format!(
                "Rank-sum test needs two non-empty groups (got {} and {} values)",
                a.len(),
                b.len()
            )));
        }
        if a.iter().chain(b).any(|v| v.is_nan()) {
            return Err(AppError::invalid_input("Samples contain NaN"));
        }

        let n_a = a.len() as f64;
        let n_b = b.len() as f64;
        let n = n_a + n_b;

        let mut pooled: Vec<(f64, bool)> = a.iter().map(|&v| (v, true))
            .chain(b.iter().map(|&v| (v, false)))
            .collect();
        pooled.sort_by(|x, y| x.0.total_cmp(&y.0));

        let (rank_sum_a, tie_term) = rank_sum(&pooled);

        let expected = n_a * (n + 1.0) / 2.0;
        let mut variance = n_a * n_b * (n + 1.0) / 12.0;
        if self.tie_correction {
            variance = n_a * n_b / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
        }

        if variance <= 0.0 {
            // Every value equal: nothing to tell the groups apart by
            return Ok(Verdict { statistic: 0.0, p_value: 1.0 });
        }

        let statistic = (rank_sum_a - expected) / variance.sqrt();
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| AppError::statistics(format!("Standard normal unavailable: {}", e)))?;
        let p_value = (2.0 * normal.cdf(-statistic.abs())).min(1.0);

        if !statistic.is_finite() || !p_value.is_finite() {
            return Err(AppError::statistics("Rank-sum test produced a non-finite result"));
        }

        Ok(Verdict { statistic, p_value })
    }
}

/// Rank sum of the flagged group and `sum(t^3 - t)` over tie groups.
/// `sorted` must be ordered by value.
fn rank_sum(sorted: &[(f64, bool)]) -> (f64, f64) {
    let mut rank_sum = 0.0;
    let mut tie_term = 0.0;
    let mut i = 0;

    while i < sorted.len() {
        let value = sorted[i].0;
        let mut j = i;
        while j < sorted.len() && sorted[j].0 == value {
            j += 1;
        }

        // Ranks are 1-based; the tie group i..j shares their mean
        let midrank = (i + 1 + j) as f64 / 2.0;
        let in_a = sorted[i..j].iter().filter(|(_, is_a)| *is_a).count();
        rank_sum += midrank * in_a as f64;

        let t = (j - i) as f64;
        tie_term += t * t * t - t;

        i = j;
    }

    (rank_sum, tie_term)
}

/// Descriptive statistics of one group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub p90: f64,
}

impl SampleSummary {
    /// `None` for an empty group
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;

        Some(Self {
            count,
            mean,
            median: percentile(&sorted, 50.0),
            min: sorted[0],
            max: sorted[count - 1],
            p90: percentile(&sorted, 90.0),
        })
    }
}

/// Linear interpolation between closest ranks
fn percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_values.len() as f64 - 1.0);
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        sorted_values[lower_index]
    } else {
        let weight = index - lower_index as f64;
        sorted_values[lower_index] + weight * (sorted_values[upper_index] - sorted_values[lower_index])
    }
}

/// Which measurement of a sample is analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Client-observed round trip, microseconds
    #[default]
    Elapsed,
    /// Server-reported processing time from the runtime header
    Runtime,
}

impl Metric {
    /// Value of this metric for `sample`, if it has one
    pub fn value(&self, sample: &TimingSample) -> Option<f64> {
        match self {
            Metric::Elapsed => Some(sample.elapsed_microseconds as f64),
            Metric::Runtime => sample.server_runtime_value(),
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Elapsed => "us",
            Metric::Runtime => "s",
        }
    }
}

impl FromStr for Metric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "elapsed" | "rtt" => Ok(Metric::Elapsed),
            "runtime" | "x-runtime" => Ok(Metric::Runtime),
            _ => Err(AppError::parse(format!("Unknown metric '{}' (expected elapsed or runtime)", s))),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Elapsed => write!(f, "elapsed"),
            Metric::Runtime => write!(f, "runtime"),
        }
    }
}

/// Which sample of each record forms a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleSelector {
    Slot(Slot),
    /// Whichever slot carried this token
    Token(String),
}

impl SampleSelector {
    fn pick<'r>(&self, record: &'r PairedRecord) -> Option<&'r TimingSample> {
        match self {
            SampleSelector::Slot(slot) => Some(record.sample(*slot)),
            SampleSelector::Token(token) => record.sample_for_token(token),
        }
    }
}

impl fmt::Display for SampleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleSelector::Slot(slot) => write!(f, "slot {}", slot),
            SampleSelector::Token(token) => write!(f, "token {}", token),
        }
    }
}

/// One group's values pulled out of stored records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Column {
    pub values: Vec<f64>,
    /// Records without a usable value for the metric
    pub skipped: usize,
}

impl Column {
    /// Collect `metric` of the selected sample from every record
    pub fn extract<I>(records: I, selector: &SampleSelector, metric: Metric) -> Result<Self>
    where
        I: IntoIterator<Item = Result<PairedRecord>>,
    {
        let mut column = Column::default();
        for record in records {
            let record = record?;
            match selector.pick(&record).and_then(|sample| metric.value(sample)) {
                Some(value) => column.values.push(value),
                None => column.skipped += 1,
            }
        }
        Ok(column)
    }

    /// Both slot columns of one pass over the records
    pub fn extract_pair<I>(records: I, metric: Metric) -> Result<(Self, Self)>
    where
        I: IntoIterator<Item = Result<PairedRecord>>,
    {
        let mut zero = Column::default();
        let mut one = Column::default();
        for record in records {
            let record = record?;
            for (slot, column) in [(Slot::Zero, &mut zero), (Slot::One, &mut one)] {
                match metric.value(record.sample(slot)) {
                    Some(value) => column.values.push(value),
                    None => column.skipped += 1,
                }
            }
        }
        Ok((zero, one))
    }
}

/// A named group in a comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub name: String,
    pub summary: SampleSummary,
    pub skipped: usize,
}

/// Everything `analyze` prints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub metric: Metric,
    pub tie_correction: bool,
    pub group_a: GroupReport,
    pub group_b: GroupReport,
    pub verdict: Verdict,
}

impl AnalysisReport {
    /// Run the test on two columns and summarize them
    pub fn build(
        analyzer: &RankSumAnalyzer,
        metric: Metric,
        (name_a, a): (String, &Column),
        (name_b, b): (String, &Column),
    ) -> Result<Self> {
        let verdict = analyzer.compare(&a.values, &b.values)?;
        let summary = |name: &str, column: &Column| {
            SampleSummary::from_values(&column.values)
                .ok_or_else(|| AppError::invalid_input(format!("Group '{}' has no values", name)))
        };

        Ok(Self {
            metric,
            tie_correction: analyzer.tie_correction(),
            group_a: GroupReport {
                summary: summary(&name_a, a)?,
                skipped: a.skipped,
                name: name_a,
            },
            group_b: GroupReport {
                summary: summary(&name_b, b)?,
                skipped: b.skipped,
                name: name_b,
            },
            verdict,
        })
    }
}
