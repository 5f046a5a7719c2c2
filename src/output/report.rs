use super::VERDICT_LEGEND;
use crate::{
    executor::CollectionSummary,
    stats::{AnalysisReport, GroupReport, Metric},
    token::Token,
};
use colored::*;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Renders banners, summaries and verdicts, colored or plain
#[derive(Debug, Clone, Copy)]
pub struct ReportFormatter {
    use_color: bool,
}

impl ReportFormatter {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.use_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.use_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    /// Printed before collection starts
    pub fn collection_banner(&self, label: &str, tokens: [&Token; 2], count: u64) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Collecting {} samples for:", count);
        for (slot, token) in tokens.iter().enumerate() {
            let _ = writeln!(output, " - [{}] {}", slot, self.colorize(token.as_str(), Color::Cyan));
        }
        let _ = writeln!(output);
        let _ = write!(output, "Test name: {}", self.bold(label));
        output
    }

    /// Printed after collection ends, normally or not
    pub fn collection_summary(&self, label: &str, summary: &CollectionSummary) -> String {
        format!(
            "{} {} records stored under '{}' in {:.1}s (slot 0 first: {}, slot 1 first: {})",
            self.colorize("Collected", Color::Green),
            summary.records,
            label,
            summary.elapsed.as_secs_f64(),
            summary.slot_0_first,
            summary.slot_1_first,
        )
    }

    /// Known labels with their record counts
    pub fn label_listing(&self, labels: &BTreeMap<String, usize>) -> String {
        if labels.is_empty() {
            return self.colorize("No records stored.", Color::BrightBlack).to_string();
        }

        let width = labels.keys().map(|l| l.chars().count()).max().unwrap_or(0).max(5);
        let mut output = format!("{:<width$}  {:>8}", self.bold("LABEL"), self.bold("RECORDS"), width = width);
        for (label, count) in labels {
            let _ = write!(output, "\n{:<width$}  {:>8}", label, count, width = width);
        }
        output
    }

    /// Group summaries, the verdict and the legend
    pub fn analysis(&self, report: &AnalysisReport) -> String {
        let mut output = String::new();

        let heading = format!(
            "Rank-sum comparison ({}, {}{})",
            report.metric,
            report.metric.unit(),
            if report.tie_correction { ", tie-corrected" } else { "" }
        );
        if self.use_color {
            let _ = writeln!(output, "{}", heading.blue().bold());
        } else {
            let _ = writeln!(output, "{}", heading);
        }
        let _ = writeln!(output, "{}", self.group_line("a", &report.group_a, report.metric));
        let _ = writeln!(output, "{}", self.group_line("b", &report.group_b, report.metric));
        let _ = writeln!(output);

        let verdict = &report.verdict;
        let color = if verdict.is_significant(crate::defaults::SIGNIFICANCE_LEVEL) {
            Color::Red
        } else {
            Color::Green
        };
        let _ = writeln!(
            output,
            "MWW RankSum P for input samples: {}",
            self.colorize(&verdict.p_value.to_string(), color)
        );
        let _ = writeln!(output, "MWW RankSum Z for input samples: {}", verdict.statistic);
        let _ = writeln!(output);
        let _ = write!(output, "{}", VERDICT_LEGEND.join("\n"));
        output
    }

    fn group_line(&self, tag: &str, group: &GroupReport, metric: Metric) -> String {
        let s = &group.summary;
        let precision = match metric {
            Metric::Elapsed => 1,
            Metric::Runtime => 6,
        };
        let mut line = format!(
            "  {} {:<24} n={:<7} mean={:.p$} median={:.p$} p90={:.p$} min={:.p$} max={:.p$}",
            self.bold(tag),
            group.name,
            s.count,
            s.mean,
            s.median,
            s.p90,
            s.min,
            s.max,
            p = precision
        );
        if group.skipped > 0 {
            let _ = write!(
                line,
                " {}",
                self.colorize(&format!("({} skipped)", group.skipped), Color::Yellow)
            );
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{SampleSummary, Verdict};
    use crate::token::TokenForge;
    use std::time::Duration;

    fn report() -> AnalysisReport {
        let summary = SampleSummary::from_values(&[1.0, 2.0, 3.0]).unwrap();
        AnalysisReport {
            metric: Metric::Elapsed,
            tie_correction: false,
            group_a: GroupReport { name: "t1 slot 0".to_string(), summary, skipped: 0 },
            group_b: GroupReport { name: "t1 slot 1".to_string(), summary, skipped: 2 },
            verdict: Verdict { statistic: -2.5, p_value: 0.0124 },
        }
    }

    #[test]
    fn test_analysis_prints_verdict_and_legend() {
        let text = ReportFormatter::new(false).analysis(&report());

        assert!(text.contains("MWW RankSum P for input samples: 0.0124"));
        assert!(text.contains("MWW RankSum Z for input samples: -2.5"));
        assert!(text.ends_with(VERDICT_LEGEND[1]));
        assert!(text.contains(VERDICT_LEGEND[0]));
        assert!(text.contains("t1 slot 1"));
        assert!(text.contains("(2 skipped)"));
        assert!(text.contains("n=3"));
    }

    #[test]
    fn test_banner_lists_both_tokens() {
        let a = TokenForge::build("AAAA", "1", 3).unwrap();
        let b = TokenForge::build("AAAA", "2", 3).unwrap();
        let text = ReportFormatter::new(false).collection_banner("t1", [&a, &b], 50);

        assert!(text.starts_with("Collecting 50 samples for:"));
        assert!(text.contains(" - [0] AAAA100"));
        assert!(text.contains(" - [1] AAAA200"));
        assert!(text.ends_with("Test name: t1"));
    }

    #[test]
    fn test_label_listing() {
        let formatter = ReportFormatter::new(false);
        assert_eq!(formatter.label_listing(&BTreeMap::new()), "No records stored.");

        let labels = BTreeMap::from([("t1".to_string(), 50), ("baseline".to_string(), 10_000)]);
        let text = formatter.label_listing(&labels);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("baseline"));
        assert!(lines[2].trim_end().ends_with("50"));
    }

    #[test]
    fn test_collection_summary() {
        let summary = CollectionSummary {
            records: 50,
            slot_0_first: 27,
            slot_1_first: 23,
            elapsed: Duration::from_millis(1500),
        };
        let text = ReportFormatter::new(false).collection_summary("t1", &summary);
        assert_eq!(
            text,
            "Collected 50 records stored under 't1' in 1.5s (slot 0 first: 27, slot 1 first: 23)"
        );
    }
}
