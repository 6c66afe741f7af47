//! Summary statistics and the report model
//!
//! Reduces the collected run results into a structured `EvalReport` and
//! renders it to markdown. The statistics assume non-empty inputs the same
//! way the measurements assume a reachable endpoint: degenerate inputs
//! (no results, zero baseline accuracy, zero claims) surface as IEEE
//! NaN/inf values or an index panic rather than being silently patched.

use chrono::Local;
use serde::Serialize;

use super::ablation::{AblationSummary, AblationVariant};
use super::runner::RunResult;
use crate::protocol::StageId;

// =============================================================================
// STATISTICS
// =============================================================================

/// Arithmetic mean; NaN on an empty slice
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median: middle value, or the midpoint of the two middles; NaN on empty
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// 95th percentile by the truncating index rule: the element at index
/// `(n x 0.95) as usize` of the ascending-sorted list
///
/// Deliberately not a nearest-rank or interpolating formula - reports
/// produced across versions must agree on the exact element picked.
/// Panics on an empty slice.
pub fn p95(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted[(sorted.len() as f64 * 0.95) as usize]
}

/// Fraction of correct results x 100; NaN on an empty slice
pub fn accuracy(results: &[RunResult]) -> f64 {
    let correct = results.iter().filter(|r| r.is_correct).count();
    correct as f64 / results.len() as f64 * 100.0
}

/// Strictly positive latencies (failure sentinels carry latency 0)
fn positive_latencies(results: &[RunResult]) -> Vec<f64> {
    results
        .iter()
        .map(|r| r.latency_ms)
        .filter(|l| *l > 0.0)
        .collect()
}

// =============================================================================
// REPORT MODEL
// =============================================================================

/// Mean and tail latency for one result set
#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub mean_ms: f64,
    pub p95_ms: f64,
}

impl LatencySummary {
    fn from_results(results: &[RunResult]) -> Self {
        let latencies = positive_latencies(results);
        if latencies.is_empty() {
            return Self {
                mean_ms: f64::NAN,
                p95_ms: f64::NAN,
            };
        }
        Self {
            mean_ms: mean(&latencies),
            p95_ms: p95(&latencies),
        }
    }
}

/// Aggregated verification-claim outcomes with shares of the total
#[derive(Debug, Clone, Serialize)]
pub struct ClaimStats {
    pub verified: usize,
    pub uncertain: usize,
    pub contradicted: usize,
    pub total: usize,
    pub verified_pct: f64,
    pub uncertain_pct: f64,
    pub contradicted_pct: f64,
}

impl ClaimStats {
    fn from_results(results: &[RunResult]) -> Self {
        let verified: usize = results.iter().map(|r| r.claim_counts.verified).sum();
        let uncertain: usize = results.iter().map(|r| r.claim_counts.uncertain).sum();
        let contradicted: usize = results.iter().map(|r| r.claim_counts.contradicted).sum();
        let total = verified + uncertain + contradicted;

        let pct = |count: usize| count as f64 / total as f64 * 100.0;
        Self {
            verified,
            uncertain,
            contradicted,
            total,
            verified_pct: pct(verified),
            uncertain_pct: pct(uncertain),
            contradicted_pct: pct(contradicted),
        }
    }
}

/// Latency statistics for one pipeline stage, over runs that captured it
#[derive(Debug, Clone, Serialize)]
pub struct StageLatencyStats {
    pub stage: String,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub samples: usize,
}

/// One row of the ablation table
#[derive(Debug, Clone, Serialize)]
pub struct AblationRow {
    pub name: String,
    pub accuracy: f64,
    pub delta_from_full: f64,
    pub avg_latency_ms: f64,
    pub samples: usize,
}

/// One row of the per-question detail table
#[derive(Debug, Clone, Serialize)]
pub struct DetailRow {
    pub index: usize,
    pub question: String,
    pub is_correct: bool,
    pub latency_ms: f64,
}

/// The structured evaluation report
///
/// Rendering (`to_markdown` or JSON serialization) is a pure function of
/// this model; nothing here goes back into measurement.
#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub generated_at: String,
    pub samples: usize,
    pub pipeline_accuracy: f64,
    pub baseline_accuracy: f64,
    /// Absolute difference in percentage points
    pub accuracy_delta: f64,
    /// `(pipeline/baseline - 1) x 100`; inf when baseline accuracy is zero
    pub relative_improvement_pct: f64,
    pub pipeline_latency: LatencySummary,
    pub baseline_latency: LatencySummary,
    pub claims: ClaimStats,
    pub stage_stats: Vec<StageLatencyStats>,
    pub ablation: Vec<AblationRow>,
    pub details: Vec<DetailRow>,
}

impl EvalReport {
    /// Reduce the collected results into the report model
    pub fn compute(
        pipeline: &[RunResult],
        baseline: &[RunResult],
        ablation: &[(AblationVariant, AblationSummary)],
    ) -> Self {
        let pipeline_accuracy = accuracy(pipeline);
        let baseline_accuracy = accuracy(baseline);

        // Deltas are relative to the Full Pipeline row; zero if it is absent.
        let full_accuracy = ablation
            .iter()
            .find(|(v, _)| *v == AblationVariant::Full)
            .map(|(_, s)| s.accuracy)
            .unwrap_or(0.0);

        let ablation_rows = ablation
            .iter()
            .map(|(variant, summary)| AblationRow {
                name: variant.display_name().to_string(),
                accuracy: summary.accuracy,
                delta_from_full: summary.accuracy - full_accuracy,
                avg_latency_ms: summary.avg_latency_ms,
                samples: summary.samples,
            })
            .collect();

        let details = pipeline
            .iter()
            .enumerate()
            .map(|(i, r)| DetailRow {
                index: i + 1,
                question: r.question.chars().take(40).collect(),
                is_correct: r.is_correct,
                latency_ms: r.latency_ms,
            })
            .collect();

        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            samples: pipeline.len(),
            pipeline_accuracy,
            baseline_accuracy,
            accuracy_delta: pipeline_accuracy - baseline_accuracy,
            relative_improvement_pct: (pipeline_accuracy / baseline_accuracy - 1.0) * 100.0,
            pipeline_latency: LatencySummary::from_results(pipeline),
            baseline_latency: LatencySummary::from_results(baseline),
            claims: ClaimStats::from_results(pipeline),
            stage_stats: stage_stats(pipeline),
            ablation: ablation_rows,
            details,
        }
    }

    /// Render the report as a markdown document
    pub fn to_markdown(&self) -> String {
        let mut lines = Vec::new();

        lines.push("# Council Evaluation Results".to_string());
        lines.push(String::new());
        lines.push(format!("Generated: {}", self.generated_at));
        lines.push(String::new());

        lines.push("## Summary".to_string());
        lines.push(String::new());
        lines.push("| Metric | Full Pipeline | Baseline | Improvement |".to_string());
        lines.push("|--------|---------------|----------|-------------|".to_string());
        lines.push(format!(
            "| **Accuracy** | {:.1}% | {:.1}% | {:+.1}% |",
            self.pipeline_accuracy, self.baseline_accuracy, self.accuracy_delta
        ));
        lines.push(format!(
            "| **Avg Latency** | {:.0}ms | {:.0}ms | — |",
            self.pipeline_latency.mean_ms, self.baseline_latency.mean_ms
        ));
        lines.push(format!(
            "| **P95 Latency** | {:.0}ms | {:.0}ms | — |",
            self.pipeline_latency.p95_ms, self.baseline_latency.p95_ms
        ));
        lines.push(String::new());

        lines.push("## Relative Improvement".to_string());
        lines.push(String::new());
        lines.push(format!(
            "- **Accuracy improvement**: {:.1}% relative improvement",
            self.relative_improvement_pct
        ));
        lines.push(format!("- **Samples evaluated**: {}", self.samples));
        lines.push(String::new());

        lines.push("## Verification Analysis".to_string());
        lines.push(String::new());
        lines.push("| Label | Count | Percentage |".to_string());
        lines.push("|-------|-------|------------|".to_string());
        lines.push(format!(
            "| Verified/Consistent | {} | {:.1}% |",
            self.claims.verified, self.claims.verified_pct
        ));
        lines.push(format!(
            "| Uncertain | {} | {:.1}% |",
            self.claims.uncertain, self.claims.uncertain_pct
        ));
        lines.push(format!(
            "| Contradicted | {} | {:.1}% |",
            self.claims.contradicted, self.claims.contradicted_pct
        ));
        lines.push(String::new());

        if !self.ablation.is_empty() {
            lines.push("## Ablation Study Results".to_string());
            lines.push(String::new());
            lines.push("| Configuration | Accuracy | Δ from Full | Avg Latency |".to_string());
            lines.push("|---------------|----------|-------------|-------------|".to_string());
            for row in &self.ablation {
                lines.push(format!(
                    "| {} | {:.1}% | {:+.1}% | {:.0}ms |",
                    row.name, row.accuracy, row.delta_from_full, row.avg_latency_ms
                ));
            }
            lines.push(String::new());
        }

        if !self.stage_stats.is_empty() {
            lines.push("## Stage Latency Breakdown".to_string());
            lines.push(String::new());
            lines.push("| Stage | Avg (ms) | P50 (ms) | P95 (ms) |".to_string());
            lines.push("|-------|----------|----------|----------|".to_string());
            for stat in &self.stage_stats {
                lines.push(format!(
                    "| {} | {:.0} | {:.0} | {:.0} |",
                    stat.stage.to_uppercase(),
                    stat.mean_ms,
                    stat.median_ms,
                    stat.p95_ms
                ));
            }
            lines.push(String::new());
        }

        if !self.details.is_empty() {
            lines.push("## Detailed Results".to_string());
            lines.push(String::new());
            lines.push("<details>".to_string());
            lines.push("<summary>Click to expand individual results</summary>".to_string());
            lines.push(String::new());
            lines.push("| # | Question (truncated) | Correct | Latency |".to_string());
            lines.push("|---|---------------------|---------|---------|".to_string());
            for row in &self.details {
                let status = if row.is_correct { "✓" } else { "✗" };
                lines.push(format!(
                    "| {} | {}... | {} | {:.0}ms |",
                    row.index, row.question, status, row.latency_ms
                ));
            }
            lines.push(String::new());
            lines.push("</details>".to_string());
        }

        lines.join("\n")
    }
}

/// Per-stage latency statistics over the runs that captured each stage
///
/// Stages with no captured samples are omitted entirely: absence is "no
/// measurement", and must not contribute zeros to any denominator.
fn stage_stats(results: &[RunResult]) -> Vec<StageLatencyStats> {
    StageId::ALL
        .iter()
        .filter_map(|stage| {
            let latencies: Vec<f64> = results
                .iter()
                .filter_map(|r| r.stage_latencies.get(*stage))
                .collect();
            if latencies.is_empty() {
                return None;
            }
            let p95_ms = if latencies.len() > 1 {
                p95(&latencies)
            } else {
                latencies[0]
            };
            Some(StageLatencyStats {
                stage: stage.key().to_string(),
                mean_ms: mean(&latencies),
                median_ms: median(&latencies),
                p95_ms,
                samples: latencies.len(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClaimCounts, StageLatencies};

    fn result(is_correct: bool, latency_ms: f64) -> RunResult {
        RunResult {
            question: "What is the capital of Australia?".to_string(),
            expected: "Canberra".to_string(),
            response: "Canberra".to_string(),
            is_correct,
            latency_ms,
            stage_latencies: StageLatencies::default(),
            claim_counts: ClaimCounts::default(),
        }
    }

    fn results(correct: usize, total: usize) -> Vec<RunResult> {
        (0..total)
            .map(|i| result(i < correct, 100.0 + i as f64))
            .collect()
    }

    #[test]
    fn test_mean_and_median() {
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        // Even length averages the two middles.
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn test_p95_truncating_index_rule() {
        // Length 20: index (20 x 0.95) as usize = 19, the last element.
        let values: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(p95(&values), values[(values.len() as f64 * 0.95) as usize]);
        assert_eq!(p95(&values), 20.0);

        // Length 21: 19.95 truncates to 19 - a nearest-rank formula would
        // round up to 20. This pins the truncation.
        let values: Vec<f64> = (1..=21).map(f64::from).collect();
        assert_eq!(p95(&values), 20.0);

        // Single element.
        assert_eq!(p95(&[7.0]), 7.0);

        // Sorts before indexing.
        assert_eq!(p95(&[5.0, 1.0, 3.0]), 5.0);
    }

    #[test]
    fn test_accuracy_and_relative_improvement() {
        let pipeline = results(8, 10);
        let baseline = results(5, 10);

        let report = EvalReport::compute(&pipeline, &baseline, &[]);
        assert_eq!(report.pipeline_accuracy, 80.0);
        assert_eq!(report.baseline_accuracy, 50.0);
        assert_eq!(report.accuracy_delta, 30.0);
        // ((0.8 / 0.5) - 1) x 100 = 60.0
        assert!((report.relative_improvement_pct - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_relative_improvement_diverges_on_zero_baseline() {
        let pipeline = results(8, 10);
        let baseline = results(0, 10);

        let report = EvalReport::compute(&pipeline, &baseline, &[]);
        assert!(report.relative_improvement_pct.is_infinite());
    }

    #[test]
    fn test_latency_summary_skips_failure_sentinels() {
        let mut pipeline = results(2, 2);
        pipeline[0].latency_ms = 100.0;
        pipeline[1].latency_ms = 0.0; // sentinel

        let report = EvalReport::compute(&pipeline, &pipeline.clone(), &[]);
        assert_eq!(report.pipeline_latency.mean_ms, 100.0);
        assert_eq!(report.pipeline_latency.p95_ms, 100.0);
    }

    #[test]
    fn test_claim_aggregation() {
        let mut pipeline = results(2, 2);
        pipeline[0].claim_counts = ClaimCounts {
            verified: 3,
            uncertain: 1,
            contradicted: 0,
        };
        pipeline[1].claim_counts = ClaimCounts {
            verified: 1,
            uncertain: 0,
            contradicted: 1,
        };

        let report = EvalReport::compute(&pipeline, &pipeline.clone(), &[]);
        assert_eq!(report.claims.verified, 4);
        assert_eq!(report.claims.uncertain, 1);
        assert_eq!(report.claims.contradicted, 1);
        assert_eq!(report.claims.total, 6);
        assert!((report.claims.verified_pct - 4.0 / 6.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_stage_stats_cover_only_captured_stages() {
        let mut pipeline = results(3, 3);
        pipeline[0].stage_latencies.set(StageId::Stage1, 10.0);
        pipeline[1].stage_latencies.set(StageId::Stage1, 30.0);
        pipeline[2].stage_latencies.set(StageId::Stage3, 40.0);

        let report = EvalReport::compute(&pipeline, &pipeline.clone(), &[]);

        let stages: Vec<&str> = report.stage_stats.iter().map(|s| s.stage.as_str()).collect();
        assert_eq!(stages, vec!["stage1", "stage3"]);

        let stage1 = &report.stage_stats[0];
        assert_eq!(stage1.samples, 2);
        assert_eq!(stage1.mean_ms, 20.0);
        assert_eq!(stage1.median_ms, 20.0);

        // A single sample is its own p95.
        let stage3 = &report.stage_stats[1];
        assert_eq!(stage3.samples, 1);
        assert_eq!(stage3.p95_ms, 40.0);
    }

    #[test]
    fn test_ablation_rows_delta_from_full() {
        let ablation = vec![
            (
                AblationVariant::Full,
                AblationSummary {
                    accuracy: 80.0,
                    avg_latency_ms: 900.0,
                    samples: 10,
                },
            ),
            (
                AblationVariant::Minimal,
                AblationSummary {
                    accuracy: 60.0,
                    avg_latency_ms: 300.0,
                    samples: 10,
                },
            ),
        ];

        let report = EvalReport::compute(&results(8, 10), &results(5, 10), &ablation);
        assert_eq!(report.ablation.len(), 2);
        assert_eq!(report.ablation[0].delta_from_full, 0.0);
        assert_eq!(report.ablation[1].delta_from_full, -20.0);
    }

    #[test]
    fn test_markdown_contains_all_sections() {
        let mut pipeline = results(8, 10);
        pipeline[0].stage_latencies.set(StageId::Stage1, 10.0);
        pipeline[0].claim_counts.verified = 2;
        let ablation = vec![(
            AblationVariant::Full,
            AblationSummary {
                accuracy: 80.0,
                avg_latency_ms: 900.0,
                samples: 10,
            },
        )];

        let report = EvalReport::compute(&pipeline, &results(5, 10), &ablation);
        let markdown = report.to_markdown();

        assert!(markdown.contains("# Council Evaluation Results"));
        assert!(markdown.contains("| **Accuracy** | 80.0% | 50.0% | +30.0% |"));
        assert!(markdown.contains("## Ablation Study Results"));
        assert!(markdown.contains("| Full Pipeline | 80.0% | +0.0% | 900ms |"));
        assert!(markdown.contains("| STAGE1 |"));
        assert!(markdown.contains("<details>"));
    }
}
