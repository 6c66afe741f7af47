//! Ablation study
//!
//! Reruns the benchmark with pipeline features switched off one at a time to
//! measure each feature's contribution. The configuration set is closed and
//! runs strictly in order - the endpoint never sees concurrent ablation
//! traffic.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::runner::{BenchmarkRunner, RunResult};
use crate::client::{AnswerClient, StagedClient};
use crate::config::{EvalConfig, VerificationMode};
use crate::dataset::EvalQuestion;

/// The four fixed ablation configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AblationVariant {
    /// Cross-review and verification both on
    Full,
    /// Verification off
    NoVerification,
    /// Cross-review off
    NoCrossReview,
    /// Both off
    Minimal,
}

impl AblationVariant {
    /// All variants, in study order (Full first - deltas are relative to it)
    pub const ALL: [AblationVariant; 4] = [
        Self::Full,
        Self::NoVerification,
        Self::NoCrossReview,
        Self::Minimal,
    ];

    /// Display name used in reports
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Full => "Full Pipeline",
            Self::NoVerification => "No Verification",
            Self::NoCrossReview => "No Cross-Review",
            Self::Minimal => "Minimal (No Review, No Verify)",
        }
    }

    /// Whether stage 2 cross-review runs under this variant
    pub fn enable_cross_review(&self) -> bool {
        matches!(self, Self::Full | Self::NoVerification)
    }

    /// Stage 4 verification mode under this variant
    pub fn verification_mode(&self) -> VerificationMode {
        match self {
            Self::Full | Self::NoCrossReview => VerificationMode::Consistency,
            Self::NoVerification | Self::Minimal => VerificationMode::Off,
        }
    }
}

/// Reduced metrics for one ablation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AblationSummary {
    /// Fraction correct x 100, over every result including failures
    pub accuracy: f64,
    /// Mean latency over results with strictly positive latency; failure
    /// sentinels count against accuracy but not against latency
    pub avg_latency_ms: f64,
    /// Question-set size used for this run
    pub samples: usize,
}

impl AblationSummary {
    pub fn from_results(results: &[RunResult]) -> Self {
        let correct = results.iter().filter(|r| r.is_correct).count();
        let accuracy = correct as f64 / results.len() as f64 * 100.0;

        let latencies: Vec<f64> = results
            .iter()
            .map(|r| r.latency_ms)
            .filter(|l| *l > 0.0)
            .collect();
        let avg_latency_ms = latencies.iter().sum::<f64>() / latencies.len() as f64;

        Self {
            accuracy,
            avg_latency_ms,
            samples: results.len(),
        }
    }
}

/// Runs the benchmark once per ablation configuration
pub struct AblationStudy {
    pacing: Duration,
}

impl AblationStudy {
    pub fn new() -> Self {
        Self {
            pacing: Duration::from_secs(1),
        }
    }

    pub fn with_pacing(pacing: Duration) -> Self {
        Self {
            pacing,
        }
    }

    /// Run all four configurations against the configured endpoint
    ///
    /// A fresh collector is built for every configuration; configurations
    /// run back to back with no interleaving.
    pub async fn run(
        &self,
        config: &EvalConfig,
        questions: &[EvalQuestion],
    ) -> Result<Vec<(AblationVariant, AblationSummary)>> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        self.run_with(questions, |variant| {
            Ok(StagedClient::new(&config.endpoint, timeout)?
                .with_flags(
                    config.council_size,
                    variant.enable_cross_review(),
                    variant.verification_mode(),
                )
                .with_label(variant.display_name()))
        })
        .await
    }

    /// Run all four configurations with a caller-supplied client factory
    pub async fn run_with<C, F>(
        &self,
        questions: &[EvalQuestion],
        make_client: F,
    ) -> Result<Vec<(AblationVariant, AblationSummary)>>
    where
        C: AnswerClient,
        F: Fn(AblationVariant) -> Result<C>,
    {
        let runner = BenchmarkRunner::with_pacing(self.pacing);
        let mut summaries = Vec::with_capacity(AblationVariant::ALL.len());

        for variant in AblationVariant::ALL {
            eprintln!("\n  Testing: {}", variant.display_name());
            let client = make_client(variant)?;
            let results = runner.run(&client, questions).await;
            summaries.push((variant, AblationSummary::from_results(&results)));
        }

        Ok(summaries)
    }
}

impl Default for AblationStudy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::runner::tests::{question, ScriptedClient};
    use crate::client::{ClaimCounts, QueryOutcome, StageLatencies};

    #[test]
    fn test_variant_flags() {
        assert!(AblationVariant::Full.enable_cross_review());
        assert_eq!(
            AblationVariant::Full.verification_mode(),
            VerificationMode::Consistency
        );

        assert!(AblationVariant::NoVerification.enable_cross_review());
        assert_eq!(
            AblationVariant::NoVerification.verification_mode(),
            VerificationMode::Off
        );

        assert!(!AblationVariant::NoCrossReview.enable_cross_review());
        assert_eq!(
            AblationVariant::NoCrossReview.verification_mode(),
            VerificationMode::Consistency
        );

        assert!(!AblationVariant::Minimal.enable_cross_review());
        assert_eq!(AblationVariant::Minimal.verification_mode(), VerificationMode::Off);
    }

    #[test]
    fn test_summary_excludes_failures_from_latency_mean() {
        let questions = [
            question("q0", "alpha"),
            question("q1", "beta"),
        ];
        let results = vec![
            RunResult::evaluated(
                &questions[0],
                QueryOutcome {
                    response: "alpha".to_string(),
                    total_latency_ms: 200.0,
                    stage_latencies: StageLatencies::default(),
                    claim_counts: ClaimCounts::default(),
                },
            ),
            RunResult::failure(&questions[1], "boom"),
        ];

        let summary = AblationSummary::from_results(&results);
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.accuracy, 50.0);
        // The failure's zero latency is excluded, not averaged in.
        assert_eq!(summary.avg_latency_ms, 200.0);
    }

    #[tokio::test]
    async fn test_study_covers_all_variants_in_order() {
        let questions = vec![question("q0", "alpha"), question("q1", "beta")];

        let study = AblationStudy::with_pacing(Duration::ZERO);
        let summaries = study
            .run_with(&questions, |_variant| {
                Ok(ScriptedClient::new(vec!["alpha", "beta"], vec![]))
            })
            .await
            .unwrap();

        let names: Vec<&str> = summaries
            .iter()
            .map(|(v, _)| v.display_name())
            .collect();
        assert_eq!(
            names,
            vec![
                "Full Pipeline",
                "No Verification",
                "No Cross-Review",
                "Minimal (No Review, No Verify)"
            ]
        );
        for (_, summary) in &summaries {
            assert_eq!(summary.samples, 2);
            assert_eq!(summary.accuracy, 100.0);
        }
    }
}
