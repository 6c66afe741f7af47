//! Sequential benchmark runs
//!
//! Drives a question set through a client one request at a time, in order,
//! converting per-question failures into sentinel records so a batch always
//! yields exactly one result per question.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::judge::judge_response;
use crate::client::{AnswerClient, ClaimCounts, StageLatencies};
use crate::dataset::EvalQuestion;

/// Default delay between consecutive requests
const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// The immutable record of one evaluated question
///
/// A failed query is recorded, not retried: its sentinel carries an error
/// marker in `response`, `is_correct = false`, and `latency_ms = 0` (a
/// placeholder, not a measurement - aggregation excludes zero latencies).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub question: String,
    pub expected: String,
    pub response: String,
    pub is_correct: bool,
    pub latency_ms: f64,
    pub stage_latencies: StageLatencies,
    pub claim_counts: ClaimCounts,
}

impl RunResult {
    /// Build the record for a completed query, scoring the answer
    pub fn evaluated(question: &EvalQuestion, outcome: crate::client::QueryOutcome) -> Self {
        let is_correct = judge_response(&outcome.response, &question.expected);
        Self {
            question: question.question.clone(),
            expected: question.expected.clone(),
            response: outcome.response,
            is_correct,
            latency_ms: outcome.total_latency_ms,
            stage_latencies: outcome.stage_latencies,
            claim_counts: outcome.claim_counts,
        }
    }

    /// Build the sentinel record for a failed query
    pub fn failure(question: &EvalQuestion, reason: &str) -> Self {
        Self {
            question: question.question.clone(),
            expected: question.expected.clone(),
            response: format!("ERROR: {}", reason),
            is_correct: false,
            latency_ms: 0.0,
            stage_latencies: StageLatencies::default(),
            claim_counts: ClaimCounts::default(),
        }
    }

    /// Whether this record is a failure sentinel rather than a measurement
    pub fn is_failure(&self) -> bool {
        self.latency_ms == 0.0 && self.response.starts_with("ERROR:")
    }
}

/// Runs a question set through a client, one request at a time
pub struct BenchmarkRunner {
    pacing: Duration,
}

impl BenchmarkRunner {
    pub fn new() -> Self {
        Self {
            pacing: DEFAULT_PACING,
        }
    }

    /// Override the inter-request delay (tests use zero)
    pub fn with_pacing(pacing: Duration) -> Self {
        Self {
            pacing,
        }
    }

    /// Evaluate every question, in order
    ///
    /// Output order equals input order and the lengths always match: a
    /// failure becomes a sentinel record and the batch continues. The pacing
    /// delay follows every request, success or failure - it is a courtesy to
    /// the remote endpoint, not a backoff.
    pub async fn run(&self, client: &dyn AnswerClient, questions: &[EvalQuestion]) -> Vec<RunResult> {
        let mut results = Vec::with_capacity(questions.len());

        for (i, item) in questions.iter().enumerate() {
            let preview: String = item.question.chars().take(50).collect();
            eprintln!("  [{}/{}] {}...", i + 1, questions.len(), preview);

            let result = match client.ask(&item.question).await {
                Ok(outcome) => RunResult::evaluated(item, outcome),
                Err(err) => {
                    tracing::warn!("query failed for '{}': {:#}", preview, err);
                    RunResult::failure(item, &format!("{:#}", err))
                }
            };
            results.push(result);

            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        results
    }
}

impl Default for BenchmarkRunner {
    fn default() -> Self {
        Self::new()
    }
}
