//! Client trait abstraction
//!
//! Defines a common interface for the full-pipeline and baseline collectors,
//! so orchestration and tests are independent of the concrete client.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::protocol::StageId;

/// Wall-clock latency per pipeline stage, in milliseconds
///
/// A stage's entry is present only if its completion event arrived. Values
/// are gaps between consecutive stage boundaries, not independent stage
/// durations: together with the time after the last stage they partition the
/// request's wall-clock time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StageLatencies {
    pub stage1: Option<f64>,
    pub stage2: Option<f64>,
    pub stage3: Option<f64>,
    pub stage4: Option<f64>,
}

impl StageLatencies {
    pub fn get(&self, stage: StageId) -> Option<f64> {
        match stage {
            StageId::Stage1 => self.stage1,
            StageId::Stage2 => self.stage2,
            StageId::Stage3 => self.stage3,
            StageId::Stage4 => self.stage4,
        }
    }

    pub fn set(&mut self, stage: StageId, latency_ms: f64) {
        let slot = match stage {
            StageId::Stage1 => &mut self.stage1,
            StageId::Stage2 => &mut self.stage2,
            StageId::Stage3 => &mut self.stage3,
            StageId::Stage4 => &mut self.stage4,
        };
        *slot = Some(latency_ms);
    }

    /// Number of stages with a captured latency
    pub fn captured(&self) -> usize {
        StageId::ALL.iter().filter(|s| self.get(**s).is_some()).count()
    }
}

/// Verification-claim outcomes aggregated from a stage-4 payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimCounts {
    /// Claims labeled verified or consistent
    pub verified: usize,
    /// Claims labeled uncertain
    pub uncertain: usize,
    /// Claims labeled contradicted
    pub contradicted: usize,
}

impl ClaimCounts {
    pub fn total(&self) -> usize {
        self.verified + self.uncertain + self.contradicted
    }
}

/// What a client hands back for one evaluated question
///
/// The baseline client leaves `stage_latencies` and `claim_counts` empty;
/// that absence means "no measurement", never zero.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Final answer text (empty if the synthesis stage never arrived)
    pub response: String,
    /// Elapsed time from request start to stream completion
    pub total_latency_ms: f64,
    /// Per-stage latency partition, where captured
    pub stage_latencies: StageLatencies,
    /// Verification-claim counts, where captured
    pub claim_counts: ClaimCounts,
}

/// Unified trait for council-service clients
///
/// All collectors implement this trait so a benchmark run can drive the full
/// pipeline, the baseline, or a test double through the same loop.
#[async_trait::async_trait]
pub trait AnswerClient: Send + Sync {
    /// Human-readable label for progress output
    fn label(&self) -> &str;

    /// Submit one question and collect the streamed response
    ///
    /// One outbound request per call; no retries. Transport and protocol
    /// errors propagate to the caller.
    async fn ask(&self, question: &str) -> Result<QueryOutcome>;
}

/// Running stage-boundary clock for one request
///
/// Holds the request start and the previous stage boundary; each `mark`
/// returns the gap since that boundary and advances it. Owned by a single
/// collector call, so concurrent runs cannot interfere.
#[derive(Debug)]
pub struct StageTimer {
    start: Instant,
    boundary: Instant,
}

impl StageTimer {
    /// Start the clock; call immediately before issuing the request
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            boundary: now,
        }
    }

    /// Close the current stage: return the time since the previous boundary
    /// (or since start, for the first stage) and reset the boundary to now
    pub fn mark(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.boundary).as_secs_f64() * 1000.0;
        self.boundary = now;
        elapsed_ms
    }

    /// Total elapsed time since the request started
    pub fn total_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}
