//! Single-model baseline collector
//!
//! Speaks the identical wire protocol with cross-review disabled,
//! verification off, and a council of one, and keeps strictly less of the
//! response: only the stage-3 answer text and the end-to-end latency. Exists
//! to give the full pipeline a comparable baseline.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::time::Duration;

use super::staged::{CouncilRequest, SynthesisResult};
use super::traits::{AnswerClient, QueryOutcome, StageTimer};
use crate::protocol::{EventStreamParser, LineBuffer, StageId};

/// What the baseline keeps from a response
#[derive(Debug, Clone, Default)]
pub struct BaselineResponse {
    /// Stage-3 answer text, empty if synthesis never completed
    pub response: String,
    /// Elapsed time from request start to stream completion
    pub latency_ms: f64,
}

/// Client that queries the service as a single model
pub struct SingleStageClient {
    http: reqwest::Client,
    endpoint: String,
    label: String,
}

impl SingleStageClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            label: "Single Model Baseline".to_string(),
        })
    }

    /// Submit one question and keep only the final answer and total latency
    pub async fn query(&self, question: &str) -> Result<BaselineResponse> {
        let url = format!("{}/api/chat", self.endpoint.trim_end_matches('/'));
        let request = CouncilRequest {
            message: question.to_string(),
            council_size: 1,
            enable_cross_review: false,
            verification_mode: "off".to_string(),
        };

        let timer = StageTimer::start();

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {} from {}: {}", status, url, body);
        }

        let mut answer = String::new();
        let mut parser = EventStreamParser::new();
        let mut lines = LineBuffer::new();

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Response stream aborted")?;
            for line in lines.push_chunk(&chunk) {
                if let Some(event) = parser.feed_line(&line) {
                    extract_answer(&mut answer, event);
                }
            }
        }
        if let Some(line) = lines.flush() {
            if let Some(event) = parser.feed_line(&line) {
                extract_answer(&mut answer, event);
            }
        }

        Ok(BaselineResponse {
            response: answer,
            latency_ms: timer.total_ms(),
        })
    }
}

/// Capture the stage-3 answer text; all other events are discarded
fn extract_answer(answer: &mut String, event: crate::protocol::StageEvent) {
    if event.stage() != Some(StageId::Stage3) {
        return;
    }
    let synthesis: SynthesisResult = event
        .payload
        .get("result")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    *answer = synthesis.final_answer;
}

#[async_trait::async_trait]
impl AnswerClient for SingleStageClient {
    fn label(&self) -> &str {
        &self.label
    }

    async fn ask(&self, question: &str) -> Result<QueryOutcome> {
        let baseline = self.query(question).await?;
        // No stage breakdown and no claims: absent measurements, not zeros.
        Ok(QueryOutcome {
            response: baseline.response,
            total_latency_ms: baseline.latency_ms,
            stage_latencies: Default::default(),
            claim_counts: Default::default(),
        })
    }
}
