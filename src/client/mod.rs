//! Clients for the council answering service
//!
//! Two collectors speak the same wire protocol: `StagedClient` drives the
//! full pipeline and captures per-stage payloads and latencies, while
//! `SingleStageClient` is the degraded single-model baseline that keeps only
//! the final answer text and total latency. Orchestration code works against
//! the `AnswerClient` trait so both (and test doubles) are interchangeable.

pub mod single;
pub mod staged;
pub mod traits;

pub use single::{BaselineResponse, SingleStageClient};
pub use staged::{Claim, CompositeResponse, CouncilRequest, StagedClient, SynthesisResult, VerificationResult};
pub use traits::{AnswerClient, ClaimCounts, QueryOutcome, StageLatencies, StageTimer};
