//! Council evaluation library
//!
//! Provides tools for benchmarking multi-stage council answering services:
//! streamed response collection, per-stage latency measurement, lexical
//! answer scoring, and ablation studies.

pub mod benchmark;
pub mod client;
pub mod config;
pub mod dataset;
pub mod protocol;
