//! Ordered response writing for pipelined connections.
//!
//! A connection may read request `n + 1` while the response of request `n` is still being
//! produced. Every fully read request becomes a [`Call`]; its handler answers through the
//! matching [`Responder`] whenever it is done. The [`Pipeline`] writes the answers strictly
//! in arrival order, picks a write [`Strategy`] for each body and batches flushes.
//!
//! The pieces:
//!
//! - [`Call`] and [`Responder`]: one request/response exchange and its lifecycle
//! - [`Pipeline`] and [`PipelineHandle`]: the engine driving the write side and its input
//! - [`PipelineConfig`]: flush threshold, small body threshold and queue bounds
//! - [`PipelineMetrics`]: counters shared by every pipeline that reports into them

mod call;
mod config;
mod engine;
mod flush;
mod metrics;
mod queue;
mod strategy;

#[cfg(test)]
mod testing;

pub use call::{Call, CallState, Responder};
pub use config::{DEFAULT_FLUSH_THRESHOLD, DEFAULT_SMALL_BODY_THRESHOLD, PipelineConfig};
pub use engine::{Pipeline, PipelineHandle, PipelineOutcome};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use strategy::Strategy;
