//! Concurrent bounded-queue work pipeline.
//!
//! Drives an [`ItemHandler`] over a stream of [`WorkItem`]s with a fixed
//! worker pool, bounded in-flight work, and a single aggregate
//! [`PipelineState`] handed to the handler's finalize hook.

mod engine;
mod outcome;

pub use engine::{ItemHandler, Pipeline, PipelineConfig, WorkItem};
pub use outcome::{ItemReport, Outcome, PipelineState};
