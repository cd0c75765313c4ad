//! Producer-page bot: per-page processing, the run report, and end-to-end
//! orchestration on top of the generic work pipeline.

pub mod bot;
pub mod collaborators;
pub mod producer;
pub mod report;

#[cfg(test)]
mod testing;

pub use bot::{
    ProgressReporter, RunMode, RunOptions, RunSummary, SilentProgress, run_producer_pages,
    run_with,
};
pub use collaborators::{CategoryIndex, DocumentStore};
pub use producer::{EditStats, PageReport, ProducerPageProcessor};
pub use report::render_report;
