//! End-to-end producer-page run: login, page source, pipeline, summary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use tracing::{Instrument, error, info, info_span, warn};

use pagebot_pipeline::{Pipeline, PipelineConfig, PipelineState};
use pagebot_shared::{AppConfig, Result, RunConfig, RunId, validate_credentials};
use pagebot_wiki::WikiClient;

use crate::collaborators::{CategoryIndex, DocumentStore};
use crate::producer::{EditStats, ProducerPageProcessor};

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each page, with the number of pages checked so far.
    fn page_checked(&self, title: &str, checked: usize);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_checked(&self, _title: &str, _checked: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Which producer pages to visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Every page of the producers category, optionally starting at a sort key prefix.
    All { from: Option<String> },
    /// Exactly one page; no report is written.
    Single(String),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: RunMode,
    pub run: RunConfig,
}

/// Result of a producer-page run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunId,
    pub pages_checked: usize,
    /// Edited pages, in completion order.
    pub edited: Vec<String>,
    /// `(page, message)` for pages that need manual intervention.
    pub errors: Vec<(String, String)>,
    /// Song and album pages left for manual addition.
    pub unplaced: usize,
    pub songs_added: usize,
    pub albums_added: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    fn new(
        run_id: RunId,
        state: &PipelineState<EditStats, Vec<String>>,
        elapsed: Duration,
    ) -> Self {
        let (songs_added, albums_added) = state
            .successes
            .iter()
            .fold((0, 0), |(songs, albums), (_, stats)| {
                (songs + stats.songs_added, albums + stats.albums_added)
            });
        Self {
            run_id,
            pages_checked: state.acknowledged,
            edited: state.modified.clone(),
            errors: state.errors.clone(),
            unplaced: state.failures.iter().map(|(_, entries)| entries.len()).sum(),
            songs_added,
            albums_added,
            elapsed,
        }
    }
}

/// Run the producer-page bot against the configured wiki.
///
/// Without credentials a dry run reads anonymously; a real run fails.
pub async fn run_producer_pages(
    config: &AppConfig,
    options: RunOptions,
    progress: Arc<dyn ProgressReporter>,
) -> Result<RunSummary> {
    let client = WikiClient::new(&config.wiki)?.with_dry_run(options.run.dry_run);

    progress.phase("Logging in");
    match validate_credentials(config) {
        Ok(credentials) => client.login(&credentials).await?,
        Err(e) if options.run.dry_run => {
            warn!(error = %e, "no credentials, continuing anonymously");
        }
        Err(e) => return Err(e),
    }

    let single_page = matches!(options.mode, RunMode::Single(_));
    let processor = ProducerPageProcessor::new(
        client.clone(),
        client.clone(),
        config.producer_pages.clone(),
        Arc::clone(&progress),
    )
    .single_page(single_page);

    let source: BoxStream<'static, String> = match options.mode {
        RunMode::Single(title) => stream::iter([title]).boxed(),
        RunMode::All { from } => client
            .category_stream(&config.producer_pages.category, from.as_deref())
            .filter_map(|listed| async move {
                match listed {
                    Ok(title) => Some(title),
                    Err(e) => {
                        error!(error = %e, "failed to list producer pages");
                        None
                    }
                }
            })
            .boxed(),
    };

    run_with(
        processor,
        source,
        PipelineConfig::from(&options.run),
        progress.as_ref(),
    )
    .await
}

/// Run `processor` over `source` and summarize the outcome.
pub async fn run_with<D, C, S>(
    processor: ProducerPageProcessor<D, C>,
    source: S,
    pipeline_config: PipelineConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary>
where
    D: DocumentStore,
    C: CategoryIndex,
    S: Stream<Item = String>,
{
    let run_id = RunId::new();
    let span = info_span!("run", %run_id);

    async move {
        let started = Instant::now();
        info!(
            category = %processor.settings().category,
            concurrency = pipeline_config.concurrency,
            queue_capacity = pipeline_config.queue_capacity,
            "starting producer page run"
        );

        let pipeline = Pipeline::new(pipeline_config, processor)?;
        progress.phase("Checking producer pages");
        let state = pipeline.run(source).await;

        let summary = RunSummary::new(run_id, &state, started.elapsed());
        progress.done(&summary);
        info!(
            pages_checked = summary.pages_checked,
            edited = summary.edited.len(),
            errors = summary.errors.len(),
            unplaced = summary.unplaced,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "run complete"
        );
        Ok(summary)
    }
    .instrument(span)
    .await
}
