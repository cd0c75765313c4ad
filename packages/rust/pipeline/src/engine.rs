//! Bounded producer/worker pipeline.
//!
//! One producer pulls items from a stream into a bounded queue; a fixed pool
//! of workers drains it, runs the [`ItemHandler`] on each item and folds the
//! outcome into a shared [`PipelineState`] under one lock.
//!
//! Every queued item holds a slot permit until its outcome is recorded. The
//! producer takes a slot before pulling the next item, so at most
//! `queue_capacity` items are ever between "pulled" and "acknowledged". Once the
//! producer is done, reclaiming every slot is the join barrier.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_channel::{Receiver, Sender};
use futures::{FutureExt, Stream, StreamExt};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use pagebot_shared::{PageBotError, Result, RunConfig};

use crate::outcome::{Outcome, PipelineState};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// One unit of input, identified by a document id.
pub trait WorkItem: Send + 'static {
    fn id(&self) -> &str;
}

impl WorkItem for String {
    fn id(&self) -> &str {
        self
    }
}

/// Per-item business logic injected into the pipeline.
///
/// Handlers report failures through the returned [`Outcome`] instead of
/// propagating them.
pub trait ItemHandler<T: WorkItem>: Send + Sync + 'static {
    /// Payload recorded for successful items.
    type Success: Send + Sync + 'static;
    /// Payload recorded for items that need manual follow-up.
    type Failure: Send + Sync + 'static;

    fn process_item(
        &self,
        item: T,
    ) -> impl Future<Output = Outcome<Self::Success, Self::Failure>> + Send;

    /// Runs once after all items are acknowledged and the workers are gone.
    fn finalize(
        &self,
        _state: &PipelineState<Self::Success, Self::Failure>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Sizing of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of workers.
    pub concurrency: usize,
    /// Maximum number of pulled but unacknowledged items.
    pub queue_capacity: usize,
    /// Time budget per item; `None` lets handlers run unbounded.
    pub item_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 100,
            queue_capacity: 500,
            item_timeout: None,
        }
    }
}

impl From<&RunConfig> for PipelineConfig {
    fn from(run: &RunConfig) -> Self {
        Self {
            concurrency: run.concurrency,
            queue_capacity: run.queue_capacity,
            item_timeout: run.item_timeout,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(PageBotError::config("concurrency must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(PageBotError::config("queue capacity must be at least 1"));
        }
        if self.queue_capacity > Semaphore::MAX_PERMITS || u32::try_from(self.queue_capacity).is_err()
        {
            return Err(PageBotError::config(format!(
                "queue capacity {} is too large",
                self.queue_capacity
            )));
        }
        if self.item_timeout.is_some_and(|t| t.is_zero()) {
            return Err(PageBotError::config("item timeout must be positive"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A queued item and the slot it occupies. Dropping the ticket acknowledges it.
struct Ticket<T> {
    item: T,
    slot: OwnedSemaphorePermit,
}

/// Generic bounded-queue pipeline around an [`ItemHandler`].
pub struct Pipeline<H> {
    config: PipelineConfig,
    handler: Arc<H>,
}

impl<H> Pipeline<H> {
    /// Create a pipeline, rejecting unusable sizing.
    pub fn new(config: PipelineConfig, handler: H) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            handler: Arc::new(handler),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Process every item of `source` and return the aggregated outcomes.
    ///
    /// Returns after the finalize hook has run. The pipeline itself never
    /// fails; a panicking or timed-out handler yields a failed outcome.
    #[instrument(skip_all, fields(concurrency = self.config.concurrency, queue_capacity = self.config.queue_capacity))]
    pub async fn run<T, S>(&self, source: S) -> PipelineState<H::Success, H::Failure>
    where
        T: WorkItem,
        H: ItemHandler<T>,
        S: Stream<Item = T>,
    {
        let started = Instant::now();
        let capacity = self.config.queue_capacity;
        let slots = Arc::new(Semaphore::new(capacity));
        let (tx, rx) = async_channel::bounded::<Ticket<T>>(capacity);
        let state = Arc::new(Mutex::new(PipelineState::default()));

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.concurrency {
            workers.spawn(worker(
                worker_id,
                rx.clone(),
                Arc::clone(&self.handler),
                Arc::clone(&state),
                self.config.item_timeout,
            ));
        }
        drop(rx);

        let produced = produce(source, &tx, &slots).await;
        debug!(produced, "producer finished");

        // Join barrier: every slot back means every item was acknowledged.
        let barrier = slots
            .acquire_many(capacity as u32)
            .await
            .expect("pipeline semaphore is never closed");
        drop(barrier);

        workers.shutdown().await;
        drop(tx);

        let state = std::mem::take(&mut *state.lock().await);
        info!(
            produced,
            acknowledged = state.acknowledged,
            modified = state.modified.len(),
            errors = state.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline drained"
        );

        self.handler.finalize(&state).await;
        state
    }
}

/// Pull items into the queue, one slot per item.
async fn produce<T, S>(source: S, tx: &Sender<Ticket<T>>, slots: &Arc<Semaphore>) -> usize
where
    T: WorkItem,
    S: Stream<Item = T>,
{
    let mut source = pin!(source);
    let mut produced = 0;

    loop {
        let slot = Arc::clone(slots)
            .acquire_owned()
            .await
            .expect("pipeline semaphore is never closed");
        let Some(item) = source.next().await else {
            break;
        };

        debug!(id = item.id(), "queued");
        if tx.send(Ticket { item, slot }).await.is_err() {
            warn!("all workers are gone, stopping producer");
            break;
        }
        produced += 1;
    }

    produced
}

async fn worker<T, H>(
    worker_id: usize,
    rx: Receiver<Ticket<T>>,
    handler: Arc<H>,
    state: Arc<Mutex<PipelineState<H::Success, H::Failure>>>,
    item_timeout: Option<Duration>,
) where
    T: WorkItem,
    H: ItemHandler<T>,
{
    while let Ok(Ticket { item, slot }) = rx.recv().await {
        let id = item.id().to_string();
        let outcome = handle(handler.as_ref(), item, &id, item_timeout).await;

        {
            let mut state = state.lock().await;
            state.record(outcome);
            state.acknowledged += 1;
        }
        drop(slot);
        debug!(worker_id, %id, "acknowledged");
    }
}

/// Run the handler, turning timeouts and panics into failed outcomes.
async fn handle<T, H>(
    handler: &H,
    item: T,
    id: &str,
    item_timeout: Option<Duration>,
) -> Outcome<H::Success, H::Failure>
where
    T: WorkItem,
    H: ItemHandler<T>,
{
    let guarded = AssertUnwindSafe(handler.process_item(item)).catch_unwind();
    let result = match item_timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%id, ?limit, "item timed out");
                return Outcome::failed(id, format!("timed out after {limit:?}"));
            }
        },
        None => guarded.await,
    };

    result.unwrap_or_else(|panic| {
        let message = panic_message(panic.as_ref());
        error!(%id, %message, "item handler panicked");
        Outcome::failed(id, format!("handler panicked: {message}"))
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
