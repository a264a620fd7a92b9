//! BatchWriter - buffers items and flushes them to a handler
//!
//! One loop task per writer serializes submit, interval flush and stop.
//! Items a flush reports as failed stay at the front of the buffer with an
//! incremented attempt counter until `max_retries` is exhausted.

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use metrics::counter;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, instrument, warn};

use crate::error::BatchError;

/// Batch writer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    /// Buffer capacity; a full buffer is flushed before the next item enters
    pub batch_size: usize,
    /// Extra attempts granted to a failed item
    pub max_retries: u32,
    /// Periodic flush interval
    pub interval: Duration,
    /// Per-flush deadline; an expired flush counts every item as failed
    pub timeout: Option<Duration>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 3,
            interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// Flush callback
///
/// Must return exactly one result per item, in item order.
/// `true` = delivered, `false` = retry (subject to `max_retries`).
pub trait BatchHandler<T>: Send + 'static {
    fn flush(&mut self, items: &[T]) -> impl Future<Output = Vec<bool>> + Send;
}

/// Counters reported when the writer stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Handler invocations
    pub flushes: u64,
    /// Items the handler acknowledged
    pub delivered: u64,
    /// Items dropped after exhausting retries
    pub dropped: u64,
}

enum Command<T> {
    Submit(Vec<T>),
    Stop(oneshot::Sender<()>),
}

/// A configured writer that has not started yet
pub struct BatchWriter<T, H> {
    name: String,
    config: WriterConfig,
    handler: H,
    _items: PhantomData<fn(T)>,
}

impl<T, H> BatchWriter<T, H>
where
    T: Send + Sync + 'static,
    H: BatchHandler<T>,
{
    /// Create a writer; `batch_size` is clamped to at least 1 and a zero
    /// interval to 1ms
    pub fn new(name: impl Into<String>, mut config: WriterConfig, handler: H) -> Self {
        config.batch_size = config.batch_size.max(1);
        config.interval = config.interval.max(Duration::from_millis(1));
        Self {
            name: name.into(),
            config,
            handler,
            _items: PhantomData,
        }
    }

    /// Spawn the processing loop
    #[instrument(name = "batch_writer_start", skip(self), fields(writer = %self.name))]
    pub fn start(self) -> RunningWriter<T> {
        // Capacity 1: a submit waits until the loop has taken the previous one
        let (tx, rx) = mpsc::channel(1);
        let name = self.name.clone();

        let state = WriterLoop {
            name: self.name,
            buffer: Buffer::with_capacity(self.config.batch_size),
            config: self.config,
            handler: self.handler,
            stats: WriterStats::default(),
        };

        let task = tokio::spawn(state.run(rx));

        RunningWriter { name, tx, task }
    }
}

/// Handle to a started writer
pub struct RunningWriter<T> {
    name: String,
    tx: mpsc::Sender<Command<T>>,
    task: JoinHandle<WriterStats>,
}

impl<T: Send + 'static> RunningWriter<T> {
    /// Writer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hand items to the loop, waiting while it is busy flushing
    pub async fn submit(&self, items: impl IntoIterator<Item = T>) -> Result<(), BatchError> {
        let items: Vec<T> = items.into_iter().collect();
        if items.is_empty() {
            return Ok(());
        }
        self.tx
            .send(Command::Submit(items))
            .await
            .map_err(|_| BatchError::stopped(&self.name))
    }

    /// Flush what is buffered, terminate the loop and wait for it
    #[instrument(name = "batch_writer_stop", skip(self), fields(writer = %self.name))]
    pub async fn stop(self) -> Result<WriterStats, BatchError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Stop(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }

        match self.task.await {
            Ok(stats) => {
                debug!(
                    writer = %self.name,
                    flushes = stats.flushes,
                    delivered = stats.delivered,
                    dropped = stats.dropped,
                    "Batch writer stopped"
                );
                Ok(stats)
            }
            Err(e) => Err(BatchError::LoopPanicked {
                name: self.name,
                message: e.to_string(),
            }),
        }
    }
}

/// Submitted values plus their attempt counters, kept in lockstep
struct Buffer<T> {
    items: Vec<T>,
    attempts: Vec<u32>,
}

impl<T> Buffer<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            attempts: Vec::with_capacity(capacity),
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn push(&mut self, item: T) {
        self.items.push(item);
        self.attempts.push(0);
    }

    /// Keep failed items that still have attempts left, compacted to the
    /// front in their original order. Returns (delivered, dropped).
    fn settle(&mut self, results: &[bool], max_retries: u32) -> (u64, u64) {
        let mut kept = 0;
        let mut delivered = 0;
        let mut dropped = 0;

        for (idx, &ok) in results.iter().enumerate() {
            if ok {
                delivered += 1;
                continue;
            }
            let attempt = self.attempts[idx];
            if attempt >= max_retries {
                dropped += 1;
                continue;
            }
            // kept <= idx, so the write cursor never passes the read cursor
            self.items.swap(kept, idx);
            self.attempts[kept] = attempt + 1;
            kept += 1;
        }

        self.items.truncate(kept);
        self.attempts.truncate(kept);
        (delivered, dropped)
    }
}

struct WriterLoop<T, H> {
    name: String,
    config: WriterConfig,
    handler: H,
    buffer: Buffer<T>,
    stats: WriterStats,
}

impl<T, H> WriterLoop<T, H>
where
    T: Send + Sync + 'static,
    H: BatchHandler<T>,
{
    async fn run(mut self, mut rx: mpsc::Receiver<Command<T>>) -> WriterStats {
        let period = self.config.interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Submit(items)) => {
                        for item in items {
                            self.accept(item).await;
                        }
                    }
                    Some(Command::Stop(ack)) => {
                        self.flush().await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        warn!(writer = %self.name, "Writer handle dropped without stop, flushing");
                        self.flush().await;
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.flush().await;
                }
            }
        }

        self.stats
    }

    async fn accept(&mut self, item: T) {
        if self.buffer.len() >= self.config.batch_size {
            self.flush().await;
        }
        // Still full: every retained item failed and has attempts left.
        // Flush again so retries drain before backlog grows.
        while self.buffer.len() >= self.config.batch_size {
            self.flush().await;
        }
        self.buffer.push(item);
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let len = self.buffer.len();
        let results = self.invoke_handler().await;
        self.stats.flushes += 1;

        let results = if results.len() == len {
            results
        } else {
            error!(
                writer = %self.name,
                expected = len,
                got = results.len(),
                "Handler returned mismatched result count, treating batch as failed"
            );
            vec![false; len]
        };

        let (delivered, dropped) = self.buffer.settle(&results, self.config.max_retries);
        self.stats.delivered += delivered;
        self.stats.dropped += dropped;

        counter!("event_exporter_batch_flushes_total", "writer" => self.name.clone()).increment(1);
        if dropped > 0 {
            counter!("event_exporter_batch_items_dropped_total", "writer" => self.name.clone())
                .increment(dropped);
            warn!(writer = %self.name, dropped, "Items dropped after max retries");
        }

        debug!(
            writer = %self.name,
            batch = len,
            delivered,
            retained = self.buffer.len(),
            "Batch flushed"
        );
    }

    async fn invoke_handler(&mut self) -> Vec<bool> {
        let len = self.buffer.len();
        let flush = self.handler.flush(&self.buffer.items);

        match self.config.timeout {
            Some(limit) => match time::timeout(limit, flush).await {
                Ok(results) => results,
                Err(_) => {
                    warn!(
                        writer = %self.name,
                        batch = len,
                        timeout_ms = limit.as_millis() as u64,
                        "Flush timed out"
                    );
                    vec![false; len]
                }
            },
            None => flush.await,
        }
    }
}
