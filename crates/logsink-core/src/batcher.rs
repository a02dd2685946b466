// crates/logsink-core/src/batcher.rs
// ============================================================================
// Module: Logsink Periodic Batcher
// Description: Bounded event queue that flushes batches to a BatchWriter.
// Purpose: Decouple producers from storage latency and own batch redelivery.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! [`PeriodicBatcher`] accepts events through a non-blocking [`emit`], queues
//! them in a bounded channel, and drives a dedicated worker thread that hands
//! batches of at most `batch_size` events to a [`BatchWriter`] whenever a
//! batch fills up or the flush period elapses. Failed batches are redelivered
//! on later ticks up to `retry_limit` times and then abandoned with a
//! diagnostic.
//! Invariants:
//! - Events reach the writer in emission order.
//! - At most one `write_batch` call is in flight per batcher.
//! - A full queue drops the new event rather than blocking the producer.
//! - While a failed batch waits for redelivery the worker holds at most
//!   `max_buffer_size` events (or one batch, if larger); newer events are
//!   dropped and reported.
//!
//! [`emit`]: PeriodicBatcher::emit

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::SyncSender;
use std::sync::mpsc::TrySendError;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use serde::Deserialize;
use thiserror::Error;

use crate::diagnostics::DiagnosticEvent;
use crate::diagnostics::DiagnosticKind;
use crate::diagnostics::DiagnosticSink;
use crate::event::LogEvent;
use crate::writer::BatchWriter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of events per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;
/// Queue capacity; events beyond it are dropped.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 100_000;
/// Default flush period in milliseconds.
pub const DEFAULT_PERIOD_MS: u64 = 2_000;
/// Default number of redelivery attempts for a failed batch.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;
/// Diagnostic source label for batcher events.
const DIAGNOSTIC_SOURCE: &str = "batcher";

// ============================================================================
// SECTION: Config
// ============================================================================

/// Batching configuration.
///
/// # Invariants
/// - `batch_size`, `max_buffer_size`, and `period_ms` are greater than zero.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchingConfig {
    /// Maximum events handed to the writer per call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Queue capacity between producers and the worker.
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
    /// Flush period in milliseconds.
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    /// Redelivery attempts for a failed batch before it is abandoned.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            period_ms: DEFAULT_PERIOD_MS,
            retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }
}

impl BatchingConfig {
    /// Validates batching limits.
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::Invalid`] when a limit is zero.
    pub fn validate(&self) -> Result<(), BatcherError> {
        if self.batch_size == 0 {
            return Err(BatcherError::Invalid("batch_size must be greater than zero".to_string()));
        }
        if self.max_buffer_size == 0 {
            return Err(BatcherError::Invalid(
                "max_buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.period_ms == 0 {
            return Err(BatcherError::Invalid("period_ms must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Returns the default batch size.
const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Returns the default queue capacity.
const fn default_max_buffer_size() -> usize {
    DEFAULT_MAX_BUFFER_SIZE
}

/// Returns the default flush period.
const fn default_period_ms() -> u64 {
    DEFAULT_PERIOD_MS
}

/// Returns the default redelivery limit.
const fn default_retry_limit() -> u32 {
    DEFAULT_RETRY_LIMIT
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Batcher errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatcherError {
    /// Invalid batching configuration.
    #[error("invalid batching config: {0}")]
    Invalid(String),
    /// Worker thread could not be started or reached.
    #[error("batcher io error: {0}")]
    Io(String),
    /// The batcher has been shut down.
    #[error("batcher is shut down")]
    Closed,
}

// ============================================================================
// SECTION: Batcher
// ============================================================================

/// Messages consumed by the worker thread.
enum BatcherMessage {
    /// A producer event.
    Event(LogEvent),
    /// Deliver everything queued so far, then acknowledge.
    Flush(mpsc::Sender<()>),
}

/// Bounded, periodically flushing front end for a [`BatchWriter`].
pub struct PeriodicBatcher {
    /// Producer side of the queue; `None` once shut down.
    sender: Mutex<Option<SyncSender<BatcherMessage>>>,
    /// Worker thread handle; `None` once joined.
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Self-log channel.
    diagnostics: Arc<dyn DiagnosticSink>,
    /// Queue capacity reported on drops.
    capacity: usize,
}

impl PeriodicBatcher {
    /// Validates `config` and starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError`] when the config is invalid or the worker
    /// thread cannot be spawned.
    pub fn start(
        config: BatchingConfig,
        writer: Arc<dyn BatchWriter>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, BatcherError> {
        config.validate()?;
        let (sender, receiver) = mpsc::sync_channel(config.max_buffer_size);
        let capacity = config.max_buffer_size;
        let worker_diagnostics = Arc::clone(&diagnostics);
        let worker = thread::Builder::new()
            .name("logsink-batcher".to_string())
            .spawn(move || {
                let mut delivery = Delivery::new(&config, writer.as_ref(), worker_diagnostics);
                batcher_loop(&config, &mut delivery, &receiver);
                writer.shutdown();
            })
            .map_err(|err| BatcherError::Io(format!("failed to spawn batcher thread: {err}")))?;
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            diagnostics,
            capacity,
        })
    }

    /// Enqueues an event without blocking.
    ///
    /// Returns false when the event was dropped because the queue is full or
    /// the batcher has shut down.
    pub fn emit(&self, event: LogEvent) -> bool {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return false;
        };
        match sender.try_send(BatcherMessage::Event(event)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                drop(guard);
                self.diagnostics.record(&DiagnosticEvent::now(
                    DIAGNOSTIC_SOURCE,
                    DiagnosticKind::EventDropped {
                        capacity: self.capacity,
                    },
                ));
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Blocks until every event emitted before the call has been offered to
    /// the writer.
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::Closed`] when the batcher has shut down.
    pub fn flush(&self) -> Result<(), BatcherError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(BatcherError::Closed)?;
        let (ack_tx, ack_rx) = mpsc::channel();
        sender.send(BatcherMessage::Flush(ack_tx)).map_err(|_| BatcherError::Closed)?;
        ack_rx.recv().map_err(|_| BatcherError::Closed)
    }

    /// Drains queued events, shuts the writer down, and joins the worker.
    ///
    /// Idempotent; later calls return immediately.
    pub fn shutdown(&self) {
        drop(self.sender.lock().unwrap_or_else(PoisonError::into_inner).take());
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }
}

impl Drop for PeriodicBatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// A failed batch awaiting redelivery.
struct RetryBatch {
    /// Events of the failed batch.
    events: Vec<LogEvent>,
    /// Write attempts made so far.
    attempts: u32,
}

/// Worker-side delivery state.
struct Delivery<'a> {
    /// Destination writer.
    writer: &'a dyn BatchWriter,
    /// Self-log channel.
    diagnostics: Arc<dyn DiagnosticSink>,
    /// Maximum events per write.
    batch_size: usize,
    /// Redelivery attempts allowed after the first failure.
    retry_limit: u32,
    /// Upper bound on events held by the worker, parked retry included.
    capacity: usize,
    /// Events received but not yet offered.
    pending: Vec<LogEvent>,
    /// Failed batch waiting for redelivery.
    retry: Option<RetryBatch>,
}

impl<'a> Delivery<'a> {
    /// Creates empty delivery state.
    fn new(
        config: &BatchingConfig,
        writer: &'a dyn BatchWriter,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            writer,
            diagnostics,
            batch_size: config.batch_size,
            retry_limit: config.retry_limit,
            capacity: config.max_buffer_size.max(config.batch_size),
            pending: Vec::with_capacity(config.batch_size.min(DEFAULT_BATCH_SIZE)),
            retry: None,
        }
    }

    /// Returns the number of events held by the worker.
    fn held(&self) -> usize {
        self.pending.len() + self.retry.as_ref().map_or(0, |retry| retry.events.len())
    }

    /// Queues a received event, or drops it with a diagnostic when the
    /// worker already holds `capacity` events behind a parked retry.
    fn admit(&mut self, event: LogEvent) {
        if self.held() >= self.capacity {
            self.diagnostics.record(&DiagnosticEvent::now(
                DIAGNOSTIC_SOURCE,
                DiagnosticKind::EventDropped {
                    capacity: self.capacity,
                },
            ));
            return;
        }
        self.pending.push(event);
        if self.pending.len() >= self.batch_size && self.retry.is_none() {
            self.deliver();
        }
    }

    /// Offers the retry batch, then pending events in `batch_size` chunks.
    ///
    /// Stops at the first failure so batches stay in emission order.
    fn deliver(&mut self) {
        if let Some(retry) = self.retry.take() {
            let RetryBatch {
                events,
                attempts,
            } = retry;
            if !self.attempt(events, attempts) {
                return;
            }
        }
        while !self.pending.is_empty() {
            let take = self.pending.len().min(self.batch_size);
            let batch: Vec<LogEvent> = self.pending.drain(.. take).collect();
            if !self.attempt(batch, 0) {
                return;
            }
        }
    }

    /// Writes one batch; on failure either parks it for redelivery or
    /// abandons it. Returns true when the batch was delivered.
    fn attempt(&mut self, events: Vec<LogEvent>, previous_attempts: u32) -> bool {
        let outcome = self.writer.write_batch(&events);
        if outcome.is_success() {
            return true;
        }
        let attempts = previous_attempts.saturating_add(1);
        if attempts > self.retry_limit {
            self.diagnostics.record(&DiagnosticEvent::now(
                DIAGNOSTIC_SOURCE,
                DiagnosticKind::BatchAbandoned {
                    records: events.len(),
                    attempts,
                },
            ));
            return true;
        }
        self.retry = Some(RetryBatch {
            events,
            attempts,
        });
        false
    }

    /// Reports whatever could not be delivered before the worker exits.
    fn abandon_remaining(&mut self) {
        let (retried, attempts) =
            self.retry.take().map_or((0, 0), |retry| (retry.events.len(), retry.attempts));
        let records = retried + self.pending.len();
        self.pending.clear();
        if records > 0 {
            self.diagnostics.record(&DiagnosticEvent::now(
                DIAGNOSTIC_SOURCE,
                DiagnosticKind::BatchAbandoned {
                    records,
                    attempts,
                },
            ));
        }
    }
}

/// Receives events until the queue disconnects, delivering full batches
/// immediately and partial batches once per period.
fn batcher_loop(
    config: &BatchingConfig,
    delivery: &mut Delivery<'_>,
    receiver: &Receiver<BatcherMessage>,
) {
    let period = Duration::from_millis(config.period_ms);
    let mut deadline = Instant::now() + period;
    loop {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match receiver.recv_timeout(timeout) {
            Ok(BatcherMessage::Event(event)) => delivery.admit(event),
            Ok(BatcherMessage::Flush(ack)) => {
                delivery.deliver();
                let _ = ack.send(());
            }
            Err(RecvTimeoutError::Timeout) => {
                delivery.deliver();
                deadline = Instant::now() + period;
            }
            Err(RecvTimeoutError::Disconnected) => {
                delivery.deliver();
                delivery.abandon_remaining();
                return;
            }
        }
    }
}
