//! Ingestion queue -- the bounded buffer between adapters and the coordinator.
//!
//! A fixed-capacity FIFO over `tokio::sync::mpsc`. Producers suspend on
//! [`QueueHandle::push`] when the queue is full; this backpressure is the
//! pipeline's only overload-control mechanism -- events are delayed at the
//! producer, never dropped. The single consumer suspends on
//! [`QueueReceiver::pop`] when the queue is empty.
//!
//! # Ordering
//! FIFO in global arrival order: the consumer observes events in the order
//! they were pushed, regardless of which adapter produced them. There is no
//! per-source ordering guarantee across adapters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use sentrypipe_core::event::NormalizedEvent;
use sentrypipe_core::metrics as m;

use crate::error::IngestError;

/// Create a bounded event queue.
///
/// Returns the clonable producer handle and the single consumer side.
pub fn bounded(capacity: usize) -> (QueueHandle, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let counters = Arc::new(QueueCounters::default());
    (
        QueueHandle {
            tx,
            counters: Arc::clone(&counters),
            capacity,
        },
        QueueReceiver {
            rx,
            counters,
            capacity,
        },
    )
}

#[derive(Debug, Default)]
struct QueueCounters {
    pushed: AtomicU64,
    popped: AtomicU64,
}

impl QueueCounters {
    fn depth(&self) -> u64 {
        self.pushed
            .load(Ordering::Relaxed)
            .saturating_sub(self.popped.load(Ordering::Relaxed))
    }
}

/// Producer side of the ingestion queue. Cheap to clone; one per adapter.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<NormalizedEvent>,
    counters: Arc<QueueCounters>,
    capacity: usize,
}

impl QueueHandle {
    /// Push an event, suspending while the queue is at capacity.
    ///
    /// Ownership of the event transfers to the consumer on success. Fails
    /// only when the consumer side has been dropped.
    pub async fn push(&self, event: NormalizedEvent) -> Result<(), IngestError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| IngestError::Channel("queue receiver dropped".to_owned()))?;
        self.counters.pushed.fetch_add(1, Ordering::Relaxed);
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::INGEST_QUEUE_DEPTH).set(self.counters.depth() as f64);
        Ok(())
    }

    /// Queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events pushed since creation.
    pub fn pushed_total(&self) -> u64 {
        self.counters.pushed.load(Ordering::Relaxed)
    }

    /// Events currently pending (pushed minus popped).
    pub fn depth(&self) -> u64 {
        self.counters.depth()
    }
}

/// Consumer side of the ingestion queue. Exactly one per pipeline.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::Receiver<NormalizedEvent>,
    counters: Arc<QueueCounters>,
    capacity: usize,
}

impl QueueReceiver {
    /// Pop the next event, suspending while the queue is empty.
    ///
    /// Returns `None` once every producer handle has been dropped and the
    /// queue is drained.
    pub async fn pop(&mut self) -> Option<NormalizedEvent> {
        let event = self.rx.recv().await;
        if event.is_some() {
            self.counters.popped.fetch_add(1, Ordering::Relaxed);
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::INGEST_QUEUE_DEPTH).set(self.counters.depth() as f64);
        }
        event
    }

    /// Pop without suspending. Used by the shutdown drain, which must not
    /// wait for producers that are already stopping.
    pub fn try_pop(&mut self) -> Option<NormalizedEvent> {
        match self.rx.try_recv() {
            Ok(event) => {
                self.counters.popped.fetch_add(1, Ordering::Relaxed);
                #[allow(clippy::cast_precision_loss)]
                metrics::gauge!(m::INGEST_QUEUE_DEPTH).set(self.counters.depth() as f64);
                Some(event)
            }
            Err(_) => None,
        }
    }

    /// Queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events popped since creation.
    pub fn popped_total(&self) -> u64 {
        self.counters.popped.load(Ordering::Relaxed)
    }

    /// Events currently pending (pushed minus popped).
    pub fn depth(&self) -> u64 {
        self.counters.depth()
    }
}
