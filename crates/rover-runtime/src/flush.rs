//! [`FlushJob`] – moves staged records from the [`PersistenceBuffer`] into
//! the durable store.
//!
//! The buffer lock is held only for the swap; the write itself runs on the
//! blocking pool.  A failed write hands the batch back to the buffer so it is
//! retried on the next tick.  One last flush runs when the stop signal is
//! raised.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rover_memory::{DurableStore, PersistenceBuffer, StoreError};
use tracing::{debug, error, info, instrument};

use crate::periodic::PeriodicJob;

pub struct FlushJob<S: DurableStore + 'static> {
    buffer: Arc<PersistenceBuffer>,
    store: Arc<Mutex<S>>,
}

impl<S: DurableStore + 'static> FlushJob<S> {
    pub fn new(buffer: Arc<PersistenceBuffer>, store: Arc<Mutex<S>>) -> Self {
        Self { buffer, store }
    }

    /// Drain the buffer and persist the batch.  Returns the number of
    /// records written.
    #[instrument(skip(self))]
    pub async fn flush_once(&self) -> Result<usize, StoreError> {
        let batch = self.buffer.drain();
        if batch.is_empty() {
            return Ok(0);
        }
        let written = batch.len();

        let batch = Arc::new(batch);
        let store = self.store.clone();
        let staged = batch.clone();
        let outcome = tokio::task::spawn_blocking(move || store.lock().write_batch(&staged))
            .await
            .unwrap_or_else(|join_err| Err(StoreError::WriterAborted(join_err.to_string())));

        match outcome {
            Ok(()) => {
                debug!(written, "flush complete");
                Ok(written)
            }
            Err(e) => {
                error!(error = %e, records = written, "flush failed; batch requeued");
                // The writer's handle is gone by now, panicked or not.
                let batch = Arc::try_unwrap(batch).unwrap_or_else(|shared| (*shared).clone());
                self.buffer.requeue(batch);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<S: DurableStore + 'static> PeriodicJob for FlushJob<S> {
    fn name(&self) -> &str {
        "flush"
    }

    async fn tick(&mut self) {
        // Failures are already logged and requeued.
        let _ = self.flush_once().await;
    }

    async fn on_stop(&mut self) {
        match self.flush_once().await {
            Ok(written) => info!(written, "final flush complete"),
            Err(_) => {
                let (sensors, commands) = self.buffer.pending();
                error!(sensors, commands, "final flush failed; staged records lost");
            }
        }
    }
}
