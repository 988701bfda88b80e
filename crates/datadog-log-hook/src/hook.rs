// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The hook: entry point for every log entry and owner of the flush path.
//!
//! A flush always goes through the same steps, whatever triggered it:
//!
//! ```text
//!   Idle ──> Detached ──> Serialized ──> Sent ──> Rearmed
//!               │                                    ^
//!               └──────────── on any failure ────────┘
//! ```
//!
//! Detaching swaps the current batch for an empty one under the buffer lock,
//! so producers keep appending to the new generation while the old one is on
//! the wire. A failed batch is dropped, never re-queued.

use crate::batch::{Batch, BatchBuffer};
use crate::config::{Config, Options};
use crate::entry::LogEntry;
use crate::errors::{FlushError, FormatError, HookError};
use crate::layer::HookLayer;
use crate::scheduler::{self, FlushScheduler};
use crate::shipper::Shipper;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, error, Level};

const ALL_LEVELS: [Level; 5] = [
    Level::ERROR,
    Level::WARN,
    Level::INFO,
    Level::DEBUG,
    Level::TRACE,
];

/// Batching log hook. Cheap to clone; all clones share one buffer and timer.
#[derive(Clone)]
pub struct Hook {
    inner: Arc<Inner>,
}

struct Inner {
    api_key: String,
    config: Config,
    buffer: BatchBuffer,
    shipper: Shipper,
    scheduler: FlushScheduler,
    last_flush: Mutex<Option<Instant>>,
    runtime: Handle,
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("config", &self.inner.config)
            .field("buffered", &self.buffered())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl Hook {
    /// Creates a hook sending to Datadog with the given API key.
    ///
    /// Unset options are filled with their defaults. The flush timer is armed
    /// immediately and runs on the current tokio runtime, so this must be
    /// called from within one.
    pub fn new(api_key: impl Into<String>, options: Options) -> Result<Self, HookError> {
        let runtime = Handle::try_current().map_err(|e| HookError::Runtime(e.to_string()))?;
        let config = options.resolve();
        let api_key = api_key.into();

        let inner = Arc::new(Inner {
            shipper: Shipper::new(api_key.clone(), &config),
            buffer: BatchBuffer::new(config.max_batch_size),
            scheduler: FlushScheduler::new(config.flush_period),
            last_flush: Mutex::new(None),
            runtime,
            api_key,
            config,
        });

        // The timer task only holds a weak reference, so dropping the last
        // handle stops it.
        let weak = Arc::downgrade(&inner);
        inner.runtime.spawn(scheduler::run(
            inner.scheduler.subscribe(),
            inner.scheduler.cancellation_token(),
            move || {
                let weak = weak.clone();
                async move {
                    let Some(inner) = weak.upgrade() else {
                        return ControlFlow::Break(());
                    };
                    debug!("LOGS | Flush period elapsed");
                    if let Err(e) = inner.flush().await {
                        inner.report(&e);
                    }
                    ControlFlow::Continue(())
                }
            },
        ));

        debug!(
            "LOGS | Hook created: flushing every {:?} or {} records to {}",
            inner.config.flush_period, inner.config.max_batch_size, inner.config.post_url
        );

        Ok(Hook { inner })
    }

    /// Encodes and buffers one entry.
    ///
    /// If the entry fills the batch, the batch is flushed before returning and
    /// a delivery failure is returned as [`HookError::Flush`]. An entry that
    /// cannot be encoded is dropped and leaves the buffer untouched.
    pub async fn fire(&self, entry: &LogEntry) -> Result<(), HookError> {
        let record = self.inner.config.formatter.format(entry)?;
        if let Some(batch) = self.inner.append(record) {
            debug!(
                "LOGS | Batch {} is full, flushing {} records",
                batch.generation(),
                batch.len()
            );
            self.inner.ship(batch).await?;
        }
        Ok(())
    }

    /// Like [`Hook::fire`], for callers that cannot await.
    ///
    /// A batch filled by this entry is shipped on the hook's runtime in the
    /// background; its delivery errors go to the error handler.
    pub fn enqueue(&self, entry: &LogEntry) -> Result<(), FormatError> {
        let record = self.inner.config.formatter.format(entry)?;
        if let Some(batch) = self.inner.append(record) {
            let inner = Arc::clone(&self.inner);
            self.inner.runtime.spawn(async move {
                if let Err(e) = inner.ship(batch).await {
                    inner.report(&e);
                }
            });
        }
        Ok(())
    }

    /// Severities this hook wants to receive: all of them.
    #[must_use]
    pub fn levels(&self) -> &'static [Level] {
        &ALL_LEVELS
    }

    /// Ships whatever is buffered, even nothing (an empty array is sent).
    pub async fn flush(&self) -> Result<(), FlushError> {
        self.inner.flush().await
    }

    /// Stops the flush timer and ships the remaining records, if any.
    ///
    /// The hook still accepts entries afterwards, but without the timer they
    /// are only shipped when a batch fills up or [`Hook::flush`] is called.
    pub async fn shutdown(&self) -> Result<(), FlushError> {
        self.inner.scheduler.cancel();
        let batch = self.inner.buffer.detach();
        if batch.is_empty() {
            return Ok(());
        }
        self.inner.ship(batch).await
    }

    /// A [`tracing_subscriber::Layer`] feeding tracing events into this hook.
    #[must_use]
    pub fn layer(&self) -> HookLayer {
        HookLayer::new(self.clone())
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.inner.api_key
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Number of records waiting in the current batch.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.inner.buffer.len()
    }

    /// Generation number of the batch currently being filled.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.buffer.generation()
    }

    /// When the last flush attempt started, if there was one.
    #[must_use]
    pub fn last_flush(&self) -> Option<Instant> {
        #[allow(clippy::expect_used)]
        *self.inner.last_flush.lock().expect("lock poisoned")
    }

    /// When the flush timer will next fire unless a flush happens first.
    #[must_use]
    pub fn next_flush(&self) -> Instant {
        self.inner.scheduler.deadline()
    }
}

impl Inner {
    fn append(&self, record: Vec<u8>) -> Option<Batch> {
        if self.scheduler.is_cancelled() {
            debug!(
                "LOGS | Record buffered after shutdown, it will only ship with a full batch or an explicit flush"
            );
        }
        self.buffer.append(record)
    }

    async fn flush(&self) -> Result<(), FlushError> {
        let batch = self.buffer.detach();
        self.ship(batch).await
    }

    async fn ship(&self, batch: Batch) -> Result<(), FlushError> {
        {
            #[allow(clippy::expect_used)]
            let mut last_flush = self.last_flush.lock().expect("lock poisoned");
            *last_flush = Some(Instant::now());
        }

        let result = self.shipper.ship(batch).await;
        self.scheduler.rearm();
        result
    }

    fn report(&self, error: &FlushError) {
        error!("LOGS | Failed to flush logs, batch dropped: {}", error);
        if let Some(handler) = &self.config.error_handler {
            handler(error);
        }
    }
}
