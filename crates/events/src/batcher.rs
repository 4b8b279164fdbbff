//! Fixed-window event batching.
//!
//! Producers hand events to an [`EventSender`], which never blocks: the
//! queue is bounded and events beyond it are dropped with a warning.
//! [`EventBatcher`] drains the queue on a background task. The first event
//! after an idle period opens a window of fixed length; everything that
//! arrives before the window closes is released as one batch, in arrival
//! order. Later arrivals do not extend the window.

use std::time::Duration;

use loggroup_core::event::LogEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Create a bounded producer queue.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<LogEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, rx)
}

// ---------------------------------------------------------------------------
// EventSender
// ---------------------------------------------------------------------------

/// Producer handle. Cheap to clone and safe to use from any thread.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<LogEvent>,
}

impl EventSender {
    /// Queue an event without waiting. Returns `false` if it was dropped.
    pub fn submit(&self, event: LogEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    group_key_hash = event.group_key_hash,
                    "Log grouping queue full, event dropped"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::debug!(
                    group_key_hash = event.group_key_hash,
                    "Log grouping stopped, event dropped"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBatcher
// ---------------------------------------------------------------------------

/// Background task turning the producer queue into batches.
pub struct EventBatcher {
    window: Duration,
    events: mpsc::Receiver<LogEvent>,
    batches: mpsc::Sender<Vec<LogEvent>>,
}

impl EventBatcher {
    pub fn new(
        window: Duration,
        events: mpsc::Receiver<LogEvent>,
        batches: mpsc::Sender<Vec<LogEvent>>,
    ) -> Self {
        Self {
            window,
            events,
            batches,
        }
    }

    /// Run the batching loop.
    ///
    /// Exits when `cancel` fires or every [`EventSender`] is dropped. Events
    /// still open in a window or queued at that point are released as a
    /// final batch.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(window_ms = self.window.as_millis() as u64, "Event batcher started");

        loop {
            let first = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let rest = self.drain();
                    self.emit(rest).await;
                    break;
                }
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let mut batch = vec![first];
            let stopping = self.fill_window(&mut batch, &cancel).await;
            if stopping {
                batch.extend(self.drain());
            }
            self.emit(batch).await;

            if stopping {
                break;
            }
        }

        tracing::info!("Event batcher stopped");
    }

    /// Collect events until the window closes. Returns `true` if the batcher
    /// should stop afterwards.
    async fn fill_window(&mut self, batch: &mut Vec<LogEvent>, cancel: &CancellationToken) -> bool {
        let deadline = tokio::time::sleep(self.window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return true,
                _ = &mut deadline => return false,
                event = self.events.recv() => match event {
                    Some(event) => batch.push(event),
                    None => return true,
                },
            }
        }
    }

    /// Close the queue and take whatever is still in it.
    fn drain(&mut self) -> Vec<LogEvent> {
        self.events.close();
        let mut rest = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            rest.push(event);
        }
        rest
    }

    async fn emit(&self, batch: Vec<LogEvent>) {
        if batch.is_empty() {
            return;
        }
        let size = batch.len();
        tracing::debug!(batch_size = size, "Releasing log batch");
        if self.batches.send(batch).await.is_err() {
            tracing::error!(batch_size = size, "Log merger is gone, batch dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
