//! The running log grouping service.
//!
//! [`LogGroupPipeline::start`] wires producer queue, batcher, merger and
//! (optionally) the retention sweeper onto the current tokio runtime:
//!
//! ```text
//! StructuredLogger -> EventSender -> EventBatcher -> GroupMerger -> GroupStore
//! ```
//!
//! Batches are merged strictly one after another.

use std::sync::Arc;

use loggroup_core::capture::EventCapture;
use loggroup_core::config::LogGroupConfig;
use loggroup_core::error::CoreError;
use loggroup_db::GroupStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::batcher::{self, EventBatcher, EventSender};
use crate::logger::StructuredLogger;
use crate::merger::GroupMerger;
use crate::retention;

/// Batches waiting for the merger before the batcher waits too.
const BATCH_QUEUE_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct LogGroupPipeline {
    sender: EventSender,
    capture: Arc<EventCapture>,
    config: Arc<LogGroupConfig>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl LogGroupPipeline {
    /// Validate `config` and spawn the background tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(store: Arc<dyn GroupStore>, config: LogGroupConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let config = Arc::new(config);
        let cancel = CancellationToken::new();

        let (sender, events) = batcher::channel(config.queue_capacity);
        let (batch_tx, batch_rx) = mpsc::channel(BATCH_QUEUE_CAPACITY);

        let mut tasks = Vec::with_capacity(3);
        tasks.push(tokio::spawn(
            EventBatcher::new(config.batch_window, events, batch_tx).run(cancel.clone()),
        ));
        // The merger stops once the batcher has released its last batch.
        tasks.push(tokio::spawn(
            GroupMerger::new(Arc::clone(&store), Arc::clone(&config)).run(batch_rx),
        ));
        if !config.purge_interval.is_zero() {
            tasks.push(tokio::spawn(retention::run(
                store,
                config.purge_interval,
                cancel.clone(),
            )));
        }

        tracing::info!(
            batch_window_ms = config.batch_window.as_millis() as u64,
            queue_capacity = config.queue_capacity,
            max_occurrences = config.max_occurrences_per_group,
            "Log grouping pipeline started"
        );

        Ok(Self {
            sender,
            capture: Arc::new(EventCapture::new(config.frame_extractor())),
            config,
            cancel,
            tasks,
        })
    }

    /// A logger for `category` feeding this pipeline.
    pub fn logger(&self, category: impl Into<Arc<str>>) -> StructuredLogger {
        StructuredLogger::new(
            category,
            self.sender.clone(),
            Arc::clone(&self.capture),
            self.config.include_scopes,
        )
    }

    /// Raw producer handle for already-captured events.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    pub fn config(&self) -> &LogGroupConfig {
        &self.config
    }

    /// Flush pending events, wait for the last merge and stop every task.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Log grouping task failed");
            }
        }
        tracing::info!("Log grouping pipeline stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use loggroup_core::exception::ExceptionInfo;
    use loggroup_db::MemoryGroupStore;
    use serde_json::json;

    use super::*;

    fn config() -> LogGroupConfig {
        LogGroupConfig {
            batch_window: Duration::from_millis(50),
            purge_interval: Duration::ZERO,
            ..LogGroupConfig::default()
        }
    }

    #[tokio::test]
    async fn templated_events_collapse_into_one_group() {
        let store = MemoryGroupStore::new();
        let pipeline = LogGroupPipeline::start(Arc::new(store.clone()), config()).unwrap();
        let logger = pipeline.logger("app::home");

        logger.info("Generated {count} items", &[("count", json!(5))]);
        logger.info("Generated {count} items", &[("count", json!(2))]);
        logger.info("Hi there!", &[]);
        pipeline.shutdown().await;

        let groups = store.snapshot().await;
        assert_eq!(groups.len(), 2);
        let generated = groups
            .iter()
            .find(|g| g.message_template == "Generated {count} items")
            .unwrap();
        assert_eq!(generated.occurrence_count, 2);
        assert_eq!(generated.occurrences[0].message, "Generated 2 items");
    }

    #[tokio::test]
    async fn exceptions_at_different_call_sites_group_separately() {
        let store = MemoryGroupStore::new();
        let pipeline = LogGroupPipeline::start(Arc::new(store.clone()), config()).unwrap();
        let logger = pipeline.logger("app::home");

        let at_index = ExceptionInfo::new("InvalidOperation", "boom")
            .with_stack_trace("at MyApp.HomeController.Index() in HomeController.cs:line 33");
        let at_about = ExceptionInfo::new("InvalidOperation", "boom")
            .with_stack_trace("at MyApp.HomeController.About() in HomeController.cs:line 58");

        logger.error(Some(&at_index), "Request failed", &[]);
        logger.error(Some(&at_index), "Request failed", &[]);
        logger.error(Some(&at_about), "Request failed", &[]);
        pipeline.shutdown().await;

        let mut counts: Vec<i64> = store
            .snapshot()
            .await
            .iter()
            .map(|g| g.occurrence_count)
            .collect();
        counts.sort();
        assert_eq!(counts, [1, 2]);
    }

    #[tokio::test]
    async fn call_sites_stay_separate_across_batches() {
        let store = MemoryGroupStore::new();
        let pipeline = LogGroupPipeline::start(Arc::new(store.clone()), config()).unwrap();
        let logger = pipeline.logger("app::home");

        let at_index = ExceptionInfo::new("InvalidOperation", "boom")
            .with_stack_trace("at MyApp.HomeController.Index() in HomeController.cs:line 33");
        let at_about = ExceptionInfo::new("InvalidOperation", "boom")
            .with_stack_trace("at MyApp.HomeController.About() in HomeController.cs:line 58");

        logger.error(Some(&at_index), "Request failed", &[]);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.snapshot().await.len(), 1);

        logger.error(Some(&at_about), "Request failed", &[]);
        pipeline.shutdown().await;

        let mut functions: Vec<String> = store
            .snapshot()
            .await
            .into_iter()
            .map(|g| g.function)
            .collect();
        functions.sort();
        assert_eq!(functions, ["HomeController.About()", "HomeController.Index()"]);
    }

    #[tokio::test]
    async fn events_beyond_queue_capacity_are_dropped() {
        let store = MemoryGroupStore::new();
        let config = LogGroupConfig {
            queue_capacity: 1,
            ..config()
        };
        let pipeline = LogGroupPipeline::start(Arc::new(store.clone()), config).unwrap();
        let logger = pipeline.logger("app::home");

        // The batcher cannot run before the first await on this thread.
        for _ in 0..3 {
            logger.info("Hi there!", &[]);
        }
        pipeline.shutdown().await;

        let groups = store.snapshot().await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].occurrence_count, 1);
    }

    #[tokio::test]
    async fn disabled_scopes_are_not_stored() {
        let store = MemoryGroupStore::new();
        let config = LogGroupConfig {
            include_scopes: false,
            ..config()
        };
        let pipeline = LogGroupPipeline::start(Arc::new(store.clone()), config).unwrap();
        let logger = pipeline.logger("app::home");

        let _scope = logger.begin_key_value_scope(&[("request", json!("r-1"))]);
        logger.info("Hi there!", &[]);
        pipeline.shutdown().await;

        let groups = store.snapshot().await;
        assert_eq!(groups[0].occurrences[0].scope_values, None);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = LogGroupConfig {
            max_occurrences_per_group: 0,
            ..config()
        };
        let result = LogGroupPipeline::start(Arc::new(MemoryGroupStore::new()), config);
        assert_matches!(result, Err(CoreError::Validation(_)));
    }
}
