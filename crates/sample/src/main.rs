//! Log grouping demo.
//!
//! Emits a representative set of events twice, lets them batch and merge,
//! then prints the resulting groups. Uses PostgreSQL when `DATABASE_URL` is
//! set and an in-memory store otherwise.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use loggroup_core::config::LogGroupConfig;
use loggroup_core::exception::ExceptionInfo;
use loggroup_core::record::GroupRecord;
use loggroup_core::scope::ScopeValue;
use loggroup_db::{GroupStore, MemoryGroupStore, PgGroupStore, StoreError};
use loggroup_events::{LogGroupPipeline, StructuredLogger};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A stack trace line pointing at this source file.
macro_rules! frame {
    ($function:literal) => {
        format!(
            "at Sample.HomeController.{} in {}:line {}",
            $function,
            file!(),
            line!()
        )
    };
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
struct InvalidOperation {
    message: String,
    #[source]
    source: Option<Box<InvalidOperation>>,
}

impl InvalidOperation {
    fn new(message: &str, source: Option<InvalidOperation>) -> Self {
        Self {
            message: message.to_string(),
            source: source.map(Box::new),
        }
    }
}

enum Backend {
    Memory(MemoryGroupStore),
    Postgres(PgGroupStore),
}

impl Backend {
    fn store(&self) -> Arc<dyn GroupStore> {
        match self {
            Backend::Memory(store) => Arc::new(store.clone()),
            Backend::Postgres(store) => Arc::new(store.clone()),
        }
    }

    async fn groups(&self) -> Result<Vec<GroupRecord>, StoreError> {
        match self {
            Backend::Memory(store) => Ok(store.snapshot().await),
            Backend::Postgres(store) => store.list().await,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loggroup_events=debug,loggroup_sample=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = LogGroupConfig::from_env().context("Invalid logging configuration")?;
    tracing::info!(
        max_occurrences = config.max_occurrences_per_group,
        include_scopes = config.include_scopes,
        retention_days = config.retention_days,
        "Loaded log grouping configuration"
    );

    // --- Store ---
    let backend = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = loggroup_db::create_pool(&database_url)
                .await
                .context("Failed to connect to database")?;
            loggroup_db::health_check(&pool)
                .await
                .context("Database health check failed")?;
            loggroup_db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Using PostgreSQL group store");
            Backend::Postgres(PgGroupStore::new(pool))
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set, using in-memory group store");
            Backend::Memory(MemoryGroupStore::new())
        }
    };

    // --- Pipeline ---
    let window = config.batch_window;
    let pipeline = LogGroupPipeline::start(backend.store(), config)?;
    let logger = pipeline.logger("Sample.Controllers.HomeController");

    for _ in 0..2 {
        index(&logger);
    }
    tokio::time::sleep(window + Duration::from_millis(100)).await;
    pipeline.shutdown().await;

    // --- Summary ---
    for group in backend.groups().await? {
        tracing::info!(
            id = %group.id,
            level = group.level.as_str(),
            occurrences = group.occurrence_count,
            function = %group.function,
            template = %group.message_template,
            "Log group"
        );
    }

    Ok(())
}

fn index(logger: &StructuredLogger) {
    // Simple logging
    logger.info("Hi there!", &[]);

    // Templates
    logger.info(
        "The time on the server is {time}.",
        &[("time", json!(Utc::now().to_rfc3339()))],
    );

    // Exceptions
    let exception = ExceptionInfo::new("InvalidOperationException", "Foobar zanz")
        .with_stack_trace(frame!("Index()"));
    logger.error(Some(&exception), "Woops, an error occurred", &[]);

    logger.error(
        Some(&exception),
        "Woops, an error occurred executing {action} at {date}",
        &[
            ("action", json!("Index")),
            ("date", json!(Utc::now().to_rfc3339())),
        ],
    );

    // Nested exceptions
    let nested = ExceptionInfo::from_error(&nested_failure())
        .with_stack_trace(frame!("CallNestedFunctionThatThrows()"))
        .with_data("attempt", 1);
    logger.error(Some(&nested), "Nested operation failed", &[]);

    // Scopes
    {
        let _answer = logger.begin_scope(ScopeValue::value(42));
        logger.info("This message will have forty-two stored with it", &[]);
    }

    {
        let _answer = logger.begin_scope(ScopeValue::value(42));
        let _user = logger.begin_scope(ScopeValue::template(
            "The current user is {user}",
            [("user".to_string(), json!("ada"))],
        ));
        let _total = logger.begin_key_value_scope(&[("total count", json!(777))]);
        logger.info(
            "This log will contain forty-two, the current signed in user name, and the total count name and value",
            &[],
        );
    }
}

fn nested_failure() -> InvalidOperation {
    let deepest = InvalidOperation::new("deepest", None);
    let middle = InvalidOperation::new("middle", Some(deepest));
    InvalidOperation::new("outermost", Some(middle))
}
