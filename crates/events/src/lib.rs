//! Runtime services for log grouping.
//!
//! - [`StructuredLogger`]: logger front-end bound to one category.
//! - [`EventBatcher`]: fixed-window batching behind a bounded, non-blocking
//!   producer queue ([`EventSender`]).
//! - [`GroupMerger`]: merges batches into stored groups, retrying once on
//!   conflict.
//! - [`retention`]: periodic purge of expired groups.
//! - [`LogGroupPipeline`]: starts and stops all of the above.

pub mod batcher;
pub mod error;
pub mod logger;
pub mod merger;
pub mod pipeline;
pub mod retention;

pub use batcher::{EventBatcher, EventSender};
pub use error::MergeError;
pub use logger::StructuredLogger;
pub use merger::GroupMerger;
pub use pipeline::LogGroupPipeline;
