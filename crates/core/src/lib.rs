//! Log grouping domain logic.
//!
//! Pure functions and data types with no I/O:
//!
//! - [`stack_frame`]: application call-site extraction from stack traces.
//! - [`template`]: template inference from rendered messages.
//! - [`group_key`]: deterministic group keys and record ids.
//! - [`record`]: the [`GroupRecord`](record::GroupRecord) aggregate and its
//!   merge rules.
//! - [`scope`]: ambient scope values and their flattening.
//! - [`exception`]: exception capture and rendering.
//! - [`capture`]: assembling a stamped [`LogEvent`](event::LogEvent).
//! - [`config`]: options shared by the runtime services.

pub mod capture;
pub mod config;
pub mod error;
pub mod event;
pub mod exception;
pub mod group_key;
pub mod record;
pub mod scope;
pub mod stack_frame;
pub mod template;
pub mod types;
