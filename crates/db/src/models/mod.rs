//! Database row structs.

pub mod log_group;
