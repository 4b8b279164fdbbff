/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Deterministic 32-bit group key produced by [`crate::group_key`].
pub type GroupKeyHash = i32;

/// Ordered name/value map. Insertion order is preserved (`preserve_order`).
pub type ValueMap = serde_json::Map<String, serde_json::Value>;
