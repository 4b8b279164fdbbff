#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record with this id was created concurrently.
    #[error("Group {id} already exists")]
    Conflict { id: String },

    /// The backend does not offer the requested capability.
    #[error("Unsupported by this store: {0}")]
    Unsupported(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}
