use loggroup_db::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The batch hit an id conflict again after its single retry.
    #[error("Group {id} conflicted again after retry")]
    ConflictAfterRetry { id: String },
}
