use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("sync request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sync service rejected the trigger with status {0}")]
    SyncRejected(reqwest::StatusCode),

    #[error("no raw data appeared within {0:?}")]
    Timeout(Duration),

    #[error("object store request failed: {0}")]
    ObjectStore(String),

    #[error("container task failed: {0}")]
    Task(String),

    #[error("container task exited with code {0}")]
    TaskExit(i32),

    #[error("run cancelled")]
    Cancelled,
}
