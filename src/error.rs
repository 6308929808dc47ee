//! Error taxonomy shared by every component: `Connection`, `Query`, `Upload`,
//! `Delete`, `Download`, `Unknown`. Retry policy lives in [`crate::retry`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("upload error: {0}")]
    Upload(String),

    #[error("delete error: {0}")]
    Delete(String),

    #[error("download error: {0}")]
    Download(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl SyncError {
    /// Short tag used in `SyncStatus.last_sync_error` and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Connection(_) => "connection",
            SyncError::Query(_) => "query",
            SyncError::Upload(_) => "upload",
            SyncError::Delete(_) => "delete",
            SyncError::Download(_) => "download",
            SyncError::Unknown(_) => "unknown",
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                SyncError::Connection(e.to_string())
            }
            _ => SyncError::Query(e.to_string()),
        }
    }
}
