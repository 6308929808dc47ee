pub mod download;
pub mod scheduler;
pub mod types;
pub mod upload;

pub use download::DownloadSyncManager;
pub use scheduler::{SchedulerConfig, SyncScheduler};
pub use types::{
    MeterSyncResult, SyncCycleResult, SyncStatus, TenantChange, TenantSyncResult, UploadResult,
};
pub use upload::UploadSyncManager;
