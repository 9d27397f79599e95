//! Core: 下载任务、传输层、目录布局与管理器 actor

pub mod error;
pub mod manager;
pub mod paths;
pub mod task;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{DownloadError, DownloadResult, ErrorCategory};
pub use manager::{
    CancelDownload, DownloadManagerActor, GetSnapshot, Shutdown, StartDownload, Subscribe, TaskNotice,
    TaskSnapshot,
};
pub use paths::{AppPaths, PathProvider};
pub use transport::{ReqwestTransport, Transport};
