//! `task` 模块包含了与单个下载任务相关的所有逻辑
//!
//! 主要包括：
//! - `download`: `DownloadTask` 与工作线程句柄
//! - `state`: 任务状态 `TaskState`
//! - `events`: 对外通知 `TaskEvent` 与接收端 `EventSink`
//! - `source`: 网络探测与镜像选择
//! - `util`: 取消令牌、文件名与进度计算

pub mod download;
pub mod events;
pub mod source;
pub mod state;
pub mod util;


pub use download::{ArtifactKind, Destination, DownloadRequest, DownloadTask, TaskHandle};
pub use events::{EventSink, StatusText, TaskEvent};
pub use source::ProbeSettings;
pub use state::TaskState;
pub use util::CancelToken;
