use futures::StreamExt;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::core::error::{DownloadError, ErrorCategory};
use crate::core::paths::PathProvider;
use crate::core::transport::{TransferResponse, Transport};
use crate::utils::validator::is_valid_url;
use super::events::{EventSink, StatusText, TaskEvent};
use super::source::{check_network, mirror_url, ProbeSettings};
use super::state::TaskState;
use super::util::{file_name_from_url, progress_percent, CancelToken};

/// 下载产物的种类，两种任务互相独立
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// 机器人框架压缩包
    Framework,
    /// 宿主应用安装包
    HostApp,
}

impl ArtifactKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Framework => "框架",
            ArtifactKind::HostApp => "宿主应用",
        }
    }

    fn slug(&self) -> &'static str {
        match self {
            ArtifactKind::Framework => "framework",
            ArtifactKind::HostApp => "host-app",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 下载目标目录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    #[default]
    Temp,
    Install,
}

/// 构造任务所需的参数
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub kind: ArtifactKind,
    pub url: String,
    pub mirror_base: String,
    /// None 表示跳过网络探测，直接使用原始链接
    pub probe: Option<ProbeSettings>,
    pub destination: Destination,
}

impl DownloadRequest {
    pub fn new(kind: ArtifactKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            mirror_base: "https://gh.ddlc.top/".to_string(),
            probe: None,
            destination: Destination::Temp,
        }
    }

    pub fn with_probe(mut self, probe: ProbeSettings) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_mirror_base(mut self, mirror_base: impl Into<String>) -> Self {
        self.mirror_base = mirror_base.into();
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }
}

/// 单次下载任务，启动后被消耗，不能复用
pub struct DownloadTask {
    id: Uuid,
    kind: ArtifactKind,
    url: String,
    mirror_base: String,
    probe: Option<ProbeSettings>,
    destination_dir: PathBuf,
    state: TaskState,
    total_bytes: Option<u64>,
    bytes_written: u64,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn EventSink>,
    cancel: CancelToken,
    guard: Option<RunGuard>,
}

impl DownloadTask {
    pub fn new(
        request: DownloadRequest,
        paths: &dyn PathProvider,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, DownloadError> {
        Self::with_id(Uuid::new_v4(), request, paths, transport, sink)
    }

    /// 使用调用方预先分配的任务 id，便于通知接收端携带它
    pub fn with_id(
        id: Uuid,
        request: DownloadRequest,
        paths: &dyn PathProvider,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, DownloadError> {
        validate_source(&request.url)?;
        let destination_dir = match request.destination {
            Destination::Temp => paths.tmp_dir().to_path_buf(),
            Destination::Install => paths.install_dir().to_path_buf(),
        };
        Ok(Self {
            id,
            kind: request.kind,
            url: request.url,
            mirror_base: request.mirror_base,
            probe: request.probe,
            destination_dir,
            state: TaskState::Idle,
            total_bytes: None,
            bytes_written: 0,
            transport,
            sink,
            cancel: CancelToken::new(),
            guard: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// 取消令牌在启动前取出，启动后用于从其他线程取消
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn set_url(&mut self, url: impl Into<String>) -> Result<(), DownloadError> {
        let url = url.into();
        validate_source(&url)?;
        self.url = url;
        Ok(())
    }

    pub fn set_destination_dir(&mut self, dir: impl Into<PathBuf>) {
        self.destination_dir = dir.into();
    }

    /// 在独立线程中运行任务
    pub fn spawn(self) -> Result<TaskHandle, DownloadError> {
        let id = self.id;
        let kind = self.kind;
        let cancel = self.cancel.clone();
        let thread = std::thread::Builder::new()
            .name(format!("download-{}", kind.slug()))
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build();
                match rt {
                    Ok(rt) => rt.block_on(self.run()),
                    Err(e) => self.abort(DownloadError::Worker(format!("无法创建运行时: {}", e))),
                }
            })
            .map_err(|e| DownloadError::Worker(e.to_string()))?;
        Ok(TaskHandle {
            id,
            kind,
            cancel,
            thread,
        })
    }

    /// 运行到终态并返回该终态
    pub async fn run(mut self) -> TaskState {
        self.guard = Some(RunGuard::new(self.sink.clone()));
        self.sink.emit(TaskEvent::IndeterminateModeChanged(true));

        let result = self.execute().await;
        self.finish(result);
        self.settle()
    }

    fn abort(mut self, error: DownloadError) -> TaskState {
        self.guard = Some(RunGuard::new(self.sink.clone()));
        self.finish(Err(error));
        self.settle()
    }

    /// 终态通知已发出，释放守卫并发出最后的重置通知
    fn settle(mut self) -> TaskState {
        if let Some(mut guard) = self.guard.take() {
            guard.settle();
        }
        self.state
    }

    /// 记录正在写入的文件，运行中途 panic 时由守卫删除
    fn track_partial(&mut self, path: Option<&Path>) {
        if let Some(guard) = self.guard.as_mut() {
            guard.partial = path.map(Path::to_path_buf);
        }
    }

    async fn execute(&mut self) -> Result<(), DownloadError> {
        self.ensure_not_cancelled()?;
        let url = self.select_source().await?;
        self.ensure_not_cancelled()?;

        self.transition(TaskState::Downloading);
        info!("{} 开始下载{} ~ {}", "-".repeat(10), self.kind, "-".repeat(10));
        info!("任务 {} 下载链接: {}", self.id, url);
        self.sink.emit(TaskEvent::StatusChanged(StatusText::Starting));

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self.transport.open(&url) => response?,
        };

        let total = match response.content_length {
            Some(total) if total > 0 => total,
            other => {
                error!(
                    "无法获取文件大小, Content-Length为空或无法连接到下载链接 (content_length = {:?})",
                    other
                );
                return Err(DownloadError::ContentLengthUnavailable);
            }
        };
        self.total_bytes = Some(total);
        self.sink.emit(TaskEvent::IndeterminateModeChanged(false));

        let path = self.destination_dir.join(file_name_from_url(&url)?);
        info!("文件将保存到: {} ({} 字节)", path.display(), total);
        let result = self.stream_to_file(response, &path, total).await;
        if result.is_err() {
            discard_partial(&path).await;
        }
        self.track_partial(None);
        result
    }

    /// 需要时进行网络探测，决定实际下载链接
    async fn select_source(&mut self) -> Result<String, DownloadError> {
        let Some(probe) = self.probe.clone() else {
            return Ok(self.url.clone());
        };

        self.transition(TaskState::ProbingNetwork);
        self.sink.emit(TaskEvent::StatusChanged(StatusText::CheckingNetwork));
        let healthy = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
            healthy = check_network(self.transport.as_ref(), &probe) => healthy,
        };

        if healthy {
            self.sink.emit(TaskEvent::StatusChanged(StatusText::NetworkGood));
            Ok(self.url.clone())
        } else {
            let mirrored = mirror_url(&self.mirror_base, &self.url);
            info!("访问 {} 速度偏慢, 切换下载链接为: {}", probe.target, mirrored);
            self.sink.emit(TaskEvent::StatusChanged(StatusText::NetworkDegraded));
            self.sink
                .emit(TaskEvent::StatusChanged(StatusText::MirrorSelected(mirrored.clone())));
            Ok(mirrored)
        }
    }

    async fn stream_to_file(
        &mut self,
        response: TransferResponse,
        path: &Path,
        total: u64,
    ) -> Result<(), DownloadError> {
        let mut body = response.body;
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| DownloadError::filesystem(e, path))?;
        self.track_partial(Some(path));

        loop {
            self.ensure_not_cancelled()?;
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = body.next() => next,
            };
            let chunk = match next {
                Some(chunk) => chunk?,
                None => break,
            };

            let written = self.bytes_written + chunk.len() as u64;
            if written > total {
                return Err(DownloadError::BodyOverflow {
                    expected: total,
                    actual: written,
                });
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::filesystem(e, path))?;
            self.bytes_written = written;

            self.sink
                .emit(TaskEvent::ProgressChanged(progress_percent(written, total)));
            self.sink.emit(TaskEvent::StatusChanged(StatusText::Downloading));
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::filesystem(e, path))?;
        drop(file);

        if self.bytes_written != total {
            return Err(DownloadError::SizeMismatch {
                expected: total,
                actual: self.bytes_written,
            });
        }
        debug!("任务 {} 写入完成: {} 字节", self.id, self.bytes_written);
        Ok(())
    }

    /// 把执行结果转换为终态与通知
    fn finish(&mut self, result: Result<(), DownloadError>) {
        match result {
            Ok(()) => {
                self.transition(TaskState::Completed);
                self.sink.emit(TaskEvent::Completed);
                self.sink.emit(TaskEvent::StatusChanged(StatusText::Completed));
                info!("{} 下载{}结束 ~ {}", "-".repeat(10), self.kind, "-".repeat(10));
            }
            Err(DownloadError::Cancelled) => {
                self.transition(TaskState::Cancelled);
                info!("任务 {} ({}) 已取消, 已写入 {} 字节", self.id, self.kind, self.bytes_written);
                self.sink.emit(TaskEvent::StatusChanged(StatusText::Cancelled));
                self.sink.emit(TaskEvent::Cancelled);
            }
            Err(error) => {
                self.transition(TaskState::Failed);
                log_failure(self.kind, &error);
                let text = match error.category() {
                    ErrorCategory::SizeUnavailable => StatusText::SizeUnavailable,
                    _ => StatusText::Failed,
                };
                self.sink.emit(TaskEvent::StatusChanged(text));
                self.sink.emit(TaskEvent::Failed);
            }
        }
    }

    fn transition(&mut self, next: TaskState) {
        if !self.state.can_transition_to(next) {
            error!("任务 {} 非法状态转换: {:?} -> {:?}", self.id, self.state, next);
            return;
        }
        debug!("任务 {} 状态: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    fn ensure_not_cancelled(&self) -> Result<(), DownloadError> {
        if self.cancel.is_cancelled() {
            Err(DownloadError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadTask")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("destination_dir", &self.destination_dir)
            .field("state", &self.state)
            .field("total_bytes", &self.total_bytes)
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}

/// 运行中任务的句柄
pub struct TaskHandle {
    id: Uuid,
    kind: ArtifactKind,
    cancel: CancelToken,
    thread: JoinHandle<TaskState>,
}

impl TaskHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// 阻塞等待下载线程结束
    pub fn join(self) -> Result<TaskState, DownloadError> {
        self.thread
            .join()
            .map_err(|_| DownloadError::Worker(format!("{} 下载线程异常退出", self.kind)))
    }
}

/// 保证每条退出路径最后都把进度显示重置为不确定模式
struct RunGuard {
    sink: Arc<dyn EventSink>,
    settled: bool,
    /// 已创建但尚未写完的文件
    partial: Option<PathBuf>,
}

impl RunGuard {
    fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            settled: false,
            partial: None,
        }
    }

    fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.settled {
            // 运行中途 panic，终态通知还没有发出
            error!("下载任务异常中断");
            if let Some(path) = self.partial.take() {
                // 正在展开栈，只能同步删除
                match std::fs::remove_file(&path) {
                    Ok(()) => debug!("已删除不完整的文件: {}", path.display()),
                    Err(e) => warn!("删除不完整的文件失败 {}: {}", path.display(), e),
                }
            }
            self.sink.emit(TaskEvent::StatusChanged(StatusText::Failed));
            self.sink.emit(TaskEvent::Failed);
        }
        self.sink.emit(TaskEvent::IndeterminateModeChanged(true));
    }
}

fn validate_source(url: &str) -> Result<(), DownloadError> {
    if !is_valid_url(url) {
        return Err(DownloadError::InvalidUrl(url.to_string()));
    }
    file_name_from_url(url).map(|_| ())
}

fn log_failure(kind: ArtifactKind, error: &DownloadError) {
    match error {
        DownloadError::HttpStatus { status, body } => {
            error!(
                "发送下载{}请求时引发 HTTP 状态错误, 响应码: {}, 响应内容: {}",
                kind, status, body
            );
        }
        DownloadError::Transport { kind: transport_kind, message } => {
            error!("下载{}时引发传输错误 [{}]: {}", kind, transport_kind, message);
        }
        DownloadError::Filesystem { kind: io_kind, path, message } => {
            error!(
                "下载{}时引发文件系统错误 [{:?}] {}: {}",
                kind,
                io_kind,
                path.display(),
                message
            );
        }
        other => error!("下载{}时引发 {:?}: {}", kind, other.category(), other),
    }
}

/// 失败或取消后删除不完整的文件
async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("已删除不完整的文件: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("删除不完整的文件失败 {}: {}", path.display(), e),
    }
}
