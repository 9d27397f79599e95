use actix::prelude::*;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::core::error::DownloadError;
use crate::core::paths::PathProvider;
use crate::core::task::{
    ArtifactKind, Destination, DownloadRequest, DownloadTask, EventSink, StatusText, TaskEvent,
    TaskHandle, TaskState,
};
use crate::core::transport::Transport;

/// ================== 任务快照 ==================
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub task_id: Uuid,
    pub kind: ArtifactKind,
    pub url: String,
    pub state: TaskState,
    pub percent: u8,
    pub indeterminate: bool,
    pub status: Option<String>,
}

impl TaskSnapshot {
    fn new(task_id: Uuid, kind: ArtifactKind, url: String) -> Self {
        Self {
            task_id,
            kind,
            url,
            state: TaskState::Idle,
            percent: 0,
            indeterminate: true,
            status: None,
        }
    }

    /// 按通知更新观察到的状态
    fn apply(&mut self, event: &TaskEvent) {
        match event {
            TaskEvent::StatusChanged(text) => {
                match text {
                    StatusText::CheckingNetwork => self.state = TaskState::ProbingNetwork,
                    StatusText::Starting => self.state = TaskState::Downloading,
                    _ => {}
                }
                self.status = Some(text.to_string());
            }
            TaskEvent::ProgressChanged(percent) => self.percent = *percent,
            TaskEvent::IndeterminateModeChanged(indeterminate) => self.indeterminate = *indeterminate,
            TaskEvent::Completed => {
                // 终态先于状态文本到达，轮询不能看到过时的文本
                self.state = TaskState::Completed;
                self.status = Some(StatusText::Completed.to_string());
            }
            TaskEvent::Failed => self.state = TaskState::Failed,
            TaskEvent::Cancelled => self.state = TaskState::Cancelled,
        }
    }
}

/// 工作线程上报的通知
#[derive(Debug, Clone)]
pub struct TaskNotice {
    pub kind: ArtifactKind,
    pub task_id: Uuid,
    pub event: TaskEvent,
}
impl Message for TaskNotice { type Result = (); }

/// 把任务通知转发到管理器邮箱
struct NoticeSink {
    kind: ArtifactKind,
    task_id: Uuid,
    recipient: Recipient<TaskNotice>,
}

impl EventSink for NoticeSink {
    fn emit(&self, event: TaskEvent) {
        self.recipient.do_send(TaskNotice {
            kind: self.kind,
            task_id: self.task_id,
            event,
        });
    }
}

struct Slot {
    handle: Option<TaskHandle>,
    snapshot: TaskSnapshot,
}

/// 下载管理器 Actor：每种产物同一时间只有一个下载在进行
pub struct DownloadManagerActor {
    config: Config,
    paths: Arc<dyn PathProvider>,
    transport: Arc<dyn Transport>,
    slots: HashMap<ArtifactKind, Slot>,
    subscribers: Vec<Recipient<TaskNotice>>,
}

impl DownloadManagerActor {
    pub fn new(config: Config, paths: Arc<dyn PathProvider>, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            paths,
            transport,
            slots: HashMap::new(),
            subscribers: Vec::new(),
        }
    }

    fn build_request(&self, kind: ArtifactKind, url: String, destination: Destination) -> DownloadRequest {
        let mut request = DownloadRequest::new(kind, url)
            .with_mirror_base(self.config.mirror_base.clone())
            .with_destination(destination);
        // 只有框架下载走网络探测与镜像
        if kind == ArtifactKind::Framework && self.config.probe_enabled {
            request = request.with_probe(self.config.probe_settings());
        }
        request
    }
}

impl Actor for DownloadManagerActor {
    type Context = Context<Self>;

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        // 退出时取消仍在进行的下载，让工作线程自行收尾
        for slot in self.slots.values() {
            if let Some(handle) = slot.handle.as_ref().filter(|handle| !handle.is_finished()) {
                warn!("管理器停止, 取消进行中的{}下载 {}", handle.kind(), handle.id());
                handle.cancel();
            }
        }
        Running::Stop
    }
}

/// 启动下载
pub struct StartDownload {
    pub kind: ArtifactKind,
    /// 为空时使用配置中的链接
    pub url: Option<String>,
    pub destination: Destination,
}
impl Message for StartDownload { type Result = Result<Uuid, DownloadError>; }
impl Handler<StartDownload> for DownloadManagerActor {
    type Result = Result<Uuid, DownloadError>;
    fn handle(&mut self, msg: StartDownload, ctx: &mut Self::Context) -> Self::Result {
        if let Some(slot) = self.slots.get(&msg.kind) {
            if slot.handle.is_some() && !slot.snapshot.state.is_terminal() {
                return Err(DownloadError::AlreadyRunning(format!(
                    "{} ({})",
                    msg.kind, slot.snapshot.task_id
                )));
            }
        }

        let url = match msg.url {
            Some(url) => url,
            None => self.config.url_for(msg.kind).to_string(),
        };
        if url.is_empty() {
            return Err(DownloadError::Config(format!("未配置{}的下载链接", msg.kind)));
        }

        let request = self.build_request(msg.kind, url.clone(), msg.destination);
        let task_id = Uuid::new_v4();
        let sink: Arc<dyn EventSink> = Arc::new(NoticeSink {
            kind: msg.kind,
            task_id,
            recipient: ctx.address().recipient(),
        });
        let task = DownloadTask::with_id(task_id, request, self.paths.as_ref(), self.transport.clone(), sink)?;
        let handle = task.spawn()?;
        info!("已启动{}下载任务 {}: {}", msg.kind, task_id, url);

        self.slots.insert(
            msg.kind,
            Slot {
                handle: Some(handle),
                snapshot: TaskSnapshot::new(task_id, msg.kind, url),
            },
        );
        Ok(task_id)
    }
}

/// 取消指定种类的下载
pub struct CancelDownload { pub kind: ArtifactKind }
impl Message for CancelDownload { type Result = bool; }
impl Handler<CancelDownload> for DownloadManagerActor {
    type Result = bool;
    fn handle(&mut self, msg: CancelDownload, _ctx: &mut Self::Context) -> Self::Result {
        match self.slots.get(&msg.kind) {
            Some(Slot { handle: Some(handle), snapshot }) if !snapshot.state.is_terminal() => {
                info!("取消{}下载任务 {}", msg.kind, handle.id());
                handle.cancel();
                true
            }
            _ => false,
        }
    }
}

/// 查询指定种类的任务快照
pub struct GetSnapshot { pub kind: ArtifactKind }
impl Message for GetSnapshot { type Result = Option<TaskSnapshot>; }
impl Handler<GetSnapshot> for DownloadManagerActor {
    type Result = Option<TaskSnapshot>;
    fn handle(&mut self, msg: GetSnapshot, _ctx: &mut Self::Context) -> Self::Result {
        self.slots.get(&msg.kind).map(|slot| slot.snapshot.clone())
    }
}

/// 停止管理器，进行中的下载会被取消。
/// 工作线程持有管理器地址，丢弃 `Addr` 不会让它停止
pub struct Shutdown;
impl Message for Shutdown { type Result = (); }
impl Handler<Shutdown> for DownloadManagerActor {
    type Result = ();
    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) {
        info!("下载管理器收到停止请求");
        ctx.stop();
    }
}

/// 订阅所有任务通知
pub struct Subscribe(pub Recipient<TaskNotice>);
impl Message for Subscribe { type Result = (); }
impl Handler<Subscribe> for DownloadManagerActor {
    type Result = ();
    fn handle(&mut self, msg: Subscribe, _ctx: &mut Self::Context) {
        self.subscribers.push(msg.0);
    }
}

impl Handler<TaskNotice> for DownloadManagerActor {
    type Result = ();
    fn handle(&mut self, msg: TaskNotice, _ctx: &mut Self::Context) {
        let Some(slot) = self.slots.get_mut(&msg.kind) else {
            return;
        };
        if slot.snapshot.task_id != msg.task_id {
            debug!("忽略过期任务 {} 的通知: {:?}", msg.task_id, msg.event);
            return;
        }

        slot.snapshot.apply(&msg.event);
        if msg.event.is_terminal() {
            // 线程只剩最后的重置通知，不再等待它
            slot.handle = None;
            info!("{}下载任务 {} 结束: {:?}", msg.kind, msg.task_id, slot.snapshot.state);
        }

        for subscriber in &self.subscribers {
            subscriber.do_send(msg.clone());
        }
    }
}
