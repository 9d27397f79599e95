//! 单元测试共用的脚本化传输、记录型通知接收端与临时目录

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Mutex;
use std::task::Poll;
use std::time::Duration;
use tempfile::TempDir;

use crate::core::error::{DownloadError, TransportKind};
use crate::core::paths::PathProvider;
use crate::core::task::{EventSink, TaskEvent};
use crate::core::transport::{TransferResponse, Transport};

#[derive(Debug, Clone)]
pub(crate) enum ProbeScript {
    Status(u16),
    ConnectError,
    Hang,
}

#[derive(Debug, Clone)]
pub(crate) enum ResponseScript {
    /// 按顺序返回这些块
    Chunks {
        content_length: Option<u64>,
        chunks: Vec<Vec<u8>>,
    },
    /// 先返回这些块，然后报告连接重置
    BrokenAfter {
        content_length: u64,
        chunks: Vec<Vec<u8>>,
    },
    /// 先返回这些块，之后一直挂起
    StallAfter {
        content_length: u64,
        chunks: Vec<Vec<u8>>,
    },
    /// 先返回这些块，读取下一块时 panic
    PanicAfter {
        content_length: u64,
        chunks: Vec<Vec<u8>>,
    },
    Status { status: u16, body: String },
    ConnectError,
}

pub(crate) struct ScriptedTransport {
    probe: ProbeScript,
    response: ResponseScript,
    probed: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new(response: ResponseScript) -> Self {
        Self {
            probe: ProbeScript::Status(200),
            response,
            probed: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn completing(content_length: Option<u64>, chunks: Vec<Vec<u8>>) -> Self {
        Self::new(ResponseScript::Chunks {
            content_length,
            chunks,
        })
    }

    pub(crate) fn with_probe(mut self, probe: ProbeScript) -> Self {
        self.probe = probe;
        self
    }

    pub(crate) fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }

    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

fn body_of(chunks: Vec<Vec<u8>>) -> impl futures::Stream<Item = Result<Bytes, DownloadError>> {
    stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn probe(&self, url: &str, _timeout: Duration) -> Result<u16, DownloadError> {
        self.probed.lock().unwrap().push(url.to_string());
        match &self.probe {
            ProbeScript::Status(status) => Ok(*status),
            ProbeScript::ConnectError => Err(DownloadError::transport(
                TransportKind::Connect,
                "dns error: failed to lookup address",
            )),
            ProbeScript::Hang => futures::future::pending().await,
        }
    }

    async fn open(&self, url: &str) -> Result<TransferResponse, DownloadError> {
        self.opened.lock().unwrap().push(url.to_string());
        match self.response.clone() {
            ResponseScript::Chunks {
                content_length,
                chunks,
            } => Ok(TransferResponse {
                content_length,
                body: body_of(chunks).boxed(),
            }),
            ResponseScript::BrokenAfter {
                content_length,
                chunks,
            } => Ok(TransferResponse {
                content_length: Some(content_length),
                body: body_of(chunks)
                    .chain(stream::once(async {
                        Err(DownloadError::transport(TransportKind::Body, "connection reset by peer"))
                    }))
                    .boxed(),
            }),
            ResponseScript::StallAfter {
                content_length,
                chunks,
            } => Ok(TransferResponse {
                content_length: Some(content_length),
                body: body_of(chunks).chain(stream::pending()).boxed(),
            }),
            ResponseScript::PanicAfter {
                content_length,
                chunks,
            } => Ok(TransferResponse {
                content_length: Some(content_length),
                body: body_of(chunks)
                    .chain(stream::poll_fn(
                        |_| -> Poll<Option<Result<Bytes, DownloadError>>> { panic!("响应体读取崩溃") },
                    ))
                    .boxed(),
            }),
            ResponseScript::Status { status, body } => Err(DownloadError::http_status(status, body)),
            ResponseScript::ConnectError => Err(DownloadError::transport(
                TransportKind::Connect,
                "connection refused",
            )),
        }
    }
}

/// 记录所有通知的接收端
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<TaskEvent>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn progress(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::ProgressChanged(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn count(&self, event: &TaskEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: TaskEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// 临时目录同时充当下载目录和安装目录
pub(crate) struct TempPaths {
    dir: TempDir,
}

impl TempPaths {
    pub(crate) fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl PathProvider for TempPaths {
    fn tmp_dir(&self) -> &Path {
        self.dir.path()
    }

    fn install_dir(&self) -> &Path {
        self.dir.path()
    }
}
