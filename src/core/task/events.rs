//! 任务对外发布的通知与订阅接口

use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

/// 状态标签文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusText {
    CheckingNetwork,
    NetworkGood,
    NetworkDegraded,
    MirrorSelected(String),
    Starting,
    Downloading,
    Completed,
    SizeUnavailable,
    Failed,
    Cancelled,
}

impl fmt::Display for StatusText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusText::CheckingNetwork => f.write_str("检查网络环境"),
            StatusText::NetworkGood => f.write_str("网络环境良好"),
            StatusText::NetworkDegraded => f.write_str("网络环境较差"),
            StatusText::MirrorSelected(url) => write!(f, "切换下载链接为: {}", url),
            StatusText::Starting => f.write_str("开始下载 ~"),
            StatusText::Downloading => f.write_str("正在下载 ~"),
            StatusText::Completed => f.write_str("下载完成"),
            StatusText::SizeUnavailable => f.write_str("无法获取文件大小"),
            StatusText::Failed => f.write_str("下载失败"),
            StatusText::Cancelled => f.write_str("下载已取消"),
        }
    }
}

/// 下载任务发出的通知，顺序即产生顺序
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum TaskEvent {
    StatusChanged(StatusText),
    ProgressChanged(u8),
    IndeterminateModeChanged(bool),
    Completed,
    Failed,
    Cancelled,
}

impl TaskEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskEvent::Completed | TaskEvent::Failed | TaskEvent::Cancelled
        )
    }
}

/// 通知的接收端，由表现层实现
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TaskEvent);
}

impl EventSink for UnboundedSender<TaskEvent> {
    fn emit(&self, event: TaskEvent) {
        // 接收端已关闭时丢弃
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_texts_are_distinct() {
        assert_ne!(
            StatusText::SizeUnavailable.to_string(),
            StatusText::Failed.to_string()
        );
        assert!(StatusText::MirrorSelected("https://m/x".to_string())
            .to_string()
            .contains("https://m/x"));
    }

    #[test]
    fn test_channel_sink_keeps_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.emit(TaskEvent::ProgressChanged(10));
        tx.emit(TaskEvent::ProgressChanged(20));
        tx.emit(TaskEvent::Completed);
        assert_eq!(rx.try_recv().ok(), Some(TaskEvent::ProgressChanged(10)));
        assert_eq!(rx.try_recv().ok(), Some(TaskEvent::ProgressChanged(20)));
        assert_eq!(rx.try_recv().ok(), Some(TaskEvent::Completed));
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_string(&TaskEvent::ProgressChanged(42)).unwrap();
        assert_eq!(json, r#"{"event":"progress_changed","value":42}"#);
        let json = serde_json::to_string(&TaskEvent::Completed).unwrap();
        assert_eq!(json, r#"{"event":"completed"}"#);
    }
}
