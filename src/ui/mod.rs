mod progress;

use serde::Serialize;
use std::fmt;
pub use progress::ProgressView;

use crate::core::task::{ArtifactKind, TaskState};

pub fn print_success(message: &str) {
    println!("✓ {}", message);
}

pub fn print_error(message: &str) {
    eprintln!("✗ {}", message);
}

/// 一次下载结束后的摘要
#[derive(Debug, Clone, Serialize)]
pub struct DownloadSummary {
    pub kind: ArtifactKind,
    pub url: String,
    pub state: TaskState,
    /// 仅在完成时有值
    pub file: Option<String>,
    pub file_size: Option<u64>,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed_time: std::time::Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &std::time::Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl DownloadSummary {
    pub fn succeeded(&self) -> bool {
        self.state == TaskState::Completed
    }
}

impl fmt::Display for DownloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n下载摘要:")?;
        writeln!(f, "产物: {}", self.kind)?;
        writeln!(f, "链接: {}", self.url)?;
        let result = match self.state {
            TaskState::Completed => "成功",
            TaskState::Cancelled => "已取消",
            _ => "失败",
        };
        writeln!(f, "结果: {}", result)?;
        if let Some(file) = &self.file {
            writeln!(f, "文件: {}", file)?;
        }
        if let Some(size) = self.file_size {
            writeln!(f, "大小: {}", format_size(size))?;
        }
        writeln!(f, "耗时: {:.2}秒", self.elapsed_time.as_secs_f64())?;
        Ok(())
    }
}

pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(10 * 1024 * 1024), "10.00 MB");
    }

    #[test]
    fn test_summary_display_and_json() {
        let summary = DownloadSummary {
            kind: ArtifactKind::Framework,
            url: "https://example.com/a.zip".to_string(),
            state: TaskState::Cancelled,
            file: None,
            file_size: None,
            elapsed_time: Duration::from_millis(1500),
        };
        assert!(!summary.succeeded());
        let text = summary.to_string();
        assert!(text.contains("已取消"));
        assert!(text.contains("1.50秒"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["kind"], "framework");
        assert_eq!(json["state"], "cancelled");
        assert_eq!(json["elapsed_secs"], 1.5);
    }
}
