use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

use crate::core::error::DownloadError;

/// 取消令牌：标志位供同步检查，watch 通道用于打断挂起的读取
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    signal: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            signal: Arc::new(signal),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.signal.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// 等待取消请求
    pub async fn cancelled(&self) {
        let mut rx = self.signal.subscribe();
        // sender 由 self 持有，wait_for 不会因通道关闭而返回
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// 取 URL 最后一个路径段作为文件名，百分号编码会被解码
pub fn file_name_from_url(url: &str) -> Result<String, DownloadError> {
    let parsed = Url::parse(url).map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", url, e)))?;
    parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .map(|segment| match urlencoding::decode(segment) {
            Ok(decoded) => decoded.into_owned(),
            // 非 UTF-8 的编码保持原样
            Err(_) => segment.to_string(),
        })
        .filter(|name| is_plain_file_name(name))
        .ok_or_else(|| DownloadError::InvalidUrl(format!("无法从链接推断文件名: {}", url)))
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// floor(written / total * 100)，total 为 0 时返回 0
pub fn progress_percent(written: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (written as u128 * 100) / total as u128;
    percent.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_extraction() {
        assert_eq!(
            file_name_from_url("https://example.com/pkg/artifact.zip").unwrap(),
            "artifact.zip"
        );
        assert_eq!(
            file_name_from_url("https://example.com/file.zip?token=abc").unwrap(),
            "file.zip"
        );
        assert!(file_name_from_url("https://example.com/").is_err());
        assert!(file_name_from_url("not a url").is_err());
    }

    #[test]
    fn test_filename_is_percent_decoded() {
        assert_eq!(
            file_name_from_url("https://example.com/pkg/my%20file.zip").unwrap(),
            "my file.zip"
        );
        assert_eq!(
            file_name_from_url("https://example.com/pkg/%E6%A1%86%E6%9E%B6.zip").unwrap(),
            "框架.zip"
        );
        // 解码后含路径分隔符的名字不能作为文件名
        assert!(file_name_from_url("https://example.com/pkg/..%2Fevil.zip").is_err());
        assert!(file_name_from_url("https://example.com/pkg/a%5Cb.zip").is_err());
        assert!(file_name_from_url("https://example.com/pkg/%2E%2E").is_err());
    }

    #[test]
    fn test_filename_through_mirror_prefix() {
        let mirrored = "https://mirror.example.org/https://github.com/owner/repo/releases/download/v1/Bundle.zip";
        assert_eq!(file_name_from_url(mirrored).unwrap(), "Bundle.zip");
    }

    #[test]
    fn test_progress_percent_floors() {
        assert_eq!(progress_percent(0, 1000), 0);
        assert_eq!(progress_percent(250, 1000), 25);
        assert_eq!(progress_percent(999, 1000), 99);
        assert_eq!(progress_percent(1000, 1000), 100);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(5, 0), 0);
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
        // 已取消时 cancelled() 立即返回
        tokio_test::block_on(other.cancelled());
    }
}
