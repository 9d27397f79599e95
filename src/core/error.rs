use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// HTTP 错误响应体在日志中保留的最大长度
const MAX_BODY_PREVIEW: usize = 1024;

/// 传输层错误的细分类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    Connect,
    Redirect,
    Body,
    Request,
    Other,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::Timeout => "超时",
            TransportKind::Connect => "连接失败",
            TransportKind::Redirect => "重定向",
            TransportKind::Body => "响应体读取",
            TransportKind::Request => "请求构建",
            TransportKind::Other => "其他",
        };
        f.write_str(name)
    }
}

/// 错误大类，决定日志细节与状态文本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    SizeUnavailable,
    Http,
    Transport,
    Filesystem,
    Cancelled,
    Setup,
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("无法获取文件大小: Content-Length 为空或为 0")]
    ContentLengthUnavailable,

    #[error("HTTP 状态错误: 响应码 {status}, 响应内容: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("传输错误({kind}): {message}")]
    Transport { kind: TransportKind, message: String },

    #[error("文件系统错误({kind:?}) {}: {message}", .path.display())]
    Filesystem {
        kind: io::ErrorKind,
        path: PathBuf,
        message: String,
    },

    #[error("响应体超出声明长度: 声明 {expected} 字节, 已收到 {actual} 字节")]
    BodyOverflow { expected: u64, actual: u64 },

    #[error("文件大小不匹配: 预期 {expected} 字节, 实际 {actual} 字节")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("下载被取消")]
    Cancelled,

    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("任务已在运行: {0}")]
    AlreadyRunning(String),

    #[error("下载线程异常: {0}")]
    Worker(String),
}

impl DownloadError {
    /// 构造 HTTP 状态错误，过长的响应体会被截断
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > MAX_BODY_PREVIEW {
            let mut cut = MAX_BODY_PREVIEW;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("...");
        }
        DownloadError::HttpStatus { status, body }
    }

    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        DownloadError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// 将 IO 错误与出错路径绑定
    pub fn filesystem(error: io::Error, path: &Path) -> Self {
        DownloadError::Filesystem {
            kind: error.kind(),
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DownloadError::ContentLengthUnavailable => ErrorCategory::SizeUnavailable,
            DownloadError::HttpStatus { .. } => ErrorCategory::Http,
            DownloadError::Transport { .. }
            | DownloadError::BodyOverflow { .. }
            | DownloadError::SizeMismatch { .. } => ErrorCategory::Transport,
            DownloadError::Filesystem { .. } => ErrorCategory::Filesystem,
            DownloadError::Cancelled => ErrorCategory::Cancelled,
            DownloadError::InvalidUrl(_)
            | DownloadError::Config(_)
            | DownloadError::AlreadyRunning(_)
            | DownloadError::Worker(_) => ErrorCategory::Setup,
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportKind::Timeout
        } else if error.is_connect() {
            TransportKind::Connect
        } else if error.is_redirect() {
            TransportKind::Redirect
        } else if error.is_body() || error.is_decode() {
            TransportKind::Body
        } else if error.is_builder() || error.is_request() {
            TransportKind::Request
        } else {
            TransportKind::Other
        };
        DownloadError::transport(kind, error.to_string())
    }
}

pub type DownloadResult<T> = Result<T, DownloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        assert_eq!(
            DownloadError::ContentLengthUnavailable.category(),
            ErrorCategory::SizeUnavailable
        );
        assert_eq!(
            DownloadError::http_status(404, "not found").category(),
            ErrorCategory::Http
        );
        assert_eq!(
            DownloadError::transport(TransportKind::Timeout, "read timed out").category(),
            ErrorCategory::Transport
        );
        assert_eq!(
            DownloadError::SizeMismatch { expected: 10, actual: 5 }.category(),
            ErrorCategory::Transport
        );
        assert_eq!(DownloadError::Cancelled.category(), ErrorCategory::Cancelled);
        assert_eq!(
            DownloadError::AlreadyRunning("框架".to_string()).category(),
            ErrorCategory::Setup
        );
    }

    #[test]
    fn test_filesystem_error_keeps_kind_and_path() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::filesystem(io_error, Path::new("/tmp/artifact.zip"));
        match &error {
            DownloadError::Filesystem { kind, path, .. } => {
                assert_eq!(*kind, io::ErrorKind::PermissionDenied);
                assert_eq!(path, Path::new("/tmp/artifact.zip"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(error.category(), ErrorCategory::Filesystem);
        assert!(error.to_string().contains("/tmp/artifact.zip"));
    }

    #[test]
    fn test_http_body_is_truncated() {
        let error = DownloadError::http_status(500, "x".repeat(4096));
        match error {
            DownloadError::HttpStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), MAX_BODY_PREVIEW + 3);
                assert!(body.ends_with("..."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
