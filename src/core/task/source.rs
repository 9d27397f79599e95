//! 网络探测与下载源选择

use log::{info, warn};
use std::time::Duration;

use crate::core::transport::Transport;

/// 探测参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    /// 探测目标，与下载源无关
    pub target: String,
    pub timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            target: "https://github.com".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// 检查网络环境：超时内返回 200 才算良好，探测失败不是任务错误
pub async fn check_network(transport: &dyn Transport, probe: &ProbeSettings) -> bool {
    info!("{} 检查网络环境 {}", "-".repeat(10), "-".repeat(10));
    match tokio::time::timeout(probe.timeout, transport.probe(&probe.target, probe.timeout)).await {
        Ok(Ok(200)) => {
            info!("网络环境良好: {}", probe.target);
            true
        }
        Ok(Ok(status)) => {
            warn!("探测 {} 返回状态码 {}, 视为网络环境较差", probe.target, status);
            false
        }
        Ok(Err(e)) => {
            warn!("探测 {} 失败: {}", probe.target, e);
            false
        }
        Err(_) => {
            warn!("探测 {} 超过 {:?} 未响应", probe.target, probe.timeout);
            false
        }
    }
}

/// 镜像改写：原样拼接 mirror_base 与原始链接
pub fn mirror_url(mirror_base: &str, original: &str) -> String {
    format!("{}{}", mirror_base, original)
}
