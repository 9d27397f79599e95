//! HTTP 传输抽象
//!
//! 任务只通过 [`Transport`] 访问网络，错误在这里被归类为
//! [`DownloadError`] 的具体分支。

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use log::debug;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;

use crate::config::Config;
use crate::core::error::{DownloadError, DownloadResult};

/// 已收到响应头、尚未读取响应体的传输
pub struct TransferResponse {
    /// 响应头中的 Content-Length
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, DownloadResult<Bytes>>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// 对探测目标发送 HEAD 请求，返回状态码
    async fn probe(&self, url: &str, timeout: Duration) -> DownloadResult<u16>;

    /// 发起跟随重定向的 GET 请求；非 2xx 状态返回 `HttpStatus`
    async fn open(&self, url: &str) -> DownloadResult<TransferResponse>;
}

/// 基于 reqwest 的传输实现
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &Config) -> DownloadResult<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(Policy::limited(config.max_redirects))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            // 每个下载线程有独立的运行时，连接不跨运行时复用
            .pool_max_idle_per_host(0)
            .build()
            .map_err(DownloadError::from)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn probe(&self, url: &str, timeout: Duration) -> DownloadResult<u16> {
        let response = self.client.head(url).timeout(timeout).send().await?;
        Ok(response.status().as_u16())
    }

    async fn open(&self, url: &str) -> DownloadResult<TransferResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DownloadError::http_status(status.as_u16(), body));
        }

        debug!("{} 响应头: {:?}", response.url(), response.headers());
        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(DownloadError::from))
            .boxed();
        Ok(TransferResponse {
            content_length,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_builds_from_default_config() {
        let config = Config::default();
        assert!(ReqwestTransport::new(&config).is_ok());
    }
}
