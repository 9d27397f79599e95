use anyhow::Result;
use url::Url;

/// 只接受带主机名的 http/https 链接
pub fn is_valid_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// 镜像前缀必须是合法链接并以 `/` 结尾，原始链接会直接拼接在其后
pub fn validate_mirror_base(base: &str) -> Result<()> {
    if !is_valid_url(base) {
        anyhow::bail!("镜像前缀无效: {}", base);
    }
    if !base.ends_with('/') {
        anyhow::bail!("镜像前缀必须以 / 结尾: {}", base);
    }
    Ok(())
}

pub fn validate_base_dir(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        anyhow::bail!("数据根目录不能为空");
    }
    Ok(())
}
