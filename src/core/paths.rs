use log::{info, warn};
use std::io;
use std::path::{Path, PathBuf};

use crate::core::error::{DownloadError, DownloadResult};

/// 下载目录提供者，保证返回的目录已经存在
pub trait PathProvider: Send + Sync {
    /// 临时下载目录
    fn tmp_dir(&self) -> &Path;
    /// 框架安装目录
    fn install_dir(&self) -> &Path;
}

/// 以基础目录为根的默认目录布局
#[derive(Debug, Clone)]
pub struct AppPaths {
    base: PathBuf,
    tmp: PathBuf,
    install: PathBuf,
}

impl AppPaths {
    pub fn new(base: impl Into<PathBuf>) -> DownloadResult<Self> {
        let base = base.into();
        let paths = Self {
            tmp: base.join("tmp"),
            install: base.join("framework"),
            base,
        };
        paths.validate()?;
        Ok(paths)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    fn validate(&self) -> DownloadResult<()> {
        info!("{} 开始验证路径 {}", "-".repeat(10), "-".repeat(10));
        ensure_dir(&self.tmp)?;
        ensure_dir(&self.install)?;
        info!("{} 路径验证完成 {}", "-".repeat(10), "-".repeat(10));
        Ok(())
    }
}

impl PathProvider for AppPaths {
    fn tmp_dir(&self) -> &Path {
        &self.tmp
    }

    fn install_dir(&self) -> &Path {
        &self.install
    }
}

fn ensure_dir(path: &Path) -> DownloadResult<()> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        warn!("存在一个同名文件, 请检查: {}", path.display());
        return Err(DownloadError::filesystem(
            io::Error::new(io::ErrorKind::AlreadyExists, "路径被普通文件占用"),
            path,
        ));
    }
    std::fs::create_dir_all(path).map_err(|e| DownloadError::filesystem(e, path))?;
    info!("路径不存在, 已创建: {}", path.display());
    Ok(())
}
