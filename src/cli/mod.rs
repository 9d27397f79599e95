//! CLI: 命令行接口和参数解析模块
//!
//! ## 支持的命令
//!
//! - 下载框架：`botdl framework`
//! - 下载宿主应用：`botdl host-app --url <url>`
//! - 编辑配置：`botdl -e`
//! - 指定配置：`botdl -c botdl.conf framework`
//!
//! ## 平台支持
//!
//! - Windows: `%APPDATA%/botdl/botdl.conf`
//! - macOS: `~/Library/Application Support/botdl/botdl.conf`
//! - Linux: `~/.config/botdl/botdl.conf`

use clap::{Parser, ValueEnum};
use std::env;

use crate::config::Config;
use crate::core::error::DownloadError;
use crate::core::task::{ArtifactKind, Destination};
use crate::utils::validator::is_valid_url;

/// 获取平台默认配置文件路径
pub fn default_config_path() -> String {
    #[cfg(target_os = "windows")]
    {
        let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        format!("{}/botdl/botdl.conf", appdata)
    }
    #[cfg(target_os = "macos")]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/Library/Application Support/botdl/botdl.conf", home)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/.config/botdl/botdl.conf", home)
    }
}

/// 打开配置文件编辑器
pub fn open_config_in_editor(config_path: &str) {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("notepad").arg(config_path).status().ok();
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg("-e").arg(config_path).status().ok();
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // 优先 xdg-open，否则 nano
        if std::process::Command::new("xdg-open").arg(config_path).status().is_err() {
            let _ = std::process::Command::new("nano").arg(config_path).status();
        }
    }
}

/// 命令行中的产物名称
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactArg {
    /// 机器人框架压缩包
    Framework,
    /// 宿主应用安装包
    HostApp,
}

impl From<ArtifactArg> for ArtifactKind {
    fn from(arg: ArtifactArg) -> Self {
        match arg {
            ArtifactArg::Framework => ArtifactKind::Framework,
            ArtifactArg::HostApp => ArtifactKind::HostApp,
        }
    }
}

/// botdl 命令行参数
///
/// 示例用法：
///   botdl framework
///   botdl host-app --url https://example.com/setup.exe
///   botdl -e  # 编辑配置文件
#[derive(Parser, Debug, Clone)]
#[command(
    name = "botdl",
    version = env!("CARGO_PKG_VERSION"),
    about = "机器人框架与宿主应用下载器",
    long_about = "下载机器人框架压缩包或宿主应用安装包，网络较差时自动切换到镜像。\n\n示例：\n  botdl framework\n  botdl framework --install\n  botdl host-app --url https://example.com/setup.exe\n  botdl -e\n"
)]
pub struct Args {
    /// 要下载的产物
    #[arg(value_enum, required_unless_present = "edit_config", help = "要下载的产物：framework 或 host-app。")]
    pub artifact: Option<ArtifactArg>,

    /// 覆盖配置中的下载链接
    #[arg(long, short = 'u', help = "下载链接，覆盖配置文件中的设置。")]
    pub url: Option<String>,

    /// 配置文件路径，默认为平台推荐路径
    #[arg(short = 'c', long, default_value_t = default_config_path(), help = "配置文件路径，默认为平台推荐路径。")]
    pub config: String,

    /// 编辑配置文件（-e 或 --edit）
    #[arg(short = 'e', long = "edit", help = "用系统默认编辑器打开配置文件并退出。")]
    pub edit_config: bool,

    #[arg(long, short = 'd', help = "数据根目录，覆盖配置文件中的设置。")]
    pub base_dir: Option<String>,

    #[arg(long, short = 'm', help = "镜像前缀，覆盖配置文件中的设置。")]
    pub mirror: Option<String>,

    #[arg(long, help = "跳过网络检查，直接使用原始链接。")]
    pub no_probe: bool,

    #[arg(long, help = "下载到安装目录而不是临时目录。")]
    pub install: bool,

    #[arg(long, help = "以 JSON 输出下载摘要。")]
    pub json: bool,
}

impl Args {
    /// 解析命令行参数，并加载合并后的配置
    pub fn parse_args() -> Result<(Self, Config), DownloadError> {
        let args = Args::parse();
        let config = args.load_config()?;
        Ok((args, config))
    }

    /// 加载或创建配置文件，合并命令行参数后校验
    pub fn load_config(&self) -> Result<Config, DownloadError> {
        let mut config = Config::load(&self.config)?;
        config.merge_from_args(self);
        config
            .validate()
            .map_err(|e| DownloadError::Config(format!("配置无效: {}", e)))?;
        if let Some(url) = &self.url {
            if !is_valid_url(url) {
                return Err(DownloadError::InvalidUrl(url.clone()));
            }
        }
        Ok(config)
    }

    pub fn kind(&self) -> Option<ArtifactKind> {
        self.artifact.map(ArtifactKind::from)
    }

    pub fn destination(&self) -> Destination {
        if self.install {
            Destination::Install
        } else {
            Destination::Temp
        }
    }
}
