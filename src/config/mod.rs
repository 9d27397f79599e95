use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core::error::DownloadError;
use crate::core::task::{ArtifactKind, ProbeSettings};
use crate::utils::validator::{is_valid_url, validate_base_dir, validate_mirror_base};

/// 配置结构体
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 数据根目录，临时目录与安装目录都位于其下
    pub base_dir: String,
    /// 框架压缩包下载链接
    pub framework_url: String,
    /// 宿主应用安装包下载链接，为空时必须在命令行指定
    pub host_app_url: String,
    /// 下载框架前是否检查网络环境
    pub probe_enabled: bool,
    /// 网络探测地址
    pub probe_url: String,
    /// 网络探测超时时间（秒）
    pub probe_timeout: u64,
    /// 镜像前缀，原始链接直接拼接在其后
    pub mirror_base: String,
    /// 连接超时时间（秒）
    pub connect_timeout: u64,
    /// 最大重定向次数
    pub max_redirects: usize,
    /// User-Agent
    pub user_agent: String,
    /// 日志文件路径
    pub log_file: String,
    /// 日志级别
    pub log_level: String,
    /// 日志文件最大大小（字节），超过后轮转
    pub log_max_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: ".".to_string(),
            framework_url: "https://github.com/NapNeko/NapCatQQ/releases/latest/download/NapCat.Shell.zip".to_string(),
            host_app_url: String::new(),
            probe_enabled: true,
            probe_url: "https://github.com".to_string(),
            probe_timeout: 5,
            mirror_base: "https://gh.ddlc.top/".to_string(),
            connect_timeout: 10,
            max_redirects: 10,
            user_agent: format!("botdl/{}", env!("CARGO_PKG_VERSION")),
            log_file: "logs/botdl.log".to_string(),
            log_level: "info".to_string(),
            log_max_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl Config {
    /// 加载配置文件，不存在时写入默认配置
    pub fn load(path: &str) -> Result<Self, DownloadError> {
        if Path::new(path).exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| DownloadError::filesystem(e, Path::new(path)))?;
            match toml::from_str(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    eprintln!("配置文件格式错误: {}，将使用默认配置", e);
                    Ok(Config::default())
                }
            }
        } else {
            let config = Config::default();
            config.save_with_tutorial(path)?;
            Ok(config)
        }
    }

    /// 保存带教程的配置文件（唯一写入方法）
    pub fn save_with_tutorial(&self, path: &str) -> Result<(), DownloadError> {
        let target = Path::new(path);
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| DownloadError::filesystem(e, parent))?;
            }
        }
        let config_content = toml::to_string_pretty(self)
            .map_err(|e| DownloadError::Config(format!("无法序列化配置: {}", e)))?;
        let full_content = format!("{}\n{}", Config::generate_tutorial_content(), config_content);
        fs::write(target, full_content).map_err(|e| DownloadError::filesystem(e, target))?;
        Ok(())
    }

    fn generate_tutorial_content() -> &'static str {
        r#"# botdl 配置文件
# ====================
#
# 这是一个 TOML 格式的配置文件，用于配置 botdl 下载器的行为。
#
# 配置文件位置：
# - Windows: %APPDATA%/botdl/botdl.conf
# - macOS: ~/Library/Application Support/botdl/botdl.conf
# - Linux: ~/.config/botdl/botdl.conf
#
# 命令行参数会覆盖配置文件中的设置，优先级：命令行 > 配置文件 > 默认值
#
# 使用示例：
#   botdl framework                                   # 下载框架到 <base_dir>/tmp
#   botdl framework --install                         # 直接下载到 <base_dir>/framework
#   botdl host-app --url https://example.com/setup.exe
#   botdl framework --no-probe                        # 跳过网络检查，直接使用原始链接
#   botdl -e                                          # 编辑本文件
#
# ==================== 配置项说明 ====================
#
# base_dir        数据根目录，下载文件保存在 <base_dir>/tmp 或 <base_dir>/framework
# framework_url   框架压缩包下载链接
# host_app_url    宿主应用安装包下载链接
# probe_enabled   下载框架前是否检查 probe_url 的可达性
# probe_url       网络探测地址，只有 200 响应才算网络良好
# probe_timeout   网络探测超时（秒），超时视为网络较差
# mirror_base     网络较差时使用的镜像前缀，实际链接为 mirror_base + 原始链接
# connect_timeout 连接超时（秒）
# max_redirects   最大重定向次数
# user_agent      请求使用的 User-Agent
# log_file        日志文件路径
# log_level       日志级别：error / warn / info / debug / trace
# log_max_size    日志文件最大字节数，超过后轮转为 <log_file>.backup
#
# ==================== 故障排除 ====================
#
# 问题：提示无法获取文件大小
# 解决：服务器没有返回 Content-Length，换一个下载链接或镜像
#
# 问题：框架下载很慢
# 解决：保持 probe_enabled = true，或更换 mirror_base
"#
    }

    /// 校验配置合法性
    pub fn validate(&self) -> Result<(), DownloadError> {
        validate_base_dir(&self.base_dir).map_err(|e| DownloadError::Config(e.to_string()))?;
        if !self.framework_url.is_empty() && !is_valid_url(&self.framework_url) {
            return Err(DownloadError::Config(format!("框架下载链接无效: {}", self.framework_url)));
        }
        if !self.host_app_url.is_empty() && !is_valid_url(&self.host_app_url) {
            return Err(DownloadError::Config(format!("宿主应用下载链接无效: {}", self.host_app_url)));
        }
        if self.probe_enabled {
            if !is_valid_url(&self.probe_url) {
                return Err(DownloadError::Config(format!("网络探测地址无效: {}", self.probe_url)));
            }
            if self.probe_timeout == 0 {
                return Err(DownloadError::Config("网络探测超时时间必须大于0".to_string()));
            }
        }
        validate_mirror_base(&self.mirror_base).map_err(|e| DownloadError::Config(e.to_string()))?;
        if self.connect_timeout == 0 {
            return Err(DownloadError::Config("连接超时时间必须大于0".to_string()));
        }
        if self.log_max_size == 0 {
            return Err(DownloadError::Config("日志文件大小上限必须大于0".to_string()));
        }
        Ok(())
    }

    /// 合并命令行参数到配置
    pub fn merge_from_args(&mut self, args: &crate::cli::Args) {
        if let Some(base_dir) = &args.base_dir {
            self.base_dir = base_dir.clone();
        }
        if let Some(mirror) = &args.mirror {
            self.mirror_base = mirror.clone();
        }
        if args.no_probe {
            self.probe_enabled = false;
        }
    }

    pub fn url_for(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Framework => &self.framework_url,
            ArtifactKind::HostApp => &self.host_app_url,
        }
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            target: self.probe_url.clone(),
            timeout: Duration::from_secs(self.probe_timeout),
        }
    }

    /// 获取配置摘要信息
    pub fn get_summary(&self) -> String {
        format!(
            "配置摘要:\n\
            - 数据根目录: {}\n\
            - 框架链接: {}\n\
            - 宿主应用链接: {}\n\
            - 网络探测: {}\n\
            - 镜像前缀: {}\n\
            - 连接超时: {} 秒",
            self.base_dir,
            self.framework_url,
            if self.host_app_url.is_empty() { "未配置" } else { &self.host_app_url },
            if self.probe_enabled {
                format!("{} (超时 {} 秒)", self.probe_url, self.probe_timeout)
            } else {
                "禁用".to_string()
            },
            self.mirror_base,
            self.connect_timeout,
        )
    }
}
