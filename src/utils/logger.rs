use chrono::Local; // 用于获取本地时间
use log::LevelFilter; // 用于设置日志级别
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 覆盖日志过滤规则的环境变量
pub const LOG_ENV: &str = "BOTDL_LOG";

/// 按大小轮转的日志文件
pub struct RotatingFile {
    writer: BufWriter<File>,
    file_path: PathBuf,
    max_size: u64, // 最大文件大小 (bytes)
    current_size: u64,
}

impl RotatingFile {
    pub fn open(file_path: impl AsRef<Path>, max_size: u64) -> io::Result<Self> {
        let file_path = file_path.as_ref().to_path_buf();
        // 确保日志目录存在
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&file_path)?;
        let current_size = file.metadata()?.len();

        Ok(Self {
            writer: BufWriter::new(file),
            file_path,
            max_size,
            current_size,
        })
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.file_path.clone().into_os_string();
        name.push(".backup");
        PathBuf::from(name)
    }

    /// 检查并执行日志轮转
    fn check_rotation(&mut self) -> io::Result<()> {
        if self.current_size <= self.max_size {
            return Ok(());
        }
        self.writer.flush()?;

        let backup_path = self.backup_path();
        if backup_path.exists() {
            std::fs::remove_file(&backup_path)?;
        }
        std::fs::rename(&self.file_path, &backup_path)?;

        let file = OpenOptions::new().create(true).append(true).open(&self.file_path)?;
        self.writer = BufWriter::new(file);
        self.current_size = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_rotation()?;
        let written = self.writer.write(buf)?;
        self.current_size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// 解析日志级别，无法识别时退回 info
pub fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level).unwrap_or(LevelFilter::Info)
}

/// 初始化全局日志，写入轮转文件，`BOTDL_LOG` 可覆盖过滤规则
pub fn init_logger(file_path: &str, level: &str, max_size: u64) -> io::Result<()> {
    let file = RotatingFile::open(file_path, max_size)?;

    env_logger::Builder::new()
        .filter_level(parse_level(level))
        .parse_env(LOG_ENV)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("verbose"), LevelFilter::Info);
    }

    #[test]
    fn test_rotation_moves_full_file_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("botdl.log");

        let mut file = RotatingFile::open(&path, 16).unwrap();
        file.write_all(b"first line that is long\n").unwrap();
        file.write_all(b"second\n").unwrap();
        file.flush().unwrap();

        let backup = dir.path().join("logs").join("botdl.log.backup");
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "first line that is long\n");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("botdl.log");
        {
            let mut file = RotatingFile::open(&path, 1024).unwrap();
            file.write_all(b"a\n").unwrap();
            file.flush().unwrap();
        }
        let mut file = RotatingFile::open(&path, 1024).unwrap();
        assert_eq!(file.current_size, 2);
        file.write_all(b"b\n").unwrap();
        file.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");
    }
}
