use actix::prelude::*;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use botdl::cli::{open_config_in_editor, Args};
use botdl::config::Config;
use botdl::core::task::util::file_name_from_url;
use botdl::core::task::{ArtifactKind, Destination, TaskState};
use botdl::core::{
    AppPaths, CancelDownload, DownloadManagerActor, GetSnapshot, PathProvider, ReqwestTransport, Shutdown,
    StartDownload, TaskSnapshot,
};
use botdl::ui::{print_error, print_success, DownloadSummary, ProgressView};
use botdl::utils::logger::init_logger;
use clap::Parser;

const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

#[actix::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // --edit 逻辑：确保配置文件存在后打开编辑器
    if args.edit_config {
        Config::load(&args.config)?;
        open_config_in_editor(&args.config);
        return Ok(());
    }

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            print_error(&format!("参数解析失败: {}", e));
            std::process::exit(2);
        }
    };

    if let Err(e) = init_logger(&config.log_file, &config.log_level, config.log_max_size) {
        eprintln!("日志初始化失败: {}", e);
    }
    info!(
        "程序启动 botdl {} (构建于 {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("未知")
    );
    info!("配置文件路径: {}", args.config);
    info!("{}", config.get_summary());

    let Some(kind) = args.kind() else {
        anyhow::bail!("未指定要下载的产物");
    };
    if !args.json {
        println!("{}", config.get_summary());
    }

    let paths = Arc::new(AppPaths::new(&config.base_dir)?);
    info!("数据根目录: {}", paths.base_dir().display());
    let transport = Arc::new(ReqwestTransport::new(&config)?);
    let destination = args.destination();
    let manager = DownloadManagerActor::new(config.clone(), paths.clone(), transport).start();
    info!("下载管理器已启动");

    let started = Instant::now();
    let task_id = match manager
        .send(StartDownload {
            kind,
            url: args.url.clone(),
            destination,
        })
        .await?
    {
        Ok(task_id) => task_id,
        Err(e) => {
            error!("启动{}下载失败: {}", kind, e);
            print_error(&format!("启动{}下载失败: {}", kind, e));
            std::process::exit(1);
        }
    };
    info!("{}下载任务 {} 已启动", kind, task_id);
    if !args.json {
        println!("\n开始下载{}... (按 Ctrl-C 取消)", kind);
    }

    let snapshot = run_download_loop(&manager, kind, args.json).await?;
    let summary = build_summary(&snapshot, paths.as_ref(), destination, started.elapsed());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary);
        if summary.succeeded() {
            print_success(&format!("{}下载完成", kind));
        } else {
            print_error(snapshot.status.as_deref().unwrap_or("下载失败"));
        }
    }
    manager.send(Shutdown).await?;
    info!("程序结束: {:?}", snapshot.state);

    match snapshot.state {
        TaskState::Completed => Ok(()),
        TaskState::Cancelled => std::process::exit(130),
        _ => std::process::exit(1),
    }
}

/// 轮询任务快照刷新进度，直到任务进入终态
async fn run_download_loop(
    manager: &Addr<DownloadManagerActor>,
    kind: ArtifactKind,
    quiet: bool,
) -> anyhow::Result<TaskSnapshot> {
    let mut view = (!quiet).then(|| ProgressView::new(kind.label()));
    let mut ticker = tokio::time::interval(PROGRESS_UPDATE_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancel_requested = false;

    loop {
        tokio::select! {
            result = &mut ctrl_c, if !cancel_requested => {
                if let Err(e) = result {
                    warn!("无法监听 Ctrl-C: {}", e);
                }
                cancel_requested = true;
                info!("用户取消{}下载", kind);
                manager.send(CancelDownload { kind }).await?;
            }
            _ = ticker.tick() => {
                let Some(snapshot) = manager.send(GetSnapshot { kind }).await? else {
                    anyhow::bail!("找不到{}下载任务", kind);
                };
                if let Some(view) = view.as_mut() {
                    view.update(&snapshot);
                }
                if snapshot.state.is_terminal() {
                    if let Some(view) = view.as_ref() {
                        view.finish(snapshot.status.as_deref().unwrap_or_default());
                    }
                    return Ok(snapshot);
                }
            }
        }
    }
}

fn build_summary(
    snapshot: &TaskSnapshot,
    paths: &dyn PathProvider,
    destination: Destination,
    elapsed: Duration,
) -> DownloadSummary {
    let file = if snapshot.state == TaskState::Completed {
        let dir = match destination {
            Destination::Temp => paths.tmp_dir(),
            Destination::Install => paths.install_dir(),
        };
        file_name_from_url(&snapshot.url).ok().map(|name| dir.join(name))
    } else {
        None
    };
    let file_size = file
        .as_ref()
        .and_then(|path| std::fs::metadata(path).ok())
        .map(|meta| meta.len());

    DownloadSummary {
        kind: snapshot.kind,
        url: snapshot.url.clone(),
        state: snapshot.state,
        file: file.map(|path| path.display().to_string()),
        file_size,
        elapsed_time: elapsed,
    }
}
