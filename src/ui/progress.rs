use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::core::manager::TaskSnapshot;

const DETERMINATE_TEMPLATE: &str = "{prefix} [{wide_bar:.cyan/blue}] {pos:>3}% {msg}";
const INDETERMINATE_TEMPLATE: &str = "{prefix} {spinner:.green} {msg}";

/// 单个下载任务的终端进度条，按快照刷新
pub struct ProgressView {
    bar: ProgressBar,
    indeterminate: bool,
    last_status: Option<String>,
}

impl ProgressView {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_prefix(label.to_string());
        let view = Self {
            bar,
            indeterminate: true,
            last_status: None,
        };
        view.apply_style();
        view
    }

    /// 确定模式显示百分比，不确定模式显示旋转指示
    fn apply_style(&self) {
        if self.indeterminate {
            let style = ProgressStyle::with_template(INDETERMINATE_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            self.bar.set_style(style);
            self.bar.enable_steady_tick(Duration::from_millis(120));
        } else {
            let style = ProgressStyle::with_template(DETERMINATE_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-");
            self.bar.disable_steady_tick();
            self.bar.set_style(style);
        }
    }

    pub fn update(&mut self, snapshot: &TaskSnapshot) {
        if snapshot.indeterminate != self.indeterminate {
            self.indeterminate = snapshot.indeterminate;
            self.apply_style();
        }
        self.bar.set_position(u64::from(snapshot.percent));

        if snapshot.status != self.last_status {
            if let Some(status) = &snapshot.status {
                self.bar.set_message(status.clone());
            }
            self.last_status = snapshot.status.clone();
        }
    }

    pub fn finish(&self, message: &str) {
        self.bar.disable_steady_tick();
        self.bar.finish_with_message(message.to_string());
    }

    pub fn is_indeterminate(&self) -> bool {
        self.indeterminate
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}
