use crate::core::mover::WritingSentinel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 默认重试间隔（毫秒）
pub const DEFAULT_WAIT_MS: u64 = 5_000;

/// 监视模式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// 先全量对账，再递归监视创建/删除
    Library,
    /// 只监视源目录第一层的新建，不做对账
    Flat,
}

/// 一个监视对：源目录 -> 目标目录
///
/// 进程启动时由配置生成，生命周期内不再修改。
#[derive(Debug, Clone)]
pub struct WatchedPair {
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    pub name: String,
    pub place_in_subfolder: bool,
    pub retry_interval: Duration,
    pub mode: WatchMode,
}

impl WatchedPair {
    pub fn new(
        name: impl Into<String>,
        source_root: impl Into<PathBuf>,
        dest_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
            name: name.into(),
            place_in_subfolder: false,
            retry_interval: Duration::from_millis(DEFAULT_WAIT_MS),
            mode: WatchMode::Flat,
        }
    }

    pub fn with_mode(mut self, mode: WatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_subfolder(mut self, place_in_subfolder: bool) -> Self {
        self.place_in_subfolder = place_in_subfolder;
        self
    }
}

/// 会话级别的过滤与占用检测设置
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// 名称包含这些子串的事件/文件直接忽略
    pub ignore_patterns: Vec<String>,
    pub sentinel: WritingSentinel,
}

impl SessionOptions {
    /// 判断名称是否命中忽略列表
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore_patterns.iter().any(|p| name.contains(p.as_str()))
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            ignore_patterns: default_ignore_patterns(),
            sentinel: WritingSentinel::default(),
        }
    }
}

pub fn default_ignore_patterns() -> Vec<String> {
    vec!["TeraCopy".to_string(), ".lftp-pget-status".to_string()]
}
