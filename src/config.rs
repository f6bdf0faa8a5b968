//! 应用配置模块

use crate::core::mover::WritingSentinel;
use crate::logging::LogConfig;
use crate::models::{default_ignore_patterns, SessionOptions, WatchMode, WatchedPair, DEFAULT_WAIT_MS};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 配置文件默认名称（当前工作目录下）
pub const CONFIG_FILE_NAME: &str = "paths.json";
/// 指定配置文件路径的环境变量
pub const CONFIG_ENV: &str = "MEDIASYNC_CONFIG";

/// 单个监视路径配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathConfig {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub name: String,
    /// 按提取出的标题放入子目录
    #[serde(default)]
    pub place_in_sub: bool,
    /// 库模式：对账 + 递归监视
    #[serde(default)]
    pub library: bool,
    /// 覆盖全局重试间隔（毫秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_time: Option<u64>,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub paths: Vec<PathConfig>,
    /// 重试间隔（毫秒）
    #[serde(default = "default_wait_time")]
    pub wait_time: u64,
    /// 忽略名称中包含这些子串的文件
    #[serde(default = "default_ignore_patterns")]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub sentinel: WritingSentinel,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_wait_time() -> u64 {
    DEFAULT_WAIT_MS
}

/// 配置文件路径：环境变量优先，否则为当前目录下的 paths.json
pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

impl AppConfig {
    /// 从文件加载并校验
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("配置文件无效: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.paths.is_empty() {
            bail!("至少需要配置一个监视路径");
        }
        for (i, path) in self.paths.iter().enumerate() {
            if path.source.trim().is_empty() || path.destination.trim().is_empty() {
                bail!("第 {} 个路径缺少 source 或 destination", i + 1);
            }
            if Path::new(&path.source) == Path::new(&path.destination) {
                bail!("第 {} 个路径的源目录和目标目录相同: {}", i + 1, path.source);
            }
        }
        Ok(())
    }

    /// 生成所有监视对
    pub fn watched_pairs(&self) -> Vec<WatchedPair> {
        self.paths
            .iter()
            .map(|p| {
                let source = PathBuf::from(&p.source);
                let name = if p.name.trim().is_empty() {
                    source
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| p.source.clone())
                } else {
                    p.name.clone()
                };
                let mode = if p.library {
                    WatchMode::Library
                } else {
                    WatchMode::Flat
                };
                WatchedPair::new(name, source, &p.destination)
                    .with_mode(mode)
                    .with_subfolder(p.place_in_sub)
                    .with_retry_interval(Duration::from_millis(p.wait_time.unwrap_or(self.wait_time)))
            })
            .collect()
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            ignore_patterns: self.ignore.clone(),
            sentinel: self.sentinel.clone(),
        }
    }
}
