//! 安全移动 - 等待源文件写完后再复制到目标
//!
//! 文件被占用或仍在下载是常态而不是错误：固定间隔无限重试，只有源文件消失才会放弃。

use crate::core::registry::MovedLog;
use crate::core::title::TitleExtractor;
use crate::models::{WatchMode, WatchedPair};
use crate::status::StatusSink;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// 写入中标记
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingSentinel {
    /// 文件旁存在 `<文件名><后缀>` 时视为写入中
    #[serde(default = "default_sibling_suffixes")]
    pub sibling_suffixes: Vec<String>,
    /// 目录下任意条目名称包含这些子串时视为写入中
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
}

fn default_sibling_suffixes() -> Vec<String> {
    vec![".lftp-pget-status".to_string()]
}

fn default_markers() -> Vec<String> {
    vec![".lftp".to_string()]
}

impl Default for WritingSentinel {
    fn default() -> Self {
        Self {
            sibling_suffixes: default_sibling_suffixes(),
            markers: default_markers(),
        }
    }
}

impl WritingSentinel {
    /// 检查路径是否仍在被写入，目录递归检查
    pub fn is_being_written(&self, path: &Path) -> bool {
        if path.is_dir() {
            WalkDir::new(path)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .any(|entry| {
                    let name = entry.file_name().to_string_lossy();
                    self.markers.iter().any(|m| name.contains(m.as_str()))
                })
        } else {
            self.sibling_suffixes.iter().any(|suffix| {
                let mut sibling = OsString::from(path.as_os_str());
                sibling.push(suffix);
                Path::new(&sibling).exists()
            })
        }
    }
}

/// 一次待执行的移动
#[derive(Debug, Clone)]
pub struct PendingMove {
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    pub relative_name: PathBuf,
    pub is_directory: bool,
    pub place_in_subfolder: bool,
    pub retry_interval: Duration,
    /// 为 false 时立即尝试第一次复制，且不检查写入标记（对账用）
    pub wait_for_writer: bool,
}

impl PendingMove {
    /// 由文件监视事件产生
    ///
    /// 库模式下目标目录与源目录结构一致，不放入标题子目录。
    pub fn from_event(pair: &WatchedPair, relative_name: PathBuf, is_directory: bool) -> Self {
        Self {
            source_root: pair.source_root.clone(),
            dest_root: pair.dest_root.clone(),
            relative_name,
            is_directory,
            place_in_subfolder: pair.place_in_subfolder && pair.mode == WatchMode::Flat,
            retry_interval: pair.retry_interval,
            wait_for_writer: true,
        }
    }

    /// 由对账差异产生：逐文件、不放入子目录
    pub fn for_reconcile(pair: &WatchedPair, relative_name: PathBuf) -> Self {
        Self {
            source_root: pair.source_root.clone(),
            dest_root: pair.dest_root.clone(),
            relative_name,
            is_directory: false,
            place_in_subfolder: false,
            retry_interval: pair.retry_interval,
            wait_for_writer: false,
        }
    }

    pub fn source_path(&self) -> PathBuf {
        self.source_root.join(&self.relative_name)
    }
}

/// 移动结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    /// 复制完成，`attempts` 为检查/尝试的轮数
    Completed { attempts: u32 },
    /// 源在复制前消失
    Abandoned,
    /// 会话被取消
    Cancelled,
}

/// 安全移动器，可廉价 clone 后放进各个传输任务
#[derive(Clone)]
pub struct SafeMover {
    sentinel: Arc<WritingSentinel>,
    titles: Arc<dyn TitleExtractor>,
    status: Arc<dyn StatusSink>,
    moved: Arc<MovedLog>,
    cancel: CancellationToken,
}

impl SafeMover {
    pub fn new(
        status: Arc<dyn StatusSink>,
        titles: Arc<dyn TitleExtractor>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sentinel: Arc::new(WritingSentinel::default()),
            titles,
            status,
            moved: Arc::new(MovedLog::new()),
            cancel,
        }
    }

    pub fn with_sentinel(mut self, sentinel: WritingSentinel) -> Self {
        self.sentinel = Arc::new(sentinel);
        self
    }

    pub fn moved(&self) -> Arc<MovedLog> {
        self.moved.clone()
    }

    pub fn status(&self) -> &Arc<dyn StatusSink> {
        &self.status
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 计算目标路径，放入子目录时使用提取出的标题，标题为空则退回目标根目录
    pub fn destination_path(pending: &PendingMove, title: &str) -> PathBuf {
        if pending.place_in_subfolder && !pending.is_directory && !title.is_empty() {
            pending.dest_root.join(title).join(&pending.relative_name)
        } else {
            pending.dest_root.join(&pending.relative_name)
        }
    }

    /// 执行一次移动，直到完成、源消失或会话取消
    pub async fn transfer(&self, pending: &PendingMove) -> MoveResult {
        let title = if pending.place_in_subfolder && !pending.is_directory {
            self.titles.extract_title(&pending.relative_name)
        } else {
            String::new()
        };
        let label = display_label(&title, &pending.relative_name);
        let source = pending.source_path();
        let dest = Self::destination_path(pending, &title);
        let name = pending.relative_name.display();

        self.status
            .status(&label, &format!("复制 {} -> {}", name, dest.display()));

        let mut attempts = 0u32;
        let mut reported_busy = false;

        loop {
            let should_wait = pending.wait_for_writer || attempts > 0;
            if should_wait && !self.wait(pending.retry_interval).await {
                self.status.status(&label, &format!("{} 移动前线程被停止", name));
                return MoveResult::Cancelled;
            }
            if self.cancel.is_cancelled() {
                return MoveResult::Cancelled;
            }
            attempts += 1;

            if !source_exists(&source).await {
                return self.abandon(&label, pending);
            }

            if pending.wait_for_writer && self.is_being_written(&source).await {
                if !reported_busy {
                    self.status
                        .status(&label, &format!("{} 仍在写入，等待写入完成后再移动", name));
                    reported_busy = true;
                }
                continue;
            }

            match copy_item(&source, &dest, pending.is_directory).await {
                Ok(bytes) => {
                    debug!("复制完成: {} ({} 字节, 第 {} 轮)", name, bytes, attempts);
                    break;
                }
                Err(e) => {
                    if e.kind() == io::ErrorKind::NotFound && !source_exists(&source).await {
                        return self.abandon(&label, pending);
                    }
                    // 被占用与写入中同等对待
                    if !reported_busy {
                        self.status.status(
                            &label,
                            &format!("{} 正被其他进程使用，等待释放后再移动", name),
                        );
                        reported_busy = true;
                    }
                    debug!("复制失败，稍后重试: {} - {}", name, e);
                }
            }
        }

        self.status.status(&label, &format!("{} 移动成功", name));
        self.moved.record(&pending.relative_name);
        MoveResult::Completed { attempts }
    }

    fn abandon(&self, label: &str, pending: &PendingMove) -> MoveResult {
        self.status.status(
            label,
            &format!("{} 已被删除或找不到，停止移动", pending.relative_name.display()),
        );
        MoveResult::Abandoned
    }

    /// 等待一个间隔，期间被取消返回 false
    async fn wait(&self, interval: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(interval) => true,
        }
    }

    async fn is_being_written(&self, path: &Path) -> bool {
        let sentinel = self.sentinel.clone();
        let path = path.to_path_buf();
        match tokio::task::spawn_blocking(move || sentinel.is_being_written(&path)).await {
            Ok(busy) => busy,
            Err(e) => {
                warn!("写入检查任务失败: {}", e);
                true
            }
        }
    }
}

/// 状态显示名：有标题用标题，否则用文件名
fn display_label(title: &str, relative_name: &Path) -> String {
    if !title.is_empty() {
        return title.to_string();
    }
    relative_name
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| relative_name.display().to_string())
}

async fn source_exists(path: &Path) -> bool {
    // 无法确认时当作存在，交给下一轮重试
    fs::try_exists(path).await.unwrap_or(true)
}

/// 复制文件或整个目录，目标已存在时覆盖，缺失的目标目录自动创建
async fn copy_item(source: &Path, dest: &Path, is_directory: bool) -> io::Result<u64> {
    if is_directory {
        let (source, dest) = (source.to_path_buf(), dest.to_path_buf());
        tokio::task::spawn_blocking(move || copy_dir_recursive(&source, &dest))
            .await
            .map_err(io::Error::other)?
    } else {
        // 目标位置上的同名目录不在对账索引里，复制前先清掉
        let dest_is_dir = fs::symlink_metadata(dest)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if dest_is_dir {
            debug!("删除占位的同名目录: {}", dest.display());
            fs::remove_dir_all(dest).await?;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(source, dest).await
    }
}

fn copy_dir_recursive(source: &Path, dest: &Path) -> io::Result<u64> {
    std::fs::create_dir_all(dest)?;
    let mut total = 0;
    for entry in WalkDir::new(source).follow_links(false).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            total += std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(total)
}
