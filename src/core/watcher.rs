//! 文件监视循环
//!
//! 通过 notify 订阅源目录的创建/删除通知：创建交给 [`SafeMover`] 在独立任务中处理，
//! 删除直接同步到目标目录。

use crate::core::mover::{MoveResult, PendingMove, SafeMover};
use crate::core::prune::remove_and_prune;
use crate::core::registry::SeenSet;
use crate::error::Result;
use crate::models::{SessionOptions, WatchMode, WatchedPair};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// 监视状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Armed,
    Terminated,
}

/// 监视循环结束的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEnd {
    /// 监视句柄失效（例如源目录被删除）
    Invalid(String),
    Cancelled,
}

/// 事件被忽略的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// 通知队列溢出
    Overflow,
    /// 命中忽略列表
    SkipList,
    /// 已经处理过的创建
    Duplicate,
    /// 不在源目录下
    OutsideRoot,
    /// 单层模式下的子目录事件或删除事件
    NotWatched,
    /// 与创建/删除无关的事件
    Unsupported,
}

/// 单个路径的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Ignored(IgnoreReason),
    Dispatched(PathBuf),
    Deleted(PathBuf),
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Created,
    Removed,
}

/// 一个监视对的事件循环
pub struct WatchLoop {
    pair: WatchedPair,
    options: SessionOptions,
    mover: SafeMover,
    seen: Arc<SeenSet>,
    roots: Vec<PathBuf>,
    state: WatchState,
    workers: JoinSet<(PathBuf, MoveResult)>,
    events: Option<mpsc::UnboundedReceiver<notify::Result<Event>>>,
    watcher: Option<RecommendedWatcher>,
}

impl WatchLoop {
    pub fn new(
        pair: WatchedPair,
        options: SessionOptions,
        mover: SafeMover,
        seen: Arc<SeenSet>,
    ) -> Self {
        // 通知里的路径可能是规范化后的路径（例如 macOS 的 /private/var）
        let mut roots = vec![pair.source_root.clone()];
        if let Ok(canonical) = std::fs::canonicalize(&pair.source_root) {
            if canonical != pair.source_root {
                roots.push(canonical);
            }
        }

        Self {
            pair,
            options,
            mover,
            seen,
            roots,
            state: WatchState::Idle,
            workers: JoinSet::new(),
            events: None,
            watcher: None,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// 正在进行的传输数
    pub fn in_flight(&self) -> usize {
        self.workers.len()
    }

    /// 订阅源目录通知
    ///
    /// 库模式递归监视整棵树（新出现的子目录也会被覆盖），单层模式只监视第一层。
    pub fn arm(&mut self) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        let mode = match self.pair.mode {
            WatchMode::Library => RecursiveMode::Recursive,
            WatchMode::Flat => RecursiveMode::NonRecursive,
        };
        watcher.watch(&self.pair.source_root, mode)?;

        self.events = Some(rx);
        self.watcher = Some(watcher);
        self.state = WatchState::Armed;

        info!("开始监视: {} ({:?})", self.pair.source_root.display(), mode);
        self.mover
            .status()
            .status(&self.pair.name, &format!("启动 {} 监视...", self.pair.name));
        Ok(())
    }

    /// 处理通知直到监视失效或被取消
    pub async fn run(&mut self) -> WatchEnd {
        let Some(mut events) = self.events.take() else {
            return WatchEnd::Invalid("监视尚未启动".to_string());
        };
        let cancel = self.mover.cancel_token().clone();

        let end = loop {
            tokio::select! {
                _ = cancel.cancelled() => break WatchEnd::Cancelled,
                Some(joined) = self.workers.join_next(), if !self.workers.is_empty() => {
                    match joined {
                        Ok((name, result)) => debug!("传输结束: {} {:?}", name.display(), result),
                        Err(e) => warn!("传输任务异常: {}", e),
                    }
                }
                received = events.recv() => match received {
                    None => break WatchEnd::Invalid("通知通道已关闭".to_string()),
                    Some(Ok(event)) => {
                        let outcomes = self.handle_event(event).await;
                        if outcomes.contains(&EventOutcome::Invalid) {
                            break WatchEnd::Invalid("源目录已被删除".to_string());
                        }
                    }
                    Some(Err(e)) => {
                        warn!("文件监视错误: {}", e);
                        if !self.pair.source_root.exists() {
                            break WatchEnd::Invalid(e.to_string());
                        }
                    }
                },
            }
        };

        self.watcher = None;
        self.state = WatchState::Terminated;

        let message = match &end {
            WatchEnd::Invalid(reason) => format!("监视失效，停止: {}", reason),
            WatchEnd::Cancelled => "监视已停止".to_string(),
        };
        self.mover.status().status(&self.pair.name, &message);
        end
    }

    /// 等待所有进行中的传输结束
    pub async fn drain(&mut self) -> Vec<(PathBuf, MoveResult)> {
        let mut finished = Vec::new();
        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok(result) => finished.push(result),
                Err(e) => warn!("传输任务异常: {}", e),
            }
        }
        finished
    }

    /// 处理一条原始通知
    pub async fn handle_event(&mut self, event: Event) -> Vec<EventOutcome> {
        if event.need_rescan() {
            warn!("通知队列溢出，部分事件可能丢失: {}", self.pair.name);
            return vec![EventOutcome::Ignored(IgnoreReason::Overflow)];
        }

        let changes: Vec<(Change, PathBuf)> = match event.kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                event.paths.into_iter().map(|p| (Change::Created, p)).collect()
            }
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                event.paths.into_iter().map(|p| (Change::Removed, p)).collect()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = event.paths.into_iter();
                paths
                    .next()
                    .map(|from| (Change::Removed, from))
                    .into_iter()
                    .chain(paths.map(|to| (Change::Created, to)))
                    .collect()
            }
            EventKind::Modify(ModifyKind::Name(_)) => event
                .paths
                .into_iter()
                .map(|p| {
                    let change = if p.exists() { Change::Created } else { Change::Removed };
                    (change, p)
                })
                .collect(),
            _ => return vec![EventOutcome::Ignored(IgnoreReason::Unsupported)],
        };

        let mut outcomes = Vec::with_capacity(changes.len());
        for (change, path) in changes {
            outcomes.push(self.handle_change(change, &path).await);
        }
        outcomes
    }

    async fn handle_change(&mut self, change: Change, path: &Path) -> EventOutcome {
        if change == Change::Removed && self.roots.iter().any(|r| r == path) {
            return EventOutcome::Invalid;
        }

        let Some(relative) = self.relative_name(path) else {
            return EventOutcome::Ignored(IgnoreReason::OutsideRoot);
        };

        let skipped = relative
            .components()
            .any(|c| self.options.is_ignored(&c.as_os_str().to_string_lossy()));
        if skipped {
            return EventOutcome::Ignored(IgnoreReason::SkipList);
        }

        if self.pair.mode == WatchMode::Flat
            && (change == Change::Removed || relative.components().count() > 1)
        {
            return EventOutcome::Ignored(IgnoreReason::NotWatched);
        }

        match change {
            Change::Created => {
                let is_directory = path.is_dir();
                if self.dispatch(relative.clone(), is_directory) {
                    EventOutcome::Dispatched(relative)
                } else {
                    EventOutcome::Ignored(IgnoreReason::Duplicate)
                }
            }
            Change::Removed => {
                self.seen.forget(&relative);
                self.delete(&relative).await;
                EventOutcome::Deleted(relative)
            }
        }
    }

    /// 登记并启动一次传输，名称已处理过时返回 false
    pub fn dispatch(&mut self, relative: PathBuf, is_directory: bool) -> bool {
        if !self.seen.insert(&relative) {
            return false;
        }

        self.mover.status().status(
            &self.pair.name,
            &format!("发现 {}，移动到目标目录", relative.display()),
        );

        let pending = PendingMove::from_event(&self.pair, relative.clone(), is_directory);
        let mover = self.mover.clone();
        self.workers.spawn(async move {
            let result = mover.transfer(&pending).await;
            (relative, result)
        });
        true
    }

    async fn delete(&self, relative: &Path) {
        let status = self.mover.status();
        status.status(
            &self.pair.name,
            &format!("删除 {}", self.pair.dest_root.join(relative).display()),
        );
        match remove_and_prune(&self.pair.dest_root, relative).await {
            Ok(_) => status.status(&self.pair.name, &format!("{} 删除完成", relative.display())),
            Err(e) => warn!("删除失败: {} - {}", relative.display(), e),
        }
    }

    fn relative_name(&self, path: &Path) -> Option<PathBuf> {
        self.roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .filter(|rel| rel.components().next().is_some())
            .map(Path::to_path_buf)
    }
}
