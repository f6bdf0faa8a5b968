use crate::core::comparator::SyncAction;
use crate::core::engine::{ReconcileEngine, ReconcileReport};
use crate::core::mover::SafeMover;
use crate::core::prune::remove_and_prune;
use crate::core::registry::{MovedLog, SeenSet};
use crate::core::scanner::ScanConfig;
use crate::core::title::TitleExtractor;
use crate::core::watcher::{WatchEnd, WatchLoop};
use crate::error::{Result, SyncError};
use crate::models::{SessionOptions, WatchMode, WatchedPair};
use crate::status::StatusSink;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 会话结束原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Cancelled,
    /// 监视失效，该监视对不再工作（不会自动重启）
    WatchInvalid(String),
}

/// 一个监视对的完整生命周期：库模式先对账，然后一直监视
pub struct SyncSession {
    pair: WatchedPair,
    options: SessionOptions,
    mover: SafeMover,
    seen: Arc<SeenSet>,
}

impl SyncSession {
    pub fn new(
        pair: WatchedPair,
        options: SessionOptions,
        status: Arc<dyn StatusSink>,
        titles: Arc<dyn TitleExtractor>,
        cancel: CancellationToken,
    ) -> Self {
        let mover = SafeMover::new(status, titles, cancel).with_sentinel(options.sentinel.clone());
        Self {
            pair,
            options,
            mover,
            seen: Arc::new(SeenSet::new()),
        }
    }

    pub fn pair(&self) -> &WatchedPair {
        &self.pair
    }

    /// 已完成移动的记录
    pub fn moved(&self) -> Arc<MovedLog> {
        self.mover.moved()
    }

    pub fn seen(&self) -> Arc<SeenSet> {
        self.seen.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.mover.cancel_token().clone()
    }

    fn engine(&self) -> ReconcileEngine {
        ReconcileEngine::new(self.mover.clone()).with_scan_config(ScanConfig {
            exclude_patterns: self.options.ignore_patterns.clone(),
        })
    }

    /// 运行会话直到监视失效或被取消
    ///
    /// 对账失败（源目录不可读）直接返回错误，只影响本监视对。
    pub async fn run(&self) -> Result<SessionEnd> {
        // 目标在源目录内会让复制结果再次触发监视
        if self.pair.dest_root.starts_with(&self.pair.source_root) {
            return Err(SyncError::Config(format!(
                "目标目录位于源目录内: {}",
                self.pair.dest_root.display()
            )));
        }

        let engine = self.engine();
        let mut watch = WatchLoop::new(
            self.pair.clone(),
            self.options.clone(),
            self.mover.clone(),
            self.seen.clone(),
        );

        if self.pair.mode == WatchMode::Library {
            engine.reconcile(&self.pair).await?;
        }
        if self.mover.cancel_token().is_cancelled() {
            return Ok(SessionEnd::Cancelled);
        }

        watch.arm()?;
        if self.pair.mode == WatchMode::Library {
            self.catch_up(&engine, &mut watch).await?;
        }

        let end = watch.run().await;
        let finished = watch.drain().await;
        info!("会话结束: {} ({} 个传输收尾)", self.pair.name, finished.len());

        Ok(match end {
            WatchEnd::Cancelled => SessionEnd::Cancelled,
            WatchEnd::Invalid(reason) => SessionEnd::WatchInvalid(reason),
        })
    }

    /// 仅执行一次对账
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        self.engine().reconcile(&self.pair).await
    }

    /// 监视启动后再比对一次，补上对账结束到监视生效之间出现的变化
    ///
    /// 补发的复制会登记到已见集合，之后同名的创建通知会被去重。
    async fn catch_up(&self, engine: &ReconcileEngine, watch: &mut WatchLoop) -> Result<usize> {
        let plan = engine.plan(&self.pair).await?;
        let mut changed = 0;

        for action in plan.actions {
            match action {
                SyncAction::Copy { path, .. } => {
                    let is_directory = self.pair.source_root.join(&path).is_dir();
                    if watch.dispatch(path, is_directory) {
                        changed += 1;
                    }
                }
                SyncAction::Delete { path } => {
                    if let Err(e) = remove_and_prune(&self.pair.dest_root, &path).await {
                        warn!("补充删除失败: {} - {}", path.display(), e);
                    } else {
                        changed += 1;
                    }
                }
            }
        }

        if changed > 0 {
            info!("补充同步: {} 有 {} 个变化", self.pair.name, changed);
        }
        Ok(changed)
    }
}
