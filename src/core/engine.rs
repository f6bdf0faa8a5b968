use crate::core::comparator::{ActionSummary, FileComparator, SyncAction};
use crate::core::mover::{MoveResult, PendingMove, SafeMover};
use crate::core::prune::remove_and_prune;
use crate::core::scanner::{FileScanner, ScanConfig};
use crate::error::Result;
use crate::models::WatchedPair;
use serde::Serialize;
use std::path::PathBuf;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// 对账报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub source_files: usize,
    pub dest_files: usize,
    pub files_deleted: usize,
    pub files_copied: usize,
    pub files_abandoned: usize,
    pub files_cancelled: usize,
    pub delete_failed: usize,
    /// 异常退出的删除/复制任务
    pub tasks_failed: usize,
    pub bytes_planned: u64,
}

impl ReconcileReport {
    /// 本次对账是否没有改动目标目录
    pub fn is_noop(&self) -> bool {
        self.files_deleted == 0
            && self.files_copied == 0
            && self.delete_failed == 0
            && self.tasks_failed == 0
    }
}

/// 对账计划
#[derive(Debug, Clone)]
pub struct ReconcilePlan {
    pub source_files: usize,
    pub dest_files: usize,
    pub actions: Vec<SyncAction>,
    pub summary: ActionSummary,
}

/// 对账引擎：让目标目录与源目录在某一时刻一致
#[derive(Clone)]
pub struct ReconcileEngine {
    mover: SafeMover,
    scanner: FileScanner,
}

impl ReconcileEngine {
    pub fn new(mover: SafeMover) -> Self {
        Self {
            mover,
            scanner: FileScanner::default(),
        }
    }

    pub fn with_scan_config(mut self, config: ScanConfig) -> Self {
        self.scanner = FileScanner::with_config(config);
        self
    }

    /// 并发扫描两棵树并计算差异
    ///
    /// 目标根目录不存在时自动创建；源根目录不可读直接返回错误。
    pub async fn plan(&self, pair: &WatchedPair) -> Result<ReconcilePlan> {
        tokio::fs::create_dir_all(&pair.dest_root).await?;

        let (source, dest) = tokio::join!(
            self.scanner.scan_blocking(pair.source_root.clone()),
            self.scanner.scan_blocking(pair.dest_root.clone()),
        );
        let (source, dest) = (source?, dest?);

        let actions = FileComparator::compare_indexes(&source, &dest);
        let summary = FileComparator::summarize_actions(&actions);
        debug!(
            "比较完成: 源 {} 个文件, 目标 {} 个文件, {} 个复制, {} 个删除",
            source.len(),
            dest.len(),
            summary.copy_count,
            summary.delete_count
        );

        Ok(ReconcilePlan {
            source_files: source.len(),
            dest_files: dest.len(),
            actions,
            summary,
        })
    }

    /// 执行一次完整对账，所有删除和复制结束后才返回
    ///
    /// 先并发执行全部删除，再并发执行全部复制，避免清理空目录时与复制到同一目录的任务冲突。
    pub async fn reconcile(&self, pair: &WatchedPair) -> Result<ReconcileReport> {
        info!("开始对账: {} ({} -> {})", pair.name, pair.source_root.display(), pair.dest_root.display());
        let status = self.mover.status().clone();
        status.status(&pair.name, "开始对账");

        let plan = self.plan(pair).await?;
        let mut report = ReconcileReport {
            source_files: plan.source_files,
            dest_files: plan.dest_files,
            bytes_planned: plan.summary.copy_bytes,
            ..Default::default()
        };

        let (deletes, copies): (Vec<_>, Vec<_>) = plan
            .actions
            .into_iter()
            .partition(|a| matches!(a, SyncAction::Delete { .. }));

        let mut deletions = JoinSet::new();
        for action in deletes {
            let dest_root = pair.dest_root.clone();
            let path: PathBuf = action.path().clone();
            deletions.spawn(async move {
                let result = remove_and_prune(&dest_root, &path).await;
                (path, result)
            });
        }
        while let Some(joined) = deletions.join_next().await {
            let (path, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    report.tasks_failed += 1;
                    warn!("删除任务异常: {}", e);
                    continue;
                }
            };
            match result {
                Ok(_) => {
                    report.files_deleted += 1;
                    status.status(&pair.name, &format!("已删除 {}", path.display()));
                }
                Err(e) => {
                    report.delete_failed += 1;
                    warn!("删除失败: {} - {}", path.display(), e);
                }
            }
        }

        let mut transfers = JoinSet::new();
        for action in copies {
            let mover = self.mover.clone();
            let pending = PendingMove::for_reconcile(pair, action.path().clone());
            transfers.spawn(async move { mover.transfer(&pending).await });
        }
        while let Some(joined) = transfers.join_next().await {
            match joined {
                Ok(MoveResult::Completed { .. }) => report.files_copied += 1,
                Ok(MoveResult::Abandoned) => report.files_abandoned += 1,
                Ok(MoveResult::Cancelled) => report.files_cancelled += 1,
                Err(e) => {
                    report.tasks_failed += 1;
                    warn!("传输任务异常: {}", e);
                }
            }
        }

        info!(
            "对账完成: {} - 复制 {}, 删除 {}, 放弃 {}",
            pair.name, report.files_copied, report.files_deleted, report.files_abandoned
        );
        status.status(
            &pair.name,
            &format!("对账完成: 复制 {}, 删除 {}", report.files_copied, report.files_deleted),
        );

        Ok(report)
    }
}
