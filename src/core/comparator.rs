use crate::core::scanner::PathIndex;
use std::path::PathBuf;

/// 对账动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// 从源复制到目标（目标已存在则覆盖）
    Copy { path: PathBuf, size: u64 },
    /// 删除目标中多余的文件
    Delete { path: PathBuf },
}

impl SyncAction {
    pub fn path(&self) -> &PathBuf {
        match self {
            SyncAction::Copy { path, .. } => path,
            SyncAction::Delete { path } => path,
        }
    }
}

/// 文件比较器
///
/// 目标 = 源 的差集运算。相对路径相同但大小不同的文件只生成复制（覆盖），不生成删除，
/// 否则删除和复制会同时作用于同一个路径。
#[derive(Debug, Default)]
pub struct FileComparator;

impl FileComparator {
    /// 比较两个索引，返回同步动作列表
    pub fn compare_indexes(source: &PathIndex, dest: &PathIndex) -> Vec<SyncAction> {
        let source_paths = source.paths();

        let mut actions: Vec<SyncAction> = source
            .difference(dest)
            .map(|entry| SyncAction::Copy {
                path: entry.relative_path.clone(),
                size: entry.size,
            })
            .chain(
                dest.difference(source)
                    .filter(|entry| !source_paths.contains(entry.relative_path.as_path()))
                    .map(|entry| SyncAction::Delete {
                        path: entry.relative_path.clone(),
                    }),
            )
            .collect();

        // 按操作类型和路径排序，确保一致性
        actions.sort_by(|a, b| {
            let order = |action: &SyncAction| match action {
                SyncAction::Delete { .. } => 0,
                SyncAction::Copy { .. } => 1,
            };
            order(a).cmp(&order(b)).then_with(|| a.path().cmp(b.path()))
        });

        actions
    }

    /// 统计同步动作
    pub fn summarize_actions(actions: &[SyncAction]) -> ActionSummary {
        let mut summary = ActionSummary::default();
        for action in actions {
            match action {
                SyncAction::Copy { size, .. } => {
                    summary.copy_count += 1;
                    summary.copy_bytes += size;
                }
                SyncAction::Delete { .. } => summary.delete_count += 1,
            }
        }
        summary
    }
}

/// 动作统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSummary {
    pub copy_count: usize,
    pub copy_bytes: u64,
    pub delete_count: usize,
}

impl ActionSummary {
    pub fn is_empty(&self) -> bool {
        self.copy_count == 0 && self.delete_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::PathEntry;

    fn index(entries: &[(&str, u64)]) -> PathIndex {
        entries
            .iter()
            .map(|(p, s)| PathEntry::new(*p, *s))
            .collect()
    }

    #[test]
    fn differing_size_overwrites_without_delete() {
        let source = index(&[("a/x.txt", 10), ("b/y.txt", 20)]);
        let dest = index(&[("b/y.txt", 99), ("c/z.txt", 5)]);

        let actions = FileComparator::compare_indexes(&source, &dest);

        assert_eq!(
            actions,
            vec![
                SyncAction::Delete { path: "c/z.txt".into() },
                SyncAction::Copy { path: "a/x.txt".into(), size: 10 },
                SyncAction::Copy { path: "b/y.txt".into(), size: 20 },
            ]
        );
    }

    #[test]
    fn identical_trees_need_nothing() {
        let source = index(&[("a", 1), ("b/c", 2)]);
        let actions = FileComparator::compare_indexes(&source, &source.clone());
        assert!(actions.is_empty());
        assert!(FileComparator::summarize_actions(&actions).is_empty());
    }

    #[test]
    fn summary_counts_bytes() {
        let source = index(&[("a", 3), ("b", 4)]);
        let dest = index(&[("z", 1)]);
        let summary =
            FileComparator::summarize_actions(&FileComparator::compare_indexes(&source, &dest));
        assert_eq!(
            summary,
            ActionSummary {
                copy_count: 2,
                copy_bytes: 7,
                delete_count: 1
            }
        );
    }
}
