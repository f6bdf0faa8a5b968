//! 会话内共享的登记表，多个传输任务可并发写入

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 已分发过的名称，用于过滤同一次创建产生的重复通知
#[derive(Debug, Default)]
pub struct SeenSet {
    names: Mutex<HashSet<PathBuf>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn names(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 插入名称，之前不存在时返回 true
    pub fn insert(&self, name: &Path) -> bool {
        self.names().insert(name.to_path_buf())
    }

    pub fn contains(&self, name: &Path) -> bool {
        self.names().contains(name)
    }

    /// 删除事件后移除该名称及其下的所有名称，之后真正的重新创建才能被处理
    pub fn forget(&self, name: &Path) -> bool {
        let mut names = self.names();
        let before = names.len();
        names.retain(|n| !n.starts_with(name));
        names.len() != before
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 已完成移动的记录，仅用于观察和测试
#[derive(Debug, Default)]
pub struct MovedLog {
    entries: Mutex<Vec<PathBuf>>,
}

impl MovedLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<PathBuf>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, name: &Path) {
        self.entries().push(name.to_path_buf())
    }

    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.entries().clone()
    }

    /// 某个名称被记录的次数
    pub fn count(&self, name: &Path) -> usize {
        self.snapshot().iter().filter(|p| p.as_path() == name).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn seen_set_reports_first_insert_only() {
        let seen = SeenSet::new();
        assert!(seen.insert(Path::new("a.mkv")));
        assert!(!seen.insert(Path::new("a.mkv")));
        assert!(seen.forget(Path::new("a.mkv")));
        assert!(seen.insert(Path::new("a.mkv")));
    }

    #[test]
    fn forgetting_a_directory_forgets_its_children() {
        let seen = SeenSet::new();
        seen.insert(Path::new("show"));
        seen.insert(&Path::new("show").join("e1.mkv"));
        seen.insert(Path::new("show2"));

        assert!(seen.forget(Path::new("show")));
        assert!(!seen.contains(&Path::new("show").join("e1.mkv")));
        assert!(seen.contains(Path::new("show2")));
        assert!(!seen.forget(Path::new("missing")));
    }

    #[test]
    fn concurrent_inserts_are_safe() {
        let seen = Arc::new(SeenSet::new());
        let log = Arc::new(MovedLog::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let seen = seen.clone();
                let log = log.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let name = PathBuf::from(format!("{}-{}", i, j % 50));
                        seen.insert(&name);
                        log.record(&name);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(seen.len(), 8 * 50);
        assert_eq!(log.snapshot().len(), 800);
        assert_eq!(log.count(Path::new("3-7")), 2);
    }
}
