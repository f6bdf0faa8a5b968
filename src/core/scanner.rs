use crate::error::{Result, SyncError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 目录树中的一个文件：相对路径 + 大小
///
/// 只按结构比较，不看时间戳也不看内容。相对路径和大小都相同的两个文件即视为相同。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathEntry {
    pub relative_path: PathBuf,
    pub size: u64,
}

impl PathEntry {
    pub fn new(relative_path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            relative_path: relative_path.into(),
            size,
        }
    }
}

/// 扫描配置
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// 路径中任一部分包含这些子串就排除
    pub exclude_patterns: Vec<String>,
}

/// 一棵目录树在扫描时刻的快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathIndex {
    entries: HashSet<PathEntry>,
}

impl PathIndex {
    /// 用默认配置扫描，不排除任何文件
    pub fn scan(root: &Path) -> Result<Self> {
        FileScanner::default().scan(root)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entry: &PathEntry) -> bool {
        self.entries.contains(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathEntry> {
        self.entries.iter()
    }

    /// 在 self 中但不在 other 中的条目
    pub fn difference<'a>(&'a self, other: &'a PathIndex) -> impl Iterator<Item = &'a PathEntry> {
        self.entries.difference(&other.entries)
    }

    /// 所有相对路径
    pub fn paths(&self) -> HashSet<&Path> {
        self.entries.iter().map(|e| e.relative_path.as_path()).collect()
    }
}

impl FromIterator<PathEntry> for PathIndex {
    fn from_iter<I: IntoIterator<Item = PathEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// 文件扫描器
#[derive(Debug, Clone, Default)]
pub struct FileScanner {
    config: ScanConfig,
}

impl FileScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// 检查相对路径是否应该被排除
    fn should_exclude(&self, relative: &Path) -> bool {
        if self.config.exclude_patterns.is_empty() {
            return false;
        }
        relative.components().any(|c| {
            let part = c.as_os_str().to_string_lossy();
            self.config
                .exclude_patterns
                .iter()
                .any(|p| part.contains(p.as_str()))
        })
    }

    /// 逐个产出 root 下的普通文件，目录本身不产出
    ///
    /// 根目录之下读不到的条目会被跳过并记录警告。
    pub fn walk<'a>(&'a self, root: &'a Path) -> impl Iterator<Item = PathEntry> + 'a {
        WalkDir::new(root)
            .follow_links(false)
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("跳过无法读取的条目: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| {
                let relative = entry.path().strip_prefix(root).ok()?.to_path_buf();
                if self.should_exclude(&relative) {
                    debug!("排除文件: {}", relative.display());
                    return None;
                }
                let metadata = entry.metadata().ok()?;
                Some(PathEntry {
                    relative_path: relative,
                    size: metadata.len(),
                })
            })
    }

    /// 扫描目录树
    ///
    /// 根目录不可读时返回 `RootUnreadable`，不重试。
    pub fn scan(&self, root: &Path) -> Result<PathIndex> {
        std::fs::read_dir(root).map_err(|source| SyncError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        })?;

        let index: PathIndex = self.walk(root).collect();
        info!("扫描完成: {} 个文件 ({})", index.len(), root.display());
        Ok(index)
    }

    /// 在阻塞线程池中扫描，避免阻塞 async runtime
    pub async fn scan_blocking(&self, root: PathBuf) -> Result<PathIndex> {
        let scanner = self.clone();
        tokio::task::spawn_blocking(move || scanner.scan(&root)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, len: usize) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![b'x'; len]).unwrap();
    }

    #[test]
    fn scan_lists_files_with_relative_paths() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/x.txt", 10);
        write(dir.path(), "b/c/y.txt", 20);
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let index = PathIndex::scan(dir.path()).unwrap();

        assert_eq!(index.len(), 2);
        assert!(index.contains(&PathEntry::new(Path::new("a").join("x.txt"), 10)));
        assert!(index.contains(&PathEntry::new(Path::new("b").join("c").join("y.txt"), 20)));
    }

    #[test]
    fn scan_of_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");

        let err = PathIndex::scan(&missing).unwrap_err();
        assert!(matches!(err, SyncError::RootUnreadable { .. }));
    }

    #[test]
    fn exclude_patterns_match_any_component() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "show/ep1.mkv", 5);
        write(dir.path(), "show/ep1.mkv.lftp-pget-status", 1);
        write(dir.path(), "TeraCopy-tmp/ep2.mkv", 5);

        let scanner = FileScanner::with_config(ScanConfig {
            exclude_patterns: vec![".lftp-pget-status".into(), "TeraCopy".into()],
        });
        let index = scanner.scan(dir.path()).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.contains(&PathEntry::new(Path::new("show").join("ep1.mkv"), 5)));
    }

    #[test]
    fn entries_compare_by_path_and_size() {
        let a: PathIndex = [PathEntry::new("x", 1), PathEntry::new("y", 2)].into_iter().collect();
        let b: PathIndex = [PathEntry::new("x", 1), PathEntry::new("y", 3)].into_iter().collect();

        let only_a: Vec<_> = a.difference(&b).collect();
        assert_eq!(only_a, vec![&PathEntry::new("y", 2)]);
    }
}
