//! 删除目标路径并向上清理空目录

use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// 删除 `dest_root` 下的 `relative`（文件或整个目录），然后清理变空的上级目录
///
/// 目标不存在视为已删除。返回是否真的删除了东西。
pub async fn remove_and_prune(dest_root: &Path, relative: &Path) -> io::Result<bool> {
    let target = dest_root.join(relative);

    let result = match fs::symlink_metadata(&target).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(&target).await,
        Ok(_) => fs::remove_file(&target).await,
        Err(e) => Err(e),
    };
    let removed = match result {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(e),
    };

    prune_empty_ancestors(dest_root, &target).await;
    Ok(removed)
}

/// 从 `path` 的父目录开始向上删除空目录，遇到非空目录或到达 `root` 停止（`root` 本身保留）
pub async fn prune_empty_ancestors(root: &Path, path: &Path) {
    let mut current = path.parent();

    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        match is_empty_dir(dir).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                current = dir.parent();
                continue;
            }
            Err(e) => {
                warn!("检查目录失败: {} - {}", dir.display(), e);
                break;
            }
        }
        match fs::remove_dir(dir).await {
            Ok(()) => debug!("删除空目录: {}", dir.display()),
            // 并发的另一个删除任务可能已经删掉它
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                debug!("删除空目录失败，停止向上清理: {} - {}", dir.display(), e);
                break;
            }
        }
        current = dir.parent();
    }
}

async fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    let mut entries = fs::read_dir(dir).await?;
    Ok(entries.next_entry().await?.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn removing_last_file_prunes_up_to_root() {
        let root = TempDir::new().unwrap();
        let deep = root.path().join("a").join("b").join("c");
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(deep.join("f.txt"), b"x").unwrap();
        std::fs::write(root.path().join("a").join("keep.txt"), b"x").unwrap();

        let rel = Path::new("a").join("b").join("c").join("f.txt");
        assert!(remove_and_prune(root.path(), &rel).await.unwrap());

        assert!(!root.path().join("a").join("b").exists());
        assert!(root.path().join("a").join("keep.txt").exists());
    }

    #[tokio::test]
    async fn root_is_never_removed() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("x")).unwrap();
        std::fs::write(root.path().join("x").join("only.txt"), b"x").unwrap();

        remove_and_prune(root.path(), &Path::new("x").join("only.txt"))
            .await
            .unwrap();

        assert!(root.path().exists());
        assert!(!root.path().join("x").exists());
    }

    #[tokio::test]
    async fn missing_target_is_not_an_error() {
        let root = TempDir::new().unwrap();
        let removed = remove_and_prune(root.path(), Path::new("ghost.txt"))
            .await
            .unwrap();
        assert!(!removed);
    }

    #[tokio::test]
    async fn directories_are_removed_recursively() {
        let root = TempDir::new().unwrap();
        let season = root.path().join("show").join("season1");
        std::fs::create_dir_all(&season).unwrap();
        std::fs::write(season.join("e1.mkv"), b"x").unwrap();

        remove_and_prune(root.path(), &Path::new("show").join("season1"))
            .await
            .unwrap();

        assert!(!root.path().join("show").exists());
    }
}
