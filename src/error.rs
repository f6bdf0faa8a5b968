//! 同步错误类型

use std::path::PathBuf;
use thiserror::Error;

/// 同步过程中的错误
///
/// 单个文件的失败（被占用、被删除）不会走到这里，只有影响整个监视对的错误才会返回给调用方。
#[derive(Debug, Error)]
pub enum SyncError {
    /// 根目录无法读取（通常是配置错误）
    #[error("无法读取根目录 {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 文件监视建立失败或失效
    #[error("文件监视失败: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("后台任务异常退出: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
