use mediasync::core::NoTitle;
use mediasync::{MemoryStatusSink, SessionEnd, SessionOptions, SyncSession, WatchMode, WatchedPair};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_secs(10);

struct Running {
    status: Arc<MemoryStatusSink>,
    cancel: CancellationToken,
    handle: JoinHandle<mediasync::error::Result<SessionEnd>>,
}

async fn start(src: &Path, dst: &Path, mode: WatchMode) -> Running {
    let status = Arc::new(MemoryStatusSink::new());
    let cancel = CancellationToken::new();
    let pair = WatchedPair::new("watch", src, dst)
        .with_mode(mode)
        .with_retry_interval(Duration::from_millis(50));
    let session = SyncSession::new(
        pair,
        SessionOptions::default(),
        status.clone(),
        Arc::new(NoTitle),
        cancel.clone(),
    );
    let handle = tokio::spawn(async move { session.run().await });

    let armed = {
        let status = status.clone();
        move || status.count_containing("启动") > 0
    };
    assert!(wait_until(armed).await, "watch never armed");
    Running {
        status,
        cancel,
        handle,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}

impl Running {
    async fn stop(self) -> SessionEnd {
        self.cancel.cancel();
        tokio::time::timeout(TIMEOUT, self.handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap()
    }
}

#[tokio::test]
async fn flat_session_moves_new_top_level_files() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    fs::write(src.path().join("old.mkv"), b"old").unwrap();
    let running = start(src.path(), dst.path(), WatchMode::Flat).await;

    fs::write(src.path().join("new.mkv"), b"fresh").unwrap();
    let target = dst.path().join("new.mkv");
    assert!(wait_until(|| fs::read(&target).map(|c| c == b"fresh").unwrap_or(false)).await);

    // 单层模式不做对账
    assert!(!dst.path().join("old.mkv").exists());
    assert!(running.status.count_containing("移动成功") >= 1);
    assert_eq!(running.stop().await, SessionEnd::Cancelled);
}

#[tokio::test]
async fn library_session_reconciles_then_follows_changes() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    fs::create_dir_all(src.path().join("show")).unwrap();
    fs::write(src.path().join("show").join("e01.mkv"), b"1").unwrap();
    fs::create_dir_all(dst.path().join("stale")).unwrap();
    fs::write(dst.path().join("stale").join("old.mkv"), b"x").unwrap();

    let running = start(src.path(), dst.path(), WatchMode::Library).await;

    assert!(dst.path().join("show").join("e01.mkv").exists());
    assert!(!dst.path().join("stale").exists());

    fs::write(src.path().join("show").join("e02.mkv"), b"22").unwrap();
    let added = dst.path().join("show").join("e02.mkv");
    assert!(wait_until(|| fs::read(&added).map(|c| c == b"22").unwrap_or(false)).await);

    fs::remove_file(src.path().join("show").join("e01.mkv")).unwrap();
    let removed = dst.path().join("show").join("e01.mkv");
    assert!(wait_until(|| !removed.exists()).await);
    assert!(dst.path().join("show").exists());

    assert_eq!(running.stop().await, SessionEnd::Cancelled);
}

#[tokio::test]
async fn removing_source_root_ends_session() {
    let base = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    let src = base.path().join("incoming");
    fs::create_dir_all(&src).unwrap();
    let running = start(&src, dst.path(), WatchMode::Library).await;

    fs::remove_dir_all(&src).unwrap();

    let end = tokio::time::timeout(TIMEOUT, running.handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(matches!(end, SessionEnd::WatchInvalid(_)));
    assert!(running.status.count_containing("监视失效") >= 1);
}

#[tokio::test]
async fn destination_inside_source_is_rejected() {
    let src = TempDir::new().unwrap();
    let session = SyncSession::new(
        WatchedPair::new("nested", src.path(), src.path().join("mirror")),
        SessionOptions::default(),
        Arc::new(MemoryStatusSink::new()),
        Arc::new(NoTitle),
        CancellationToken::new(),
    );

    let err = session.run().await.unwrap_err();
    assert!(matches!(err, mediasync::SyncError::Config(_)));
    assert!(!src.path().join("mirror").exists());
}
