use anyhow::Result;
use mediasync::config::{default_config_path, AppConfig};
use mediasync::core::{ReleaseTitleExtractor, SyncSession, TitleExtractor};
use mediasync::logging::init_logging;
use mediasync::status::{StatusSink, TracingStatusSink};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = AppConfig::load(&config_path)?;

    // 初始化日志系统
    let _log_guard = init_logging(&config.log);
    info!("加载配置: {} ({} 个监视路径)", config_path.display(), config.paths.len());

    let status: Arc<dyn StatusSink> = Arc::new(TracingStatusSink);
    let titles: Arc<dyn TitleExtractor> = Arc::new(ReleaseTitleExtractor::new());
    let options = config.session_options();
    let shutdown = CancellationToken::new();

    // 每个监视对一个任务，互不影响
    let mut sessions = JoinSet::new();
    for pair in config.watched_pairs() {
        let session = SyncSession::new(
            pair,
            options.clone(),
            status.clone(),
            titles.clone(),
            shutdown.child_token(),
        );
        sessions.spawn(async move {
            let name = session.pair().name.clone();
            (name, session.run().await)
        });
    }

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c(), if !shutdown.is_cancelled() => {
                if let Err(e) = signal {
                    warn!("监听退出信号失败: {}", e);
                }
                info!("正在停止所有监视...");
                shutdown.cancel();
            }
            joined = sessions.join_next() => match joined {
                None => break,
                Some(Ok((name, Ok(end)))) => info!("{} 已结束: {:?}", name, end),
                Some(Ok((name, Err(e)))) => error!("{} 异常结束: {}", name, e),
                Some(Err(e)) => error!("会话任务异常退出: {}", e),
            },
        }
    }

    info!("所有监视已结束");
    Ok(())
}
