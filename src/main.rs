//! Plex Intro Detector
//!
//! 入口：初始化日志、加载配置；设置了 RUN_INTERVAL 则定时运行，否则运行一次后退出。
//! 可选的第一个命令行参数为额外的 TOML 配置文件路径。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use plex_intro_detector::{
    config::load_config,
    core::{run_once, Scheduler, ShutdownManager},
    observability,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load configuration")?;

    match cfg.run_interval {
        Some(interval) => {
            tracing::info!("Scheduler enabled: running every {}s", interval.as_secs());
            let shutdown = Arc::new(ShutdownManager::new());
            shutdown.install_signal_handlers();
            Scheduler::new(interval, shutdown).run(|| run_once(&cfg)).await;
        }
        None => {
            run_once(&cfg).await.context("Run failed")?;
        }
    }

    Ok(())
}
