//! 运行驱动：连接服务、执行单次对账、按固定间隔重复
//!
//! 单次模式下连接失败或拉取观看记录失败直接返回错误（进程非零退出）；
//! 定时模式下每轮的错误只记录日志，下一轮照常进行。两轮之间不会重叠。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::clients::{LibraryProvider, PlexClient, TautulliClient, WatchHistoryProvider};
use crate::config::Config;
use crate::core::engine::{ReconciliationEngine, RunOptions, RunReport};
use crate::core::shutdown::ShutdownManager;
use crate::core::DetectorError;
use crate::store::StateStore;

/// 一次运行用到的外部服务
#[derive(Clone)]
pub struct Services {
    pub history: Arc<dyn WatchHistoryProvider>,
    pub library: Arc<dyn LibraryProvider>,
}

/// 按配置创建 Tautulli / Plex 客户端；Plex 会先请求 /identity 确认可达
pub async fn connect(cfg: &Config) -> Result<Services, DetectorError> {
    let tautulli = TautulliClient::new(
        &cfg.tautulli_url,
        &cfg.tautulli_api_key,
        cfg.request_timeout_secs,
        cfg.history_length,
    )
    .map_err(|e| DetectorError::Connection(format!("Tautulli: {}", e)))?;
    let plex = PlexClient::connect(
        &cfg.plex_url,
        &cfg.plex_token,
        cfg.request_timeout_secs,
        cfg.analyze_timeout_secs,
    )
    .await
    .map_err(|e| DetectorError::Connection(format!("Plex: {}", e)))?;
    tracing::info!(plex = %cfg.plex_url, tautulli = %cfg.tautulli_url, "Connected to services");

    Ok(Services {
        history: Arc::new(tautulli),
        library: Arc::new(plex),
    })
}

/// 单次对账：加载状态 -> 拉取观看记录 -> 引擎判定 -> 保存状态（dry run 不保存）
pub async fn run_pass(
    cfg: &Config,
    services: &Services,
    store: &StateStore,
) -> Result<RunReport, DetectorError> {
    tracing::info!(
        "Starting intro detection for users: {}",
        cfg.target_users.join(", ")
    );

    let state = store.load().await;
    let watched = services
        .history
        .watched(&cfg.target_users, cfg.lookback_days)
        .await
        .map_err(|e| DetectorError::HistoryFetch(e.to_string()))?;
    tracing::info!(
        "Found {} shows watched by target users ({} episodes)",
        watched.shows.len(),
        watched.episodes.len()
    );

    let engine = ReconciliationEngine::new(services.library.clone());
    let report = engine.run(&watched, state, &RunOptions::from(cfg)).await;

    if cfg.dry_run {
        tracing::info!("[DRY RUN] State not saved");
    } else {
        store.save(&report.state).await?;
        tracing::debug!(path = %store.path().display(), ids = report.state.len(), "State saved");
    }

    tracing::info!("Complete: {}", report.stats);
    Ok(report)
}

/// 连接服务并执行一次对账
pub async fn run_once(cfg: &Config) -> Result<RunReport, DetectorError> {
    let services = connect(cfg).await?;
    let store = StateStore::new(&cfg.state_file);
    run_pass(cfg, &services, &store).await
}

/// 固定间隔调度：一轮结束后休眠 interval 再开始下一轮，收到关闭信号即退出
pub struct Scheduler {
    interval: Duration,
    shutdown: Arc<ShutdownManager>,
}

impl Scheduler {
    pub fn new(interval: Duration, shutdown: Arc<ShutdownManager>) -> Self {
        Self { interval, shutdown }
    }

    /// 返回实际执行的轮数
    pub async fn run<F, Fut>(&self, mut pass: F) -> usize
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RunReport, DetectorError>>,
    {
        let mut runs = 0;
        loop {
            if self.shutdown.is_shutdown() {
                break;
            }
            runs += 1;
            if let Err(e) = pass().await {
                tracing::error!("Run failed: {}", e);
            }

            tracing::info!("Sleeping for {}s...", self.interval.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.wait_for_shutdown() => break,
            }
        }
        match self.shutdown.reason() {
            Some(reason) => tracing::info!(?reason, "Scheduler stopped after {} runs", runs),
            None => tracing::info!("Scheduler stopped after {} runs", runs),
        }
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::clients::{Episode, MockHistory, MockLibrary};
    use crate::core::{EpisodeId, ShowId};
    use crate::core::shutdown::ShutdownReason;

    fn test_config(state_file: std::path::PathBuf) -> Config {
        Config {
            plex_url: "http://plex:32400".into(),
            plex_token: "token".into(),
            tautulli_url: "http://tautulli:8181".into(),
            tautulli_api_key: "key".into(),
            target_users: vec!["bob".into()],
            lookback_days: 7,
            dry_run: false,
            state_file,
            max_analyze: 20,
            run_interval: None,
            skip_watched: true,
            request_timeout_secs: 30,
            analyze_timeout_secs: 2,
            history_length: 1000,
        }
    }

    fn services(history: MockHistory, library: MockLibrary) -> (Services, Arc<MockLibrary>) {
        let library = Arc::new(library);
        let services = Services {
            history: Arc::new(history),
            library: library.clone(),
        };
        (services, library)
    }

    #[tokio::test]
    async fn test_history_failure_aborts_without_saving() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = test_config(dir.path().join("analyzed.json"));
        let store = StateStore::new(&cfg.state_file);
        let (services, _) = services(MockHistory::new().failing(), MockLibrary::new());

        let err = run_pass(&cfg, &services, &store).await.unwrap_err();
        assert!(matches!(err, DetectorError::HistoryFetch(_)));
        assert!(!cfg.state_file.exists());
    }

    #[tokio::test]
    async fn test_pass_saves_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = test_config(dir.path().join("analyzed.json"));
        let store = StateStore::new(&cfg.state_file);
        let (services, library) = services(
            MockHistory::new().with_watch("bob", ShowId(1), EpisodeId(11)),
            MockLibrary::new().with_show(
                ShowId(1),
                "Show",
                vec![Episode::new(EpisodeId(11), "E1"), Episode::new(EpisodeId(12), "E2")],
            ),
        );

        let report = run_pass(&cfg, &services, &store).await.unwrap();
        assert_eq!(report.stats.skipped_watched, 1);
        assert_eq!(report.stats.analyzed, 1);
        assert_eq!(library.analyze_calls(), vec![EpisodeId(12)]);

        let saved = store.load().await;
        assert!(saved.contains(EpisodeId(11)));
        assert!(saved.contains(EpisodeId(12)));
    }

    #[tokio::test]
    async fn test_scheduler_continues_after_failure_until_shutdown() {
        let shutdown = Arc::new(ShutdownManager::new());
        let scheduler = Scheduler::new(Duration::from_millis(5), shutdown.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let runs = scheduler
            .run(|| {
                let calls = calls.clone();
                let shutdown = shutdown.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n == 3 {
                        shutdown.shutdown(ShutdownReason::UserInitiated);
                    }
                    if n == 1 {
                        return Err(DetectorError::HistoryFetch("down".into()));
                    }
                    Ok(RunReport::default())
                }
            })
            .await;

        assert_eq!(runs, 3);
        assert_eq!(shutdown.reason(), Some(ShutdownReason::UserInitiated));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_scheduler_does_not_start_after_shutdown() {
        let shutdown = Arc::new(ShutdownManager::new());
        shutdown.shutdown(ShutdownReason::Signal);
        let scheduler = Scheduler::new(Duration::from_secs(3600), shutdown);

        let runs = scheduler
            .run(|| async { Ok::<_, DetectorError>(RunReport::default()) })
            .await;
        assert_eq!(runs, 0);
    }
}
