//! 对账引擎：决定每一集的处理结果
//!
//! 对观看集合中的每个节目（按 ID 升序）拉取剧集列表，逐集按以下顺序判定，命中即停：
//! 已处理 -> 有片头标记 -> 有片尾标记 -> 目标用户已看过 -> 触发分析。
//! 除 Failed 外的结果都会把 ID 记入 AnalyzedState；触发分析次数达到上限后立即结束整次运行，
//! 尚未评估的剧集不产生任何结果，下次运行仍有资格。

use std::sync::Arc;

use crate::clients::{AnalyzeAck, Episode, LibraryProvider, Show};
use crate::config::Config;
use crate::core::{DetectorError, EpisodeId, Outcome, RunStats, WatchedSet};
use crate::store::AnalyzedState;

/// 引擎关心的运行参数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOptions {
    pub max_analyze: usize,
    pub skip_watched: bool,
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_analyze: 20,
            skip_watched: true,
            dry_run: false,
        }
    }
}

impl From<&Config> for RunOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            max_analyze: cfg.max_analyze,
            skip_watched: cfg.skip_watched,
            dry_run: cfg.dry_run,
        }
    }
}

/// 一次对账的产出
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    pub state: AnalyzedState,
    pub stats: RunStats,
    /// 按评估顺序记录的每集结果
    pub outcomes: Vec<(EpisodeId, Outcome)>,
    /// 是否因达到上限提前结束
    pub cap_reached: bool,
}

pub struct ReconciliationEngine {
    library: Arc<dyn LibraryProvider>,
}

impl ReconciliationEngine {
    pub fn new(library: Arc<dyn LibraryProvider>) -> Self {
        Self { library }
    }

    /// 执行一次对账；state 为运行开始时加载的已处理集合，返回更新后的集合与统计
    pub async fn run(
        &self,
        watched: &WatchedSet,
        state: AnalyzedState,
        options: &RunOptions,
    ) -> RunReport {
        let mut report = RunReport {
            state,
            ..RunReport::default()
        };

        'shows: for &show_id in &watched.shows {
            if report.stats.analyzed >= options.max_analyze {
                report.cap_reached = true;
                break;
            }

            let Some(show) = self.library.get_show(show_id).await else {
                tracing::warn!("{}", DetectorError::ShowNotFound(show_id));
                continue;
            };
            let episodes = match self.library.episodes(&show).await {
                Ok(episodes) => episodes,
                Err(e) => {
                    tracing::warn!(show = %show_id, error = %e, "Failed to list episodes, skipping show");
                    continue;
                }
            };

            report.stats.shows += 1;
            tracing::info!("Processing {}: {} episodes", show.title, episodes.len());

            for episode in episodes {
                if report.stats.analyzed >= options.max_analyze {
                    report.cap_reached = true;
                    break 'shows;
                }
                let id = episode.id;
                let outcome = self
                    .evaluate(&show, episode, &mut report, watched, options)
                    .await;
                if outcome.marks_handled() {
                    report.state.insert(id);
                }
                report.stats.record(outcome);
                report.outcomes.push((id, outcome));
            }
        }

        if report.cap_reached {
            tracing::info!(
                "Reached max analyze limit ({}), stopping",
                options.max_analyze
            );
        }
        report
    }

    async fn evaluate(
        &self,
        show: &Show,
        mut episode: Episode,
        report: &mut RunReport,
        watched: &WatchedSet,
        options: &RunOptions,
    ) -> Outcome {
        if report.state.contains(episode.id) {
            return Outcome::SkipAlreadyProcessed;
        }

        // 片头标记需要最新元数据
        if let Err(e) = self.library.reload(&mut episode).await {
            tracing::error!(episode = %episode.id, error = %e, "Failed to refresh episode metadata");
            return Outcome::Failed;
        }
        if episode.has_intro_marker() {
            return Outcome::SkipHasMarker;
        }
        if episode.has_credits_marker() {
            return Outcome::SkipAlreadyScanned;
        }
        if options.skip_watched && watched.contains_episode(episode.id) {
            return Outcome::SkipWatched;
        }

        if options.dry_run {
            tracing::info!("[DRY RUN] Would analyze: {} - {}", show.title, episode.title);
            return Outcome::Analyzed;
        }

        match self.library.analyze(&episode).await {
            Ok(AnalyzeAck::Accepted) => Outcome::Analyzed,
            Ok(AnalyzeAck::Unconfirmed) => {
                tracing::debug!(episode = %episode.id, "Analyze request timed out, assuming accepted");
                report.stats.unconfirmed += 1;
                Outcome::Analyzed
            }
            Err(e) => {
                tracing::error!("{}", DetectorError::AnalyzeRequest(episode.id, e.to_string()));
                Outcome::Failed
            }
        }
    }
}
