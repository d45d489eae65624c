//! 单次运行的结果状态：每集的判定结果（Outcome）与汇总统计（RunStats）
//!
//! RunStats 只用于日志汇总，不落盘。

use std::fmt;

/// 每集在一次运行中恰好得到一个判定结果
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// 已在 AnalyzedState 中
    SkipAlreadyProcessed,
    /// 已有片头标记
    SkipHasMarker,
    /// 已有片尾标记（分析器此前跑过）
    SkipAlreadyScanned,
    /// 目标用户已看过，刻意不分析
    SkipWatched,
    /// 已触发分析（或 dry run 下视为触发）
    Analyzed,
    /// 触发失败，下次运行重试
    Failed,
}

impl Outcome {
    /// 除 Failed 外，所有结果都会把 ID 记入 AnalyzedState
    pub fn marks_handled(self) -> bool {
        !matches!(self, Outcome::Failed)
    }
}

/// 各结果计数 + 处理过的节目数
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub shows: usize,
    pub skipped_analyzed: usize,
    pub skipped_has_marker: usize,
    pub skipped_already_scanned: usize,
    pub skipped_watched: usize,
    pub analyzed: usize,
    /// analyzed 中请求超时、无法确认是否被服务端接受的数量
    pub unconfirmed: usize,
    pub failed: usize,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::SkipAlreadyProcessed => self.skipped_analyzed += 1,
            Outcome::SkipHasMarker => self.skipped_has_marker += 1,
            Outcome::SkipAlreadyScanned => self.skipped_already_scanned += 1,
            Outcome::SkipWatched => self.skipped_watched += 1,
            Outcome::Analyzed => self.analyzed += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    /// 本次运行评估过的剧集总数
    pub fn evaluated(&self) -> usize {
        self.skipped_analyzed
            + self.skipped_has_marker
            + self.skipped_already_scanned
            + self.skipped_watched
            + self.analyzed
            + self.failed
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shows, {} analyzed ({} unconfirmed), {} skipped (already processed), \
             {} skipped (has intro), {} skipped (already scanned), \
             {} skipped (already watched), {} failed",
            self.shows,
            self.analyzed,
            self.unconfirmed,
            self.skipped_analyzed,
            self.skipped_has_marker,
            self.skipped_already_scanned,
            self.skipped_watched,
            self.failed,
        )
    }
}
