//! 领域标识：剧集 / 节目 ID 与观看集合
//!
//! ID 即 Plex 的 ratingKey，跨运行稳定；序列化为裸整数。

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 节目（Show）ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShowId(pub u64);

/// 剧集（Episode）ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeId(pub u64);

impl fmt::Display for ShowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 回看窗口内目标用户看过的节目与剧集；每次运行重新计算，不落盘
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchedSet {
    pub shows: BTreeSet<ShowId>,
    pub episodes: BTreeSet<EpisodeId>,
}

impl WatchedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一条观看事件
    pub fn record(&mut self, show: ShowId, episode: EpisodeId) {
        self.shows.insert(show);
        self.episodes.insert(episode);
    }

    pub fn contains_episode(&self, id: EpisodeId) -> bool {
        self.episodes.contains(&id)
    }
}
