//! 内存版观看记录 / 媒体库（用于测试，无需真实服务）
//!
//! MockLibrary 记录每次 analyze / reload 调用，便于断言触发次数。

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::clients::{
    AnalyzeAck, ClientError, Episode, LibraryProvider, Marker, Show, WatchHistoryProvider,
};
use crate::core::{EpisodeId, ShowId, WatchedSet};

/// Mock 观看记录：用户名（不区分大小写）-> (节目, 剧集) 列表
#[derive(Debug, Default)]
pub struct MockHistory {
    users: HashMap<String, Vec<(ShowId, EpisodeId)>>,
    fail: bool,
}

impl MockHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watch(mut self, username: &str, show: ShowId, episode: EpisodeId) -> Self {
        self.users
            .entry(username.to_lowercase())
            .or_default()
            .push((show, episode));
        self
    }

    /// 让 watched() 始终返回错误（模拟服务不可用）
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl WatchHistoryProvider for MockHistory {
    async fn watched(
        &self,
        usernames: &[String],
        _lookback_days: u32,
    ) -> Result<WatchedSet, ClientError> {
        if self.fail {
            return Err(ClientError::Api("history unavailable".to_string()));
        }
        let mut watched = WatchedSet::new();
        for name in usernames {
            let Some(rows) = self.users.get(&name.to_lowercase()) else {
                continue;
            };
            for (show, episode) in rows {
                watched.record(*show, *episode);
            }
        }
        Ok(watched)
    }
}

/// Mock 媒体库
#[derive(Debug, Default)]
pub struct MockLibrary {
    shows: HashMap<ShowId, (Show, Vec<Episode>)>,
    fresh_markers: HashMap<EpisodeId, Vec<Marker>>,
    failing_analyze: HashSet<EpisodeId>,
    unconfirmed_analyze: HashSet<EpisodeId>,
    failing_reload: HashSet<EpisodeId>,
    analyze_calls: Mutex<Vec<EpisodeId>>,
    reload_calls: Mutex<Vec<EpisodeId>>,
}

impl MockLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_show(mut self, id: ShowId, title: &str, episodes: Vec<Episode>) -> Self {
        let show = Show {
            id,
            title: title.to_string(),
        };
        self.shows.insert(id, (show, episodes));
        self
    }

    /// reload 后剧集会带上这些标记（模拟服务端的最新元数据）
    pub fn with_fresh_markers(mut self, id: EpisodeId, markers: Vec<Marker>) -> Self {
        self.fresh_markers.insert(id, markers);
        self
    }

    pub fn failing_analyze(mut self, id: EpisodeId) -> Self {
        self.failing_analyze.insert(id);
        self
    }

    pub fn unconfirmed_analyze(mut self, id: EpisodeId) -> Self {
        self.unconfirmed_analyze.insert(id);
        self
    }

    pub fn failing_reload(mut self, id: EpisodeId) -> Self {
        self.failing_reload.insert(id);
        self
    }

    /// 已触发分析的剧集（按调用顺序，含失败的调用）
    pub fn analyze_calls(&self) -> Vec<EpisodeId> {
        self.analyze_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn reload_calls(&self) -> Vec<EpisodeId> {
        self.reload_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LibraryProvider for MockLibrary {
    async fn get_show(&self, id: ShowId) -> Option<Show> {
        self.shows.get(&id).map(|(show, _)| show.clone())
    }

    async fn episodes(&self, show: &Show) -> Result<Vec<Episode>, ClientError> {
        self.shows
            .get(&show.id)
            .map(|(_, episodes)| episodes.clone())
            .ok_or_else(|| ClientError::Api(format!("show {} has no episodes", show.id)))
    }

    async fn reload(&self, episode: &mut Episode) -> Result<(), ClientError> {
        if let Ok(mut calls) = self.reload_calls.lock() {
            calls.push(episode.id);
        }
        if self.failing_reload.contains(&episode.id) {
            return Err(ClientError::Api(format!("reload {} failed", episode.id)));
        }
        if let Some(markers) = self.fresh_markers.get(&episode.id) {
            episode.markers = markers.clone();
        }
        Ok(())
    }

    async fn analyze(&self, episode: &Episode) -> Result<AnalyzeAck, ClientError> {
        if let Ok(mut calls) = self.analyze_calls.lock() {
            calls.push(episode.id);
        }
        if self.failing_analyze.contains(&episode.id) {
            return Err(ClientError::Api(format!("analyze {} rejected", episode.id)));
        }
        if self.unconfirmed_analyze.contains(&episode.id) {
            return Ok(AnalyzeAck::Unconfirmed);
        }
        Ok(AnalyzeAck::Accepted)
    }
}
