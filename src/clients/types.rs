//! 媒体库句柄：节目、剧集与标记

use crate::core::{EpisodeId, ShowId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Show {
    pub id: ShowId,
    pub title: String,
}

/// 标记类型；Plex 目前只产出 intro / credits，其余原样保留
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    Intro,
    Credits,
    Other(String),
}

impl MarkerKind {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "intro" => MarkerKind::Intro,
            "credits" => MarkerKind::Credits,
            other => MarkerKind::Other(other.to_string()),
        }
    }
}

/// 剧集上的一段检测结果（毫秒偏移）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Marker {
    pub fn new(kind: MarkerKind, start_ms: u64, end_ms: u64) -> Self {
        Self { kind, start_ms, end_ms }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Episode {
    pub id: EpisodeId,
    pub title: String,
    /// 最近一次拉取时附带的标记；可能已过期，判定片头前需先 reload
    pub markers: Vec<Marker>,
}

impl Episode {
    pub fn new(id: EpisodeId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            markers: Vec::new(),
        }
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn has_intro_marker(&self) -> bool {
        self.markers.iter().any(|m| m.kind == MarkerKind::Intro)
    }

    /// 有片尾标记说明分析器已经跑过
    pub fn has_credits_marker(&self) -> bool {
        self.markers.iter().any(|m| m.kind == MarkerKind::Credits)
    }
}

/// 分析请求的回执。超时不代表失败：请求大概率已被服务端接受，只是客户端没等到响应
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalyzeAck {
    Accepted,
    Unconfirmed,
}
